//! Error types for the funnel core
//!
//! Every failure in the wizard degrades to a recoverable UI state:
//! - Validation errors block progression of one step
//! - Lookup errors leave vehicle data unavailable
//! - Storage errors are logged and swallowed by the adapter
//! - Payment errors become a single user-facing toast

use crate::fallback::AttemptFailure;
use crate::validation::ValidationErrors;
use crate::wizard::{StepPhase, WizardStep};

/// Main funnel error type
#[derive(Debug, thiserror::Error)]
pub enum FunnelError {
    /// Step input failed validation
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Vehicle lookup failed
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Mock payment failed
    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Wizard flow violation
    #[error("wizard error: {0}")]
    Wizard(#[from] WizardError),
}

impl From<ValidationErrors> for FunnelError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl FunnelError {
    /// Check if the user can fix this by editing the form
    #[inline]
    #[must_use]
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Lookup(LookupError::InvalidPlate(_)))
    }
}

/// Storage backend errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Storage disabled (private browsing)
    #[error("storage unavailable")]
    Unavailable,

    /// Write would exceed the quota
    #[error("quota exceeded writing {key} ({bytes} bytes)")]
    QuotaExceeded { key: String, bytes: usize },

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single provider call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Non-2xx response
    #[error("unexpected status {0}")]
    Status(u16),

    /// Network or connection failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Body decoded but is missing required data
    #[error("incomplete response: {0}")]
    Incomplete(String),

    /// Provider lacks configuration (e.g. no secret)
    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Check if the call could succeed on a later attempt
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status(code) => *code >= 500 || *code == 429,
            Self::Transport(_) => true,
            Self::Decode(_) | Self::Incomplete(_) | Self::NotConfigured(_) => false,
        }
    }
}

/// Vehicle lookup errors
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Plate too short to look up; no network call made
    #[error("invalid plate: {0}")]
    InvalidPlate(String),

    /// Every backend failed
    #[error("all {} vehicle backends failed", .attempts.len())]
    Unavailable { attempts: Vec<AttemptFailure> },
}

impl LookupError {
    /// Message shown to the user
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidPlate(_) => "Invalid plate. Provide a plate with at least 5 characters.",
            Self::Unavailable { .. } => "Could not retrieve vehicle information. Try again later.",
        }
    }
}

/// Mock payment errors
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Missing payer data
    #[error("invalid payment request: {0}")]
    InvalidRequest(String),

    /// Generator configuration is unusable
    #[error("payment configuration error: {0}")]
    Config(String),

    /// Every gateway failed
    #[error("all {} payment gateways failed", .attempts.len())]
    Unavailable { attempts: Vec<AttemptFailure> },
}

impl PaymentError {
    /// Toast shown to the user; retry is manual
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "Name and CPF are required.",
            Self::Config(_) | Self::Unavailable { .. } => {
                "We could not generate your payment right now. Please try again."
            }
        }
    }
}

/// Wizard flow errors
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    /// Arrived at a step without the prior steps' data
    #[error("missing prior state for {step:?}, restart at {restart:?}")]
    MissingPriorState { step: WizardStep, restart: WizardStep },

    /// Phase change not allowed by the step state machine
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition { from: StepPhase, to: StepPhase },

    /// Input does not belong to this step
    #[error("input for {got:?} submitted to {expected:?}")]
    WrongStep { expected: WizardStep, got: WizardStep },

    /// Step torn down before completion
    #[error("step cancelled")]
    Cancelled,
}
