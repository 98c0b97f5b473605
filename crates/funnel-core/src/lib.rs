//! Funnel Core - delivery-partner registration wizard
//!
//! The client-side heart of the registration funnel:
//! - Validates each wizard step with field-scoped errors
//! - Carries the accumulated candidate record through typed local storage
//! - Looks up vehicles by plate across ordered backends, debounced and stale-safe
//! - Plays cancelable cosmetic loading sequences between steps
//! - Generates mock PIX payments with fallback and a countdown
//!
//! No network code lives here; HTTP backends plug in through
//! [`VehicleBackend`] and [`PaymentGateway`].
//!
//! # Example
//!
//! ```rust,ignore
//! use funnel_core::prelude::*;
//!
//! # async fn example() -> Result<(), FunnelError> {
//! let persistence = Persistence::in_memory();
//! let mut step = StepController::enter(WizardStep::Profile, persistence)?;
//!
//! let next = step.submit_and_wait(&StepInput::Profile(form)).await?;
//! assert_eq!(next, Some(WizardStep::Municipalities));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod catalog;
pub mod error;
pub mod fallback;
pub mod loading;
pub mod municipalities;
pub mod payment;
pub mod storage;
pub mod timer;
pub mod types;
pub mod validation;
pub mod vehicle;
pub mod wizard;

// Re-exports for convenience
pub use catalog::{Benefit, Candidate, NewBenefit, NewCandidate, NewState, ReferenceState, Region};
pub use error::{FunnelError, LookupError, PaymentError, ProviderError, StorageError, WizardError};
pub use fallback::{AttemptFailure, FallbackChain, Named, Resolved};
pub use loading::{LoadingProgress, LoadingScript, LoadingSequence};
pub use municipalities::{start_date_options, MunicipalitySelection, StartDateOption};
pub use payment::{
    Countdown, CountdownState, LocalPixGateway, MockPixGenerator, PaymentGateway, PaymentService,
    PixConfig, PreparedPayment, DEFAULT_KIT_AMOUNT,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, Persistence, StorageKey};
pub use timer::{TimerHandle, TimerScope};
pub use types::{
    AccountType, CandidateRecord, EpiSelection, KitSize, Municipality, PaymentInfo, PaymentRequest,
    PaymentStatus, PayoutAccount, VehicleInfo, VehicleType,
};
pub use validation::{EpiForm, Field, FieldError, PayoutForm, ProfileForm, ValidationErrors};
pub use vehicle::{LookupConfig, PlateInput, ResolvedVehicle, VehicleBackend, VehicleDisplay, VehicleLookup};
pub use wizard::{StartDateInput, StepController, StepInput, StepOutcome, StepPhase, WizardState, WizardStep};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the wizard
    pub use crate::{
        CandidateRecord, EpiForm, FunnelError, LookupConfig, MockPixGenerator, PaymentRequest,
        PaymentService, Persistence, PayoutForm, ProfileForm, StepController, StepInput, StepOutcome,
        VehicleLookup, WizardState, WizardStep,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn profile() -> ProfileForm {
        ProfileForm {
            full_name: "Jane Doe".to_string(),
            tax_id: "123.456.789-09".to_string(),
            phone: "(11) 98888-7777".to_string(),
            email: "a@b.com".to_string(),
            vehicle_type: Some(VehicleType::Car),
            license_plate: Some("ABC-1234".to_string()),
            is_rented_vehicle: false,
            state: "SP".to_string(),
            city: "Campinas".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wizard_full_flow() {
        let persistence = Persistence::in_memory();

        let mut step = StepController::enter(WizardStep::Profile, persistence.clone()).unwrap();
        let next = step.submit_and_wait(&StepInput::Profile(profile())).await.unwrap();
        assert_eq!(next, Some(WizardStep::Municipalities));

        let mut step = StepController::enter(WizardStep::Municipalities, persistence.clone()).unwrap();
        let mut selection =
            MunicipalitySelection::from_municipalities(vec![Municipality::new("Campinas", 40)]);
        selection.toggle_all();
        let next = step
            .submit_and_wait(&StepInput::Municipalities(selection))
            .await
            .unwrap();
        assert_eq!(next, Some(WizardStep::StartDate));

        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let options = start_date_options(today);
        let mut step = StepController::enter(WizardStep::StartDate, persistence.clone())
            .unwrap()
            .with_today(today);
        let next = step
            .submit_and_wait(&StepInput::StartDate(StartDateInput {
                choice: Some(options[0].value.clone()),
            }))
            .await
            .unwrap();
        assert_eq!(next, Some(WizardStep::Payout));

        let mut step = StepController::enter(WizardStep::Payout, persistence.clone()).unwrap();
        let payout = PayoutForm {
            bank: "itau".to_string(),
            account_type: "savings".to_string(),
        };
        assert_eq!(
            step.submit_and_wait(&StepInput::Payout(payout)).await.unwrap(),
            Some(WizardStep::Epi)
        );

        let mut step = StepController::enter(WizardStep::Epi, persistence.clone()).unwrap();
        let epi = EpiForm {
            terms_accepted: true,
            ..EpiForm::default()
        };
        assert_eq!(
            step.submit_and_wait(&StepInput::Epi(epi)).await.unwrap(),
            Some(WizardStep::Payment)
        );

        let state = WizardState::load(&persistence);
        assert!(state.check_entry(WizardStep::Payment).is_ok());
        assert_eq!(state.record.license_plate.as_deref(), Some("ABC1234"));
        assert_eq!(state.record.start_date.as_deref(), Some("11/03/2025"));

        let service = PaymentService::local(Arc::new(MockPixGenerator::default()));
        let payment = service
            .create_and_store(&PaymentRequest::from_record(&state.record), &persistence)
            .await
            .unwrap();
        assert!(payment.pix_code.contains("12345678909"));
        assert_eq!(persistence.payment().unwrap().id, payment.id);
    }
}
