//! Ordered fallback across providers
//!
//! The fallback policy is data: an ordered list of providers consumed by
//! a single "try in order, return first success" combinator. Failures are
//! logged and collected; later providers are never called once one succeeds.

use crate::error::ProviderError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Anything that can sit in a fallback chain
pub trait Named {
    /// Provider name for logs and diagnostics
    fn name(&self) -> &str;
}

/// One failed provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// Provider name
    pub provider: String,
    /// What went wrong
    pub error: ProviderError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

/// Successful chain result
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// Value from the first provider that succeeded
    pub value: T,
    /// Name of that provider
    pub provider: String,
    /// Failures of the providers tried before it
    pub failures: Vec<AttemptFailure>,
}

/// Ordered provider list
pub struct FallbackChain<P: ?Sized> {
    providers: Vec<Arc<P>>,
}

impl<P: ?Sized> Clone for FallbackChain<P> {
    fn clone(&self) -> Self {
        Self {
            providers: self.providers.clone(),
        }
    }
}

impl<P: ?Sized + Named> fmt::Debug for FallbackChain<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChain")
            .field("providers", &self.names())
            .finish()
    }
}

impl<P: ?Sized> Default for FallbackChain<P> {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
        }
    }
}

impl<P: ?Sized + Named> FallbackChain<P> {
    /// Create chain from providers in priority order
    #[inline]
    #[must_use]
    pub fn new(providers: Vec<Arc<P>>) -> Self {
        Self { providers }
    }

    /// Append a lower-priority provider
    #[inline]
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<P>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Provider names in order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Number of providers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// True without providers
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Try each provider in order and stop at the first success
    ///
    /// # Errors
    /// Returns every attempt's failure when no provider succeeds
    pub async fn first_success<T, F, Fut>(
        &self,
        mut attempt: F,
    ) -> Result<Resolved<T>, Vec<AttemptFailure>>
    where
        F: FnMut(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut failures = Vec::new();

        for provider in &self.providers {
            let name = provider.name().to_string();
            tracing::debug!("Trying provider {}", name);

            match attempt(Arc::clone(provider)).await {
                Ok(value) => {
                    if !failures.is_empty() {
                        tracing::info!("Provider {} succeeded after {} failures", name, failures.len());
                    }
                    return Ok(Resolved {
                        value,
                        provider: name,
                        failures,
                    });
                }
                Err(error) => {
                    tracing::warn!("Provider {} failed: {}", name, error);
                    failures.push(AttemptFailure {
                        provider: name,
                        error,
                    });
                }
            }
        }

        tracing::error!("All {} providers failed", failures.len());
        Err(failures)
    }
}
