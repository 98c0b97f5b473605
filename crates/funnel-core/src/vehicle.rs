//! Vehicle lookup by license plate
//!
//! - [`VehicleBackend`]: one GET-by-plate provider
//! - [`VehicleLookup`]: normalizes the plate and tries backends in order
//! - [`PlateInput`]: debounced lookup session for a plate input field;
//!   only the most recent input may update the displayed vehicle

use crate::error::{LookupError, ProviderError};
use crate::fallback::{FallbackChain, Named};
use crate::timer::TimerHandle;
use crate::types::VehicleInfo;
use crate::validation::normalize_plate;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Source name reported for synthesized development data
pub const PLACEHOLDER_SOURCE: &str = "placeholder";

/// A provider resolving plates to vehicle data
#[async_trait]
pub trait VehicleBackend: Named + Send + Sync + fmt::Debug {
    /// Fetch vehicle data for a normalized plate
    ///
    /// # Errors
    /// Any non-2xx status, transport failure or unusable body
    async fn fetch(&self, plate: &str) -> Result<VehicleInfo, ProviderError>;
}

/// Lookup tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupConfig {
    /// Input inactivity before a lookup starts
    pub debounce_ms: u64,
    /// Shortest normalized plate worth looking up
    pub min_plate_len: usize,
    /// Synthesize placeholder data when every backend fails
    pub dev_placeholder: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 700,
            min_plate_len: 5,
            dev_placeholder: false,
        }
    }
}

impl LookupConfig {
    /// Set debounce delay
    #[inline]
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable development placeholders
    #[inline]
    #[must_use]
    pub fn with_dev_placeholder(mut self, enabled: bool) -> Self {
        self.dev_placeholder = enabled;
        self
    }

    /// Debounce delay
    #[inline]
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Vehicle data with the backend that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVehicle {
    /// Normalized plate
    pub plate: String,
    /// Vehicle data
    pub info: VehicleInfo,
    /// Backend name, or [`PLACEHOLDER_SOURCE`]
    pub source: String,
}

/// Ordered multi-backend lookup
#[derive(Debug, Clone)]
pub struct VehicleLookup {
    backends: FallbackChain<dyn VehicleBackend>,
    config: LookupConfig,
}

impl VehicleLookup {
    /// Create lookup over backends in priority order
    #[must_use]
    pub fn new(backends: Vec<Arc<dyn VehicleBackend>>, config: LookupConfig) -> Self {
        Self {
            backends: FallbackChain::new(backends),
            config,
        }
    }

    /// Lookup configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Backend names in the order they are tried
    #[must_use]
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.names()
    }

    /// Resolve a plate as typed
    ///
    /// # Errors
    /// `InvalidPlate` without any network call when the normalized plate is
    /// too short; `Unavailable` when every backend failed and development
    /// placeholders are off
    pub async fn lookup(&self, raw: &str) -> Result<ResolvedVehicle, LookupError> {
        let plate = normalize_plate(raw);
        if plate.len() < self.config.min_plate_len {
            return Err(LookupError::InvalidPlate(plate));
        }

        let result = self
            .backends
            .first_success(|backend| {
                let plate = plate.clone();
                async move {
                    let info = backend.fetch(&plate).await?;
                    if info.is_empty() {
                        return Err(ProviderError::Incomplete("no vehicle data".to_string()));
                    }
                    Ok(info)
                }
            })
            .await;

        match result {
            Ok(resolved) => {
                tracing::info!("Resolved plate {} via {}", plate, resolved.provider);
                Ok(ResolvedVehicle {
                    plate,
                    info: resolved.value,
                    source: resolved.provider,
                })
            }
            Err(_) if self.config.dev_placeholder => {
                tracing::warn!("Every vehicle backend failed for {}, using placeholder", plate);
                Ok(ResolvedVehicle {
                    info: VehicleInfo::placeholder(plate.clone()),
                    plate,
                    source: PLACEHOLDER_SOURCE.to_string(),
                })
            }
            Err(attempts) => Err(LookupError::Unavailable { attempts }),
        }
    }
}

/// What the vehicle panel shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VehicleDisplay {
    /// Nothing to show
    #[default]
    Idle,
    /// Lookup running for a plate
    Loading {
        /// Plate being looked up
        plate: String,
    },
    /// Vehicle found
    Ready(ResolvedVehicle),
    /// Lookup failed
    Failed {
        /// Plate that failed
        plate: String,
        /// User-facing message
        message: String,
    },
}

struct Latest {
    generation: u64,
    pending: Option<TimerHandle>,
}

/// Debounced lookup session bound to one plate input
///
/// Each keystroke bumps a generation counter and restarts the debounce.
/// A finished lookup only publishes if its generation is still the latest,
/// so a slow response for a superseded plate can never overwrite the
/// display.
pub struct PlateInput {
    lookup: Arc<VehicleLookup>,
    latest: Arc<Mutex<Latest>>,
    display: Arc<watch::Sender<VehicleDisplay>>,
}

impl fmt::Debug for PlateInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlateInput")
            .field("generation", &self.latest.lock().generation)
            .field("display", &*self.display.borrow())
            .finish_non_exhaustive()
    }
}

impl PlateInput {
    /// Create a session over a lookup
    #[must_use]
    pub fn new(lookup: Arc<VehicleLookup>) -> Self {
        let (tx, _rx) = watch::channel(VehicleDisplay::Idle);
        Self {
            lookup,
            latest: Arc::new(Mutex::new(Latest {
                generation: 0,
                pending: None,
            })),
            display: Arc::new(tx),
        }
    }

    /// Display updates
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<VehicleDisplay> {
        self.display.subscribe()
    }

    /// Current display
    #[must_use]
    pub fn display(&self) -> VehicleDisplay {
        self.display.borrow().clone()
    }

    /// Input generation; bumps on every keystroke
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.latest.lock().generation
    }

    /// Feed the current input value
    ///
    /// Cancels any pending or running lookup for the previous value. Short
    /// plates reset the display without a lookup.
    pub fn input(&self, raw: &str) {
        let plate = normalize_plate(raw);
        let mut latest = self.latest.lock();
        latest.generation += 1;
        let generation = latest.generation;
        if let Some(mut previous) = latest.pending.take() {
            previous.cancel();
        }

        if plate.len() < self.lookup.config().min_plate_len {
            self.display.send_replace(VehicleDisplay::Idle);
            return;
        }

        let lookup = Arc::clone(&self.lookup);
        let guard = Arc::clone(&self.latest);
        let display = Arc::clone(&self.display);
        let debounce = lookup.config().debounce();

        latest.pending = Some(TimerHandle::spawn(async move {
            tokio::time::sleep(debounce).await;
            if !publish(&guard, &display, generation, VehicleDisplay::Loading { plate: plate.clone() }) {
                return;
            }

            let next = match lookup.lookup(&plate).await {
                Ok(resolved) => VehicleDisplay::Ready(resolved),
                Err(err) => {
                    tracing::warn!("Vehicle lookup for {} failed: {}", plate, err);
                    VehicleDisplay::Failed {
                        plate: plate.clone(),
                        message: err.user_message().to_string(),
                    }
                }
            };

            if !publish(&guard, &display, generation, next) {
                tracing::debug!("Discarding stale lookup result for {}", plate);
            }
        }));
    }

    /// Cancel any pending lookup
    pub fn teardown(&self) {
        let mut latest = self.latest.lock();
        latest.generation += 1;
        if let Some(mut pending) = latest.pending.take() {
            pending.cancel();
        }
    }
}

impl Drop for PlateInput {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn publish(
    latest: &Mutex<Latest>,
    display: &watch::Sender<VehicleDisplay>,
    generation: u64,
    value: VehicleDisplay,
) -> bool {
    let latest = latest.lock();
    if latest.generation != generation {
        return false;
    }
    display.send_replace(value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct ScriptedBackend {
        name: String,
        delay: Duration,
        responses: HashMap<String, Result<VehicleInfo, ProviderError>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                delay: Duration::ZERO,
                responses: HashMap::new(),
                calls: AtomicUsize::new(0),
            })
        }

        fn serving(name: &str, delay: Duration, plates: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                delay,
                responses: plates
                    .iter()
                    .map(|(plate, brand)| {
                        let info = VehicleInfo {
                            brand: (*brand).to_string(),
                            model: "MODEL".to_string(),
                            plate: (*plate).to_string(),
                            ..VehicleInfo::default()
                        };
                        ((*plate).to_string(), Ok(info))
                    })
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Named for ScriptedBackend {
        fn name(&self) -> &str {
            &self.name
        }
    }

    #[async_trait]
    impl VehicleBackend for ScriptedBackend {
        async fn fetch(&self, plate: &str) -> Result<VehicleInfo, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.responses
                .get(plate)
                .cloned()
                .unwrap_or(Err(ProviderError::Status(404)))
        }
    }

    #[tokio::test]
    async fn short_plate_fails_fast() {
        let backend = ScriptedBackend::failing("a");
        let lookup = VehicleLookup::new(vec![backend.clone()], LookupConfig::default());

        let err = lookup.lookup("ab-1").await.unwrap_err();

        assert!(matches!(err, LookupError::InvalidPlate(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_through_to_next_backend() {
        let a = ScriptedBackend::failing("a");
        let b = ScriptedBackend::serving("b", Duration::ZERO, &[("ABC1234", "FIAT")]);
        let c = ScriptedBackend::serving("c", Duration::ZERO, &[("ABC1234", "VW")]);
        let lookup = VehicleLookup::new(vec![a.clone(), b.clone(), c.clone()], LookupConfig::default());

        let resolved = lookup.lookup("abc-1234").await.unwrap();

        assert_eq!(resolved.info.brand, "FIAT");
        assert_eq!(resolved.source, "b");
        assert_eq!(c.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_failing_is_unavailable_or_placeholder() {
        let backends: Vec<Arc<dyn VehicleBackend>> =
            vec![ScriptedBackend::failing("a"), ScriptedBackend::failing("b")];

        let lookup = VehicleLookup::new(backends.clone(), LookupConfig::default());
        match lookup.lookup("ABC1234").await.unwrap_err() {
            LookupError::Unavailable { attempts } => assert_eq!(attempts.len(), 2),
            other => panic!("unexpected {other:?}"),
        }

        let dev = VehicleLookup::new(backends, LookupConfig::default().with_dev_placeholder(true));
        let resolved = dev.lookup("ABC1234").await.unwrap();
        assert_eq!(resolved.source, PLACEHOLDER_SOURCE);
        assert_eq!(resolved.info.plate, "ABC1234");
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_coalesces_keystrokes() {
        let backend = ScriptedBackend::serving("a", Duration::ZERO, &[("ABC1234", "FIAT")]);
        let lookup = Arc::new(VehicleLookup::new(vec![backend.clone()], LookupConfig::default()));
        let input = PlateInput::new(lookup);

        for typed in ["ABC12", "ABC123", "ABC1234"] {
            input.input(typed);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(input.display(), VehicleDisplay::Ready(ref r) if r.plate == "ABC1234"));
    }

    #[tokio::test(start_paused = true)]
    async fn short_input_resets_display() {
        let backend = ScriptedBackend::serving("a", Duration::ZERO, &[("ABC1234", "FIAT")]);
        let input = PlateInput::new(Arc::new(VehicleLookup::new(vec![backend], LookupConfig::default())));

        input.input("ABC1234");
        tokio::time::sleep(Duration::from_secs(1)).await;
        input.input("AB");

        assert_eq!(input.display(), VehicleDisplay::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_lookup() {
        let backend = ScriptedBackend::serving("a", Duration::ZERO, &[("ABC1234", "FIAT")]);
        let input = PlateInput::new(Arc::new(VehicleLookup::new(
            vec![backend.clone()],
            LookupConfig::default(),
        )));

        input.input("ABC1234");
        input.teardown();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(input.display(), VehicleDisplay::Idle);
    }
}
