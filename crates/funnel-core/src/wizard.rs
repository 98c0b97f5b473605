//! Wizard step controller
//!
//! The registration funnel is a linear sequence of steps. The accumulated
//! [`WizardState`] is an explicit value threaded through pure transition
//! functions; a [`StepController`] drives one step through its phases:
//!
//! ```text
//! Editing -> Validating -> Invalid -> Editing
//!                       -> Valid -> Persisting -> Loading -> Navigating
//!                                              -> Navigating
//! ```
//!
//! The loading phase plays a cosmetic [`LoadingSequence`]; navigation only
//! happens once it completes, and tearing the controller down cancels it.

use crate::error::WizardError;
use crate::loading::{LoadingScript, LoadingSequence};
use crate::municipalities::{start_date_options, validate_start_date, MunicipalitySelection, StartDateOption};
use crate::storage::Persistence;
use crate::types::{CandidateRecord, EpiSelection, PayoutAccount};
use crate::validation::{mask_cpf, profile_holds, EpiForm, PayoutForm, ProfileForm, ValidationErrors};
use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Steps of the funnel in route order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    /// Personal data and vehicle
    Profile,
    /// Delivery area
    Municipalities,
    /// First working day
    StartDate,
    /// Bank account for earnings
    Payout,
    /// Safety kit sizes and terms
    Epi,
    /// Mock kit payment
    Payment,
}

impl WizardStep {
    /// Every step in order
    pub const ALL: [WizardStep; 6] = [
        WizardStep::Profile,
        WizardStep::Municipalities,
        WizardStep::StartDate,
        WizardStep::Payout,
        WizardStep::Epi,
        WizardStep::Payment,
    ];

    /// Route path of the page hosting the step
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Profile => "/cadastro",
            // Start date is a modal on the municipality page
            Self::Municipalities | Self::StartDate => "/municipios",
            Self::Payout => "/recebedor",
            Self::Epi => "/finalizacao",
            Self::Payment => "/entrega",
        }
    }

    /// Following step
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    /// Preceding step
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        index.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }

    /// Loading sequence played after a successful submit
    #[must_use]
    pub fn loading_script(self) -> Option<LoadingScript> {
        match self {
            Self::Profile => Some(LoadingScript::profile()),
            Self::Municipalities => Some(LoadingScript::municipalities()),
            Self::Epi => Some(LoadingScript::epi()),
            Self::StartDate | Self::Payout | Self::Payment => None,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Phase of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepPhase {
    /// User is filling the form
    Editing,
    /// Running step validation
    Validating,
    /// Validation failed
    Invalid,
    /// Validation passed
    Valid,
    /// Writing to local storage
    Persisting,
    /// Cosmetic loading sequence
    Loading,
    /// Moving to the next step
    Navigating,
}

/// Phases reachable from `from`
#[must_use]
pub fn allowed_transitions(from: StepPhase) -> Vec<StepPhase> {
    use StepPhase::*;
    match from {
        Editing => vec![Validating],
        Validating => vec![Invalid, Valid],
        Invalid => vec![Editing],
        Valid => vec![Persisting],
        Persisting => vec![Loading, Navigating],
        Loading => vec![Navigating, Editing],
        Navigating => vec![],
    }
}

/// Check a phase change
///
/// # Errors
/// Returns `IllegalTransition` when `to` is not reachable from `from`
pub fn validate_transition(from: StepPhase, to: StepPhase) -> Result<(), WizardError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(WizardError::IllegalTransition { from, to })
    }
}

/// Start-date step input
///
/// Only the pick travels with the input; the offered dates are derived
/// from the day the step is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDateInput {
    /// Picked value, if any
    pub choice: Option<String>,
}

/// Form data submitted to a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepInput {
    /// Profile form
    Profile(ProfileForm),
    /// Municipality picks
    Municipalities(MunicipalitySelection),
    /// Start-date choice
    StartDate(StartDateInput),
    /// Payout form
    Payout(PayoutForm),
    /// Safety kit form
    Epi(EpiForm),
}

impl StepInput {
    /// Step this input belongs to
    #[must_use]
    pub fn step(&self) -> WizardStep {
        match self {
            Self::Profile(_) => WizardStep::Profile,
            Self::Municipalities(_) => WizardStep::Municipalities,
            Self::StartDate(_) => WizardStep::StartDate,
            Self::Payout(_) => WizardStep::Payout,
            Self::Epi(_) => WizardStep::Epi,
        }
    }
}

/// Everything accumulated so far
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    /// Candidate record
    pub record: CandidateRecord,
    /// Safety kit sizes
    pub epi: Option<EpiSelection>,
    /// Payout account
    pub payout: Option<PayoutAccount>,
}

impl WizardState {
    /// Rebuild state from storage; missing entries stay empty
    #[must_use]
    pub fn load(persistence: &Persistence) -> Self {
        Self {
            record: persistence.candidate().unwrap_or_default(),
            epi: persistence.epi(),
            payout: persistence.payout(),
        }
    }

    /// Apply one step's input as of today, returning the new state
    ///
    /// # Errors
    /// Returns the step's field errors; the original state is untouched
    pub fn apply(&self, input: &StepInput) -> Result<Self, ValidationErrors> {
        self.apply_on(input, Local::now().date_naive())
    }

    /// Apply one step's input, offering start dates relative to `today`
    ///
    /// # Errors
    /// Returns the step's field errors; the original state is untouched
    pub fn apply_on(&self, input: &StepInput, today: NaiveDate) -> Result<Self, ValidationErrors> {
        let mut next = self.clone();
        match input {
            StepInput::Profile(form) => form.apply_to(&mut next.record)?,
            StepInput::Municipalities(selection) => {
                next.record.selected_municipalities = selection.validate()?;
            }
            StepInput::StartDate(input) => {
                let offered = start_date_options(today);
                next.record.start_date = Some(validate_start_date(input.choice.as_deref(), &offered)?);
            }
            StepInput::Payout(form) => next.payout = Some(form.validate()?),
            StepInput::Epi(form) => next.epi = Some(form.validate()?),
        }
        Ok(next)
    }

    /// First step whose prerequisites are missing, if it comes before `step`
    #[must_use]
    pub fn restart_point(&self, step: WizardStep) -> Option<WizardStep> {
        let missing = if !profile_holds(&self.record) {
            WizardStep::Profile
        } else if self.record.selected_municipalities.is_empty() {
            WizardStep::Municipalities
        } else if self.record.start_date.is_none() {
            WizardStep::StartDate
        } else if self.payout.is_none() {
            WizardStep::Payout
        } else if self.epi.is_none() {
            WizardStep::Epi
        } else {
            WizardStep::Payment
        };
        (missing < step).then_some(missing)
    }

    /// Check the state may enter `step`
    ///
    /// # Errors
    /// Returns `MissingPriorState` naming where to restart
    pub fn check_entry(&self, step: WizardStep) -> Result<(), WizardError> {
        match self.restart_point(step) {
            Some(restart) => Err(WizardError::MissingPriorState { step, restart }),
            None => Ok(()),
        }
    }

    /// Write the part of the state a step changed
    ///
    /// Returns `false` when the write failed; the flow carries on.
    pub fn persist(&self, persistence: &Persistence, step: WizardStep) -> bool {
        match step {
            WizardStep::Profile | WizardStep::Municipalities | WizardStep::StartDate => {
                persistence.save(crate::storage::keys::CANDIDATE, &self.record)
            }
            WizardStep::Payout => match &self.payout {
                Some(payout) => persistence.save(crate::storage::keys::PAYOUT, payout),
                None => false,
            },
            WizardStep::Epi => match &self.epi {
                Some(epi) => persistence.save(crate::storage::keys::EPI, epi),
                None => false,
            },
            WizardStep::Payment => true,
        }
    }
}

/// Result of a submit
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Form rejected; the step is back in `Editing`
    Invalid(ValidationErrors),
    /// Loading sequence started; navigation follows on completion
    Loading,
    /// Navigation callback already ran
    Navigated(WizardStep),
}

/// Controller for one mounted step
///
/// Dropping the controller cancels any running loading sequence, so the
/// navigation callback can never fire for a step that is gone.
#[derive(Debug)]
pub struct StepController {
    step: WizardStep,
    phase: Arc<Mutex<StepPhase>>,
    state: WizardState,
    errors: ValidationErrors,
    persistence: Persistence,
    script: Option<LoadingScript>,
    loading: Option<LoadingSequence>,
    today: NaiveDate,
}

impl StepController {
    /// Mount a step, loading the accumulated state from storage
    ///
    /// # Errors
    /// Returns `MissingPriorState` when an earlier step has to be redone
    pub fn enter(step: WizardStep, persistence: Persistence) -> Result<Self, WizardError> {
        let state = WizardState::load(&persistence);
        if let Err(err) = state.check_entry(step) {
            tracing::info!("Redirecting from {}: {}", step, err);
            return Err(err);
        }

        tracing::debug!("Entered step {}", step);
        Ok(Self {
            step,
            phase: Arc::new(Mutex::new(StepPhase::Editing)),
            state,
            errors: ValidationErrors::new(),
            persistence,
            script: step.loading_script(),
            loading: None,
            today: Local::now().date_naive(),
        })
    }

    /// Mount a step or fall back to the step named by the redirect
    #[must_use]
    pub fn enter_or_redirect(step: WizardStep, persistence: Persistence) -> Self {
        match Self::enter(step, persistence.clone()) {
            Ok(controller) => controller,
            Err(WizardError::MissingPriorState { restart, .. }) => {
                Self::enter(restart, persistence.clone()).unwrap_or_else(|_| Self::fresh(persistence))
            }
            Err(_) => Self::fresh(persistence),
        }
    }

    fn fresh(persistence: Persistence) -> Self {
        Self {
            step: WizardStep::Profile,
            phase: Arc::new(Mutex::new(StepPhase::Editing)),
            state: WizardState::load(&persistence),
            errors: ValidationErrors::new(),
            persistence,
            script: WizardStep::Profile.loading_script(),
            loading: None,
            today: Local::now().date_naive(),
        }
    }

    /// Replace the loading script; `None` navigates right after persisting
    #[inline]
    #[must_use]
    pub fn with_loading_script(mut self, script: Option<LoadingScript>) -> Self {
        self.script = script;
        self
    }

    /// Pin the day start dates are offered from
    #[inline]
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Start dates this step accepts
    #[must_use]
    pub fn start_date_options(&self) -> Vec<StartDateOption> {
        start_date_options(self.today)
    }

    /// Mounted step
    #[inline]
    #[must_use]
    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> StepPhase {
        *self.phase.lock()
    }

    /// Accumulated state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Field errors from the last rejected submit
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Loading sequence, while one is running
    #[inline]
    #[must_use]
    pub fn loading(&self) -> Option<&LoadingSequence> {
        self.loading.as_ref()
    }

    fn transition(&self, to: StepPhase) -> Result<(), WizardError> {
        let mut phase = self.phase.lock();
        validate_transition(*phase, to)?;
        *phase = to;
        Ok(())
    }

    /// Validate, persist and move on
    ///
    /// `navigate` receives the next step once the loading sequence (if any)
    /// completes. It is never called if the step is torn down first.
    ///
    /// # Errors
    /// Returns `WrongStep` for input of another step and
    /// `IllegalTransition` when the step is not in `Editing`
    pub fn submit<F>(&mut self, input: &StepInput, navigate: F) -> Result<StepOutcome, WizardError>
    where
        F: FnOnce(WizardStep) + Send + 'static,
    {
        if input.step() != self.step {
            return Err(WizardError::WrongStep {
                expected: self.step,
                got: input.step(),
            });
        }

        self.transition(StepPhase::Validating)?;
        let next_state = match self.state.apply_on(input, self.today) {
            Ok(state) => state,
            Err(errors) => {
                tracing::debug!("Step {} rejected: {}", self.step, errors);
                self.transition(StepPhase::Invalid)?;
                self.transition(StepPhase::Editing)?;
                self.errors = errors.clone();
                return Ok(StepOutcome::Invalid(errors));
            }
        };

        self.transition(StepPhase::Valid)?;
        self.errors = ValidationErrors::new();
        self.state = next_state;

        self.transition(StepPhase::Persisting)?;
        if !self.state.persist(&self.persistence, self.step) {
            tracing::warn!(
                "Continuing without persisted {} data for {}",
                self.step,
                mask_cpf(&self.state.record.tax_id)
            );
        }

        let next = self.step.next().unwrap_or(self.step);
        match &self.script {
            Some(script) => {
                self.transition(StepPhase::Loading)?;
                let phase = Arc::clone(&self.phase);
                self.loading = Some(LoadingSequence::start(script, move || {
                    {
                        let mut phase = phase.lock();
                        if validate_transition(*phase, StepPhase::Navigating).is_err() {
                            return;
                        }
                        *phase = StepPhase::Navigating;
                    }
                    navigate(next);
                }));
                Ok(StepOutcome::Loading)
            }
            None => {
                self.transition(StepPhase::Navigating)?;
                navigate(next);
                Ok(StepOutcome::Navigated(next))
            }
        }
    }

    /// Submit and wait for navigation
    ///
    /// Returns the step navigated to, or `None` when the form was rejected.
    ///
    /// # Errors
    /// See [`submit`](Self::submit); `Cancelled` if the loading sequence
    /// ended without navigating
    pub async fn submit_and_wait(&mut self, input: &StepInput) -> Result<Option<WizardStep>, WizardError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        match self.submit(input, move |next| {
            let _ = tx.send(next);
        })? {
            StepOutcome::Invalid(_) => Ok(None),
            StepOutcome::Navigated(next) => Ok(Some(next)),
            StepOutcome::Loading => {
                let next = rx.await.map_err(|_| WizardError::Cancelled)?;
                self.loading = None;
                Ok(Some(next))
            }
        }
    }

    /// Close the loading modal early; the step returns to `Editing`
    pub fn cancel_loading(&mut self) -> bool {
        let cancelled = self.loading.take().is_some_and(|mut seq| seq.cancel());
        if cancelled {
            // Navigation may have won the race; only roll back from Loading
            let _ = self.transition(StepPhase::Editing);
        }
        cancelled
    }

    /// Unmount the step, cancelling pending timers
    pub fn teardown(&mut self) {
        if self.cancel_loading() {
            tracing::debug!("Step {} torn down during loading", self.step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::keys;
    use crate::types::{Municipality, VehicleType};
    use crate::validation::Field;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn profile_form() -> ProfileForm {
        ProfileForm {
            full_name: "Jane Doe".to_string(),
            tax_id: "123.456.789-09".to_string(),
            phone: "(11) 98888-7777".to_string(),
            email: "a@b.com".to_string(),
            vehicle_type: Some(VehicleType::Motorcycle),
            license_plate: None,
            is_rented_vehicle: true,
            state: "sp".to_string(),
            city: "São Paulo".to_string(),
        }
    }

    fn persistence_with_profile() -> Persistence {
        let persistence = Persistence::in_memory();
        let mut record = CandidateRecord::default();
        profile_form().apply_to(&mut record).unwrap();
        assert!(persistence.save(keys::CANDIDATE, &record));
        persistence
    }

    #[test]
    fn steps_are_linear() {
        assert_eq!(WizardStep::Profile.next(), Some(WizardStep::Municipalities));
        assert_eq!(WizardStep::Epi.next(), Some(WizardStep::Payment));
        assert_eq!(WizardStep::Payment.next(), None);
        assert_eq!(WizardStep::Profile.previous(), None);
        assert_eq!(WizardStep::StartDate.path(), "/municipios");
    }

    #[test]
    fn phase_transitions() {
        assert!(validate_transition(StepPhase::Editing, StepPhase::Validating).is_ok());
        assert!(validate_transition(StepPhase::Loading, StepPhase::Editing).is_ok());
        assert!(validate_transition(StepPhase::Editing, StepPhase::Navigating).is_err());
        assert!(allowed_transitions(StepPhase::Navigating).is_empty());
    }

    #[test]
    fn apply_is_pure() {
        let state = WizardState::default();
        let next = state.apply(&StepInput::Profile(profile_form())).unwrap();

        assert_eq!(state, WizardState::default());
        assert_eq!(next.record.tax_id, "12345678909");
        assert_eq!(next.record.state, "SP");
        assert!(next.record.license_plate.is_none());
    }

    #[test]
    fn restart_point_follows_route_order() {
        let state = WizardState::default();
        assert_eq!(state.restart_point(WizardStep::Profile), None);
        assert_eq!(state.restart_point(WizardStep::Epi), Some(WizardStep::Profile));

        let state = state.apply(&StepInput::Profile(profile_form())).unwrap();
        assert_eq!(state.restart_point(WizardStep::Municipalities), None);
        assert_eq!(state.restart_point(WizardStep::Payout), Some(WizardStep::Municipalities));
    }

    #[test]
    fn entering_later_step_without_profile_redirects() {
        let err = StepController::enter(WizardStep::Municipalities, Persistence::in_memory()).unwrap_err();
        assert!(matches!(
            err,
            WizardError::MissingPriorState {
                restart: WizardStep::Profile,
                ..
            }
        ));

        let controller = StepController::enter_or_redirect(WizardStep::Epi, Persistence::in_memory());
        assert_eq!(controller.step(), WizardStep::Profile);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_submit_stays_editing() {
        let mut controller = StepController::enter(WizardStep::Profile, Persistence::in_memory()).unwrap();
        let mut form = profile_form();
        form.tax_id = "123".to_string();

        let outcome = controller
            .submit(&StepInput::Profile(form), |_| panic!("must not navigate"))
            .unwrap();

        assert!(matches!(outcome, StepOutcome::Invalid(_)));
        assert_eq!(controller.phase(), StepPhase::Editing);
        assert!(controller.errors().has(crate::validation::Field::TaxId));
    }

    #[tokio::test(start_paused = true)]
    async fn valid_submit_persists_then_navigates_after_loading() {
        let persistence = Persistence::in_memory();
        let mut controller = StepController::enter(WizardStep::Profile, persistence.clone()).unwrap();
        let navigated = Arc::new(AtomicBool::new(false));
        let n = navigated.clone();

        let outcome = controller
            .submit(&StepInput::Profile(profile_form()), move |next| {
                assert_eq!(next, WizardStep::Municipalities);
                n.store(true, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(outcome, StepOutcome::Loading);
        assert_eq!(controller.phase(), StepPhase::Loading);
        assert!(persistence.candidate().is_some());

        tokio::time::sleep(Duration::from_millis(6_000)).await;
        assert!(!navigated.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert!(navigated.load(Ordering::SeqCst));
        assert_eq!(controller.phase(), StepPhase::Navigating);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_during_loading_never_navigates() {
        let mut controller = StepController::enter(WizardStep::Profile, Persistence::in_memory()).unwrap();
        let navigated = Arc::new(AtomicBool::new(false));
        let n = navigated.clone();

        controller
            .submit(&StepInput::Profile(profile_form()), move |_| n.store(true, Ordering::SeqCst))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        controller.teardown();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!navigated.load(Ordering::SeqCst));
        assert_eq!(controller.phase(), StepPhase::Editing);
    }

    #[tokio::test(start_paused = true)]
    async fn step_without_script_navigates_immediately() {
        let persistence = persistence_with_profile();
        let mut record = persistence.candidate().unwrap();
        record.selected_municipalities = vec![Municipality::new("Campinas", 40)];
        record.start_date = Some("01/03/2025".to_string());
        persistence.save(keys::CANDIDATE, &record);

        let mut controller = StepController::enter(WizardStep::Payout, persistence.clone()).unwrap();
        let form = PayoutForm {
            bank: "nubank".to_string(),
            account_type: "checking".to_string(),
        };

        let next = controller.submit_and_wait(&StepInput::Payout(form)).await.unwrap();

        assert_eq!(next, Some(WizardStep::Epi));
        assert_eq!(persistence.payout().unwrap().bank, "nubank");
    }

    fn persistence_through_municipalities() -> Persistence {
        let persistence = persistence_with_profile();
        let mut record = persistence.candidate().unwrap();
        record.selected_municipalities = vec![Municipality::new("Campinas", 40)];
        persistence.save(keys::CANDIDATE, &record);
        persistence
    }

    #[tokio::test(start_paused = true)]
    async fn start_date_must_be_offered_by_the_controller() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let mut controller = StepController::enter(WizardStep::StartDate, persistence_through_municipalities())
            .unwrap()
            .with_today(today);

        let forged = StartDateInput {
            choice: Some("25/12/2030".to_string()),
        };
        let outcome = controller.submit(&StepInput::StartDate(forged), |_| {}).unwrap();
        assert!(matches!(outcome, StepOutcome::Invalid(_)));
        assert!(controller.errors().get(Field::StartDate).is_some());
        assert_eq!(controller.state().record.start_date, None);

        let offered = controller.start_date_options();
        assert_eq!(offered[0].value, "11/03/2025");
        let next = controller
            .submit_and_wait(&StepInput::StartDate(StartDateInput {
                choice: Some(offered[0].value.clone()),
            }))
            .await
            .unwrap();
        assert_eq!(next, Some(WizardStep::Payout));
        assert_eq!(controller.state().record.start_date.as_deref(), Some("11/03/2025"));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_step_input_is_rejected() {
        let mut controller = StepController::enter(WizardStep::Profile, Persistence::in_memory()).unwrap();
        let err = controller
            .submit(&StepInput::Epi(EpiForm::default()), |_| {})
            .unwrap_err();
        assert!(matches!(err, WizardError::WrongStep { .. }));
        assert_eq!(controller.phase(), StepPhase::Editing);
    }
}
