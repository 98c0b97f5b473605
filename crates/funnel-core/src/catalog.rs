//! Reference data and candidate records shared with the thin API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Brazilian state served as reference data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceState {
    /// Row id
    #[serde(default)]
    pub id: u64,
    /// Two-letter code
    pub code: String,
    /// Display name
    pub name: String,
    /// Whether the state is recruiting
    pub has_vacancies: bool,
    /// Open vacancies
    pub vacancy_count: u32,
}

/// Insert payload for a state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewState {
    /// Two-letter code
    pub code: String,
    /// Display name
    pub name: String,
    /// Whether the state is recruiting
    #[serde(default)]
    pub has_vacancies: bool,
    /// Open vacancies
    #[serde(default)]
    pub vacancy_count: u32,
}

impl NewState {
    /// Create new state payload
    #[inline]
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, vacancy_count: u32) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            has_vacancies: vacancy_count > 0,
            vacancy_count,
        }
    }
}

/// Legacy `/api/regions` shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// State name
    pub name: String,
    /// State code
    pub abbr: String,
    /// Open vacancies
    pub vacancies: u32,
}

impl From<&ReferenceState> for Region {
    fn from(state: &ReferenceState) -> Self {
        Self {
            name: state.name.clone(),
            abbr: state.code.clone(),
            vacancies: state.vacancy_count,
        }
    }
}

/// Benefit shown on the landing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Benefit {
    /// Row id
    pub id: u64,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Icon identifier
    pub icon_name: String,
}

/// Insert payload for a benefit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewBenefit {
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Icon identifier
    pub icon_name: String,
}

/// Insert payload for a candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCandidate {
    /// Name
    pub name: String,
    /// Email, unique across candidates
    pub email: String,
    /// Phone
    pub phone: String,
    /// Two-letter state code
    pub state: String,
    /// City
    pub city: String,
    /// Vehicle type
    pub vehicle_type: String,
    /// Prior delivery experience
    #[serde(default)]
    pub has_experience: bool,
}

impl NewCandidate {
    /// Check the column constraints of the candidates table
    ///
    /// # Errors
    /// Returns the first violated constraint as a message
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.email.trim().is_empty() {
            return Err("email is required".to_string());
        }
        if self.phone.trim().is_empty() || self.phone.chars().count() > 20 {
            return Err("phone must have between 1 and 20 characters".to_string());
        }
        if self.state.chars().count() != 2 {
            return Err("state must be a two-letter code".to_string());
        }
        if self.city.trim().is_empty() {
            return Err("city is required".to_string());
        }
        if self.vehicle_type.trim().is_empty() {
            return Err("vehicleType is required".to_string());
        }
        Ok(())
    }
}

/// Stored candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Row id
    pub id: u64,
    /// Name
    pub name: String,
    /// Email
    pub email: String,
    /// Phone
    pub phone: String,
    /// State code
    pub state: String,
    /// City
    pub city: String,
    /// Vehicle type
    pub vehicle_type: String,
    /// Prior delivery experience
    pub has_experience: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Candidate {
    /// Materialize a stored candidate from its insert payload
    #[must_use]
    pub fn from_new(id: u64, new: NewCandidate, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            state: new.state,
            city: new.city,
            vehicle_type: new.vehicle_type,
            has_experience: new.has_experience,
            created_at,
        }
    }
}
