//! Validation schemas for the wizard forms
//!
//! Pure, synchronous predicates per field plus whole-form checks that
//! turn raw form input into typed records. Every failing rule reports a
//! field-scoped message so the UI can annotate the offending input.

use crate::types::{AccountType, CandidateRecord, EpiSelection, KitSize, PayoutAccount, VehicleType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static LEGACY_PLATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}\d{4}$").expect("valid regex"));
static MERCOSUL_PLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{3}\d[A-Z]\d{2}$").expect("valid regex"));
static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

/// Smallest accepted shoe size
pub const MIN_SHOE_SIZE: u8 = 35;
/// Largest accepted shoe size
pub const MAX_SHOE_SIZE: u8 = 45;
/// Minimum characters in a full name
pub const MIN_NAME_LEN: usize = 3;

/// Banks offered on the payout step
pub const SUPPORTED_BANKS: [&str; 6] = ["itau", "bradesco", "santander", "caixa", "nubank", "inter"];

/// Form field a validation message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    /// Full name
    FullName,
    /// CPF
    TaxId,
    /// Phone
    Phone,
    /// Email
    Email,
    /// License plate
    LicensePlate,
    /// Vest size
    VestSize,
    /// Glove size
    GloveSize,
    /// Shoe size
    ShoeSize,
    /// Terms-of-use checkbox
    TermsAccepted,
    /// Municipality selection
    Municipalities,
    /// Start date
    StartDate,
    /// Payout bank
    Bank,
    /// Payout account type
    AccountType,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::FullName => "fullName",
            Field::TaxId => "taxId",
            Field::Phone => "phone",
            Field::Email => "email",
            Field::LicensePlate => "licensePlate",
            Field::VestSize => "vestSize",
            Field::GloveSize => "gloveSize",
            Field::ShoeSize => "shoeSize",
            Field::TermsAccepted => "termsAccepted",
            Field::Municipalities => "municipalities",
            Field::StartDate => "startDate",
            Field::Bank => "bank",
            Field::AccountType => "accountType",
        };
        f.write_str(name)
    }
}

/// One failing rule, scoped to a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Offending field
    pub field: Field,
    /// Inline message for the UI
    pub message: String,
}

/// Ordered set of field errors from one submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Create empty error set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-error set
    #[must_use]
    pub fn single(field: Field, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    /// Record a failing rule
    pub fn push(&mut self, field: Field, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// True when nothing failed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failing rules
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Message for a field, if it failed
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Whether a field failed
    #[inline]
    #[must_use]
    pub fn has(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    /// Iterate in submission order
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok(value)` when empty, otherwise the errors
    ///
    /// # Errors
    /// Returns `self` when any rule failed
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| format!("{}: {}", e.field, e.message)).collect();
        f.write_str(&parts.join("; "))
    }
}

/// Keep ASCII digits only
#[must_use]
pub fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Strip non-alphanumerics and uppercase
#[must_use]
pub fn normalize_plate(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Brazilian plate layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateFormat {
    /// `LLL NNNN`
    Legacy,
    /// `LLL N L NN`
    Mercosul,
}

/// Detect the plate layout after normalization
#[must_use]
pub fn plate_format(value: &str) -> Option<PlateFormat> {
    let plate = normalize_plate(value);
    if LEGACY_PLATE.is_match(&plate) {
        Some(PlateFormat::Legacy)
    } else if MERCOSUL_PLATE.is_match(&plate) {
        Some(PlateFormat::Mercosul)
    } else {
        None
    }
}

/// CPF is valid when exactly 11 digits remain after stripping
#[must_use]
pub fn validate_tax_id(value: &str) -> bool {
    digits(value).len() == 11
}

/// Phone is valid with 10 or 11 digits
#[must_use]
pub fn validate_phone(value: &str) -> bool {
    matches!(digits(value).len(), 10 | 11)
}

/// Loose `local@domain.tld` shape check
#[must_use]
pub fn validate_email(value: &str) -> bool {
    EMAIL_SHAPE.is_match(value.trim())
}

/// At least three characters once trimmed
#[must_use]
pub fn validate_full_name(value: &str) -> bool {
    value.trim().chars().count() >= MIN_NAME_LEN
}

/// Plate matches the legacy or Mercosul layout
#[must_use]
pub fn validate_license_plate(value: &str) -> bool {
    plate_format(value).is_some()
}

/// Cross-field rule: rented vehicles need no plate
///
/// Runs after the individual field rules.
#[must_use]
pub fn validate_vehicle_section(form: &ProfileForm) -> bool {
    form.is_rented_vehicle
        || form
            .license_plate
            .as_deref()
            .is_some_and(validate_license_plate)
}

/// Kit sizes in range and terms accepted
#[must_use]
pub fn validate_epi_selection(form: &EpiForm) -> bool {
    form.validate().is_ok()
}

/// Raw profile step input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileForm {
    /// Name as typed
    pub full_name: String,
    /// CPF as typed
    pub tax_id: String,
    /// Phone as typed
    pub phone: String,
    /// Email as typed
    pub email: String,
    /// Vehicle type, when picked
    pub vehicle_type: Option<VehicleType>,
    /// Plate as typed
    pub license_plate: Option<String>,
    /// Rented-vehicle checkbox
    pub is_rented_vehicle: bool,
    /// State code from the address lookup
    pub state: String,
    /// City from the address lookup
    pub city: String,
}

impl ProfileForm {
    /// Run field rules, then the vehicle refinement
    ///
    /// # Errors
    /// Returns every failing rule scoped to its field
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !validate_full_name(&self.full_name) {
            errors.push(Field::FullName, "Name must have at least 3 characters");
        }
        if !validate_tax_id(&self.tax_id) {
            errors.push(Field::TaxId, "CPF must have 11 digits");
        }
        if !validate_phone(&self.phone) {
            errors.push(Field::Phone, "Phone must have 10 or 11 digits");
        }
        if !validate_email(&self.email) {
            errors.push(Field::Email, "Invalid email");
        }

        if !validate_vehicle_section(self) {
            let missing = self
                .license_plate
                .as_deref()
                .map_or(true, |p| normalize_plate(p).is_empty());
            if missing {
                errors.push(
                    Field::LicensePlate,
                    "License plate is required unless the vehicle is rented",
                );
            } else {
                errors.push(
                    Field::LicensePlate,
                    "Plate must be ABC-1234 (legacy) or ABC1D23 (Mercosul)",
                );
            }
        }

        errors.into_result(())
    }

    /// Merge the validated profile into a record
    ///
    /// # Errors
    /// Returns the field errors when the form is invalid
    pub fn apply_to(&self, record: &mut CandidateRecord) -> Result<(), ValidationErrors> {
        self.validate()?;

        record.full_name = self.full_name.trim().to_string();
        record.tax_id = digits(&self.tax_id);
        record.phone = digits(&self.phone);
        record.email = self.email.trim().to_string();
        record.vehicle_type = self.vehicle_type;
        record.is_rented_vehicle = self.is_rented_vehicle;
        record.license_plate = if self.is_rented_vehicle {
            None
        } else {
            self.license_plate.as_deref().map(normalize_plate)
        };
        record.state = self.state.trim().to_uppercase();
        record.city = self.city.trim().to_string();
        Ok(())
    }
}

/// Re-check the profile predicates on a stored record
#[must_use]
pub fn profile_holds(record: &CandidateRecord) -> bool {
    validate_full_name(&record.full_name)
        && validate_tax_id(&record.tax_id)
        && validate_phone(&record.phone)
        && validate_email(&record.email)
        && (record.is_rented_vehicle
            || record
                .license_plate
                .as_deref()
                .is_some_and(validate_license_plate))
}

/// Raw EPI step input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpiForm {
    /// Vest size as picked
    pub vest_size: String,
    /// Glove size as picked
    pub glove_size: String,
    /// Shoe size as picked
    pub shoe_size: String,
    /// Terms-of-use checkbox
    pub terms_accepted: bool,
}

impl Default for EpiForm {
    fn default() -> Self {
        Self {
            vest_size: "M".to_string(),
            glove_size: "M".to_string(),
            shoe_size: "40".to_string(),
            terms_accepted: false,
        }
    }
}

impl EpiForm {
    /// Parse sizes and require accepted terms
    ///
    /// # Errors
    /// Returns every failing rule scoped to its field
    pub fn validate(&self) -> Result<EpiSelection, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let vest = self.vest_size.parse::<KitSize>().ok();
        if vest.is_none() {
            errors.push(Field::VestSize, "Vest size must be P, M, G or GG");
        }
        let gloves = self.glove_size.parse::<KitSize>().ok();
        if gloves.is_none() {
            errors.push(Field::GloveSize, "Glove size must be P, M, G or GG");
        }
        let shoe = self
            .shoe_size
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|s| (MIN_SHOE_SIZE..=MAX_SHOE_SIZE).contains(s));
        if shoe.is_none() {
            errors.push(Field::ShoeSize, "Shoe size must be between 35 and 45");
        }
        if !self.terms_accepted {
            errors.push(Field::TermsAccepted, "You must accept the terms of use");
        }

        match (vest, gloves, shoe) {
            (Some(vest_size), Some(glove_size), Some(shoe_size)) if errors.is_empty() => {
                Ok(EpiSelection {
                    vest_size,
                    glove_size,
                    shoe_size,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Raw payout step input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PayoutForm {
    /// Bank as picked
    pub bank: String,
    /// Account type as picked
    pub account_type: String,
}

impl PayoutForm {
    /// Require a supported bank and a known account type
    ///
    /// # Errors
    /// Returns every failing rule scoped to its field
    pub fn validate(&self) -> Result<PayoutAccount, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let bank = self.bank.trim().to_lowercase();
        if !SUPPORTED_BANKS.contains(&bank.as_str()) {
            errors.push(Field::Bank, "Select your bank");
        }
        let account_type = self.account_type.parse::<AccountType>().ok();
        if account_type.is_none() {
            errors.push(Field::AccountType, "Select checking or savings");
        }

        match account_type {
            Some(account_type) if errors.is_empty() => Ok(PayoutAccount { bank, account_type }),
            _ => Err(errors),
        }
    }
}

/// Progressive CPF mask: `000.000.000-00`
#[must_use]
pub fn format_cpf(value: &str) -> String {
    let d: Vec<char> = digits(value).chars().take(11).collect();
    let part = |from: usize, to: usize| d[from..to.min(d.len())].iter().collect::<String>();
    match d.len() {
        0..=3 => part(0, 3),
        4..=6 => format!("{}.{}", part(0, 3), part(3, 6)),
        7..=9 => format!("{}.{}.{}", part(0, 3), part(3, 6), part(6, 9)),
        _ => format!("{}.{}.{}-{}", part(0, 3), part(3, 6), part(6, 9), part(9, 11)),
    }
}

/// Progressive phone mask: `(00) 0000-0000` or `(00) 00000-0000`
#[must_use]
pub fn format_phone(value: &str) -> String {
    let d: Vec<char> = digits(value).chars().take(11).collect();
    let part = |from: usize, to: usize| d[from..to.min(d.len())].iter().collect::<String>();
    match d.len() {
        0..=2 => part(0, 2),
        3..=6 => format!("({}) {}", part(0, 2), part(2, 6)),
        7..=10 => format!("({}) {}-{}", part(0, 2), part(2, 6), part(6, 10)),
        _ => format!("({}) {}-{}", part(0, 2), part(2, 7), part(7, 11)),
    }
}

/// Display mask: hyphenate 7-character plates unless Mercosul
#[must_use]
pub fn format_plate(value: &str) -> String {
    let plate = normalize_plate(value);
    if plate.len() == 7 && !MERCOSUL_PLATE.is_match(&plate) {
        format!("{}-{}", &plate[..3], &plate[3..])
    } else {
        plate
    }
}

/// CPF masked for logs: `123***01`
#[must_use]
pub fn mask_cpf(value: &str) -> String {
    let d = digits(value);
    if d.len() < 5 {
        return "***".to_string();
    }
    format!("{}***{}", &d[..3], &d[d.len() - 2..])
}
