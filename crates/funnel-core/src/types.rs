//! Core types for the registration funnel
//!
//! Defines the records that flow through the wizard:
//! - The accumulated candidate record
//! - Vehicle data returned by lookup backends
//! - Mock PIX payment payloads
//! - Safety kit (EPI) and payout selections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Price paid per delivery, used for the daily earnings estimate (BRL)
pub const DELIVERY_FEE_BRL: f64 = 12.0;

/// Vehicle the candidate will deliver with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    /// Passenger car
    #[serde(alias = "carro")]
    Car,
    /// Motorcycle
    #[serde(alias = "moto")]
    Motorcycle,
}

impl VehicleType {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Motorcycle => "motorcycle",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "car" | "carro" => Ok(VehicleType::Car),
            "motorcycle" | "moto" => Ok(VehicleType::Motorcycle),
            other => Err(format!("unknown vehicle type: {other}")),
        }
    }
}

/// A municipality the candidate chose to deliver in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Municipality {
    /// Municipality name
    pub name: String,
    /// Estimated deliveries per day
    pub daily_delivery_estimate: u32,
}

impl Municipality {
    /// Create new municipality entry
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, daily_delivery_estimate: u32) -> Self {
        Self {
            name: name.into(),
            daily_delivery_estimate,
        }
    }

    /// Estimated earnings per day in BRL
    #[inline]
    #[must_use]
    pub fn daily_earnings(&self) -> f64 {
        f64::from(self.daily_delivery_estimate) * DELIVERY_FEE_BRL
    }
}

/// Candidate record accumulated across wizard steps
///
/// Each step mutates a subset of fields. The record is only complete
/// once every step before the payment step has validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateRecord {
    /// Full name
    pub full_name: String,
    /// CPF digits
    pub tax_id: String,
    /// Phone digits
    pub phone: String,
    /// Email address
    pub email: String,
    /// Vehicle type, when chosen
    pub vehicle_type: Option<VehicleType>,
    /// Normalized license plate; absent for rented vehicles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
    /// Candidate rents the vehicle
    pub is_rented_vehicle: bool,
    /// Two-letter state code
    pub state: String,
    /// City name
    pub city: String,
    /// Ordered municipality selection
    pub selected_municipalities: Vec<Municipality>,
    /// Chosen start date (`dd/mm/yyyy`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
}

impl CandidateRecord {
    /// Total estimated deliveries per day across the selection
    #[must_use]
    pub fn total_daily_deliveries(&self) -> u32 {
        self.selected_municipalities
            .iter()
            .map(|m| m.daily_delivery_estimate)
            .sum()
    }

    /// Total estimated earnings per day in BRL
    #[must_use]
    pub fn total_daily_earnings(&self) -> f64 {
        f64::from(self.total_daily_deliveries()) * DELIVERY_FEE_BRL
    }
}

/// Vehicle attributes returned by a lookup backend
///
/// Read-only display data in the API's camelCase shape. Upstream
/// spellings (`MARCA`, `marca`, `anoModelo`, ...) are mapped by the
/// HTTP backends before this type is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleInfo {
    /// Manufacturer
    pub brand: String,
    /// Model name
    pub model: String,
    /// Manufacture year
    pub year: String,
    /// Model year
    pub model_year: String,
    /// Color
    pub color: String,
    /// Chassis number
    pub chassis_number: String,
    /// Plate the data belongs to
    pub plate: String,
}

impl VehicleInfo {
    /// Synthetic data used when every backend fails in development mode
    #[must_use]
    pub fn placeholder(plate: impl Into<String>) -> Self {
        Self {
            brand: "TESTE - Local Dev".to_string(),
            model: "VEÍCULO DE TESTE".to_string(),
            year: "2023".to_string(),
            model_year: "2023/2024".to_string(),
            color: "PRATA".to_string(),
            chassis_number: "TESTE123456789".to_string(),
            plate: plate.into(),
        }
    }

    /// Whether the payload carries any vehicle data at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.brand.is_empty() && self.model.is_empty()
    }
}

/// Mock payment status; generated payments never settle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting payment
    #[default]
    Pending,
}

/// Fabricated PIX payment payload for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    /// Opaque session-unique identifier
    pub id: String,
    /// PIX copy-and-paste code
    pub pix_code: String,
    /// QR-code image URL
    #[serde(rename = "pixQrCode")]
    pub pix_qr_code_url: String,
    /// Always pending
    #[serde(default)]
    pub status: PaymentStatus,
    /// Creation time
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Request for a mock PIX payment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentRequest {
    /// Payer name
    pub name: String,
    /// Payer email, generated when empty
    pub email: String,
    /// Payer CPF, any formatting
    pub cpf: String,
    /// Payer phone, generated when empty
    pub phone: String,
    /// Amount in BRL
    pub amount: Option<f64>,
}

impl PaymentRequest {
    /// Create request for a payer
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, cpf: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpf: cpf.into(),
            ..Self::default()
        }
    }

    /// With amount
    #[inline]
    #[must_use]
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// With email
    #[inline]
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// With phone
    #[inline]
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    /// Build request from the accumulated candidate record
    #[must_use]
    pub fn from_record(record: &CandidateRecord) -> Self {
        Self {
            name: record.full_name.clone(),
            email: record.email.clone(),
            cpf: record.tax_id.clone(),
            phone: record.phone.clone(),
            amount: None,
        }
    }
}

/// Safety kit garment size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KitSize {
    /// Small
    P,
    /// Medium
    M,
    /// Large
    G,
    /// Extra large
    GG,
}

impl KitSize {
    /// All sizes in display order
    pub const ALL: [KitSize; 4] = [KitSize::P, KitSize::M, KitSize::G, KitSize::GG];
}

impl FromStr for KitSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "P" => Ok(KitSize::P),
            "M" => Ok(KitSize::M),
            "G" => Ok(KitSize::G),
            "GG" => Ok(KitSize::GG),
            other => Err(format!("unknown kit size: {other}")),
        }
    }
}

/// Validated safety kit selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpiSelection {
    /// Vest size
    pub vest_size: KitSize,
    /// Glove size
    pub glove_size: KitSize,
    /// Shoe size (35..=45)
    pub shoe_size: u8,
}

/// Payout account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Checking account
    #[serde(alias = "corrente")]
    Checking,
    /// Savings account
    #[serde(alias = "poupanca")]
    Savings,
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "checking" | "corrente" => Ok(AccountType::Checking),
            "savings" | "poupanca" | "poupança" => Ok(AccountType::Savings),
            other => Err(format!("unknown account type: {other}")),
        }
    }
}

/// Validated payout account record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutAccount {
    /// Bank identifier (see [`crate::validation::SUPPORTED_BANKS`])
    pub bank: String,
    /// Account type
    pub account_type: AccountType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_type_parses_both_languages() {
        assert_eq!("carro".parse::<VehicleType>().unwrap(), VehicleType::Car);
        assert_eq!("Moto".parse::<VehicleType>().unwrap(), VehicleType::Motorcycle);
        assert!("truck".parse::<VehicleType>().is_err());
    }

    #[test]
    fn vehicle_info_accepts_provider_field_names() {
        let json = r#"{"MARCA":"FIAT","MODELO":"UNO","ano":"2010","anoModelo":"2010/2011","cor":"BRANCA","chassi":"9BD","placa":"ABC1234"}"#;
        let info: VehicleInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.brand, "FIAT");
        assert_eq!(info.model_year, "2010/2011");
        assert_eq!(info.chassis_number, "9BD");
        assert!(!info.is_empty());
    }

    #[test]
    fn record_totals() {
        let record = CandidateRecord {
            selected_municipalities: vec![Municipality::new("Santos", 40), Municipality::new("Guarujá", 35)],
            ..CandidateRecord::default()
        };
        assert_eq!(record.total_daily_deliveries(), 75);
        assert!((record.total_daily_earnings() - 900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn payment_info_wire_names() {
        let info = PaymentInfo {
            id: "pix_1_2".to_string(),
            pix_code: "000201".to_string(),
            pix_qr_code_url: "https://qr.example/?data=1".to_string(),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["pixQrCode"], "https://qr.example/?data=1");
        assert_eq!(value["status"], "pending");
    }

    #[test]
    fn rented_record_omits_plate() {
        let record = CandidateRecord {
            is_rented_vehicle: true,
            ..CandidateRecord::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("licensePlate").is_none());
    }
}
