//! HTTP vehicle backends
//!
//! Each backend is a GET-by-plate URL template with a `{plate}` placeholder.
//! The standard order is: internal proxy, regional function, remote API,
//! then the directly-keyed provider as last resort.

use crate::error::ClientError;
use crate::http::{decode, normalize_base, HttpConfig};
use async_trait::async_trait;
use funnel_core::{Named, ProviderError, VehicleBackend, VehicleInfo};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder replaced by the normalized plate
pub const PLATE_PLACEHOLDER: &str = "{plate}";

/// Base URL of the directly-keyed provider
pub const DIRECT_PROVIDER_BASE: &str = "https://wdapi2.com.br/consulta";

/// One configured vehicle backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleBackendConfig {
    /// Name for logs
    pub name: String,
    /// URL template containing `{plate}`
    pub url: String,
    /// Optional bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl VehicleBackendConfig {
    /// Create config for a template
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            token: None,
        }
    }

    /// Set bearer token
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Internal proxy on the API server
    #[must_use]
    pub fn proxy(base: &str) -> Self {
        Self::new("proxy", format!("{}/api/vehicle-info/{PLATE_PLACEHOLDER}", base.trim_end_matches('/')))
    }

    /// Regional serverless function
    #[must_use]
    pub fn regional(base: &str) -> Self {
        Self::new("regional", format!("{}/vehicle-api/{PLATE_PLACEHOLDER}", base.trim_end_matches('/')))
    }

    /// Remote API deployment
    #[must_use]
    pub fn remote(base: &str) -> Self {
        Self::new("remote", format!("{}/api/vehicle-info/{PLATE_PLACEHOLDER}", base.trim_end_matches('/')))
    }

    /// Directly-keyed third-party provider
    #[must_use]
    pub fn direct(key: &str) -> Self {
        Self::new("direct", format!("{DIRECT_PROVIDER_BASE}/{PLATE_PLACEHOLDER}/{key}"))
    }
}

/// GET-by-plate backend over HTTP
#[derive(Debug, Clone)]
pub struct HttpVehicleBackend {
    config: VehicleBackendConfig,
    client: Client,
}

impl HttpVehicleBackend {
    /// Create backend with its own client
    ///
    /// # Errors
    /// `InvalidUrl` for a template without `{plate}` or not absolute
    pub fn new(config: VehicleBackendConfig, http: &HttpConfig) -> Result<Self, ClientError> {
        Self::with_client(config, http.build()?)
    }

    /// Create backend sharing a client
    ///
    /// # Errors
    /// `InvalidUrl` for a template without `{plate}` or not absolute
    pub fn with_client(config: VehicleBackendConfig, client: Client) -> Result<Self, ClientError> {
        if !config.url.contains(PLATE_PLACEHOLDER) {
            return Err(ClientError::InvalidUrl(format!(
                "{} has no {PLATE_PLACEHOLDER} placeholder",
                config.url
            )));
        }
        normalize_base(&config.url.replace(PLATE_PLACEHOLDER, "ABC1234"))?;
        Ok(Self { config, client })
    }

    /// URL for a plate
    #[must_use]
    pub fn url_for(&self, plate: &str) -> String {
        self.config.url.replace(PLATE_PLACEHOLDER, plate)
    }

    async fn get(&self, plate: &str) -> Result<VehicleInfo, ClientError> {
        let mut request = self.client.get(self.url_for(plate));
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        let body: Value = decode(request.send().await?).await?;
        parse_vehicle(body, plate)
    }
}

/// Upstream spellings per field, most specific first
const FIELD_KEYS: [(&str, [&str; 3]); 7] = [
    ("brand", ["brand", "MARCA", "marca"]),
    ("model", ["model", "MODELO", "modelo"]),
    ("year", ["year", "ano", "ANO"]),
    ("modelYear", ["modelYear", "anoModelo", "ANO_MODELO"]),
    ("color", ["color", "cor", "COR"]),
    ("chassisNumber", ["chassisNumber", "chassi", "CHASSI"]),
    ("plate", ["plate", "placa", "PLACA"]),
];

/// First non-empty value among `keys`, numbers rendered as text
fn first_text(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match body.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Turn an upstream body into vehicle data
///
/// Providers disagree on field names and some send several spellings of
/// the same field at once; the first non-empty spelling wins.
///
/// # Errors
/// `InvalidResponse` for an error payload or one without vehicle data
pub fn parse_vehicle(body: Value, plate: &str) -> Result<VehicleInfo, ClientError> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(ClientError::InvalidResponse(error.to_string()));
    }
    if !body.is_object() {
        return Err(ClientError::InvalidResponse("vehicle payload is not an object".to_string()));
    }

    let canonical: serde_json::Map<String, Value> = FIELD_KEYS
        .iter()
        .filter_map(|(field, keys)| first_text(&body, keys).map(|v| ((*field).to_string(), Value::String(v))))
        .collect();
    let mut info: VehicleInfo = serde_json::from_value(Value::Object(canonical))
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
    if info.is_empty() {
        return Err(ClientError::InvalidResponse("no vehicle data".to_string()));
    }
    if info.plate.is_empty() {
        info.plate = plate.to_string();
    }
    Ok(info)
}

impl Named for HttpVehicleBackend {
    fn name(&self) -> &str {
        &self.config.name
    }
}

#[async_trait]
impl VehicleBackend for HttpVehicleBackend {
    async fn fetch(&self, plate: &str) -> Result<VehicleInfo, ProviderError> {
        tracing::debug!("GET {} for {}", self.config.name, plate);
        Ok(self.get(plate).await?)
    }
}

/// Backends in the standard order, skipping unset entries
#[must_use]
pub fn standard_backends(
    proxy_base: Option<&str>,
    regional_base: Option<&str>,
    remote_base: Option<&str>,
    direct_key: Option<&str>,
) -> Vec<VehicleBackendConfig> {
    [
        proxy_base.map(VehicleBackendConfig::proxy),
        regional_base.map(VehicleBackendConfig::regional),
        remote_base.map(VehicleBackendConfig::remote),
        direct_key.map(VehicleBackendConfig::direct),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn templates() {
        assert_eq!(
            VehicleBackendConfig::proxy("http://localhost:5000/").url,
            "http://localhost:5000/api/vehicle-info/{plate}"
        );
        assert_eq!(
            VehicleBackendConfig::direct("KEY").url,
            "https://wdapi2.com.br/consulta/{plate}/KEY"
        );
    }

    #[test]
    fn template_requires_placeholder() {
        let config = VehicleBackendConfig::new("x", "http://localhost/vehicle");
        assert!(HttpVehicleBackend::new(config, &HttpConfig::default()).is_err());
    }

    #[test]
    fn standard_order_skips_missing() {
        let names: Vec<String> = standard_backends(Some("http://a"), None, Some("http://c"), Some("k"))
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["proxy", "remote", "direct"]);
    }

    #[test]
    fn parses_upstream_field_names() {
        let body = json!({"MARCA": "FIAT", "MODELO": "UNO", "ano": "2015", "anoModelo": "2016", "cor": "Branca", "chassi": "9BD"});
        let info = parse_vehicle(body, "ABC1234").unwrap();
        assert_eq!(info.brand, "FIAT");
        assert_eq!(info.model_year, "2016");
        assert_eq!(info.plate, "ABC1234");
    }

    #[test]
    fn both_spellings_in_one_body() {
        let body = json!({"MARCA": "VW", "marca": "VW", "MODELO": "GOL", "modelo": "GOL", "ano": "2019"});
        let info = parse_vehicle(body, "ABC1234").unwrap();
        assert_eq!(info.brand, "VW");
        assert_eq!(info.model, "GOL");
        assert_eq!(info.year, "2019");
    }

    #[test]
    fn empty_spelling_falls_back_to_next() {
        let body = json!({"MARCA": "", "marca": "FORD", "ano": 2018, "placa": "XYZ9A99"});
        let info = parse_vehicle(body, "ABC1234").unwrap();
        assert_eq!(info.brand, "FORD");
        assert_eq!(info.year, "2018");
        assert_eq!(info.plate, "XYZ9A99");
    }

    #[test]
    fn canonical_shape_round_trips() {
        let original = VehicleInfo::placeholder("ABC1D23");
        let info = parse_vehicle(serde_json::to_value(&original).unwrap(), "ABC1D23").unwrap();
        assert_eq!(info, original);
    }

    #[test]
    fn error_payload_is_rejected() {
        assert!(parse_vehicle(json!({"error": "quota"}), "ABC1234").is_err());
        assert!(parse_vehicle(json!({}), "ABC1234").is_err());
    }
}
