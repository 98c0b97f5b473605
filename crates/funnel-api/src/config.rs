//! Server configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `FUNNEL_*`
//! environment variables, then CLI flags (applied by the binary).
//!
//! ```toml
//! bind = "0.0.0.0:5000"
//! env = "production"
//! payment_amount = 84.70
//!
//! [[vehicle_backends]]
//! name = "regional"
//! url = "https://vehicle.example.com/vehicle-api/{plate}"
//! ```

use crate::error::ConfigError;
use funnel_client::{HttpConfig, VehicleBackendConfig};
use funnel_core::{LookupConfig, PixConfig, DEFAULT_KIT_AMOUNT};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Settings for `funnel-server`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Deployment environment reported by `/health`
    pub env: String,
    /// Development mode: vehicle placeholders when every backend fails
    pub dev: bool,
    /// Amount charged by `POST /api/payments/pix`
    pub payment_amount: f64,
    /// Bearer secret of the direct payment provider
    pub payment_secret: Option<String>,
    /// Upstream vehicle backends, tried in order
    pub vehicle_backends: Vec<VehicleBackendConfig>,
    /// Key of the directly-keyed vehicle provider, tried last
    pub vehicle_api_key: Option<String>,
    /// Outbound HTTP settings
    pub http: HttpConfig,
    /// Mock PIX generator settings
    pub pix: PixConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            env: "development".to_string(),
            dev: false,
            payment_amount: DEFAULT_KIT_AMOUNT,
            payment_secret: None,
            vehicle_backends: Vec::new(),
            vehicle_api_key: None,
            http: HttpConfig::default(),
            pix: PixConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Set listen address
    #[inline]
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Set development mode
    #[inline]
    #[must_use]
    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    /// Append an upstream vehicle backend
    #[inline]
    #[must_use]
    pub fn with_vehicle_backend(mut self, backend: VehicleBackendConfig) -> Self {
        self.vehicle_backends.push(backend);
        self
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// `Parse` for invalid TOML or unknown keys, `Invalid` for bad values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then `path` if given, then the process environment
    ///
    /// # Errors
    /// File unreadable or invalid, or an environment value malformed
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                tracing::debug!("Loaded config from {}", path.display());
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())
    }

    /// Override fields from `FUNNEL_*` variables read through `var`
    ///
    /// `FUNNEL_VEHICLE_BACKENDS` is a comma-separated `name=url` list and
    /// replaces the configured backends.
    ///
    /// # Errors
    /// `Invalid` naming the offending variable
    pub fn apply_env<F>(mut self, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = var("FUNNEL_BIND") {
            self.bind = bind
                .parse()
                .map_err(|e| ConfigError::invalid("FUNNEL_BIND", format!("{e}")))?;
        }
        if let Some(env) = var("FUNNEL_ENV") {
            self.env = env;
        }
        if let Some(dev) = var("FUNNEL_DEV") {
            self.dev = parse_bool(&dev).ok_or_else(|| ConfigError::invalid("FUNNEL_DEV", dev))?;
        }
        if let Some(amount) = var("FUNNEL_PAYMENT_AMOUNT") {
            self.payment_amount = amount
                .parse()
                .map_err(|e| ConfigError::invalid("FUNNEL_PAYMENT_AMOUNT", format!("{e}")))?;
        }
        if let Some(secret) = var("FUNNEL_PAYMENT_SECRET") {
            self.payment_secret = Some(secret).filter(|s| !s.trim().is_empty());
        }
        if let Some(key) = var("FUNNEL_VEHICLE_API_KEY") {
            self.vehicle_api_key = Some(key).filter(|s| !s.trim().is_empty());
        }
        if let Some(list) = var("FUNNEL_VEHICLE_BACKENDS") {
            self.vehicle_backends = parse_backend_list(&list)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `Invalid` for a non-positive amount or a template without `{plate}`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.payment_amount.is_finite() && self.payment_amount > 0.0) {
            return Err(ConfigError::invalid("payment_amount", "must be positive"));
        }
        if let Some(backend) = self
            .vehicle_backends
            .iter()
            .find(|b| !b.url.contains(funnel_client::vehicle::PLATE_PLACEHOLDER))
        {
            return Err(ConfigError::invalid(
                "vehicle_backends",
                format!("{} has no {{plate}} placeholder", backend.name),
            ));
        }
        Ok(())
    }

    /// Upstream backends, with the keyed provider appended when set
    #[must_use]
    pub fn upstream_backends(&self) -> Vec<VehicleBackendConfig> {
        let mut backends = self.vehicle_backends.clone();
        if let Some(key) = &self.vehicle_api_key {
            backends.push(VehicleBackendConfig::direct(key));
        }
        backends
    }

    /// Lookup tuning derived from the mode
    #[must_use]
    pub fn lookup_config(&self) -> LookupConfig {
        LookupConfig::default().with_dev_placeholder(self.dev)
    }

    /// Generator settings charging the configured amount
    #[must_use]
    pub fn pix_config(&self) -> PixConfig {
        self.pix.clone().with_default_amount(self.payment_amount)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

fn parse_backend_list(list: &str) -> Result<Vec<VehicleBackendConfig>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (name, url) = item.split_once('=').ok_or_else(|| {
                ConfigError::invalid("FUNNEL_VEHICLE_BACKENDS", format!("expected name=url, got {item}"))
            })?;
            Ok(VehicleBackendConfig::new(name.trim(), url.trim()))
        })
        .collect()
}
