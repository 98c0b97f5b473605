//! Funnel Client - HTTP implementations of the wizard's remote seams
//!
//! - Vehicle backends: GET-by-plate URL templates tried in order
//! - PIX gateways: direct provider and API server, ahead of the local generator
//! - A typed client for the thin API

#![warn(unreachable_pub)]

pub mod api;
pub mod error;
pub mod http;
pub mod payment;
pub mod vehicle;

pub use api::{ApiClient, Health};
pub use error::ClientError;
pub use http::HttpConfig;
pub use payment::{standard_payment_service, DirectPixGateway, ServerPixGateway};
pub use vehicle::{standard_backends, HttpVehicleBackend, VehicleBackendConfig};

use funnel_core::{LookupConfig, VehicleBackend, VehicleLookup};
use std::sync::Arc;

/// Build a lookup over configured backends sharing one client
///
/// # Errors
/// Any backend template is invalid, or the client cannot be built
pub fn vehicle_lookup(
    backends: &[VehicleBackendConfig],
    config: LookupConfig,
    http: &HttpConfig,
) -> Result<VehicleLookup, ClientError> {
    let client = http.build()?;
    let backends = backends
        .iter()
        .map(|c| {
            HttpVehicleBackend::with_client(c.clone(), client.clone())
                .map(|b| Arc::new(b) as Arc<dyn VehicleBackend>)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(VehicleLookup::new(backends, config))
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
