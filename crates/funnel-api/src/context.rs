//! Shared handler state

use crate::config::ServerConfig;
use crate::repository::{CatalogRepository, InMemoryCatalog};
use funnel_client::{standard_payment_service, vehicle_lookup, ClientError};
use funnel_core::{MockPixGenerator, PaymentService, VehicleLookup};
use std::sync::Arc;

/// Everything a handler needs, cheap to clone per request
#[derive(Debug, Clone)]
pub struct AppContext {
    /// Reference data and candidates
    pub repository: Arc<dyn CatalogRepository>,
    /// Payment gateways, ending with the local generator
    pub payments: Arc<PaymentService>,
    /// Upstream vehicle backends
    pub vehicles: Arc<VehicleLookup>,
    /// Effective configuration
    pub config: Arc<ServerConfig>,
}

impl AppContext {
    /// Assemble context from parts
    #[must_use]
    pub fn new(
        repository: Arc<dyn CatalogRepository>,
        payments: PaymentService,
        vehicles: VehicleLookup,
        config: ServerConfig,
    ) -> Self {
        Self {
            repository,
            payments: Arc::new(payments),
            vehicles: Arc::new(vehicles),
            config: Arc::new(config),
        }
    }

    /// Seeded in-memory catalog with HTTP gateways and backends from config
    ///
    /// # Errors
    /// A configured URL is invalid or the HTTP client cannot be built
    pub fn from_config(config: ServerConfig) -> Result<Self, ClientError> {
        let generator = Arc::new(MockPixGenerator::new(config.pix_config()));
        let payments = standard_payment_service(config.payment_secret.clone(), None, generator, &config.http)?;
        let vehicles = vehicle_lookup(&config.upstream_backends(), config.lookup_config(), &config.http)?;

        tracing::info!(
            "Payment gateways: {:?}; vehicle backends: {:?}",
            payments.gateway_names(),
            vehicles.backend_names()
        );
        Ok(Self::new(Arc::new(InMemoryCatalog::seeded()), payments, vehicles, config))
    }
}
