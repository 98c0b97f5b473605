//! Typed client for the thin API
//!
//! The wizard treats every call as opaque: success with a payload, or a
//! failure with a message.

use crate::error::ClientError;
use crate::http::{decode, normalize_base, HttpConfig};
use funnel_core::{
    Benefit, Candidate, NewCandidate, PaymentInfo, PaymentRequest, ReferenceState, Region, VehicleInfo,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// `GET /health` body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    /// Always `ok`
    pub status: String,
    /// Deployment environment
    pub env: String,
    /// Server version
    pub version: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

/// Client for the API server
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    client: Client,
}

impl ApiClient {
    /// Create client for a base URL
    ///
    /// # Errors
    /// `InvalidUrl` for a non-absolute base, `Http` if the client cannot be built
    pub fn new(base: &str, http: &HttpConfig) -> Result<Self, ClientError> {
        Self::with_client(base, http.build()?)
    }

    /// Create client sharing a reqwest client
    ///
    /// # Errors
    /// `InvalidUrl` for a non-absolute base
    pub fn with_client(base: &str, client: Client) -> Result<Self, ClientError> {
        Ok(Self {
            base: normalize_base(base)?,
            client,
        })
    }

    /// Base URL without trailing slash
    #[inline]
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.client.get(self.url(path)).send().await?;
        decode(response).await
    }

    /// Server health
    ///
    /// # Errors
    /// Transport failure or non-2xx
    pub async fn health(&self) -> Result<Health, ClientError> {
        self.get("/health").await
    }

    /// Every state
    ///
    /// # Errors
    /// Transport failure or non-2xx
    pub async fn states(&self) -> Result<Vec<ReferenceState>, ClientError> {
        self.get("/api/states").await
    }

    /// States currently recruiting
    ///
    /// # Errors
    /// Transport failure or non-2xx
    pub async fn states_with_vacancies(&self) -> Result<Vec<ReferenceState>, ClientError> {
        self.get("/api/states/with-vacancies").await
    }

    /// States in the legacy region shape
    ///
    /// # Errors
    /// Transport failure or non-2xx
    pub async fn regions(&self) -> Result<Vec<Region>, ClientError> {
        self.get("/api/regions").await
    }

    /// Landing-page benefits
    ///
    /// # Errors
    /// Transport failure or non-2xx
    pub async fn benefits(&self) -> Result<Vec<Benefit>, ClientError> {
        self.get("/api/benefits").await
    }

    /// Every stored candidate
    ///
    /// # Errors
    /// Transport failure or non-2xx
    pub async fn candidates(&self) -> Result<Vec<Candidate>, ClientError> {
        self.get("/api/candidates").await
    }

    /// Record a candidate
    ///
    /// # Errors
    /// `Conflict` when the email is already registered, `Status` (400) on
    /// schema violations
    pub async fn create_candidate(&self, candidate: &NewCandidate) -> Result<Candidate, ClientError> {
        let response = self
            .client
            .post(self.url("/api/candidates"))
            .json(candidate)
            .send()
            .await?;
        decode(response).await
    }

    /// Ask the server for a mock PIX payment
    ///
    /// # Errors
    /// Transport failure or non-2xx
    pub async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentInfo, ClientError> {
        let response = self
            .client
            .post(self.url("/api/payments/pix"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    /// Vehicle data through the server's proxy
    ///
    /// # Errors
    /// Transport failure or non-2xx
    pub async fn vehicle_info(&self, plate: &str) -> Result<VehicleInfo, ClientError> {
        self.get(&format!("/api/vehicle-info/{plate}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_base_and_path() {
        let client = ApiClient::new("http://localhost:5000/", &HttpConfig::default()).unwrap();
        assert_eq!(client.base(), "http://localhost:5000");
        assert_eq!(client.url("/api/states"), "http://localhost:5000/api/states");
    }
}
