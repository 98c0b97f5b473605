//! HTTP PIX gateways
//!
//! - [`DirectPixGateway`]: third-party provider, only usable with a secret
//! - [`ServerPixGateway`]: the API server's mock endpoint
//!
//! [`standard_payment_service`] chains them in front of the local generator.

use crate::error::ClientError;
use crate::http::{decode, normalize_base, HttpConfig};
use async_trait::async_trait;
use chrono::Utc;
use funnel_core::{
    LocalPixGateway, MockPixGenerator, Named, PaymentGateway, PaymentInfo, PaymentRequest,
    PaymentService, PaymentStatus, ProviderError,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Payment creation endpoint of the direct provider
pub const DIRECT_PROVIDER_URL: &str = "https://app.for4payments.com.br/api/v1/pix/create";

/// Payment body returned by either gateway
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GatewayPayment {
    #[serde(alias = "pixId")]
    id: String,
    pix_code: String,
    pix_qr_code: String,
    status: Option<PaymentStatus>,
}

impl GatewayPayment {
    fn into_info(self) -> Result<PaymentInfo, ClientError> {
        if self.pix_code.is_empty() || self.pix_qr_code.is_empty() {
            return Err(ClientError::InvalidResponse(
                "response lacks pixCode or pixQrCode".to_string(),
            ));
        }
        Ok(PaymentInfo {
            id: self.id,
            pix_code: self.pix_code,
            pix_qr_code_url: self.pix_qr_code,
            status: self.status.unwrap_or_default(),
            created_at: Utc::now(),
        })
    }
}

/// Third-party provider called with a bearer secret
#[derive(Debug, Clone)]
pub struct DirectPixGateway {
    endpoint: String,
    secret: Option<String>,
    generator: Arc<MockPixGenerator>,
    client: Client,
}

impl DirectPixGateway {
    /// Create gateway; without a secret every call fails as not configured
    ///
    /// `generator` fills in missing payer contact data.
    #[must_use]
    pub fn new(secret: Option<String>, generator: Arc<MockPixGenerator>, client: Client) -> Self {
        Self {
            endpoint: DIRECT_PROVIDER_URL.to_string(),
            secret: secret.filter(|s| !s.trim().is_empty()),
            generator,
            client,
        }
    }

    /// Point at another endpoint
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// True when a secret is set
    #[inline]
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    async fn post(&self, secret: &str, request: &PaymentRequest) -> Result<PaymentInfo, ClientError> {
        let prepared = self
            .generator
            .prepare(request)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(secret)
            .header("Accept", "application/json")
            .json(&prepared)
            .send()
            .await?;
        decode::<GatewayPayment>(response).await?.into_info()
    }
}

impl Named for DirectPixGateway {
    fn name(&self) -> &str {
        "direct"
    }
}

#[async_trait]
impl PaymentGateway for DirectPixGateway {
    async fn create(&self, request: &PaymentRequest) -> Result<PaymentInfo, ProviderError> {
        let Some(secret) = &self.secret else {
            return Err(ProviderError::NotConfigured("no payment secret".to_string()));
        };
        Ok(self.post(secret, request).await?)
    }
}

#[derive(Serialize)]
struct ServerPaymentBody<'a> {
    name: &'a str,
    email: &'a str,
    cpf: &'a str,
    phone: &'a str,
    amount: f64,
}

/// The API server's `POST /api/payments/pix`
#[derive(Debug, Clone)]
pub struct ServerPixGateway {
    url: String,
    default_amount: f64,
    client: Client,
}

impl ServerPixGateway {
    /// Create gateway for an API base URL
    ///
    /// # Errors
    /// `InvalidUrl` when `base` is not absolute
    pub fn new(base: &str, default_amount: f64, client: Client) -> Result<Self, ClientError> {
        Ok(Self {
            url: format!("{}/api/payments/pix", normalize_base(base)?),
            default_amount,
            client,
        })
    }
}

impl Named for ServerPixGateway {
    fn name(&self) -> &str {
        "server"
    }
}

#[async_trait]
impl PaymentGateway for ServerPixGateway {
    async fn create(&self, request: &PaymentRequest) -> Result<PaymentInfo, ProviderError> {
        let body = ServerPaymentBody {
            name: &request.name,
            email: &request.email,
            cpf: &request.cpf,
            phone: &request.phone,
            amount: request.amount.unwrap_or(self.default_amount),
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(ClientError::from)?;
        Ok(decode::<GatewayPayment>(response).await?.into_info()?)
    }
}

/// Direct provider (when a secret is set), then the server, then local
///
/// # Errors
/// `InvalidUrl` for a bad server base, `Http` if the client cannot be built
pub fn standard_payment_service(
    secret: Option<String>,
    server_base: Option<&str>,
    generator: Arc<MockPixGenerator>,
    http: &HttpConfig,
) -> Result<PaymentService, ClientError> {
    let client = http.build()?;
    let mut gateways: Vec<Arc<dyn PaymentGateway>> = Vec::new();

    let direct = DirectPixGateway::new(secret, Arc::clone(&generator), client.clone());
    if direct.is_configured() {
        gateways.push(Arc::new(direct));
    }
    if let Some(base) = server_base {
        let amount = generator.config().default_amount;
        gateways.push(Arc::new(ServerPixGateway::new(base, amount, client)?));
    }
    gateways.push(Arc::new(LocalPixGateway::new(generator)));

    Ok(PaymentService::new(gateways))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_body_is_rejected() {
        let body = GatewayPayment {
            id: "x".to_string(),
            pix_code: "000201".to_string(),
            ..GatewayPayment::default()
        };
        assert!(matches!(body.into_info(), Err(ClientError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn direct_without_secret_is_not_configured() {
        let gateway = DirectPixGateway::new(
            Some("   ".to_string()),
            Arc::new(MockPixGenerator::default()),
            Client::new(),
        );
        assert!(!gateway.is_configured());
        let err = gateway
            .create(&PaymentRequest::new("Jane", "12345678901"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn standard_service_order() {
        let generator = Arc::new(MockPixGenerator::default());
        let http = HttpConfig::default();

        let service =
            standard_payment_service(None, Some("http://localhost:5000"), generator.clone(), &http).unwrap();
        assert_eq!(service.gateway_names(), vec!["server", "local"]);

        let service =
            standard_payment_service(Some("sk".to_string()), Some("http://localhost:5000"), generator, &http)
                .unwrap();
        assert_eq!(service.gateway_names(), vec!["direct", "server", "local"]);
    }
}
