//! Shared reqwest client setup and response handling

use crate::error::ClientError;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    /// Whole-request timeout
    pub timeout_ms: u64,
    /// Connect timeout
    pub connect_timeout_ms: u64,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
            user_agent: format!("funnel-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    /// Set request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Build a client from these settings
    ///
    /// # Errors
    /// TLS backend cannot be initialized
    pub fn build(&self) -> Result<Client, ClientError> {
        Ok(Client::builder()
            .timeout(Duration::from_millis(self.timeout_ms))
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .user_agent(&self.user_agent)
            .build()?)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Decode a JSON body or turn a non-2xx response into an error
///
/// Error bodies of the form `{"error": "..."}` provide the message.
///
/// # Errors
/// `Conflict` for 409, `Status` for other non-2xx, `Http` for decode failures
pub async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());

    if status == StatusCode::CONFLICT {
        Err(ClientError::Conflict(message))
    } else {
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Strip a trailing slash and check the base parses
///
/// # Errors
/// `InvalidUrl` when `base` is not an absolute URL
pub fn normalize_base(base: &str) -> Result<String, ClientError> {
    url::Url::parse(base)?;
    Ok(base.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_builds() {
        assert!(HttpConfig::default().build().is_ok());
    }

    #[test]
    fn base_is_normalized() {
        assert_eq!(normalize_base("http://localhost:5000/").unwrap(), "http://localhost:5000");
        assert!(normalize_base("/relative").is_err());
    }
}
