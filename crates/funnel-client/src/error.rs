//! HTTP client errors

use funnel_core::ProviderError;

/// Errors from HTTP calls
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport or body failure inside reqwest
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("status {status}: {message}")]
    Status { status: u16, message: String },

    /// Resource already exists (409)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Configured URL does not parse
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Body decoded but is unusable
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// HTTP status, when the server answered
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Conflict(_) => Some(409),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::InvalidUrl(_) | Self::InvalidResponse(_) => None,
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidUrl(e.to_string())
    }
}

impl From<ClientError> for ProviderError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Status { status, .. } => ProviderError::Status(status),
            ClientError::Conflict(_) => ProviderError::Status(409),
            ClientError::Http(e) if e.is_decode() => ProviderError::Decode(e.to_string()),
            ClientError::Http(e) => match e.status() {
                Some(status) => ProviderError::Status(status.as_u16()),
                None => ProviderError::Transport(e.to_string()),
            },
            ClientError::InvalidUrl(msg) => ProviderError::NotConfigured(msg),
            ClientError::InvalidResponse(msg) => ProviderError::Incomplete(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_to_provider_status() {
        let err = ClientError::Status {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(ProviderError::from(err), ProviderError::Status(502));
    }

    #[test]
    fn conflict_is_409() {
        assert_eq!(ClientError::Conflict("email".to_string()).status_code(), Some(409));
    }

    #[test]
    fn bad_url_is_not_configured() {
        let err = ClientError::from(url::Url::parse("nope").unwrap_err());
        assert!(matches!(ProviderError::from(err), ProviderError::NotConfigured(_)));
    }
}
