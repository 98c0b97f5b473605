//! API, repository and configuration errors

use serde::Serialize;
use std::path::PathBuf;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

/// Catalog repository errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// Email already registered
    #[error("Email already registered")]
    DuplicateEmail(String),

    /// Candidate names a state that is not in the catalog
    #[error("Invalid state")]
    UnknownState(String),

    /// Payload violates a column constraint
    #[error("{0}")]
    Invalid(String),
}

/// Handler errors, rendered as `{"error": "..."}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or incomplete request
    #[error("{0}")]
    BadRequest(String),

    /// Resource already exists
    #[error("{0}")]
    Conflict(String),

    /// Body over the size limit
    #[error("Request body too large")]
    PayloadTooLarge,

    /// Upstream providers failed
    #[error("{0}")]
    Upstream(String),

    /// Anything else
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Response status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as JSON error body
    #[must_use]
    pub fn into_response(self) -> Response {
        error_reply(self.status(), &self.to_string(), None)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::DuplicateEmail(_) => Self::Conflict(e.to_string()),
            RepositoryError::UnknownState(_) | RepositoryError::Invalid(_) => Self::BadRequest(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
}

/// `{"error": message}` with an optional `path`
#[must_use]
pub fn error_reply(status: StatusCode, message: &str, path: Option<&str>) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorBody { error: message, path }), status).into_response()
}

/// Server configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or malformed
    #[error("invalid setting {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_map_to_statuses() {
        let dup = ApiError::from(RepositoryError::DuplicateEmail("a@b.com".to_string()));
        assert_eq!(dup.status(), StatusCode::CONFLICT);
        assert_eq!(dup.to_string(), "Email already registered");

        let state = ApiError::from(RepositoryError::UnknownState("XX".to_string()));
        assert_eq!(state.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.to_string(), "Invalid state");
    }
}
