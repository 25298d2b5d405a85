use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

use super::ApiResponse;
use crate::clients::ClientError;

/// Error returned by every handler. Service errors convert into it through
/// `From` impls living next to the handlers that use them.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("{service} error: {message}")]
    ExternalApiError { service: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ExternalApiError { .. } => StatusCode::BAD_GATEWAY,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message shown to the caller. Server side failures are logged in full
    /// and replaced with a generic text.
    fn public_message(&self) -> String {
        match self {
            Self::DatabaseError(msg) => {
                tracing::error!(error = %msg, "Database error");
                "A database error occurred".to_string()
            }
            Self::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "An internal error occurred".to_string()
            }
            Self::ExternalApiError { service, message } => {
                tracing::warn!(%service, error = %message, "Upstream request failed");
                format!("{service} request failed: {message}")
            }
            Self::NotFound(msg)
            | Self::ValidationError(msg)
            | Self::NotImplemented(msg)
            | Self::Conflict(msg)
            | Self::Unauthorized(msg) => msg.clone(),
        }
    }

    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id} not found"))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()>::error(self.public_message());
        (self.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(format!("{err:#}"))
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Config(msg) => Self::ValidationError(msg),
            ClientError::Unsupported(msg) => Self::NotImplemented(msg),
            ClientError::Status { service, .. }
            | ClientError::Auth { service, .. }
            | ClientError::Decode { service, .. } => Self::ExternalApiError {
                service: service.to_string(),
                message: err.to_string(),
            },
            ClientError::Http(e) => Self::ExternalApiError {
                service: "HTTP".to_string(),
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::not_found("Client", 3).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("busy").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(ClientError::Config("bad url".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ClientError::Unsupported("no playlists".into())).status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn test_database_details_are_hidden() {
        let err = ApiError::DatabaseError("UNIQUE constraint failed: clients.name".into());
        assert_eq!(err.public_message(), "A database error occurred");
        assert_eq!(ApiError::not_found("Client", 3).public_message(), "Client 3 not found");
    }
}
