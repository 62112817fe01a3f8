//! Error taxonomy for the order core and its HTTP mapping.
//!
//! Every failure reaching a client is rendered as `{ "error": <message>, "code": <kind> }`
//! and logged server-side (warn for 4xx, error for 5xx). Nothing is retried.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::{error, warn};

use crate::types::{OrderStatus, TableId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PosError {
    /// Missing or malformed input (empty items, negative money, bad enum value).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced order or table does not exist.
    #[error("{0} not found")]
    NotFound(String),

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Table is not `available` at order creation.
    #[error("table {0} is not available")]
    TableUnavailable(TableId),

    /// Store unreachable or a write failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Missing or malformed configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PosError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PosError::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        PosError::NotFound(resource.into())
    }

    pub fn persistence(err: impl std::fmt::Display) -> Self {
        PosError::Persistence(err.to_string())
    }

    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            PosError::Validation(_) => "validation_error",
            PosError::NotFound(_) => "not_found",
            PosError::InvalidTransition { .. } => "invalid_transition",
            PosError::TableUnavailable(_) => "table_unavailable",
            PosError::Persistence(_) => "persistence_error",
            PosError::Configuration(_) => "configuration_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PosError::Validation(_) => StatusCode::BAD_REQUEST,
            PosError::NotFound(_) => StatusCode::NOT_FOUND,
            PosError::InvalidTransition { .. } | PosError::TableUnavailable(_) => {
                StatusCode::CONFLICT
            }
            PosError::Persistence(_) | PosError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PosError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed code={} error={}", self.code(), self);
        } else {
            warn!("request rejected code={} error={}", self.code(), self);
        }
        // Internal details stay in the log.
        let message = match &self {
            PosError::Persistence(_) | PosError::Configuration(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (
            status,
            Json(serde_json::json!({ "error": message, "code": self.code() })),
        )
            .into_response()
    }
}
