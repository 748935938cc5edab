//! API error taxonomy.
//!
//! Every failure a handler can produce maps to one `ApiError` variant, which
//! carries the HTTP status, a machine-readable code, and a human-readable
//! message onto the wire.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// Which kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Mover,
    Item,
}

impl Entity {
    pub fn as_str(self) -> &'static str {
        match self {
            Entity::Mover => "mover",
            Entity::Item => "item",
        }
    }

    fn not_found_code(self) -> &'static str {
        match self {
            Entity::Mover => "MOVER_NOT_FOUND",
            Entity::Item => "ITEM_NOT_FOUND",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level detail for validation failures.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation { errors: Vec<FieldError> },

    #[error("a {entity} named '{name}' already exists")]
    DuplicateName { entity: Entity, name: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("{0}")]
    InvalidState(String),

    #[error("total weight {attempted} exceeds the limit of {limit}")]
    CapacityExceeded { limit: i64, attempted: i64 },

    #[error("the mover was modified concurrently, retry the request")]
    Conflict,

    #[error("an internal error occurred")]
    Internal(String),
}

impl ApiError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation { errors }
    }

    pub fn not_found(entity: Entity, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. }
            | Self::DuplicateName { .. }
            | Self::InvalidState(_)
            | Self::CapacityExceeded { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::DuplicateName { .. } => "DUPLICATE_NAME",
            Self::NotFound { entity, .. } => entity.not_found_code(),
            Self::InvalidState(_) => "INVALID_STATE",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::Conflict => "VERSION_CONFLICT",
            Self::Internal(_) => "OPERATION_FAILED",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity, id) => Self::NotFound { entity, id },
            StoreError::DuplicateName(entity, name) => Self::DuplicateName { entity, name },
            StoreError::VersionConflict(_) => Self::Conflict,
            StoreError::Database(message) => Self::Internal(message),
        }
    }
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Persistence failures stay opaque to clients; the detail goes to the log.
        if let Self::Internal(ref message) = self {
            tracing::error!("internal error: {}", message);
        }

        let details = match &self {
            Self::Validation { errors } => Some(errors.clone()),
            _ => None,
        };

        let body = ErrorBody {
            success: false,
            code: self.error_code(),
            message: self.to_string(),
            details,
        };

        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::validation(vec![]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found(Entity::Mover, 5).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::CapacityExceeded {
                limit: 10,
                attempted: 11
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::not_found(Entity::Mover, 1).error_code(),
            "MOVER_NOT_FOUND"
        );
        assert_eq!(
            ApiError::not_found(Entity::Item, 1).error_code(),
            "ITEM_NOT_FOUND"
        );
        assert_eq!(
            ApiError::DuplicateName {
                entity: Entity::Item,
                name: "rope".to_string()
            }
            .error_code(),
            "DUPLICATE_NAME"
        );
        assert_eq!(
            ApiError::invalid_state("mover is on a mission").error_code(),
            "INVALID_STATE"
        );
    }

    #[test]
    fn test_display_messages() {
        let err = ApiError::not_found(Entity::Mover, 5);
        assert_eq!(err.to_string(), "mover 5 not found");

        let err = ApiError::CapacityExceeded {
            limit: 10,
            attempted: 12,
        };
        assert_eq!(err.to_string(), "total weight 12 exceeds the limit of 10");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: ApiError = StoreError::DuplicateName(Entity::Mover, "Atlas".to_string()).into();
        assert_eq!(err.error_code(), "DUPLICATE_NAME");

        let err: ApiError = StoreError::VersionConflict(3).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: ApiError = StoreError::Database("disk full".to_string()).into();
        assert_eq!(err.error_code(), "OPERATION_FAILED");
    }
}
