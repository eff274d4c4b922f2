//! Transport-agnostic JSON handlers.
//!
//! Each handler returns an [`ApiResponse`] holding an HTTP status code and the
//! JSON body, wrapped in the `{"data": ..., "status": "success"}` envelope or
//! `{"error": ..., "status": "error"}` on failure. Routing and authentication
//! belong to whatever server embeds these handlers; the caller passes the
//! authenticated user id.

use crate::database::StoreError;
use crate::models::ReviewError;
use log::error;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

pub mod flashcards;
pub mod sessions;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            status: STATUS_OK,
            body: json!({ "data": data, "status": "success" }),
        }
    }

    /// List envelope without pagination links.
    pub fn list<T: Serialize>(results: &[T]) -> Result<Self, ApiError> {
        let results = serde_json::to_value(results).map_err(ApiError::serialization)?;
        Ok(Self {
            status: STATUS_OK,
            body: json!({
                "count": results.as_array().map_or(0, Vec::len),
                "next": Value::Null,
                "previous": Value::Null,
                "results": results,
                "status": "success",
            }),
        })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => STATUS_BAD_REQUEST,
            ApiError::NotFound(_) => STATUS_NOT_FOUND,
            ApiError::Conflict(_) => STATUS_CONFLICT,
            ApiError::Internal(_) => STATUS_INTERNAL_ERROR,
        }
    }

    pub fn into_response(self) -> ApiResponse {
        let message = match &self {
            ApiError::Internal(details) => {
                error!("event=api_error module=api status=error error={details}");
                "Internal server error.".to_string()
            }
            other => other.to_string(),
        };
        ApiResponse {
            status: self.status(),
            body: json!({ "error": message, "status": "error" }),
        }
    }

    fn serialization(err: serde_json::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, .. } => {
                ApiError::NotFound(not_found_message(entity))
            }
            StoreError::Invalid(err) => ApiError::BadRequest(err.to_string()),
            StoreError::Duplicate { .. } => ApiError::BadRequest(err.to_string()),
            StoreError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::InvalidQuality(_) => ApiError::BadRequest(QUALITY_RANGE_MESSAGE.to_string()),
            ReviewError::Persistence(err) => err.into(),
        }
    }
}

pub(crate) const QUALITY_RANGE_MESSAGE: &str = "Quality must be between 0 and 5.";

pub(crate) fn not_found_message(entity: &str) -> String {
    let mut entity = entity.to_string();
    if let Some(first) = entity.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    format!("{entity} not found or does not belong to you.")
}

/// Runs a handler body and converts its error into a response.
pub(crate) fn respond(result: Result<ApiResponse, ApiError>) -> ApiResponse {
    result.unwrap_or_else(ApiError::into_response)
}
