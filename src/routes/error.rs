//! JSON error responses for the HTTP surface.
//!
//! Caller mistakes come back as 400 with the rule or field that failed.
//! Store failures come back as a bare 500 and are logged here, never echoed.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{IngestError, QueryError, RejectReason, StoreError};

// ---

#[derive(Debug)]
pub enum ApiError {
    Rejected(RejectReason),
    Invalid(Vec<String>),
    Store(StoreError),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Rejected(reason) => ApiError::Rejected(reason),
            QueryError::Store(e) => ApiError::Store(e),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Invalid(fields) => ApiError::Invalid(fields),
            IngestError::Store(e) => ApiError::Store(e),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Invalid(vec![rejection.body_text()])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (status, body) = match self {
            ApiError::Rejected(reason) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "rejected_query",
                    message: Some(reason.to_string()),
                    details: Vec::new(),
                },
            ),
            ApiError::Invalid(fields) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "invalid_payload",
                    message: Some(format!("{} field(s) failed validation", fields.len())),
                    details: fields,
                },
            ),
            ApiError::Store(e) => {
                tracing::error!(error = %e, "store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "store_error",
                        message: None,
                        details: Vec::new(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
