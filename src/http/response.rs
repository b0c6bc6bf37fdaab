//! Response handling at the routing boundary.
//!
//! # Responsibilities
//! - Classify routing failures (resolution, forwarding, rewrite)
//! - Convert every failure into the fixed JSON error shape
//!
//! # Design Decisions
//! - Instance responses pass through untouched; only failures are shaped here
//! - All failures map to 500; callers decide whether to retry

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::rewrite::RewriteError;
use crate::selector::{ForwardError, SelectorError};

/// Summary reported in the `error` field of every routing failure.
pub const ROUTE_FAILURE: &str = "Container request failed";

/// Errors that can occur while routing a request to an instance.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Resolve(#[from] SelectorError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

impl RouteError {
    /// Error type string for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteError::Resolve(_) => "resolution",
            RouteError::Forward(_) => "forwarding",
            RouteError::Rewrite(_) => "rewrite",
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, detail: &str) -> Self {
        let message = if detail.is_empty() {
            "Unknown error".to_string()
        } else {
            detail.to_string()
        };
        Self {
            error: error.into(),
            message,
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let body = ErrorBody::new(ROUTE_FAILURE, &self.to_string());
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[tokio::test]
    async fn test_error_response_format() {
        let err = RouteError::from(SelectorError::Unavailable("capacity exhausted".into()));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(
            &body[..],
            br#"{"error":"Container request failed","message":"capacity exhausted"}"#
        );
    }

    #[test]
    fn test_empty_detail_is_unknown() {
        let body = ErrorBody::new(ROUTE_FAILURE, "");
        assert_eq!(body.message, "Unknown error");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(RouteError::from(SelectorError::EmptyPool).kind(), "resolution");
        assert_eq!(
            RouteError::from(ForwardError::InvalidUri("//".into())).kind(),
            "forwarding"
        );
    }
}
