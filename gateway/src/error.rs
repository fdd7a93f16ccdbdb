//! Maps the core crate's closed error taxonomy onto HTTP status codes and
//! the `{success, data, error, meta}` response envelope (§6).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use operator_core::error::{ErrorCode, OperatorError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub timestamp: i64,
    pub request_id: String,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub meta: Meta,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T, request_id: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Meta {
                timestamp: chrono::Utc::now().timestamp_millis(),
                request_id: request_id.into(),
                duration_ms,
            },
        }
    }
}

pub struct ApiError(pub OperatorError);

impl From<OperatorError> for ApiError {
    fn from(err: OperatorError) -> Self {
        Self(err)
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Blocked => StatusCode::FORBIDDEN,
        ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::Transient => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::Permanent => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = status_for(code);
        let body: Envelope<()> = Envelope {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: code.as_str(),
                message: self.0.message(),
            }),
            meta: Meta {
                timestamp: chrono::Utc::now().timestamp_millis(),
                request_id: uuid::Uuid::new_v4().to_string(),
                duration_ms: 0,
            },
        };
        (status, Json(body)).into_response()
    }
}
