use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Failure envelope shared by every handler: `{"status": false, "code", "message", ...}`.
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub status: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(flatten)] pub details: Map<String, Value>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: Option<String> },
    Unauthorized { code: &'static str },
    Forbidden { code: &'static str },
    NotFound { code: &'static str, message: Option<String> },
    Conflict { code: &'static str, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
    /// An upstream dependency refused the request after local state was committed.
    Upstream { code: &'static str, message: String, error: Option<Value>, details: Map<String, Value> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self { Self::Internal { trace_id: Some(Uuid::new_v4()), message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, message: Some(message.into()) } }
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self { Self::NotFound { code, message: Some(message.into()) } }
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self { Self::Conflict { code, message: Some(message.into()) } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Internal { .. } | ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. }
            | ApiError::Unauthorized { code }
            | ApiError::Forbidden { code }
            | ApiError::NotFound { code, .. }
            | ApiError::Conflict { code, .. }
            | ApiError::Upstream { code, .. } => code,
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

fn body(code: &'static str, message: String) -> ErrorBody {
    ErrorBody { status: false, code: code.into(), message, error: None, trace_id: None, details: Map::new() }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let payload = match self {
            ApiError::BadRequest { code, message } => body(code, message.unwrap_or_else(|| "Bad request".into())),
            ApiError::Unauthorized { code } => body(code, "Unauthorized".into()),
            ApiError::Forbidden { code } => body(code, "Forbidden".into()),
            ApiError::NotFound { code, message } => body(code, message.unwrap_or_else(|| "Not found".into())),
            ApiError::Conflict { code, message } => body(code, message.unwrap_or_else(|| "Conflict".into())),
            ApiError::Internal { trace_id, message } => ErrorBody {
                trace_id,
                error: message.map(Value::String),
                ..body("internal_error", "Internal server error".into())
            },
            ApiError::Upstream { code, message, error, details } => ErrorBody { error, details, ..body(code, message) },
        };
        let mut resp = (status, Json(payload)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
