use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("phone number is required")]
    MissingPhone,
    #[error("token does not belong to this phone number")]
    PhoneMismatch,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: bool,
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::MissingAuthorization | AuthError::InvalidAuthorization => {
                (StatusCode::UNAUTHORIZED, "AUTH_HEADER")
            }
            AuthError::InvalidHeader(_) | AuthError::Verification(_) => {
                (StatusCode::UNAUTHORIZED, "AUTH_TOKEN")
            }
            AuthError::InvalidClaim(_, _) | AuthError::InvalidJson(_) => {
                (StatusCode::UNAUTHORIZED, "AUTH_CLAIMS")
            }
            AuthError::Signing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_SIGNING"),
            AuthError::MissingPhone => (StatusCode::BAD_REQUEST, "missing_phone"),
            AuthError::PhoneMismatch => (StatusCode::FORBIDDEN, "phone_mismatch"),
        };

        let body = ErrorBody {
            status: false,
            code,
            message: self.to_string(),
        };
        let mut resp = (status, Json(body)).into_response();
        resp.headers_mut()
            .insert("X-Error-Code", axum::http::HeaderValue::from_static(code));
        resp
    }
}
