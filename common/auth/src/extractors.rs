use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts, Path};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue};

use crate::claims::{normalize_phone, Claims};
use crate::error::{AuthError, AuthResult};
use crate::verifier::JwtVerifier;

/// The customer behind a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    claims: Claims,
}

impl AuthContext {
    pub fn phone(&self) -> &str {
        &self.claims.phone
    }

    /// Succeeds only when the token was issued for `phone`.
    pub fn authorize(&self, phone: &str) -> AuthResult<()> {
        if self.claims.owns_phone(phone) {
            Ok(())
        } else {
            Err(AuthError::PhoneMismatch)
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<JwtVerifier>::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;
        let claims = verifier.verify(bearer_token(header)?)?;
        Ok(Self { claims })
    }
}

/// Phone taken from the `:phone` path segment, normalized, and owned by the
/// bearer of the request's token.
#[derive(Debug, Clone)]
pub struct PhoneOwner(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for PhoneOwner
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::MissingPhone)?;
        let phone = normalize_phone(&raw);
        if phone.is_empty() {
            return Err(AuthError::MissingPhone);
        }
        auth.authorize(&phone)?;
        Ok(Self(phone))
    }
}

fn bearer_token(value: &HeaderValue) -> AuthResult<&str> {
    let token = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim()
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorization)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }
    Ok(token)
}
