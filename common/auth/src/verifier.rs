use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::claims::{Claims, ClaimsRepr};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// A freshly signed login token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Sign arbitrary claims with an HS256 shared secret.
pub fn sign_hs256<T: Serialize>(secret: &str, claims: &T) -> AuthResult<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| AuthError::Signing(err.to_string()))
}

/// Issues and verifies HS256 login tokens bound to a customer phone number.
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    decoding: DecodingKey,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let decoding = DecodingKey::from_secret(config.secret.as_bytes());
        Self { config, decoding }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn issue(&self, phone: &str) -> AuthResult<IssuedToken> {
        self.issue_at(phone, Utc::now())
    }

    pub fn issue_at(&self, phone: &str, now: DateTime<Utc>) -> AuthResult<IssuedToken> {
        let expires_at = now + Duration::seconds(self.config.ttl_seconds);
        let repr = ClaimsRepr {
            iss: self.config.issuer.clone(),
            phone: phone.to_string(),
            exp: expires_at.timestamp(),
            iat: Some(now.timestamp()),
        };
        let token = sign_hs256(&self.config.secret, &repr)?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.validate_aud = false;
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, &self.decoding, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(phone = %claims.phone, "verified login token");
        Ok(claims)
    }
}
