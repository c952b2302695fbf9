pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod verifier;

pub use claims::{normalize_phone, Claims};
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::{AuthContext, PhoneOwner};
pub use verifier::{sign_hs256, IssuedToken, JwtVerifier};
