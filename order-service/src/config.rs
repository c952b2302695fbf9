use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Connection settings for the POS vendor sale API.
#[derive(Debug, Clone)]
pub struct VendorConfig {
    pub base_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub branch_code: String,
    pub channel: String,
    pub timeout: Duration,
}

impl VendorConfig {
    pub fn sale_url(&self) -> String {
        format!("{}/sale/", self.base_url.trim_end_matches('/'))
    }
}

/// How this storefront identifies itself on vendor sales.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub source_name: String,
    pub company_name: String,
}

#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub secret: String,
    pub issuer: String,
    pub leeway_seconds: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub admin_api_key: Option<String>,
    pub login: LoginConfig,
    pub vendor: VendorConfig,
    pub storefront: StorefrontConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8084);
        let database_url = env::var("DATABASE_URL")
            .ok()
            .and_then(|value| normalize_optional(&value));
        let admin_api_key = env::var("ADMIN_API_KEY")
            .ok()
            .and_then(|value| normalize_optional(&value));

        let login = LoginConfig {
            secret: env::var("LOGIN_JWT_SECRET").context("LOGIN_JWT_SECRET must be set")?,
            issuer: env::var("LOGIN_JWT_ISSUER").unwrap_or_else(|_| "storefront-admin".to_string()),
            leeway_seconds: env::var("LOGIN_JWT_LEEWAY_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u32>().ok())
                .unwrap_or(30),
        };

        let timeout_ms = env::var("VENDOR_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(30_000);
        let vendor = VendorConfig {
            base_url: env::var("VENDOR_BASE_URL").context("VENDOR_BASE_URL must be set")?,
            api_key: env::var("VENDOR_API_KEY").context("VENDOR_API_KEY must be set")?,
            secret_key: env::var("VENDOR_SECRET_KEY").context("VENDOR_SECRET_KEY must be set")?,
            branch_code: env::var("VENDOR_BRANCH").context("VENDOR_BRANCH must be set")?,
            channel: env::var("VENDOR_CHANNEL").unwrap_or_else(|_| "Online".to_string()),
            timeout: Duration::from_millis(timeout_ms.max(1_000)),
        };

        let storefront = StorefrontConfig {
            source_name: env::var("STOREFRONT_SOURCE").unwrap_or_else(|_| "Storefront App".to_string()),
            company_name: env::var("STOREFRONT_COMPANY").unwrap_or_else(|_| "Storefront".to_string()),
        };

        Ok(Self {
            host,
            port,
            database_url,
            admin_api_key,
            login,
            vendor,
            storefront,
        })
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_optional_drops_blank_values() {
        assert_eq!(normalize_optional("   "), None);
        assert_eq!(normalize_optional(" key "), Some("key".to_string()));
    }

    #[test]
    fn sale_url_has_single_slash() {
        let cfg = VendorConfig {
            base_url: "https://pos.example/v1/".into(),
            api_key: "k".into(),
            secret_key: "s".into(),
            branch_code: "B1".into(),
            channel: "Online".into(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(cfg.sale_url(), "https://pos.example/v1/sale/");
    }
}
