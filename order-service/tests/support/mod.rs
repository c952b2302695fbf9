#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common_auth::{JwtConfig, JwtVerifier};
use order_service::config::{AppConfig, LoginConfig, StorefrontConfig, VendorConfig};
use order_service::models::NewUser;
use order_service::store::{MemoryStore, Store};
use order_service::vendor::payload::SalePayload;
use order_service::vendor::{SalePoster, VendorError};
use order_service::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SECRET: &str = "test-login-secret";
pub const ISSUER: &str = "storefront-admin";
pub const ADMIN_KEY: &str = "admin-secret";

/// Vendor stand-in that replays scripted answers and records every payload.
#[derive(Default)]
pub struct ScriptedPoster {
    answers: Mutex<VecDeque<Result<Value, VendorError>>>,
    seen: Mutex<Vec<SalePayload>>,
}

impl ScriptedPoster {
    pub fn with(answers: Vec<Result<Value, VendorError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<SalePayload> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SalePoster for ScriptedPoster {
    async fn post_sale(&self, payload: &SalePayload) -> Result<Value, VendorError> {
        self.seen.lock().unwrap().push(payload.clone());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"status": "created", "saleId": "S-1"})))
    }
}

pub fn rejected(reason: &str) -> Result<Value, VendorError> {
    Err(VendorError::Rejected {
        status: 400,
        body: json!({"message": reason}),
    })
}

pub fn config(admin_key: Option<&str>) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: None,
        admin_api_key: admin_key.map(str::to_string),
        login: LoginConfig {
            secret: SECRET.into(),
            issuer: ISSUER.into(),
            leeway_seconds: 30,
        },
        vendor: VendorConfig {
            base_url: "http://vendor.invalid".into(),
            api_key: "vendor-key".into(),
            secret_key: "vendor-secret".into(),
            branch_code: "BR-01".into(),
            channel: "Online".into(),
            timeout: Duration::from_secs(5),
        },
        storefront: StorefrontConfig {
            source_name: "Storefront App".into(),
            company_name: "Storefront".into(),
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub poster: Arc<ScriptedPoster>,
    pub verifier: Arc<JwtVerifier>,
}

impl TestApp {
    pub fn new(poster: ScriptedPoster, admin_key: Option<&str>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let poster = Arc::new(poster);
        let verifier = Arc::new(JwtVerifier::new(JwtConfig::new(SECRET, ISSUER)));
        let state = AppState {
            store: store.clone(),
            vendor: poster.clone(),
            jwt_verifier: verifier.clone(),
            config: Arc::new(config(admin_key)),
        };
        Self {
            router: build_router(state),
            store,
            poster,
            verifier,
        }
    }

    pub fn token(&self, phone: &str) -> String {
        self.verifier.issue(phone).unwrap().token
    }

    pub async fn seed_user(&self, phone: &str, points: i64) {
        self.store
            .create_user(NewUser {
                first_name: "Asha".into(),
                last_name: "Rao".into(),
                phone: phone.into(),
                email: Some("asha@example.com".into()),
                address: None,
            })
            .await
            .unwrap();
        if points != 0 {
            self.store.adjust_loyalty(phone, points).await.unwrap();
        }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        admin_key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        if let Some(key) = admin_key {
            builder = builder.header("x-admin-key", key);
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}
