use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header::{ACCEPT, CONTENT_TYPE}, HeaderName, HeaderValue, Method, StatusCode};
use axum::{middleware, routing::{delete, get, post, put}, Json, Router};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::error;

use common_auth::{AuthContext, JwtVerifier};
use common_http_errors::{ApiError, ApiResult};

use crate::config::AppConfig;
use crate::coupon_handlers::{
    create_coupon, delete_coupon, get_coupon_status, list_coupons, set_coupon_status, set_coupon_status_by_code,
    toggle_coupon, update_coupon, verify_coupon,
};
use crate::order_handlers::{create_order, get_order, list_user_orders};
use crate::points_handlers::{create_slab, delete_slab, list_slabs};
use crate::store::{Store, StoreError};
use crate::user_handlers::{adjust_loyalty, get_loyalty, get_user, login, signup};
use crate::vendor::SalePoster;

pub static ORDER_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let v = IntCounterVec::new(
        Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
        &["service", "code", "status"],
    ).expect("valid http_errors_total metric");
    ORDER_REGISTRY.register(Box::new(v.clone())).ok();
    v
});

pub async fn http_error_metrics(req: axum::http::Request<axum::body::Body>, next: axum::middleware::Next) -> axum::response::Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp.headers().get("X-Error-Code").and_then(|v| v.to_str().ok()).unwrap_or("unknown");
        HTTP_ERRORS_TOTAL.with_label_values(&["order-service", code, status.as_str()]).inc();
    }
    resp
}

pub async fn health() -> &'static str { "ok" }

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub vendor: Arc<dyn SalePoster>,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub config: Arc<AppConfig>,
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self { state.jwt_verifier.clone() }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => ApiError::conflict("conflict", message),
            StoreError::Backend(err) => {
                error!(error = ?err, "store operation failed");
                ApiError::internal(err)
            }
        }
    }
}

/// Turn axum's JSON rejection into the service's 400 envelope.
pub(crate) fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request("invalid_body", rejection.body_text()))
}

/// For phones that come from a body or a stored record rather than the path.
pub(crate) fn ensure_owner(auth: &AuthContext, phone: &str) -> ApiResult<()> {
    auth.authorize(phone)
        .map_err(|_| ApiError::Forbidden { code: "phone_mismatch" })
}

/// Present on admin routes. When `ADMIN_API_KEY` is configured the request
/// must carry the same value in `x-admin-key`.
pub struct AdminGuard;

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_api_key.as_deref() else {
            return Ok(AdminGuard);
        };
        let provided = parts.headers.get("x-admin-key").and_then(|v| v.to_str().ok()).map(str::trim);
        if provided == Some(expected) {
            Ok(AdminGuard)
        } else {
            Err(ApiError::Unauthorized { code: "admin_key_required" })
        }
    }
}

async fn metrics(State(_state): State<AppState>) -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let families = ORDER_REGISTRY.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}"));
    }
    (StatusCode::OK, String::from_utf8_lossy(&buf).to_string())
}

pub fn build_router(state: AppState) -> Router {
    Lazy::force(&HTTP_ERRORS_TOTAL);
    crate::vendor::ladder::register_metrics();

    let allowed_origins = [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://localhost:5173",
    ];
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins.iter().filter_map(|o| o.parse::<HeaderValue>().ok()).collect::<Vec<_>>(),
        ))
        .allow_methods([
            Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS,
        ])
        .allow_headers([
            ACCEPT, CONTENT_TYPE, HeaderName::from_static("authorization"), HeaderName::from_static("x-admin-key"),
        ]);

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        // Orders
        .route("/order/new", post(create_order))
        .route("/order/:id", get(get_order))
        // Users
        .route("/user/signup", post(signup))
        .route("/user/auth", post(login))
        .route("/user/loyalty", post(adjust_loyalty))
        .route("/user/loyalty/:phone", get(get_loyalty))
        .route("/user/orders/:phone", get(list_user_orders))
        .route("/user/:phone", get(get_user))
        // Coupons
        .route("/coupon", get(list_coupons).post(create_coupon))
        .route("/coupon/verify", post(verify_coupon))
        .route("/coupon/status/:code", get(get_coupon_status))
        .route("/coupon/code/:code/status", put(set_coupon_status_by_code))
        .route("/coupon/:id", put(update_coupon).delete(delete_coupon))
        .route("/coupon/:id/status", put(set_coupon_status))
        .route("/coupon/:id/toggle", post(toggle_coupon))
        // Loyalty slabs
        .route("/points", get(list_slabs).post(create_slab))
        .route("/points/:id", delete(delete_slab))
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(http_error_metrics))
}
