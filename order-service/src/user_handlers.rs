use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use common_auth::{normalize_phone, PhoneOwner};
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::app::{parse_body, AdminGuard, AppState};
use crate::models::NewUser;
use crate::store::StoreError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct LoyaltyCredit {
    pub phone: String,
    pub points: i64,
}

fn user_not_found() -> ApiError {
    ApiError::not_found("user_not_found", "User not found")
}

/// `POST /user/signup`
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut new = parse_body(payload)?;
    new.phone = normalize_phone(&new.phone);
    new.first_name = new.first_name.trim().to_string();
    new.last_name = new.last_name.trim().to_string();
    if new.phone.is_empty() {
        return Err(ApiError::bad_request("missing_phone", "Phone number is required"));
    }
    if new.first_name.is_empty() {
        return Err(ApiError::bad_request("missing_name", "First name is required"));
    }

    let user = state.store.create_user(new).await.map_err(|err| match err {
        StoreError::Conflict(_) => ApiError::conflict("user_exists", "User already exists"),
        other => other.into(),
    })?;
    info!(phone = %user.phone, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": true, "message": "User created successfully", "data": user })),
    ))
}

/// `POST /user/auth`: issue a login token for a registered phone.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let req = parse_body(payload)?;
    let phone = normalize_phone(&req.phone);
    let user = state.store.find_user(&phone).await?.ok_or_else(user_not_found)?;
    let issued = state.jwt_verifier.issue(&user.phone).map_err(|err| {
        error!(error = %err, "failed to sign login token");
        ApiError::internal(err)
    })?;
    Ok(Json(json!({
        "status": true,
        "message": "Login successful",
        "token": issued.token,
        "expiresAt": issued.expires_at,
        "data": user,
    })))
}

/// `GET /user/:phone`
pub async fn get_user(
    State(state): State<AppState>,
    PhoneOwner(phone): PhoneOwner,
) -> ApiResult<Json<Value>> {
    let user = state.store.find_user(&phone).await?.ok_or_else(user_not_found)?;
    Ok(Json(json!({ "status": true, "data": user })))
}

/// `GET /user/loyalty/:phone`
pub async fn get_loyalty(
    State(state): State<AppState>,
    PhoneOwner(phone): PhoneOwner,
) -> ApiResult<Json<Value>> {
    let user = state.store.find_user(&phone).await?.ok_or_else(user_not_found)?;
    Ok(Json(json!({
        "status": true,
        "data": { "phone": user.phone, "loyaltyPoints": user.loyalty_points },
    })))
}

/// `POST /user/loyalty`: admin credit or debit, floored at zero.
pub async fn adjust_loyalty(
    State(state): State<AppState>,
    _admin: AdminGuard,
    payload: Result<Json<LoyaltyCredit>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let req = parse_body(payload)?;
    let phone = normalize_phone(&req.phone);
    let user = state
        .store
        .adjust_loyalty(&phone, req.points)
        .await?
        .ok_or_else(user_not_found)?;
    info!(%phone, delta = req.points, balance = user.loyalty_points, "loyalty balance adjusted");
    Ok(Json(json!({
        "status": true,
        "message": "Loyalty points updated",
        "data": { "phone": user.phone, "loyaltyPoints": user.loyalty_points },
    })))
}
