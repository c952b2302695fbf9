//! Coupon administration plus the public verify/status lookups.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use common_money::Money;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::app::{parse_body, AdminGuard, AppState};
use crate::coupons::{self, normalize_code, CouponRejection};
use crate::models::{parse_expiry, BoolInput, Coupon, CouponInput, DiscountInput};
use crate::store::{CouponKey, StoreError};

#[derive(Debug, Default, Deserialize)]
pub struct CouponListQuery {
    pub enabled: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub price: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub code: String,
    #[serde(default)]
    pub price: Money,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub enabled: BoolInput,
}

fn parse_flag(raw: &str) -> ApiResult<bool> {
    BoolInput::Text(raw.to_string())
        .as_bool()
        .ok_or_else(|| ApiError::bad_request("invalid_enabled", "enabled must be true or false"))
}

/// Build a stored coupon from admin input. A numeric `discount` is a flat amount.
fn coupon_from_input(input: CouponInput, id: Uuid, created_at: DateTime<Utc>) -> ApiResult<Coupon> {
    let code = normalize_code(&input.code);
    if code.is_empty() {
        return Err(ApiError::bad_request("missing_code", "Coupon code is required"));
    }

    let (discount, mut amount) = match input.discount {
        Some(DiscountInput::Amount(value)) => {
            let flat = Money::from_major(value)
                .map_err(|e| ApiError::bad_request("invalid_discount", e.to_string()))?;
            (None, Some(flat))
        }
        Some(DiscountInput::Text(text)) => {
            let text = text.trim().to_string();
            ((!text.is_empty()).then_some(text), None)
        }
        None => (None, None),
    };
    if input.amount.is_some() {
        amount = input.amount;
    }
    if amount.is_some_and(|a| a < Money::ZERO) || input.min_order < Money::ZERO {
        return Err(ApiError::bad_request("invalid_amount", "Amounts cannot be negative"));
    }
    if let Some(percent) = input.percent {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(ApiError::bad_request("invalid_percent", "percent must be between 0 and 100"));
        }
    }

    let expiry_date = match input.expiry_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_expiry(raw).ok_or_else(|| {
            ApiError::bad_request("invalid_expiry", "expiryDate must be an RFC 3339 timestamp or YYYY-MM-DD")
        })?),
        None => None,
    };
    let enabled = match input.enabled {
        Some(flag) => flag
            .as_bool()
            .ok_or_else(|| ApiError::bad_request("invalid_enabled", "enabled must be true or false"))?,
        None => true,
    };

    Ok(Coupon {
        id,
        code,
        discount,
        percent: input.percent,
        amount,
        min_order: input.min_order,
        max_value: input.max_value,
        expiry_date,
        enabled,
        created_at,
    })
}

fn code_taken(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(_) => ApiError::conflict("coupon_code_taken", "Coupon code already exists"),
        other => other.into(),
    }
}

fn coupon_not_found() -> ApiError {
    ApiError::not_found("coupon_not_found", "Coupon not found")
}

/// `GET /coupon?enabled=`
pub async fn list_coupons(
    State(state): State<AppState>,
    Query(query): Query<CouponListQuery>,
) -> ApiResult<Json<Value>> {
    let enabled = match query.enabled.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_flag(raw)?),
        None => None,
    };
    let coupons = state.store.list_coupons(enabled).await?;
    Ok(Json(json!({ "status": true, "data": coupons })))
}

/// `POST /coupon`
pub async fn create_coupon(
    State(state): State<AppState>,
    _admin: AdminGuard,
    payload: Result<Json<CouponInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let input = parse_body(payload)?;
    let coupon = coupon_from_input(input, Uuid::new_v4(), Utc::now())?;
    if state.store.find_coupon(&coupon.code).await?.is_some() {
        return Err(ApiError::conflict("coupon_code_taken", "Coupon code already exists"));
    }
    let coupon = state.store.insert_coupon(coupon).await.map_err(code_taken)?;
    info!(code = %coupon.code, "coupon created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": true, "message": "Coupon created successfully", "data": coupon })),
    ))
}

/// `PUT /coupon/:id`: full replacement; id and creation time are kept.
pub async fn update_coupon(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Path(id): Path<Uuid>,
    payload: Result<Json<CouponInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let input = parse_body(payload)?;
    let existing = state.store.get_coupon(id).await?.ok_or_else(coupon_not_found)?;
    let coupon = coupon_from_input(input, id, existing.created_at)?;
    let updated = state
        .store
        .update_coupon(coupon)
        .await
        .map_err(code_taken)?
        .ok_or_else(coupon_not_found)?;
    Ok(Json(json!({ "status": true, "message": "Coupon updated successfully", "data": updated })))
}

/// `DELETE /coupon/:id`
pub async fn delete_coupon(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    if !state.store.delete_coupon(id).await? {
        return Err(coupon_not_found());
    }
    info!(%id, "coupon deleted");
    Ok(Json(json!({ "status": true, "message": "Coupon deleted successfully" })))
}

/// `POST /coupon/verify`: run the checkout rules against `price`.
pub async fn verify_coupon(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let req = parse_body(payload)?;
    let outcome = coupons::resolve(state.store.as_ref(), &req.code, req.price, Utc::now()).await?;
    match outcome.reason {
        None => Ok(Json(json!({
            "status": true,
            "message": "Coupon verified successfully",
            "data": outcome.coupon,
            "discount": outcome.amount,
        }))),
        Some(CouponRejection::CouponNotFound) => Err(coupon_not_found()),
        Some(reason) => Err(ApiError::bad_request(reason.as_str(), reason.message())),
    }
}

/// `GET /coupon/status/:code?price=`
pub async fn get_coupon_status(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<PriceQuery>,
) -> ApiResult<Json<Value>> {
    let price = match query.price.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<Money>()
                .map_err(|e| ApiError::bad_request("invalid_price", e.to_string()))?,
        ),
        None => None,
    };
    let coupon = state
        .store
        .find_coupon(&normalize_code(&code))
        .await?
        .ok_or_else(coupon_not_found)?;
    let status = coupons::status(&coupon, price, Utc::now());
    Ok(Json(json!({ "status": true, "data": status })))
}

async fn set_enabled(state: &AppState, key: CouponKey, enabled: Option<bool>) -> ApiResult<Json<Value>> {
    let coupon = state
        .store
        .set_coupon_enabled(key, enabled)
        .await?
        .ok_or_else(coupon_not_found)?;
    info!(code = %coupon.code, enabled = coupon.enabled, "coupon status changed");
    Ok(Json(json!({ "status": true, "message": "Coupon status updated", "data": coupon })))
}

fn requested_flag(payload: Result<Json<StatusRequest>, JsonRejection>) -> ApiResult<bool> {
    parse_body(payload)?
        .enabled
        .as_bool()
        .ok_or_else(|| ApiError::bad_request("invalid_enabled", "enabled must be true or false"))
}

/// `PUT /coupon/:id/status`
pub async fn set_coupon_status(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Path(id): Path<Uuid>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let enabled = requested_flag(payload)?;
    set_enabled(&state, CouponKey::Id(id), Some(enabled)).await
}

/// `PUT /coupon/code/:code/status`
pub async fn set_coupon_status_by_code(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Path(code): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let enabled = requested_flag(payload)?;
    set_enabled(&state, CouponKey::Code(normalize_code(&code)), Some(enabled)).await
}

/// `POST /coupon/:id/toggle`
pub async fn toggle_coupon(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    set_enabled(&state, CouponKey::Id(id), None).await
}
