use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use common_auth::{normalize_phone, AuthContext, PhoneOwner};
use common_http_errors::{ApiError, ApiResult};
use common_money::Money;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::{ensure_owner, parse_body, AppState};
use crate::config::AppConfig;
use crate::coupons::{self, normalize_code, CouponOutcome};
use crate::loyalty::{redeem, SlabTable};
use crate::models::{AddressInput, NewOrder, Order, User};
use crate::pricing::{build_charges, build_items, check_lines, reconcile_subtotal, Bill, PricedLines};
use crate::vendor::normalize::{delivery_address, delivery_mode};
use crate::vendor::payload::{
    Customer, DeliveryInfo, SaleItem, SalePayload, SalePayment, SaleStatus, SourceInfo,
};
use crate::vendor::{post_with_ladder, DiscountPlan, LadderOutcome};

/// `POST /order/new`: price the cart, persist the order and ledger, then post
/// the sale to the POS vendor.
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let body = parse_body(payload)?;
    let phone = normalize_phone(&body.phone);
    if phone.is_empty() {
        return Err(ApiError::bad_request("missing_phone", "Phone number is required"));
    }
    ensure_owner(&auth, &phone)?;
    if body.order.is_empty() {
        return Err(ApiError::bad_request("empty_order", "Order must contain at least one item"));
    }
    check_lines(&body.order).map_err(|err| ApiError::bad_request("invalid_body", err.to_string()))?;

    let user = state
        .store
        .find_user(&phone)
        .await?
        .ok_or_else(|| ApiError::bad_request("user_not_found", "User not found"))?;

    let slabs = SlabTable::new(state.store.point_slabs().await?).map_err(|err| {
        error!(error = %err, "loyalty slab table is inconsistent");
        ApiError::internal(err)
    })?;

    let now = Utc::now();
    let priced = build_items(&body.order, body.price);
    let subtotal = reconcile_subtotal(priced.total, body.price);

    let coupon_code = body
        .coupon_code
        .as_deref()
        .map(normalize_code)
        .filter(|code| !code.is_empty());
    let coupon = match coupon_code.as_deref() {
        Some(code) => coupons::resolve(state.store.as_ref(), code, subtotal, now).await?,
        None => CouponOutcome { amount: Money::ZERO, reason: None, coupon: None },
    };
    if let Some(reason) = coupon.reason {
        info!(code = ?coupon_code, reason = reason.as_str(), "coupon contributed no discount");
    }

    let redeemed = redeem(body.loyalty, user.loyalty_points);
    let loyalty_discount = Money::from_whole_units(redeemed);
    let bill = Bill::compute(subtotal, coupon.amount, loyalty_discount, body.delivery, body.handling);
    let earned = slabs.award((subtotal - coupon.amount).non_negative());
    info!(
        %phone,
        subtotal = %bill.subtotal,
        coupon = %bill.coupon_discount,
        loyalty = %bill.loyalty_discount,
        payable = %bill.amount_payable,
        mode = priced.mode.as_str(),
        earned,
        redeemed,
        "priced order"
    );

    let order = Order {
        id: Uuid::new_v4(),
        phone: phone.clone(),
        customer_name: user.display_name(),
        lines: serde_json::to_value(&body.order).map_err(ApiError::internal)?,
        subtotal: bill.subtotal,
        coupon_code: coupon_code.clone(),
        coupon_discount: bill.coupon_discount,
        coupon_reason: coupon.reason.map(|r| r.as_str().to_string()),
        loyalty_discount: bill.loyalty_discount,
        delivery: bill.delivery,
        packaging: bill.packaging,
        amount_payable: bill.amount_payable,
        payment_method: payment_method_label(&body),
        payment_status: body.payment_status.clone(),
        order_mode: body.order_mode.clone(),
        transaction_id: body.transaction_id.clone(),
        notes: body.notes.clone(),
        breakdown_mode: priced.mode,
        earned_points: earned,
        redeemed_points: redeemed,
        order_date: body.client_placed_at.unwrap_or(now),
        client_tz_offset_minutes: body.client_tz_offset_minutes,
        created_at: now,
    };
    let order = state.store.create_order(order).await?;

    state
        .store
        .apply_order_ledger(&phone, earned - redeemed, order.id)
        .await?
        .ok_or_else(|| ApiError::bad_request("user_not_found", "User not found"))?;

    let base = build_sale_payload(&state.config, &order, &user, &body, &priced, &bill, now);
    let discount = DiscountPlan {
        total: bill.vendor_discount(),
        coupon_code: coupon_code.filter(|_| coupon.amount.is_positive()),
        coupon_amount: coupon.amount,
        loyalty_amount: loyalty_discount,
        loyalty_points: redeemed,
    };

    match post_with_ladder(state.vendor.as_ref(), &base, &discount, &state.config.vendor).await {
        LadderOutcome::Accepted { strategy, response, .. } => {
            let summary = json!({
                "subtotal": bill.subtotal,
                "couponDiscount": bill.coupon_discount,
                "couponReason": coupon.reason.map(|r| r.as_str()),
                "loyaltyDiscount": bill.loyalty_discount,
                "delivery": bill.delivery,
                "packaging": bill.packaging,
                "amountPayable": bill.amount_payable,
                "mode": priced.mode,
                "payment": if body.is_cash_on_delivery() { "COD" } else { "PREPAID" },
            });
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "status": true,
                    "message": "Sale created successfully",
                    "data": order,
                    "earnedPoints": earned,
                    "loyaltyRedeemed": redeemed,
                    "strategy": strategy,
                    "vendorResponse": response,
                    "summary": summary,
                })),
            ))
        }
        LadderOutcome::Exhausted { attempts, last_error } => {
            warn!(order_id = %order.id, attempts = attempts.len(), "vendor rejected every discount encoding");
            let mut details = Map::new();
            details.insert("orderId".into(), json!(order.id));
            details.insert("attempts".into(), serde_json::to_value(&attempts).map_err(ApiError::internal)?);
            Err(ApiError::Upstream {
                code: "vendor_rejected",
                message: "Error creating sale".into(),
                error: Some(last_error),
                details,
            })
        }
    }
}

fn payment_method_label(body: &NewOrder) -> String {
    body.payment_method
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| "ONLINE".into())
}

/// Sale document before any discount encoding is applied. Header amounts are
/// left for the normalizer to derive.
fn build_sale_payload(
    config: &AppConfig,
    order: &Order,
    user: &User,
    body: &NewOrder,
    priced: &PricedLines,
    bill: &Bill,
    now: DateTime<Utc>,
) -> SalePayload {
    let charges = build_charges(bill.delivery, bill.packaging);
    let name = user.display_name();
    let email = user.email.clone().filter(|e| !e.trim().is_empty());

    let address = body
        .address
        .clone()
        .or_else(|| user.address.clone().map(AddressInput::Text))
        .map(|addr| delivery_address(&addr));

    let cod = body.is_cash_on_delivery();
    let payments = if cod {
        vec![SalePayment {
            mode: "Cash".into(),
            amount: Money::ZERO,
            reference: None,
            note: Some("Cash on Delivery".into()),
            posted_date: None,
        }]
    } else {
        vec![SalePayment {
            mode: "Online".into(),
            amount: bill.amount_payable,
            reference: body.transaction_id.clone(),
            note: Some("Prepaid online".into()),
            posted_date: Some(now),
        }]
    };

    let mut note = String::new();
    if let (Some(code), true) = (order.coupon_code.as_deref(), order.coupon_discount.is_positive()) {
        note.push_str(&format!("Coupon used in app: {code}. "));
    }
    if let Some(notes) = body.notes.as_deref() {
        note.push_str(notes.trim());
    }
    let note = note.trim().to_string();

    SalePayload {
        branch_code: config.vendor.branch_code.clone(),
        status: SaleStatus::Closed,
        channel: config.vendor.channel.clone(),
        source_info: Some(SourceInfo {
            source: config.storefront.source_name.clone(),
            company_name: config.storefront.company_name.clone(),
            order_transaction_id: order.id.to_string(),
            is_ecom_order: true,
            is_editable: false,
            verify_coupons: false,
        }),
        customer: Some(Customer {
            name: name.clone(),
            email: email.clone(),
            phone_number: order.phone.clone(),
        }),
        delivery: Some(DeliveryInfo {
            name,
            email,
            phone_number: order.phone.clone(),
            mode: delivery_mode(body.order_mode.as_deref()),
            address,
        }),
        items: priced.items.iter().map(SaleItem::from).collect(),
        item_total_amount: Money::ZERO,
        direct_charge_amount: Money::ZERO,
        charge_amount: Money::ZERO,
        discount_amount: Money::ZERO,
        tax_amount_included: Money::ZERO,
        tax_amount_excluded: Money::ZERO,
        bill_amount: Money::ZERO,
        round_off_amount: Money::ZERO,
        bill_rounded_amount: Money::ZERO,
        tip_amount: Money::ZERO,
        total_amount: Money::ZERO,
        note: (!note.is_empty()).then_some(note),
        charges: charges.charges,
        discounts: Vec::new(),
        payments,
        balance_amount: Money::ZERO,
        tags: vec![if cod { "Cash on Delivery" } else { "Prepaid" }.to_string()],
    }
}

/// `GET /order/:id`
pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let order = state
        .store
        .find_order(id)
        .await?
        .ok_or_else(|| ApiError::not_found("order_not_found", "Order not found"))?;
    ensure_owner(&auth, &order.phone)?;
    Ok(Json(json!({
        "status": true,
        "message": "Order fetched successfully",
        "data": order,
    })))
}

/// `GET /user/orders/:phone`
pub async fn list_user_orders(
    State(state): State<AppState>,
    PhoneOwner(phone): PhoneOwner,
) -> ApiResult<Json<Value>> {
    let user = state
        .store
        .find_user(&phone)
        .await?
        .ok_or_else(|| ApiError::bad_request("user_not_found", "User not found"))?;
    let orders = state.store.orders_by_ids(&user.orders).await?;
    Ok(Json(json!({
        "status": true,
        "message": "Orders fetched successfully",
        "customer": {
            "firstName": user.first_name,
            "lastName": user.last_name,
            "phone": user.phone,
        },
        "data": orders,
    })))
}
