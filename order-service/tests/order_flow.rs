mod support;

use axum::http::StatusCode;
use chrono::Utc;
use common_money::Money;
use order_service::models::{Coupon, PointsSlab};
use order_service::store::Store;
use serde_json::{json, Value};
use support::{rejected, ScriptedPoster, TestApp};
use uuid::Uuid;

const PHONE: &str = "9876543210";

fn cart() -> Value {
    json!([
        {"shortName": "Masala Dosa", "skuCode": "DOSA", "quantity": 2, "unitPrice": 100},
        {"shortName": "Filter Coffee", "skuCode": "COFFEE", "quantity": 1, "unitPrice": 50,
         "options": [{"name": "Extra Decoction", "skuCode": "DEC", "amount": 20}]}
    ])
}

async fn seed_promotions(app: &TestApp) {
    app.store
        .insert_coupon(Coupon {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            discount: None,
            percent: Some(10.0),
            amount: None,
            min_order: Money::from_whole_units(200),
            max_value: Some(Money::from_whole_units(15)),
            expiry_date: None,
            enabled: true,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    for (lower, upper, points) in [(0, 200, 2), (200, 500, 5), (500, 1000, 12)] {
        app.store
            .insert_slab(PointsSlab {
                id: Uuid::new_v4(),
                lower: Money::from_whole_units(lower),
                upper: Money::from_whole_units(upper),
                loyalty_points: points,
            })
            .await
            .unwrap();
    }
}

fn order_body() -> Value {
    json!({
        "order": cart(),
        "phone": PHONE,
        "delivery": 40,
        "handling": 10,
        "loyalty": 50,
        "couponCode": "save10",
        "paymentMethod": "ONLINE",
        "TransactionID": "TXN-42",
        "notes": "Ring the bell"
    })
}

#[tokio::test]
async fn order_applies_coupon_and_loyalty_then_posts_sale() {
    let app = TestApp::new(ScriptedPoster::default(), None);
    app.seed_user(PHONE, 30).await;
    seed_promotions(&app).await;
    let token = app.token(PHONE);

    let (status, body) = app.send("POST", "/order/new", Some(&token), None, Some(order_body())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], true);
    assert_eq!(body["strategy"], "sale_level_negative");
    assert!(body.get("attempts").is_none());

    let summary = &body["summary"];
    assert_eq!(summary["subtotal"], 270.0);
    assert_eq!(summary["couponDiscount"], 15.0);
    assert_eq!(summary["loyaltyDiscount"], 30.0);
    assert_eq!(summary["delivery"], 40.0);
    assert_eq!(summary["packaging"], 10.0);
    assert_eq!(summary["amountPayable"], 275.0);
    assert_eq!(summary["mode"], "EXCLUDE");
    assert_eq!(body["earnedPoints"], 5);
    assert_eq!(body["loyaltyRedeemed"], 30);

    let user = app.store.find_user(PHONE).await.unwrap().unwrap();
    assert_eq!(user.loyalty_points, 5);
    assert_eq!(user.orders.len(), 1);

    let seen = app.poster.seen();
    assert_eq!(seen.len(), 1);
    let sale = &seen[0];
    assert_eq!(sale.branch_code, "BR-01");
    assert_eq!(sale.item_total_amount, Money::from_whole_units(270));
    assert_eq!(sale.items[1].option_amount, Money::from_whole_units(20));
    assert_eq!(sale.discounts.len(), 1);
    assert_eq!(sale.discounts[0].amount, Money::from_whole_units(-45));
    assert_eq!(sale.discounts[0].loyalty_points, Some(30));
    assert_eq!(sale.bill_amount, Money::from_whole_units(275));
    assert_eq!(sale.payments[0].mode, "Online");
    assert_eq!(sale.payments[0].reference.as_deref(), Some("TXN-42"));
    assert_eq!(sale.balance_amount, Money::ZERO);
    assert_eq!(sale.tags, vec!["Prepaid".to_string()]);
    let note = sale.note.as_deref().unwrap();
    assert!(note.contains("SAVE10"), "{note}");
    assert!(note.ends_with("Ring the bell"));
}

#[tokio::test]
async fn vendor_accepting_line_level_proration_reports_success_without_attempts() {
    let poster = ScriptedPoster::with(vec![rejected("negative discount"), rejected("rate mismatch")]);
    let app = TestApp::new(poster, None);
    app.seed_user(PHONE, 30).await;
    seed_promotions(&app).await;
    let token = app.token(PHONE);

    let (status, body) = app.send("POST", "/order/new", Some(&token), None, Some(order_body())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["strategy"], "line_level_prorated");
    assert!(body.get("attempts").is_none());

    let seen = app.poster.seen();
    assert_eq!(seen.len(), 3);
    let accepted = &seen[2];
    assert!(accepted.discounts.is_empty());
    let line_discounts: Money = accepted
        .items
        .iter()
        .flat_map(|i| i.discounts.iter())
        .map(|d| d.rate)
        .sum();
    assert_eq!(line_discounts, Money::from_whole_units(45));
    assert_eq!(accepted.bill_amount, Money::from_whole_units(275));
}

#[tokio::test]
async fn exhausted_ladder_returns_500_but_order_stays_persisted() {
    let poster = ScriptedPoster::with(vec![
        rejected("first"),
        rejected("second"),
        rejected("third"),
    ]);
    let app = TestApp::new(poster, None);
    app.seed_user(PHONE, 30).await;
    seed_promotions(&app).await;
    let token = app.token(PHONE);

    let (status, body) = app.send("POST", "/order/new", Some(&token), None, Some(order_body())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], false);
    assert_eq!(body["code"], "vendor_rejected");
    assert_eq!(body["error"]["message"], "third");
    let attempts = body["attempts"].as_array().unwrap();
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|a| a["ok"] == false));

    let order_id = body["orderId"].as_str().unwrap();
    let (status, fetched) = app
        .send("GET", &format!("/order/{order_id}"), Some(&token), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["amountPayable"], 275.0);

    let user = app.store.find_user(PHONE).await.unwrap().unwrap();
    assert_eq!(user.loyalty_points, 5);
}

#[tokio::test]
async fn zero_discount_posts_once_with_cash_on_delivery() {
    let poster = ScriptedPoster::with(vec![rejected("down")]);
    let app = TestApp::new(poster, None);
    app.seed_user(PHONE, 0).await;
    let token = app.token(PHONE);

    let body = json!({"order": cart(), "phone": PHONE, "paymentMethod": "COD", "orderMode": "pickup"});
    let (status, body) = app.send("POST", "/order/new", Some(&token), None, Some(body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["attempts"].as_array().unwrap().len(), 1);

    let seen = app.poster.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].payments[0].mode, "Cash");
    assert_eq!(seen[0].payments[0].amount, Money::ZERO);
    assert_eq!(seen[0].balance_amount, Money::from_whole_units(270));
    assert_eq!(seen[0].tags, vec!["Cash on Delivery".to_string()]);
}

#[tokio::test]
async fn unknown_coupon_still_places_order_with_reason() {
    let app = TestApp::new(ScriptedPoster::default(), None);
    app.seed_user(PHONE, 0).await;
    let token = app.token(PHONE);

    let body = json!({"order": cart(), "phone": PHONE, "couponCode": "NOPE"});
    let (status, body) = app.send("POST", "/order/new", Some(&token), None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["summary"]["couponDiscount"], 0.0);
    assert_eq!(body["summary"]["couponReason"], "coupon_not_found");
    assert_eq!(body["data"]["couponReason"], "coupon_not_found");
}

#[tokio::test]
async fn token_for_another_phone_is_forbidden() {
    let app = TestApp::new(ScriptedPoster::default(), None);
    app.seed_user(PHONE, 0).await;
    let token = app.token("9000000000");

    let (status, body) = app.send("POST", "/order/new", Some(&token), None, Some(order_body())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "phone_mismatch");
    assert!(app.poster.seen().is_empty());
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = TestApp::new(ScriptedPoster::default(), None);
    let (status, _) = app.send("POST", "/order/new", None, None, Some(order_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_user_is_client_error() {
    let app = TestApp::new(ScriptedPoster::default(), None);
    let token = app.token(PHONE);
    let (status, body) = app.send("POST", "/order/new", Some(&token), None, Some(order_body())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "user_not_found");
}

#[tokio::test]
async fn unrecognized_address_shape_is_rejected() {
    let app = TestApp::new(ScriptedPoster::default(), None);
    app.seed_user(PHONE, 0).await;
    let token = app.token(PHONE);
    let body = json!({"order": cart(), "phone": PHONE, "address": 42});
    let (status, body) = app.send("POST", "/order/new", Some(&token), None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_body");
}

#[tokio::test]
async fn absurd_quantities_are_rejected_without_side_effects() {
    let app = TestApp::new(ScriptedPoster::default(), None);
    app.seed_user(PHONE, 0).await;
    let token = app.token(PHONE);
    let line = json!({"shortName": "Dosa", "skuCode": "DOSA", "quantity": 1e18, "unitPrice": 100});
    let body = json!({"order": [line.clone(), line], "phone": PHONE});
    let (status, body) = app.send("POST", "/order/new", Some(&token), None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_body");

    let user = app.store.find_user(PHONE).await.unwrap().unwrap();
    assert!(user.orders.is_empty());
    assert!(app.poster.seen().is_empty());
}

#[tokio::test]
async fn order_history_is_owner_only() {
    let app = TestApp::new(ScriptedPoster::default(), None);
    app.seed_user(PHONE, 0).await;
    let token = app.token(PHONE);
    let body = json!({"order": cart(), "phone": PHONE});
    let (status, _) = app.send("POST", "/order/new", Some(&token), None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, history) = app
        .send("GET", &format!("/user/orders/{PHONE}"), Some(&token), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"].as_array().unwrap().len(), 1);
    assert_eq!(history["customer"]["firstName"], "Asha");

    let stranger = app.token("9000000000");
    let (status, _) = app
        .send("GET", &format!("/user/orders/{PHONE}"), Some(&stranger), None, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("GET", &format!("/user/loyalty/{PHONE}"), Some(&stranger), None, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "phone_mismatch");
}
