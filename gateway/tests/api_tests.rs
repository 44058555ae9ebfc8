//! HTTP-level tests over the full engine wiring
//!
//! Mounts the real routes on in-memory stores and drives the card, listing,
//! and referral flows through the JSON surface.

use actix_web::{http::StatusCode, test, web, App};
use card_ledger::ManualClock;
use chrono::{Duration, Utc};
use gateway::{handlers, AppState, Config};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;

/// Monetary fields serialize as decimal strings; compare them as numbers
fn money(value: &Value) -> Decimal {
    value.as_str().expect("decimal string").parse().unwrap()
}

fn build_state() -> web::Data<AppState> {
    let clock = ManualClock::new(Utc::now());
    let (state, _event_rx) = AppState::build(Config::default(), Arc::new(clock));
    web::Data::new(state)
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .configure(handlers::routes),
        )
        .await
    };
}

fn card_payload(code: &str) -> Value {
    json!({
        "brand": "Amazon",
        "denomination": 100,
        "card_code": code,
        "expiration_date": Utc::now() + Duration::days(365),
    })
}

#[actix_web::test]
async fn requests_without_an_acting_user_are_unauthorized() {
    let state = build_state();
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/cards")
        .set_json(card_payload("NO-AUTH"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
}

#[actix_web::test]
async fn card_upload_listing_and_duplicate_codes() {
    let state = build_state();
    let app = test_app!(state);

    // Upload
    let req = test::TestRequest::post()
        .uri("/api/cards")
        .insert_header(("X-User-Id", "seller"))
        .set_json(card_payload("API-CARD"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    let card_id = body["card"]["id"].as_str().unwrap().to_string();

    // Duplicate code, even from another user, conflicts
    let req = test::TestRequest::post()
        .uri("/api/cards")
        .insert_header(("X-User-Id", "other"))
        .set_json(card_payload("API-CARD"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Owner's portfolio shows the card
    let req = test::TestRequest::get()
        .uri("/api/cards")
        .insert_header(("X-User-Id", "seller"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["stats"]["active"], json!(1));

    // A stranger cannot fetch it
    let req = test::TestRequest::get()
        .uri(&format!("/api/cards/{card_id}"))
        .insert_header(("X-User-Id", "stranger"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn marketplace_flow_over_http() {
    let state = build_state();
    let app = test_app!(state);

    // Seller registers and lists a card
    let req = test::TestRequest::post()
        .uri("/api/cards")
        .insert_header(("X-User-Id", "seller"))
        .set_json(card_payload("FLOW-CARD"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let card_id = body["card"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/marketplace/listings")
        .insert_header(("X-User-Id", "seller"))
        .set_json(json!({
            "card_id": card_id,
            "title": "Amazon $100",
            "asking_price": 90,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let listing_id = body["listing"]["id"].as_str().unwrap().to_string();
    assert_eq!(money(&body["listing"]["discount"]), dec!(10));

    // Self-purchase is rejected
    let req = test::TestRequest::post()
        .uri(&format!("/api/marketplace/listings/{listing_id}/purchase"))
        .insert_header(("X-User-Id", "seller"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Buyer purchases; escrow holds
    let req = test::TestRequest::post()
        .uri(&format!("/api/marketplace/listings/{listing_id}/purchase"))
        .insert_header(("X-User-Id", "buyer"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(money(&body["transaction"]["fee"]), dec!(2.25));

    // A second buyer conflicts
    let req = test::TestRequest::post()
        .uri(&format!("/api/marketplace/listings/{listing_id}/purchase"))
        .insert_header(("X-User-Id", "late-buyer"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Only the buyer may confirm
    let req = test::TestRequest::post()
        .uri(&format!("/api/marketplace/listings/{listing_id}/confirm"))
        .insert_header(("X-User-Id", "stranger"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri(&format!("/api/marketplace/listings/{listing_id}/confirm"))
        .insert_header(("X-User-Id", "buyer"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Both parties rate; a repeat rating conflicts
    for (user, score) in [("buyer", 5), ("seller", 4)] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/marketplace/listings/{listing_id}/rate"))
            .insert_header(("X-User-Id", user))
            .set_json(json!({"rating": score}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
    let req = test::TestRequest::post()
        .uri(&format!("/api/marketplace/listings/{listing_id}/rate"))
        .insert_header(("X-User-Id", "buyer"))
        .set_json(json!({"rating": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Buyer sees the purchase
    let req = test::TestRequest::get()
        .uri("/api/marketplace/my-purchases")
        .insert_header(("X-User-Id", "buyer"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["count"], json!(1));
}

#[actix_web::test]
async fn referral_flow_over_http() {
    let state = build_state();
    let app = test_app!(state);

    // Referrer fetches a code
    let req = test::TestRequest::get()
        .uri("/api/referral/code")
        .insert_header(("X-User-Id", "anna"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let code = body["referral_code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);

    // A new user registers with it
    let req = test::TestRequest::post()
        .uri("/api/referral/register")
        .insert_header(("X-User-Id", "newbie"))
        .set_json(json!({"code": code}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Registering twice conflicts
    let req = test::TestRequest::post()
        .uri("/api/referral/register")
        .insert_header(("X-User-Id", "newbie"))
        .set_json(json!({"code": code}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Unknown codes are not found
    let req = test::TestRequest::post()
        .uri("/api/referral/register")
        .insert_header(("X-User-Id", "someone"))
        .set_json(json!({"code": "WRONG123"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Bonus claims once
    let req = test::TestRequest::post()
        .uri("/api/referral/claim-bonus")
        .insert_header(("X-User-Id", "newbie"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(money(&body["bonus_amount"]), dec!(10));

    let req = test::TestRequest::post()
        .uri("/api/referral/claim-bonus")
        .insert_header(("X-User-Id", "newbie"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Referrer stats reflect the row; nothing earned yet
    let req = test::TestRequest::get()
        .uri("/api/referral/stats")
        .insert_header(("X-User-Id", "anna"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["stats"]["total_referrals"], json!(1));
    assert_eq!(body["tier"], json!("bronze"));

    // Withdrawing with no earnings fails
    let req = test::TestRequest::post()
        .uri("/api/referral/withdraw")
        .insert_header(("X-User-Id", "anna"))
        .set_json(json!({"amount": 5}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
