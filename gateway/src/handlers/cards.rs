//! Card endpoints

use crate::auth::AuthedUser;
use crate::error::Result;
use crate::handlers::{parse_brand, parse_card_status, parse_currency, parse_source};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use card_ledger::{NewCard, VerificationMethod};
use chrono::{DateTime, Utc};
use pricing_engine::MarketData;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub brand: String,
    pub denomination: Decimal,
    pub currency: Option<String>,
    pub card_code: String,
    pub expiration_date: DateTime<Utc>,
    pub source: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_card(
    state: web::Data<AppState>,
    user: AuthedUser,
    req: web::Json<CreateCardRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let card = state.ledger.create_card(NewCard {
        owner: user.0,
        brand: parse_brand(&req.brand)?,
        denomination: req.denomination,
        currency: parse_currency(req.currency.as_deref())?,
        code: req.card_code,
        expiration_date: req.expiration_date,
        source: parse_source(req.source.as_deref()),
        notes: req.notes,
    })?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Gift card uploaded successfully",
        "card": card,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CardListQuery {
    pub status: Option<String>,
    pub brand: Option<String>,
}

pub async fn get_cards(
    state: web::Data<AppState>,
    user: AuthedUser,
    query: web::Query<CardListQuery>,
) -> Result<HttpResponse> {
    let status = query.status.as_deref().map(parse_card_status).transpose()?;
    let brand = query.brand.as_deref().map(parse_brand).transpose()?;
    let (cards, stats) = state.ledger.list_cards(&user.0, status, brand);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": cards.len(),
        "stats": stats,
        "cards": cards,
    })))
}

pub async fn get_card(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let card = state.ledger.get_card(path.into_inner(), &user.0)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "card": card })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCardRequest {
    pub notes: Option<String>,
    pub status: Option<String>,
}

pub async fn update_card(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    req: web::Json<UpdateCardRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let status = req.status.as_deref().map(parse_card_status).transpose()?;
    let card = state
        .ledger
        .update_card(path.into_inner(), &user.0, req.notes, status)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Card updated successfully",
        "card": card,
    })))
}

pub async fn delete_card(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    state.ledger.delete_card(path.into_inner(), &user.0)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Card deleted successfully",
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyCardRequest {
    pub verification_method: Option<String>,
}

pub async fn verify_card(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    req: web::Json<VerifyCardRequest>,
) -> Result<HttpResponse> {
    let method = match req.verification_method.as_deref() {
        Some("api") => VerificationMethod::Api,
        Some("blockchain") => VerificationMethod::Blockchain,
        _ => VerificationMethod::Manual,
    };
    let card = state.ledger.verify_card(path.into_inner(), &user.0, method)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Card verified successfully",
        "card": card,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DisputeRequest {
    pub reason: String,
}

pub async fn report_dispute(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    req: web::Json<DisputeRequest>,
) -> Result<HttpResponse> {
    let card = state
        .ledger
        .report_dispute(path.into_inner(), &user.0, &req.reason)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Dispute reported successfully",
        "card": card,
    })))
}

pub async fn conversion_history(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let (history, total_converted, remaining) =
        state.ledger.conversion_history(path.into_inner(), &user.0)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "history": history,
        "total_converted": total_converted,
        "remaining": remaining,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    /// Supply/demand ratio for the card's brand, when the caller has one
    pub supply_demand_ratio: Option<f64>,
}

pub async fn price_card(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    query: web::Query<PriceQuery>,
) -> Result<HttpResponse> {
    let card = state.ledger.get_card(path.into_inner(), &user.0)?;
    let profile = state.ledger.profiles().get_or_create(&card.owner);

    let mut market = MarketData::default();
    if let Some(ratio) = query.supply_demand_ratio {
        market.supply_demand_ratio.insert(card.brand, ratio);
    }

    let quote = pricing_engine::fair_value(&card, &profile.reputation, &market, state.clock.now());
    Ok(HttpResponse::Ok().json(json!({ "success": true, "quote": quote })))
}
