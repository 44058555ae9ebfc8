//! Referral endpoints

use crate::auth::AuthedUser;
use crate::error::{Error, Result};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

pub async fn get_code(state: web::Data<AppState>, user: AuthedUser) -> Result<HttpResponse> {
    let code = state.ledger.profiles().ensure_referral_code(&user.0);
    let link = format!("{}/register?ref={}", state.config.frontend_url, code);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "referral_code": code,
        "referral_link": link,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub code: String,
}

/// Register the acting user as referred by the owner of `code`
pub async fn register(
    state: web::Data<AppState>,
    user: AuthedUser,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    let referrer = state
        .ledger
        .profiles()
        .find_by_referral_code(&req.code)
        .ok_or_else(|| Error::NotFound("referral code not found".into()))?;

    let referral = state
        .commission
        .create_referral(&referrer, &user.0, &req.code)?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Referral registered",
        "referral": referral,
    })))
}

pub async fn stats(state: web::Data<AppState>, user: AuthedUser) -> Result<HttpResponse> {
    let stats = state.commission.stats(&user.0);
    let tier = stats.tier;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "stats": stats,
        "tier": tier,
    })))
}

pub async fn earnings(state: web::Data<AppState>, user: AuthedUser) -> Result<HttpResponse> {
    let earnings = state.commission.earnings(&user.0);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": earnings.len(),
        "earnings": earnings,
    })))
}

pub async fn referrals(state: web::Data<AppState>, user: AuthedUser) -> Result<HttpResponse> {
    let referrals = state.commission.referrals_of(&user.0);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": referrals.len(),
        "referrals": referrals,
    })))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Decimal,
    pub method: Option<String>,
}

pub async fn withdraw(
    state: web::Data<AppState>,
    user: AuthedUser,
    req: web::Json<WithdrawRequest>,
) -> Result<HttpResponse> {
    let receipt = state.commission.withdraw(
        &user.0,
        req.amount,
        req.method.as_deref().unwrap_or("bank_transfer"),
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Withdrawal initiated",
        "withdrawal": receipt,
    })))
}

pub async fn claim_bonus(state: web::Data<AppState>, user: AuthedUser) -> Result<HttpResponse> {
    let bonus = state.commission.claim_signup_bonus(&user.0)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Signup bonus claimed successfully",
        "bonus_amount": bonus,
    })))
}
