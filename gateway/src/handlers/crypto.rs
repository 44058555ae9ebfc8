//! Exchange-rate and conversion endpoints

use crate::auth::AuthedUser;
use crate::error::{Error, Result};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use card_ledger::{ChainNetwork, ChainRecord, TxStatus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// Platform fee on conversions, percent
const CONVERSION_FEE_PCT: Decimal = dec!(2.5);

const SUPPORTED_COINS: [&str; 3] = ["bitcoin", "ethereum", "solana"];

pub async fn get_rates(state: web::Data<AppState>) -> Result<HttpResponse> {
    let rates = state.rates.get_rates().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "rates": rates })))
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub card_id: Uuid,
    pub crypto_type: String,
    pub wallet_address: String,
    /// Card value to convert; defaults to the full remaining value
    pub amount: Option<Decimal>,
}

pub async fn convert(
    state: web::Data<AppState>,
    user: AuthedUser,
    req: web::Json<ConvertRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let coin = req.crypto_type.to_lowercase();
    if !SUPPORTED_COINS.contains(&coin.as_str()) {
        return Err(Error::Validation(
            "invalid crypto type: must be bitcoin, ethereum, or solana".into(),
        ));
    }
    if req.wallet_address.trim().is_empty() {
        return Err(Error::Validation("wallet address is required".into()));
    }

    let rates = state.rates.get_rates().await?;
    let rate = rates
        .rate_for(&coin)
        .filter(|r| *r > Decimal::ZERO)
        .ok_or_else(|| Error::Upstream("unable to fetch crypto rate".into()))?;

    let card = state.ledger.get_card(req.card_id, &user.0)?;
    let amount = req.amount.unwrap_or_else(|| card.remaining_value());
    let fee = amount * CONVERSION_FEE_PCT / Decimal::from(100);

    let tx = state.ledger.record_conversion(
        req.card_id,
        &user.0,
        &coin.to_uppercase(),
        amount,
        rate,
        fee,
    )?;

    let conversion = tx.conversion.as_ref();
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Conversion initiated successfully",
        "transaction": {
            "transaction_id": tx.id,
            "status": tx.status,
            "usd_amount": tx.amount,
            "fee": tx.fee,
            "net_amount": tx.net_amount,
            "crypto_amount": conversion.map(|c| c.to_amount),
            "crypto_type": coin,
            "wallet_address": req.wallet_address,
            "exchange_rate": rate,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub usd_amount: Decimal,
    pub crypto_type: String,
}

pub async fn estimate(
    state: web::Data<AppState>,
    req: web::Json<EstimateRequest>,
) -> Result<HttpResponse> {
    let coin = req.crypto_type.to_lowercase();
    if req.usd_amount <= Decimal::ZERO {
        return Err(Error::Validation("usd amount must be positive".into()));
    }

    let rates = state.rates.get_rates().await?;
    let rate = rates
        .rate_for(&coin)
        .filter(|r| *r > Decimal::ZERO)
        .ok_or_else(|| Error::Validation("invalid crypto type".into()))?;

    let fee = req.usd_amount * CONVERSION_FEE_PCT / Decimal::from(100);
    let net_amount = req.usd_amount - fee;
    let crypto_amount = net_amount / rate;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "estimate": {
            "usd_amount": req.usd_amount,
            "fee": fee,
            "fee_percentage": CONVERSION_FEE_PCT,
            "net_amount": net_amount,
            "crypto_type": coin,
            "crypto_amount": crypto_amount,
            "exchange_rate": rate,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub network: String,
    pub tx_hash: String,
    /// When given, the report is recorded on this transaction's chain
    /// sub-record (confirmation state only ever advances)
    pub transaction_id: Option<Uuid>,
}

pub async fn verify(
    state: web::Data<AppState>,
    user: AuthedUser,
    req: web::Json<VerifyRequest>,
) -> Result<HttpResponse> {
    let network = ChainNetwork::parse(&req.network)
        .ok_or_else(|| Error::Validation(format!("unknown network: {}", req.network)))?;
    let report = state.verifier.verify(network, &req.tx_hash).await?;

    if let Some(tx_id) = req.transaction_id {
        if let Some(mut tx) = state.ledger.transactions().get_mut(tx_id) {
            if tx.initiator == user.0 {
                let now = state.clock.now();
                let prev = tx.chain.take();
                let was_confirmed = prev.as_ref().map_or(false, |c| c.is_confirmed);
                let is_confirmed = was_confirmed || report.verified;
                tx.chain = Some(ChainRecord {
                    network,
                    tx_hash: req.tx_hash.clone(),
                    confirmations: report
                        .confirmations
                        .max(prev.as_ref().map_or(0, |c| c.confirmations)),
                    block_ref: report.block_ref.or(prev.as_ref().and_then(|c| c.block_ref)),
                    wallet_address: prev.as_ref().and_then(|c| c.wallet_address.clone()),
                    is_confirmed,
                    confirmed_at: prev
                        .and_then(|c| c.confirmed_at)
                        .or(if is_confirmed { Some(now) } else { None }),
                });
                if report.verified {
                    tx.advance_status(TxStatus::Completed, now);
                }
            }
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "verification": report,
    })))
}
