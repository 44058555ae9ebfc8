//! REST handlers
//!
//! JSON envelope on every response: `{success, message?, ...}`. 201 on
//! creation, 400 validation/conflict, 401/403 auth, 404 not found, 500
//! upstream.

pub mod cards;
pub mod crypto;
pub mod marketplace;
pub mod referral;

use crate::error::{Error, Result};
use actix_web::web;
use card_ledger::{Brand, CardSource, CardStatus, Currency};
use escrow_market::ListingStatus;

/// Mount every route under `/api`
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/cards")
                    .route("", web::post().to(cards::create_card))
                    .route("", web::get().to(cards::get_cards))
                    .route("/{id}", web::get().to(cards::get_card))
                    .route("/{id}", web::put().to(cards::update_card))
                    .route("/{id}", web::delete().to(cards::delete_card))
                    .route("/{id}/verify", web::post().to(cards::verify_card))
                    .route("/{id}/dispute", web::post().to(cards::report_dispute))
                    .route("/{id}/history", web::get().to(cards::conversion_history))
                    .route("/{id}/price", web::get().to(cards::price_card)),
            )
            .service(
                web::scope("/marketplace")
                    .route("/listings", web::post().to(marketplace::create_listing))
                    .route("/listings", web::get().to(marketplace::get_listings))
                    .route("/search", web::get().to(marketplace::search_listings))
                    .route("/my-listings", web::get().to(marketplace::my_listings))
                    .route("/my-purchases", web::get().to(marketplace::my_purchases))
                    .route("/listings/{id}", web::get().to(marketplace::get_listing))
                    .route("/listings/{id}", web::put().to(marketplace::update_listing))
                    .route(
                        "/listings/{id}",
                        web::delete().to(marketplace::delete_listing),
                    )
                    .route(
                        "/listings/{id}/purchase",
                        web::post().to(marketplace::purchase),
                    )
                    .route(
                        "/listings/{id}/confirm",
                        web::post().to(marketplace::confirm_receipt),
                    )
                    .route("/listings/{id}/rate", web::post().to(marketplace::rate))
                    .route(
                        "/listings/{id}/favorite",
                        web::post().to(marketplace::add_favorite),
                    )
                    .route(
                        "/listings/{id}/favorite",
                        web::delete().to(marketplace::remove_favorite),
                    )
                    .route(
                        "/listings/{id}/dispute",
                        web::post().to(marketplace::report_dispute),
                    ),
            )
            .service(
                web::scope("/referral")
                    .route("/code", web::get().to(referral::get_code))
                    .route("/register", web::post().to(referral::register))
                    .route("/stats", web::get().to(referral::stats))
                    .route("/earnings", web::get().to(referral::earnings))
                    .route("/referrals", web::get().to(referral::referrals))
                    .route("/withdraw", web::post().to(referral::withdraw))
                    .route("/claim-bonus", web::post().to(referral::claim_bonus)),
            )
            .service(
                web::scope("/crypto")
                    .route("/rates", web::get().to(crypto::get_rates))
                    .route("/convert", web::post().to(crypto::convert))
                    .route("/estimate", web::post().to(crypto::estimate))
                    .route("/verify", web::post().to(crypto::verify)),
            ),
    );
}

pub(crate) fn parse_brand(s: &str) -> Result<Brand> {
    Brand::parse(s).ok_or_else(|| Error::Validation(format!("unknown brand: {s}")))
}

pub(crate) fn parse_currency(s: Option<&str>) -> Result<Currency> {
    match s {
        None => Ok(Currency::USD),
        Some(code) => Currency::parse(code)
            .ok_or_else(|| Error::Validation(format!("unknown currency: {code}"))),
    }
}

pub(crate) fn parse_card_status(s: &str) -> Result<CardStatus> {
    match s {
        "active" => Ok(CardStatus::Active),
        "used" => Ok(CardStatus::Used),
        "expired" => Ok(CardStatus::Expired),
        "cancelled" => Ok(CardStatus::Cancelled),
        "disputed" => Ok(CardStatus::Disputed),
        _ => Err(Error::Validation(format!("unknown card status: {s}"))),
    }
}

pub(crate) fn parse_listing_status(s: &str) -> Result<ListingStatus> {
    match s {
        "active" => Ok(ListingStatus::Active),
        "sold" => Ok(ListingStatus::Sold),
        "cancelled" => Ok(ListingStatus::Cancelled),
        "expired" => Ok(ListingStatus::Expired),
        _ => Err(Error::Validation(format!("unknown listing status: {s}"))),
    }
}

pub(crate) fn parse_source(s: Option<&str>) -> CardSource {
    match s {
        Some("gifted") => CardSource::Gifted,
        Some("earned") => CardSource::Earned,
        Some("other") => CardSource::Other,
        _ => CardSource::Purchased,
    }
}
