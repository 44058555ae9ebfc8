//! Marketplace endpoints

use crate::auth::AuthedUser;
use crate::error::Result;
use crate::handlers::{parse_brand, parse_listing_status};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use escrow_market::ListingFilter;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub card_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub asking_price: Decimal,
}

pub async fn create_listing(
    state: web::Data<AppState>,
    user: AuthedUser,
    req: web::Json<CreateListingRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let listing = state.market.create_listing(
        req.card_id,
        &user.0,
        &req.title,
        req.description.as_deref().unwrap_or(""),
        req.asking_price,
    )?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Listing created successfully",
        "listing": listing,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub q: Option<String>,
    pub status: Option<String>,
}

fn filter_from(query: &ListingQuery) -> Result<ListingFilter> {
    Ok(ListingFilter {
        brand: query.brand.as_deref().map(parse_brand).transpose()?,
        min_price: query.min_price,
        max_price: query.max_price,
    })
}

pub async fn get_listings(
    state: web::Data<AppState>,
    query: web::Query<ListingQuery>,
) -> Result<HttpResponse> {
    let listings = state.market.list_listings(&filter_from(&query)?);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": listings.len(),
        "listings": listings,
    })))
}

pub async fn search_listings(
    state: web::Data<AppState>,
    query: web::Query<ListingQuery>,
) -> Result<HttpResponse> {
    let listings = state
        .market
        .search(query.q.as_deref().unwrap_or(""), &filter_from(&query)?);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": listings.len(),
        "listings": listings,
    })))
}

pub async fn get_listing(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let listing = state.market.get_listing(path.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "listing": listing })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub asking_price: Option<Decimal>,
}

pub async fn update_listing(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    req: web::Json<UpdateListingRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let listing = state.market.update_listing(
        path.into_inner(),
        &user.0,
        req.title,
        req.description,
        req.asking_price,
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Listing updated successfully",
        "listing": listing,
    })))
}

pub async fn delete_listing(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    state.market.delete_listing(path.into_inner(), &user.0)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Listing deleted successfully",
    })))
}

pub async fn purchase(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let tx = state.market.purchase(path.into_inner(), &user.0)?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Purchase initiated. Escrow is now active.",
        "transaction": {
            "transaction_id": tx.id,
            "status": tx.status,
            "amount": tx.amount,
            "fee": tx.fee,
            "net_amount": tx.net_amount,
        },
    })))
}

pub async fn confirm_receipt(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let listing = state.market.confirm_receipt(path.into_inner(), &user.0)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Receipt confirmed. Escrow released to seller.",
        "listing": listing,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: u8,
    pub review: Option<String>,
}

pub async fn rate(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    req: web::Json<RateRequest>,
) -> Result<HttpResponse> {
    let listing = state.market.rate_listing(
        path.into_inner(),
        &user.0,
        req.rating,
        req.review.as_deref().unwrap_or(""),
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Rating submitted successfully",
        "listing": listing,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListingDisputeRequest {
    pub reason: String,
}

pub async fn report_dispute(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
    req: web::Json<ListingDisputeRequest>,
) -> Result<HttpResponse> {
    let listing = state
        .market
        .report_dispute(path.into_inner(), &user.0, &req.reason)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Dispute reported successfully",
        "listing": listing,
    })))
}

pub async fn add_favorite(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let listing = state.market.add_favorite(path.into_inner(), &user.0)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Added to favorites",
        "favorites": listing.favorites(),
    })))
}

pub async fn remove_favorite(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let listing = state.market.remove_favorite(path.into_inner(), &user.0)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Removed from favorites",
        "favorites": listing.favorites(),
    })))
}

pub async fn my_listings(
    state: web::Data<AppState>,
    user: AuthedUser,
    query: web::Query<ListingQuery>,
) -> Result<HttpResponse> {
    let status = query.status.as_deref().map(parse_listing_status).transpose()?;
    let listings = state.market.my_listings(&user.0, status);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": listings.len(),
        "listings": listings,
    })))
}

pub async fn my_purchases(state: web::Data<AppState>, user: AuthedUser) -> Result<HttpResponse> {
    let purchases = state.market.my_purchases(&user.0);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": purchases.len(),
        "purchases": purchases,
    })))
}
