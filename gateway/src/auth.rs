//! Acting-user extraction
//!
//! Identity is an external collaborator: the identity provider authenticates
//! the caller and hands the gateway the acting user id in the `X-User-Id`
//! header. Requests without one are rejected with 401.

use crate::error::Error;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use card_ledger::UserId;
use std::future::{ready, Ready};

/// The authenticated acting user
#[derive(Debug, Clone)]
pub struct AuthedUser(pub UserId);

impl FromRequest for AuthedUser {
    type Error = Error;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .headers()
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| AuthedUser(UserId::new(s)));

        ready(user.ok_or(Error::Unauthenticated))
    }
}
