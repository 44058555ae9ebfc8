//! Gateway error mapping
//!
//! Every domain error is recovered at this boundary and surfaced with a
//! stable message in the `{success: false, message}` envelope. Status codes:
//! validation/conflict 400, missing identity 401, wrong identity 403,
//! not found 404, upstream 500.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Result type for gateway handlers
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Card ledger error
    #[error("{0}")]
    Ledger(#[from] card_ledger::Error),

    /// Marketplace error
    #[error("{0}")]
    Market(#[from] escrow_market::Error),

    /// Commission engine error
    #[error("{0}")]
    Commission(#[from] commission_engine::Error),

    /// Request-level validation failure
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found at the routing layer
    #[error("Not found: {0}")]
    NotFound(String),

    /// No acting user supplied
    #[error("Authentication required")]
    Unauthenticated,

    /// Upstream collaborator failed and no cached value could cover for it
    #[error("Upstream error: {0}")]
    Upstream(String),
}

fn ledger_status(err: &card_ledger::Error) -> StatusCode {
    use card_ledger::Error as E;
    match err {
        E::NotFound(_) => StatusCode::NOT_FOUND,
        E::Unauthorized(_) => StatusCode::FORBIDDEN,
        E::Validation(_)
        | E::Conflict(_)
        | E::DuplicateCode
        | E::InsufficientValue { .. }
        | E::InvalidState(_) => StatusCode::BAD_REQUEST,
    }
}

fn market_status(err: &escrow_market::Error) -> StatusCode {
    use escrow_market::Error as E;
    match err {
        E::Ledger(inner) => ledger_status(inner),
        E::NotFound(_) => StatusCode::NOT_FOUND,
        E::Unauthorized(_) => StatusCode::FORBIDDEN,
        E::Validation(_) | E::Conflict(_) | E::SelfPurchase | E::InvalidState(_) => {
            StatusCode::BAD_REQUEST
        }
    }
}

fn commission_status(err: &commission_engine::Error) -> StatusCode {
    use commission_engine::Error as E;
    match err {
        E::NotFound(_) => StatusCode::NOT_FOUND,
        E::Validation(_) | E::Conflict(_) | E::InsufficientBalance { .. } => {
            StatusCode::BAD_REQUEST
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Ledger(e) => ledger_status(e),
            Error::Market(e) => market_status(e),
            Error::Commission(e) => commission_status(e),
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(
            Error::Ledger(card_ledger::Error::DuplicateCode).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Ledger(card_ledger::Error::Unauthorized("x".into())).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Market(escrow_market::Error::SelfPurchase).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Market(escrow_market::Error::NotFound("x".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Commission(commission_engine::Error::InsufficientBalance {
                requested: dec!(50),
                available: dec!(10),
            })
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::Upstream("rates".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_envelope_is_stable() {
        let response = Error::Unauthenticated.error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
