// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

/// Failure taxonomy for the order/coupon/payment paths. Every variant maps
/// onto the `{"success": false, "message": ...}` envelope; the gateway
/// redirect path converts these into failure redirects instead.
#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid gateway signature")]
    Signature,

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl ShopError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ShopError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ShopError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ShopError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ShopError::Conflict(msg.into())
    }
}

impl ResponseError for ShopError {
    fn status_code(&self) -> StatusCode {
        match self {
            ShopError::Validation(_) => StatusCode::BAD_REQUEST,
            ShopError::NotFound(_) => StatusCode::NOT_FOUND,
            ShopError::Forbidden(_) => StatusCode::FORBIDDEN,
            ShopError::Conflict(_) => StatusCode::CONFLICT,
            ShopError::Signature => StatusCode::BAD_REQUEST,
            ShopError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ShopError::Db(e) = self {
            log::error!("database error: {e}");
            // Do not leak storage internals to the client.
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "message": "internal server error" }));
        }

        HttpResponse::build(self.status_code())
            .json(json!({ "success": false, "message": self.to_string() }))
    }
}
