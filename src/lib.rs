pub mod api;
pub mod coupons;
pub mod db;
pub mod docs;
pub mod error;
pub mod models;
pub mod orders;
pub mod pricing;
pub mod ranks;
pub mod vnpay;

use sqlx::PgPool;

use crate::vnpay::VnpayConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt_secret: String,
    pub client_url: String,
    pub vnpay: VnpayConfig,
}
