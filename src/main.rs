// src/main.rs
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::env;
use utoipa::OpenApi;

use storefront_backend::{api, docs, vnpay::VnpayConfig, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(docs::ApiDoc::openapi())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET required");
    let client_url = env::var("CLIENT_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

    let vnpay = VnpayConfig {
        tmn_code: env::var("VNPAY_TMN_CODE").expect("VNPAY_TMN_CODE required"),
        hash_secret: env::var("VNPAY_HASH_SECRET").expect("VNPAY_HASH_SECRET required"),
        gateway_url: env::var("VNPAY_URL")
            .unwrap_or_else(|_| "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string()),
        return_url: env::var("VNPAY_RETURN_URL")
            .unwrap_or_else(|_| format!("{client_url}/payment/payment-return")),
    };

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    log::info!("listening on {bind_addr}");

    let state = web::Data::new(AppState {
        pool,
        jwt_secret,
        client_url,
        vnpay,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .route("/api-docs/openapi.json", web::get().to(openapi_json))
            // Public: gateway-facing confirmation paths and the coupon
            // showcase
            .service(api::orders::verify_payment)
            .service(api::payments::vnpay_return)
            .service(api::coupons::public_coupons)
            // Authenticated routes
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .service(api::orders::create_order)
                    .service(api::orders::list_orders)
                    .service(api::orders::order_detail)
                    .service(api::orders::seller_orders)
                    .service(api::orders::update_status)
                    .service(api::orders::cancel_order)
                    .service(api::orders::purchase_status)
                    .service(api::payments::create_vnpay_payment)
                    .service(api::coupons::validate_coupon)
                    .service(api::coupons::create_coupon)
                    .service(api::coupons::list_coupons)
                    .service(api::coupons::update_coupon)
                    .service(api::coupons::delete_coupon)
                    .service(api::coupons::claim_coupon)
                    .service(api::coupons::my_coupons)
                    .service(api::ranks::my_rank),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
