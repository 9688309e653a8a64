// src/api/orders.rs

use actix_web::{get, post, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::{require_seller, AuthUser};
use crate::db;
use crate::error::ShopError;
use crate::models::{OrderStatus, PaymentMethod};
use crate::orders::{self, CreateOrderArgs};
use crate::pricing::LineItem;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub address: Uuid,
    pub items: Vec<LineItem>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/orders/create",
    tag = "orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order placed"),
        (status = 400, description = "Invalid data or coupon"),
        (status = 404, description = "Product, variant or address not found")
    )
)]
#[post("/orders/create")]
pub async fn create_order(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ShopError> {
    let payload = payload.into_inner();

    let (order, discount) = orders::create_order(
        &state.pool,
        &user.id,
        CreateOrderArgs {
            address_id: payload.address,
            items: payload.items,
            payment_method: payload.payment_method,
            coupon_code: payload.coupon_code,
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Order placed",
        "order": order,
        "discount": discount
    })))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
}

#[get("/orders/list")]
pub async fn list_orders(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, ShopError> {
    let orders = db::list_orders_for_user(&state.pool, &user.id, query.status).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "orders": orders })))
}

#[get("/orders/detail/{id}")]
pub async fn order_detail(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ShopError> {
    let id = path.into_inner();
    let order = db::get_order(&state.pool, id)
        .await?
        .ok_or_else(|| ShopError::not_found("order not found"))?;

    if order.user_id != user.id {
        require_seller(&user)?;
    }

    let items = db::get_order_items(&state.pool, id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "order": order, "items": items })))
}

#[get("/orders/seller-orders")]
pub async fn seller_orders(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ShopError> {
    require_seller(&user)?;
    let orders = db::list_all_orders(&state.pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "orders": orders })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[put("/orders/status/{id}")]
pub async fn update_status(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, ShopError> {
    require_seller(&user)?;
    let order = orders::update_order_status(&state.pool, path.into_inner(), payload.status).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Order status updated successfully",
        "order": order
    })))
}

#[post("/orders/cancel/{id}")]
pub async fn cancel_order(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ShopError> {
    let order = orders::cancel_order(&state.pool, path.into_inner(), &user.id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Order cancelled successfully",
        "order": order
    })))
}

#[get("/orders/purchased/{product_id}")]
pub async fn purchase_status(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ShopError> {
    let has_purchased = db::has_purchased(&state.pool, &user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "hasPurchased": has_purchased })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub order_id: Option<Uuid>,
    pub transaction_no: Option<String>,
    /// Epoch milliseconds, as relayed by the client from the gateway.
    pub pay_date: Option<i64>,
    pub bank_code: Option<String>,
    /// Gateway minor units, i.e. the real amount ×100.
    pub amount: Option<i64>,
    pub response_code: Option<String>,
}

/// Public API confirmation path; the PENDING guard inside makes replays
/// and races with the redirect callback report "already processed".
#[utoipa::path(
    post,
    path = "/api/orders/verify-payment",
    tag = "orders",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment outcome applied"),
        (status = 400, description = "Missing payment information"),
        (status = 409, description = "Order not found or already processed")
    )
)]
#[post("/api/orders/verify-payment")]
pub async fn verify_payment(
    state: web::Data<AppState>,
    payload: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, ShopError> {
    let payload = payload.into_inner();

    let (Some(order_id), Some(response_code)) = (payload.order_id, payload.response_code.clone())
    else {
        return Err(ShopError::validation("missing payment information"));
    };

    let order = orders::verify_payment(
        &state.pool,
        order_id,
        &response_code,
        payload.transaction_no,
        payload.amount,
        payload.bank_code,
        payload.pay_date,
    )
    .await?;

    let message = if response_code == crate::vnpay::RESPONSE_CODE_SUCCESS {
        "Payment successful"
    } else {
        "Payment failed"
    };

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": message, "order": order })))
}
