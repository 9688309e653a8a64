// src/api/payments.rs

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::db;
use crate::error::ShopError;
use crate::models::{PaymentMethod, PaymentStatus};
use crate::orders::{self, PaymentOutcome};
use crate::vnpay;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
}

/// Builds the signed gateway redirect URL for a pending VNPAY order. The
/// amount comes from the stored order, never from the client.
#[utoipa::path(
    post,
    path = "/api/payments/create-vnpay-payment",
    tag = "payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Payment URL created"),
        (status = 400, description = "Order is not payable"),
        (status = 404, description = "Order not found")
    )
)]
#[post("/payments/create-vnpay-payment")]
pub async fn create_vnpay_payment(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CreatePaymentRequest>,
) -> Result<HttpResponse, ShopError> {
    let order = db::get_order(&state.pool, payload.order_id)
        .await?
        .ok_or_else(|| ShopError::not_found("order not found"))?;

    if order.user_id != user.id {
        return Err(ShopError::forbidden("not your order"));
    }
    if order.payment_method != PaymentMethod::Vnpay {
        return Err(ShopError::validation("order is not a VNPAY order"));
    }
    if order.payment_status != PaymentStatus::Pending {
        return Err(ShopError::validation("order is not awaiting payment"));
    }

    let conn_info = req.connection_info().clone();
    let ip_addr = conn_info.realip_remote_addr().unwrap_or("127.0.0.1");

    let payment_url = vnpay::build_payment_url(&state.vnpay, order.id, order.amount, ip_addr, Utc::now());

    Ok(HttpResponse::Ok().json(json!({ "success": true, "paymentUrl": payment_url })))
}

fn redirect(url: String) -> HttpResponse {
    HttpResponse::Found()
        .append_header(("Location", url))
        .finish()
}

fn failure_redirect(client_url: &str, message: &str) -> HttpResponse {
    redirect(format!(
        "{client_url}/payment/failed?message={}",
        urlencoding::encode(message)
    ))
}

async fn handle_return(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<(Uuid, String), ShopError> {
    vnpay::verify_signature(&state.vnpay.hash_secret, params)?;

    let order_info = params
        .get("vnp_OrderInfo")
        .ok_or_else(|| ShopError::validation("missing order info"))?;
    let order_id = vnpay::extract_order_id(order_info)?;

    db::get_order(&state.pool, order_id)
        .await?
        .ok_or_else(|| ShopError::not_found("order not found"))?;

    let response_code = params
        .get("vnp_ResponseCode")
        .cloned()
        .unwrap_or_default();

    let outcome = if response_code == vnpay::RESPONSE_CODE_SUCCESS {
        PaymentOutcome::Success {
            txn_ref: params.get("vnp_TxnRef").cloned().unwrap_or_default(),
            amount: params
                .get("vnp_Amount")
                .and_then(|a| a.parse::<i64>().ok())
                .map(|a| a / 100)
                .unwrap_or(0),
            bank_code: params.get("vnp_BankCode").cloned(),
            pay_date: Utc::now(),
        }
    } else {
        PaymentOutcome::Failure
    };

    orders::apply_payment_outcome(&state.pool, order_id, &outcome).await?;
    Ok((order_id, response_code))
}

/// Redirect-driven confirmation. Every failure, the signature check
/// included, turns into a client failure redirect rather than an error
/// status; a success lands the browser on the client success page with
/// the order id.
#[get("/api/payments/vnpay-return")]
pub async fn vnpay_return(
    state: web::Data<AppState>,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    let params = query.into_inner();

    match handle_return(&state, &params).await {
        Ok((order_id, response_code)) if response_code == vnpay::RESPONSE_CODE_SUCCESS => redirect(
            format!(
                "{}/payment/success?orderId={}&vnp_ResponseCode={}",
                state.client_url, order_id, response_code
            ),
        ),
        Ok(_) => failure_redirect(&state.client_url, "Payment failed"),
        Err(e) => {
            log::warn!("vnpay return rejected: {e}");
            failure_redirect(&state.client_url, &e.to_string())
        }
    }
}
