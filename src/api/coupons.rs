// src/api/coupons.rs

use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::{require_seller, AuthUser};
use crate::coupons::{self, CouponInput};
use crate::error::ShopError;
use crate::models::CouponType;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    pub code: String,
    pub order_amount: i64,
}

/// Checkout preview: full validation against the caller and amount, no
/// side effects beyond the lazy sweep.
#[utoipa::path(
    post,
    path = "/api/coupons/validate",
    tag = "coupons",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Coupon is valid"),
        (status = 400, description = "Coupon expired, exhausted or below minimum"),
        (status = 404, description = "Coupon not found"),
        (status = 409, description = "Coupon already used by this user")
    )
)]
#[post("/coupons/validate")]
pub async fn validate_coupon(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<ValidateCouponRequest>,
) -> Result<HttpResponse, ShopError> {
    let (coupon, discount) =
        coupons::validate_for_user(&state.pool, &user.id, &payload.code, payload.order_amount)
            .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Coupon is valid",
        "coupon": coupon,
        "discountAmount": discount
    })))
}

#[get("/api/coupons/public")]
pub async fn public_coupons(state: web::Data<AppState>) -> Result<HttpResponse, ShopError> {
    let coupons = coupons::list_public(&state.pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "coupons": coupons })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    pub value: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_uses: i32,
    #[serde(default)]
    pub min_order_amount: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl CouponRequest {
    fn to_input(&self) -> Result<CouponInput, ShopError> {
        Ok(CouponInput {
            code: self
                .code
                .clone()
                .ok_or_else(|| ShopError::validation("coupon code is required"))?,
            coupon_type: self.coupon_type,
            value: self.value,
            start_date: self.start_date,
            end_date: self.end_date,
            max_uses: self.max_uses,
            min_order_amount: self.min_order_amount,
        })
    }
}

#[post("/coupons/create")]
pub async fn create_coupon(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CouponRequest>,
) -> Result<HttpResponse, ShopError> {
    require_seller(&user)?;
    let coupon = coupons::create(&state.pool, &user.id, &payload.to_input()?).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Coupon created",
        "coupon": coupon
    })))
}

#[get("/coupons/list")]
pub async fn list_coupons(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ShopError> {
    require_seller(&user)?;
    let coupons = coupons::list_all(&state.pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "coupons": coupons })))
}

#[put("/coupons/update/{id}")]
pub async fn update_coupon(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
    payload: web::Json<CouponRequest>,
) -> Result<HttpResponse, ShopError> {
    require_seller(&user)?;
    // The code itself is immutable after creation, so it is not part of
    // the update input.
    let input = CouponInput {
        code: payload.code.clone().unwrap_or_default(),
        coupon_type: payload.coupon_type,
        value: payload.value,
        start_date: payload.start_date,
        end_date: payload.end_date,
        max_uses: payload.max_uses,
        min_order_amount: payload.min_order_amount,
    };

    let coupon = coupons::update(&state.pool, path.into_inner(), &input, payload.is_active).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Coupon updated",
        "coupon": coupon
    })))
}

#[delete("/coupons/delete/{id}")]
pub async fn delete_coupon(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ShopError> {
    require_seller(&user)?;
    coupons::delete(&state.pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Coupon deleted" })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCouponRequest {
    pub coupon_id: Uuid,
}

#[post("/user-coupons/claim")]
pub async fn claim_coupon(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<ClaimCouponRequest>,
) -> Result<HttpResponse, ShopError> {
    coupons::claim(&state.pool, &user.id, payload.coupon_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Coupon claimed" })))
}

#[get("/user-coupons/my")]
pub async fn my_coupons(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ShopError> {
    let claims = coupons::list_claims(&state.pool, &user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "userCoupons": claims })))
}
