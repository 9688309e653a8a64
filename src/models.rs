// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Order lifecycle. PENDING -> {PROCESSING, CANCELLED},
/// PROCESSING -> {DELIVERED, CANCELLED}; DELIVERED and CANCELLED are
/// absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Delivered)
                | (Processing, Cancelled)
        )
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PENDING -> {PAID, FAILED}; PAID -> REFUND_PENDING on post-payment
/// cancellation. FAILED and REFUND_PENDING are terminal here: refund
/// completion happens out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    RefundPending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::RefundPending => "REFUND_PENDING",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUND_PENDING" => Ok(PaymentStatus::RefundPending),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cod,
    Vnpay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::Vnpay => "VNPAY",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(PaymentMethod::Cod),
            "VNPAY" => Ok(PaymentMethod::Vnpay),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouponType {
    Percentage,
    FixedAmount,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponType::Percentage => "PERCENTAGE",
            CouponType::FixedAmount => "FIXED_AMOUNT",
        }
    }
}

impl FromStr for CouponType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENTAGE" => Ok(CouponType::Percentage),
            "FIXED_AMOUNT" => Ok(CouponType::FixedAmount),
            other => Err(format!("unknown coupon type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserCouponStatus {
    Received,
    Used,
    Expired,
}

impl UserCouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserCouponStatus::Received => "RECEIVED",
            UserCouponStatus::Used => "USED",
            UserCouponStatus::Expired => "EXPIRED",
        }
    }
}

impl FromStr for UserCouponStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIVED" => Ok(UserCouponStatus::Received),
            "USED" => Ok(UserCouponStatus::Used),
            "EXPIRED" => Ok(UserCouponStatus::Expired),
            other => Err(format!("unknown user coupon status: {other}")),
        }
    }
}

/// Denormalized copy of the coupon at the moment it was applied, kept on
/// the order so history stays correct if the coupon is later edited or
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponSnapshot {
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    pub value: i64,
    pub discount_amount: i64,
}

/// Gateway transaction metadata, written once by the successful
/// confirmation branch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub vnpay_txn_ref: String,
    pub vnpay_amount: i64,
    pub vnpay_bank_code: Option<String>,
    pub vnpay_pay_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub address_id: Uuid,
    /// Integer total in the smallest currency unit; immutable after
    /// creation.
    pub amount: i64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub coupon: Option<CouponSnapshot>,
    pub payment_details: Option<PaymentDetails>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    pub value: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub max_uses: i32,
    pub used_count: i32,
    pub min_order_amount: i64,
    pub is_active: bool,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserCoupon {
    pub id: Uuid,
    pub user_id: String,
    pub coupon_id: Uuid,
    pub status: UserCouponStatus,
    pub received_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}
