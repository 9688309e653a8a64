// src/orders.rs
//
// Order reconciliation service: creation, the two payment-confirmation
// entry points, and the manual status transitions. Every confirmation
// path funnels into `apply_payment_outcome`, whose conditional
// payment_status = PENDING update is what makes re-delivery and races
// between the redirect callback and the verification API safe.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::coupons;
use crate::db::{self, NewOrder};
use crate::error::ShopError;
use crate::models::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::pricing::{self, LineItem};
use crate::ranks;

pub struct CreateOrderArgs {
    pub address_id: Uuid,
    pub items: Vec<LineItem>,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

/// Prices the cart, applies an optional coupon and persists the order in
/// (PENDING, PENDING). The coupon usage increment, the user-coupon USED
/// mark, the order insert and the cart clear share one transaction: if any
/// step fails nothing is retained.
pub async fn create_order(
    pool: &PgPool,
    user_id: &str,
    args: CreateOrderArgs,
) -> Result<(Order, i64), ShopError> {
    if args.items.is_empty() {
        return Err(ShopError::validation("invalid data"));
    }
    if !db::address_exists(pool, args.address_id, user_id).await? {
        return Err(ShopError::not_found("address not found"));
    }

    let items = pricing::resolve_items(pool, &args.items).await?;
    let raw_amount = pricing::raw_amount(&items);

    if args.coupon_code.is_some() {
        coupons::sweep_expired(pool).await?;
    }

    let mut tx = pool.begin().await?;

    // An invalid coupon fails the whole order; it is never silently
    // skipped.
    let coupon = match &args.coupon_code {
        Some(code) => Some(coupons::redeem(&mut tx, user_id, code, raw_amount).await?),
        None => None,
    };

    let discount = coupon.as_ref().map(|c| c.discount_amount).unwrap_or(0);
    let total_amount = raw_amount - discount;

    let order = db::insert_order(
        &mut tx,
        &NewOrder {
            user_id: user_id.to_string(),
            address_id: args.address_id,
            amount: total_amount,
            payment_method: args.payment_method,
            coupon,
            items,
        },
    )
    .await?;

    db::clear_cart(&mut tx, user_id).await?;

    tx.commit().await?;

    Ok((order, discount))
}

/// Result of a gateway confirmation, from either entry point.
#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Success {
        txn_ref: String,
        /// Already divided back out of the gateway's ×100 minor units.
        amount: i64,
        bank_code: Option<String>,
        pay_date: DateTime<Utc>,
    },
    Failure,
}

impl PaymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentOutcome::Success { .. })
    }
}

/// The single conditional transition both confirmation paths share:
/// "update where id matches AND payment_status is still PENDING". A
/// replay, or the second of two racing confirmations, matches zero rows
/// and reports already-processed instead of applying twice. Runs in its
/// own transaction; an abort leaves the order untouched and retryable.
pub async fn apply_payment_outcome(
    pool: &PgPool,
    order_id: Uuid,
    outcome: &PaymentOutcome,
) -> Result<Order, ShopError> {
    let mut tx = pool.begin().await?;

    let row = match outcome {
        PaymentOutcome::Success {
            txn_ref,
            amount,
            bank_code,
            pay_date,
        } => {
            sqlx::query(
                r#"UPDATE orders
                   SET payment_status = 'PAID', status = 'PROCESSING',
                       vnp_txn_ref = $2, vnp_amount = $3, vnp_bank_code = $4, vnp_pay_date = $5
                   WHERE id = $1 AND payment_status = 'PENDING'
                   RETURNING *"#,
            )
            .bind(order_id)
            .bind(txn_ref)
            .bind(amount)
            .bind(bank_code.as_deref())
            .bind(pay_date)
            .fetch_optional(&mut *tx)
            .await?
        }
        // The failure branch carries the same PENDING guard as success,
        // so a late failure callback cannot clobber a paid order.
        PaymentOutcome::Failure => {
            sqlx::query(
                r#"UPDATE orders
                   SET payment_status = 'FAILED', status = 'CANCELLED'
                   WHERE id = $1 AND payment_status = 'PENDING'
                   RETURNING *"#,
            )
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
        }
    };

    let Some(row) = row else {
        tx.rollback().await?;
        return Err(ShopError::conflict("order not found or already processed"));
    };

    let order = crate::db::order_from_row(&row)?;
    tx.commit().await?;

    Ok(order)
}

/// API-driven confirmation (the client polls after the gateway redirect).
pub async fn verify_payment(
    pool: &PgPool,
    order_id: Uuid,
    response_code: &str,
    txn_ref: Option<String>,
    amount_x100: Option<i64>,
    bank_code: Option<String>,
    pay_date_millis: Option<i64>,
) -> Result<Order, ShopError> {
    let outcome = if response_code == crate::vnpay::RESPONSE_CODE_SUCCESS {
        PaymentOutcome::Success {
            txn_ref: txn_ref.unwrap_or_default(),
            amount: amount_x100.map(|a| a / 100).unwrap_or(0),
            bank_code,
            pay_date: pay_date_millis
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .unwrap_or_else(Utc::now),
        }
    } else {
        PaymentOutcome::Failure
    };

    apply_payment_outcome(pool, order_id, &outcome).await
}

/// Derived payment-status side effects of a manual status transition.
pub fn derived_payment_status(
    method: PaymentMethod,
    current: PaymentStatus,
    new_status: OrderStatus,
) -> Option<PaymentStatus> {
    match (new_status, method) {
        (OrderStatus::Delivered, PaymentMethod::Cod) => Some(PaymentStatus::Paid),
        (OrderStatus::Cancelled, PaymentMethod::Cod) => Some(PaymentStatus::Failed),
        (OrderStatus::Cancelled, PaymentMethod::Vnpay) => match current {
            PaymentStatus::Pending => Some(PaymentStatus::Failed),
            PaymentStatus::Paid => Some(PaymentStatus::RefundPending),
            _ => None,
        },
        _ => None,
    }
}

/// Seller-driven transition. Validated against the lifecycle diagram, so
/// DELIVERED and CANCELLED stay absorbing; the write is guarded on the
/// status the decision was made against.
pub async fn update_order_status(
    pool: &PgPool,
    order_id: Uuid,
    new_status: OrderStatus,
) -> Result<Order, ShopError> {
    let order = db::get_order(pool, order_id)
        .await?
        .ok_or_else(|| ShopError::not_found("order not found"))?;

    if !order.status.can_transition_to(new_status) {
        return Err(ShopError::conflict(format!(
            "order cannot move from {} to {}",
            order.status, new_status
        )));
    }

    let derived = derived_payment_status(order.payment_method, order.payment_status, new_status);

    let row = sqlx::query(
        r#"UPDATE orders
           SET status = $2, payment_status = COALESCE($3, payment_status)
           WHERE id = $1 AND status = $4
           RETURNING *"#,
    )
    .bind(order_id)
    .bind(new_status.as_str())
    .bind(derived.map(|p| p.as_str()))
    .bind(order.status.as_str())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(ShopError::conflict("order was updated concurrently"));
    };
    let updated = db::order_from_row(&row)?;

    // Terminal delivered+paid feeds the gamification tier. Fire and
    // forget: a rank failure must not fail the status update.
    if updated.status == OrderStatus::Delivered && updated.payment_status == PaymentStatus::Paid {
        if let Err(e) = ranks::recalculate(pool, &updated.user_id).await {
            log::error!("rank recalculation failed for user {}: {e}", updated.user_id);
        }
    }

    Ok(updated)
}

/// Customer-initiated cancellation of their own, not yet terminal, order.
pub async fn cancel_order(pool: &PgPool, order_id: Uuid, caller: &str) -> Result<Order, ShopError> {
    let order = db::get_order(pool, order_id)
        .await?
        .ok_or_else(|| ShopError::not_found("order not found"))?;

    if order.user_id != caller {
        return Err(ShopError::forbidden("not authorized to cancel this order"));
    }
    if order.status.is_terminal() {
        return Err(ShopError::validation("order cannot be cancelled"));
    }

    let derived =
        derived_payment_status(order.payment_method, order.payment_status, OrderStatus::Cancelled);

    let row = sqlx::query(
        r#"UPDATE orders
           SET status = 'CANCELLED', payment_status = COALESCE($2, payment_status)
           WHERE id = $1 AND status = $3
           RETURNING *"#,
    )
    .bind(order_id)
    .bind(derived.map(|p| p.as_str()))
    .bind(order.status.as_str())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(ShopError::conflict("order was updated concurrently"));
    };

    Ok(db::order_from_row(&row)?)
}
