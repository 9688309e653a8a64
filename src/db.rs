// src/db.rs
//
// Runtime queries with manual row mapping, so the build does not depend on
// a live database.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{CouponSnapshot, Order, OrderItem, OrderStatus, PaymentDetails};

fn decode<T>(s: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = String>,
{
    s.parse::<T>().map_err(|e| sqlx::Error::Decode(e.into()))
}

pub(crate) fn order_from_row(r: &PgRow) -> Result<Order, sqlx::Error> {
    let status: String = r.try_get("status")?;
    let payment_status: String = r.try_get("payment_status")?;
    let payment_method: String = r.try_get("payment_method")?;

    let coupon = match r.try_get::<Option<String>, _>("coupon_code")? {
        Some(code) => {
            let coupon_type: String = r
                .try_get::<Option<String>, _>("coupon_type")?
                .unwrap_or_default();
            Some(CouponSnapshot {
                code,
                coupon_type: decode(&coupon_type)?,
                value: r.try_get::<Option<i64>, _>("coupon_value")?.unwrap_or(0),
                discount_amount: r.try_get::<Option<i64>, _>("coupon_discount")?.unwrap_or(0),
            })
        }
        None => None,
    };

    let payment_details = match r.try_get::<Option<String>, _>("vnp_txn_ref")? {
        Some(txn_ref) => Some(PaymentDetails {
            vnpay_txn_ref: txn_ref,
            vnpay_amount: r.try_get::<Option<i64>, _>("vnp_amount")?.unwrap_or(0),
            vnpay_bank_code: r.try_get("vnp_bank_code")?,
            vnpay_pay_date: r
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>("vnp_pay_date")?
                .unwrap_or_else(chrono::Utc::now),
        }),
        None => None,
    };

    Ok(Order {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        address_id: r.try_get("address_id")?,
        amount: r.try_get("amount")?,
        status: decode(&status)?,
        payment_status: decode(&payment_status)?,
        payment_method: decode(&payment_method)?,
        coupon,
        payment_details,
        date: r.try_get("date")?,
    })
}

fn order_item_from_row(r: &PgRow) -> Result<OrderItem, sqlx::Error> {
    Ok(OrderItem {
        product_id: r.try_get("product_id")?,
        variant_id: r.try_get("variant_id")?,
        quantity: r.try_get("quantity")?,
        unit_price: r.try_get("unit_price")?,
    })
}

// ---- Catalog / address / cart collaborators (read or clear only) ----

pub async fn get_product_price(pool: &PgPool, product_id: Uuid) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query("SELECT offer_price FROM products WHERE id = $1 AND is_active = true")
        .bind(product_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("offer_price")))
}

pub async fn get_variant_price(pool: &PgPool, variant_id: Uuid) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query("SELECT offer_price FROM product_variants WHERE id = $1")
        .bind(variant_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("offer_price")))
}

pub async fn address_exists(
    pool: &PgPool,
    address_id: Uuid,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 AS one FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

pub async fn clear_cart(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// ---- Orders ----

pub struct NewOrderItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: i64,
}

pub struct NewOrder {
    pub user_id: String,
    pub address_id: Uuid,
    pub amount: i64,
    pub payment_method: crate::models::PaymentMethod,
    pub coupon: Option<CouponSnapshot>,
    pub items: Vec<NewOrderItem>,
}

/// Inserts the order and its line items. Both status fields start at
/// PENDING for every payment method; moving to PROCESSING takes either a
/// confirmed payment or an explicit seller action.
pub async fn insert_order(
    tx: &mut Transaction<'_, Postgres>,
    new: &NewOrder,
) -> Result<Order, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO orders
           (user_id, address_id, amount, status, payment_status, payment_method,
            coupon_code, coupon_type, coupon_value, coupon_discount)
           VALUES ($1, $2, $3, 'PENDING', 'PENDING', $4, $5, $6, $7, $8)
           RETURNING *"#,
    )
    .bind(&new.user_id)
    .bind(new.address_id)
    .bind(new.amount)
    .bind(new.payment_method.as_str())
    .bind(new.coupon.as_ref().map(|c| c.code.clone()))
    .bind(new.coupon.as_ref().map(|c| c.coupon_type.as_str()))
    .bind(new.coupon.as_ref().map(|c| c.value))
    .bind(new.coupon.as_ref().map(|c| c.discount_amount))
    .fetch_one(&mut **tx)
    .await?;

    let order = order_from_row(&row)?;

    for item in &new.items {
        sqlx::query(
            r#"INSERT INTO order_items (order_id, product_id, variant_id, quantity, unit_price)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(order.id)
        .bind(item.product_id)
        .bind(item.variant_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut **tx)
        .await?;
    }

    Ok(order)
}

pub async fn get_order(pool: &PgPool, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| order_from_row(&r)).transpose()
}

pub async fn list_orders_for_user(
    pool: &PgPool,
    user_id: &str,
    status: Option<OrderStatus>,
) -> Result<Vec<Order>, sqlx::Error> {
    let rows = match status {
        Some(status) => {
            sqlx::query("SELECT * FROM orders WHERE user_id = $1 AND status = $2 ORDER BY date DESC")
                .bind(user_id)
                .bind(status.as_str())
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query("SELECT * FROM orders WHERE user_id = $1 ORDER BY date DESC")
                .bind(user_id)
                .fetch_all(pool)
                .await?
        }
    };

    rows.iter().map(order_from_row).collect()
}

pub async fn list_all_orders(pool: &PgPool) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM orders ORDER BY date DESC")
        .fetch_all(pool)
        .await?;

    rows.iter().map(order_from_row).collect()
}

pub async fn get_order_items(pool: &PgPool, order_id: Uuid) -> Result<Vec<OrderItem>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM order_items WHERE order_id = $1")
        .bind(order_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(order_item_from_row).collect()
}

/// Lifetime spend: the sum over orders that reached DELIVERED with a PAID
/// payment.
pub async fn total_delivered_paid(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT COALESCE(SUM(amount), 0)::bigint AS total
           FROM orders
           WHERE user_id = $1 AND status = 'DELIVERED' AND payment_status = 'PAID'"#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("total"))
}

/// Review gating: has this user a delivered, paid order containing the
/// product.
pub async fn has_purchased(
    pool: &PgPool,
    user_id: &str,
    product_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT 1 AS one
           FROM orders o
           JOIN order_items i ON i.order_id = o.id
           WHERE o.user_id = $1
             AND i.product_id = $2
             AND o.status = 'DELIVERED'
             AND o.payment_status = 'PAID'
           LIMIT 1"#,
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}
