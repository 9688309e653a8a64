// src/coupons.rs
//
// Coupon ledger: validation, the lazy expiry sweep, and the atomic
// redemption used by order creation. `used_count` is only ever advanced
// through a conditional increment bounded by `max_uses`, so the cap holds
// under concurrent redemptions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ShopError;
use crate::models::{Coupon, CouponSnapshot, CouponType, UserCoupon, UserCouponStatus};

pub(crate) fn coupon_from_row(r: &PgRow) -> Result<Coupon, sqlx::Error> {
    let coupon_type: String = r.try_get("type")?;
    Ok(Coupon {
        id: r.try_get("id")?,
        code: r.try_get("code")?,
        coupon_type: coupon_type
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
        value: r.try_get("value")?,
        start_date: r.try_get("start_date")?,
        end_date: r.try_get("end_date")?,
        max_uses: r.try_get("max_uses")?,
        used_count: r.try_get("used_count")?,
        min_order_amount: r.try_get("min_order_amount")?,
        is_active: r.try_get("is_active")?,
        created_by: r.try_get("created_by")?,
    })
}

fn user_coupon_from_row(r: &PgRow) -> Result<UserCoupon, sqlx::Error> {
    let status: String = r.try_get("status")?;
    Ok(UserCoupon {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        coupon_id: r.try_get("coupon_id")?,
        status: status
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
        received_at: r.try_get("received_at")?,
        used_at: r.try_get("used_at")?,
    })
}

/// Discount for an order amount. Percentage discounts floor; fixed
/// discounts are clamped to the order amount so the total never goes
/// negative.
pub fn discount_amount(coupon_type: CouponType, value: i64, order_amount: i64) -> i64 {
    match coupon_type {
        CouponType::Percentage => order_amount * value / 100,
        CouponType::FixedAmount => value.min(order_amount),
    }
}

/// Window, cap and minimum checks against an already-loaded coupon. The
/// window and cap are re-checked even for `is_active` rows because the
/// lazy sweep may not have run since they lapsed.
pub fn check_coupon(coupon: &Coupon, now: DateTime<Utc>, order_amount: i64) -> Result<(), ShopError> {
    if now < coupon.start_date || now > coupon.end_date {
        return Err(ShopError::validation("coupon expired"));
    }
    if coupon.used_count >= coupon.max_uses {
        return Err(ShopError::validation("coupon has no uses left"));
    }
    if order_amount < coupon.min_order_amount {
        return Err(ShopError::validation(format!(
            "order must be at least {}",
            coupon.min_order_amount
        )));
    }
    Ok(())
}

/// Idempotent expiry sweep. Runs at the start of every read path that
/// depends on coupon validity; there is no background scheduler.
pub async fn sweep_expired(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE coupons
           SET is_active = false
           WHERE is_active = true AND (end_date < NOW() OR used_count >= max_uses)"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"UPDATE user_coupons
           SET status = 'EXPIRED'
           WHERE status = 'RECEIVED'
             AND coupon_id IN (SELECT id FROM coupons WHERE is_active = false)"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_active_by_code(pool: &PgPool, code: &str) -> Result<Option<Coupon>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM coupons WHERE code = $1 AND is_active = true")
        .bind(code.to_uppercase())
        .fetch_optional(pool)
        .await?;

    row.map(|r| coupon_from_row(&r)).transpose()
}

/// Full validation without side effects, for the checkout preview
/// endpoint.
pub async fn validate_for_user(
    pool: &PgPool,
    user_id: &str,
    code: &str,
    order_amount: i64,
) -> Result<(Coupon, i64), ShopError> {
    sweep_expired(pool).await?;

    let coupon = find_active_by_code(pool, code)
        .await?
        .ok_or_else(|| ShopError::not_found("coupon not found or disabled"))?;

    check_coupon(&coupon, Utc::now(), order_amount)?;

    if find_usage(pool, user_id, coupon.id).await? == Some(UserCouponStatus::Used) {
        return Err(ShopError::conflict("coupon already used"));
    }

    let discount = discount_amount(coupon.coupon_type, coupon.value, order_amount);
    Ok((coupon, discount))
}

async fn find_usage(
    pool: &PgPool,
    user_id: &str,
    coupon_id: Uuid,
) -> Result<Option<UserCouponStatus>, sqlx::Error> {
    let row = sqlx::query("SELECT status FROM user_coupons WHERE user_id = $1 AND coupon_id = $2")
        .bind(user_id)
        .bind(coupon_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(r) => {
            let status: String = r.get("status");
            Ok(Some(status.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?))
        }
        None => Ok(None),
    }
}

/// Redeems a coupon inside the order-creation transaction: validates,
/// bumps `used_count` under the cap, and marks the user's claim USED.
/// Rolls back with the transaction if the order insert fails afterwards.
pub async fn redeem(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    code: &str,
    order_amount: i64,
) -> Result<CouponSnapshot, ShopError> {
    let row = sqlx::query("SELECT * FROM coupons WHERE code = $1 AND is_active = true FOR UPDATE")
        .bind(code.to_uppercase())
        .fetch_optional(&mut **tx)
        .await?;

    let coupon = match row {
        Some(r) => coupon_from_row(&r)?,
        None => return Err(ShopError::not_found("coupon not found or disabled")),
    };

    check_coupon(&coupon, Utc::now(), order_amount)?;

    let usage = sqlx::query("SELECT status FROM user_coupons WHERE user_id = $1 AND coupon_id = $2")
        .bind(user_id)
        .bind(coupon.id)
        .fetch_optional(&mut **tx)
        .await?;
    if let Some(r) = usage {
        let status: String = r.get("status");
        if status == UserCouponStatus::Used.as_str() {
            return Err(ShopError::conflict("coupon already used"));
        }
    }

    let bumped =
        sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE id = $1 AND used_count < max_uses")
            .bind(coupon.id)
            .execute(&mut **tx)
            .await?;
    if bumped.rows_affected() == 0 {
        return Err(ShopError::validation("coupon has no uses left"));
    }

    sqlx::query(
        r#"INSERT INTO user_coupons (user_id, coupon_id, status, used_at)
           VALUES ($1, $2, 'USED', NOW())
           ON CONFLICT (user_id, coupon_id)
           DO UPDATE SET status = 'USED', used_at = NOW()"#,
    )
    .bind(user_id)
    .bind(coupon.id)
    .execute(&mut **tx)
    .await?;

    let discount = discount_amount(coupon.coupon_type, coupon.value, order_amount);
    Ok(CouponSnapshot {
        code: coupon.code,
        coupon_type: coupon.coupon_type,
        value: coupon.value,
        discount_amount: discount,
    })
}

// ---- Claim-first flow ----

/// Claims a public coupon for later use. At most one claim per
/// (user, coupon); re-claims report a conflict.
pub async fn claim(pool: &PgPool, user_id: &str, coupon_id: Uuid) -> Result<(), ShopError> {
    sweep_expired(pool).await?;

    let row = sqlx::query("SELECT * FROM coupons WHERE id = $1 AND is_active = true")
        .bind(coupon_id)
        .fetch_optional(pool)
        .await?;
    let coupon = match row {
        Some(r) => coupon_from_row(&r)?,
        None => return Err(ShopError::not_found("coupon not found or disabled")),
    };

    let now = Utc::now();
    if now < coupon.start_date || now > coupon.end_date {
        return Err(ShopError::validation("coupon expired"));
    }

    let inserted = sqlx::query(
        r#"INSERT INTO user_coupons (user_id, coupon_id)
           VALUES ($1, $2)
           ON CONFLICT (user_id, coupon_id) DO NOTHING"#,
    )
    .bind(user_id)
    .bind(coupon_id)
    .execute(pool)
    .await?;
    if inserted.rows_affected() == 0 {
        return Err(ShopError::conflict("coupon already claimed"));
    }

    Ok(())
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimedCoupon {
    #[serde(flatten)]
    pub claim: UserCoupon,
    pub coupon: Coupon,
}

pub async fn list_claims(pool: &PgPool, user_id: &str) -> Result<Vec<ClaimedCoupon>, ShopError> {
    sweep_expired(pool).await?;

    let rows = sqlx::query(
        r#"SELECT uc.id, uc.user_id, uc.coupon_id, uc.status, uc.received_at, uc.used_at,
                  c.id AS c_id, c.code, c.type, c.value, c.start_date, c.end_date,
                  c.max_uses, c.used_count, c.min_order_amount, c.is_active, c.created_by
           FROM user_coupons uc
           JOIN coupons c ON c.id = uc.coupon_id
           WHERE uc.user_id = $1
           ORDER BY uc.received_at DESC"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for r in &rows {
        let coupon_type: String = r.try_get("type")?;
        out.push(ClaimedCoupon {
            claim: user_coupon_from_row(r)?,
            coupon: Coupon {
                id: r.try_get("c_id")?,
                code: r.try_get("code")?,
                coupon_type: coupon_type.parse().map_err(ShopError::Validation)?,
                value: r.try_get("value")?,
                start_date: r.try_get("start_date")?,
                end_date: r.try_get("end_date")?,
                max_uses: r.try_get("max_uses")?,
                used_count: r.try_get("used_count")?,
                min_order_amount: r.try_get("min_order_amount")?,
                is_active: r.try_get("is_active")?,
                created_by: r.try_get("created_by")?,
            },
        });
    }
    Ok(out)
}

// ---- Seller administration ----

pub struct CouponInput {
    pub code: String,
    pub coupon_type: CouponType,
    pub value: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_uses: i32,
    pub min_order_amount: i64,
}

/// Start snaps to 00:00:00 and end to 23:59:59 of the given calendar
/// dates.
pub fn window_bounds(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    let end = end.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc();
    (start, end)
}

pub fn validate_input(input: &CouponInput) -> Result<(), ShopError> {
    let (start, end) = window_bounds(input.start_date, input.end_date);
    if start >= end {
        return Err(ShopError::validation("end date must be after start date"));
    }
    if input.coupon_type == CouponType::Percentage && !(0..=100).contains(&input.value) {
        return Err(ShopError::validation("percentage value must be between 0 and 100"));
    }
    if input.max_uses <= 0 {
        return Err(ShopError::validation("max uses must be positive"));
    }
    Ok(())
}

pub async fn create(pool: &PgPool, created_by: &str, input: &CouponInput) -> Result<Coupon, ShopError> {
    validate_input(input)?;
    let (start, end) = window_bounds(input.start_date, input.end_date);

    let row = sqlx::query(
        r#"INSERT INTO coupons
           (code, type, value, start_date, end_date, max_uses, min_order_amount, created_by)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
           RETURNING *"#,
    )
    .bind(input.code.to_uppercase())
    .bind(input.coupon_type.as_str())
    .bind(input.value)
    .bind(start)
    .bind(end)
    .bind(input.max_uses)
    .bind(input.min_order_amount)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            ShopError::conflict("coupon code already exists")
        }
        other => ShopError::Db(other),
    })?;

    Ok(coupon_from_row(&row)?)
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Coupon>, ShopError> {
    sweep_expired(pool).await?;

    let rows = sqlx::query("SELECT * FROM coupons ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(coupon_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

/// Active coupons currently inside their window, for the public listing.
pub async fn list_public(pool: &PgPool) -> Result<Vec<Coupon>, ShopError> {
    sweep_expired(pool).await?;

    let rows = sqlx::query(
        r#"SELECT * FROM coupons
           WHERE is_active = true AND start_date <= NOW() AND end_date >= NOW()
           ORDER BY end_date ASC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(coupon_from_row)
        .collect::<Result<Vec<_>, _>>()?)
}

pub async fn update(pool: &PgPool, id: Uuid, input: &CouponInput, is_active: bool) -> Result<Coupon, ShopError> {
    validate_input(input)?;
    let (start, end) = window_bounds(input.start_date, input.end_date);

    let row = sqlx::query(
        r#"UPDATE coupons
           SET type = $2, value = $3, start_date = $4, end_date = $5,
               max_uses = $6, min_order_amount = $7, is_active = $8
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(input.coupon_type.as_str())
    .bind(input.value)
    .bind(start)
    .bind(end)
    .bind(input.max_uses)
    .bind(input.min_order_amount)
    .bind(is_active)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(r) => Ok(coupon_from_row(&r)?),
        None => Err(ShopError::not_found("coupon not found")),
    }
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ShopError> {
    let deleted = sqlx::query("DELETE FROM coupons WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ShopError::not_found("coupon not found"));
    }
    Ok(())
}
