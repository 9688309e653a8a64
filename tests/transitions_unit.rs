use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use storefront_backend::coupons::{self, CouponInput};
use storefront_backend::models::{Coupon, CouponType, OrderStatus, PaymentMethod, PaymentStatus};
use storefront_backend::orders::derived_payment_status;
use storefront_backend::ranks::{determine_rank, rank_progress, Rank};

fn active_coupon(coupon_type: CouponType, value: i64) -> Coupon {
    let now = Utc::now();
    Coupon {
        id: Uuid::new_v4(),
        code: "TESTCODE".to_string(),
        coupon_type,
        value,
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(7),
        max_uses: 100,
        used_count: 0,
        min_order_amount: 0,
        is_active: true,
        created_by: "seller-1".to_string(),
    }
}

// ---- Order lifecycle ----

#[test]
fn pending_orders_move_to_processing_or_cancelled_only() {
    use OrderStatus::*;
    assert!(Pending.can_transition_to(Processing));
    assert!(Pending.can_transition_to(Cancelled));
    assert!(!Pending.can_transition_to(Delivered));
    assert!(!Pending.can_transition_to(Pending));
}

#[test]
fn processing_orders_move_to_delivered_or_cancelled_only() {
    use OrderStatus::*;
    assert!(Processing.can_transition_to(Delivered));
    assert!(Processing.can_transition_to(Cancelled));
    assert!(!Processing.can_transition_to(Pending));
    assert!(!Processing.can_transition_to(Processing));
}

#[test]
fn delivered_and_cancelled_are_absorbing() {
    use OrderStatus::*;
    for terminal in [Delivered, Cancelled] {
        assert!(terminal.is_terminal());
        for next in [Pending, Processing, Delivered, Cancelled] {
            assert!(!terminal.can_transition_to(next));
        }
    }
    assert!(!Pending.is_terminal());
    assert!(!Processing.is_terminal());
}

// ---- Derived payment status ----

#[test]
fn cod_delivery_settles_the_payment() {
    assert_eq!(
        derived_payment_status(PaymentMethod::Cod, PaymentStatus::Pending, OrderStatus::Delivered),
        Some(PaymentStatus::Paid)
    );
}

#[test]
fn cod_cancellation_fails_the_payment() {
    assert_eq!(
        derived_payment_status(PaymentMethod::Cod, PaymentStatus::Pending, OrderStatus::Cancelled),
        Some(PaymentStatus::Failed)
    );
}

#[test]
fn vnpay_cancellation_depends_on_whether_money_moved() {
    assert_eq!(
        derived_payment_status(PaymentMethod::Vnpay, PaymentStatus::Pending, OrderStatus::Cancelled),
        Some(PaymentStatus::Failed)
    );
    assert_eq!(
        derived_payment_status(PaymentMethod::Vnpay, PaymentStatus::Paid, OrderStatus::Cancelled),
        Some(PaymentStatus::RefundPending)
    );
    assert_eq!(
        derived_payment_status(PaymentMethod::Vnpay, PaymentStatus::Failed, OrderStatus::Cancelled),
        None
    );
}

#[test]
fn non_terminal_transitions_leave_payment_untouched() {
    assert_eq!(
        derived_payment_status(PaymentMethod::Cod, PaymentStatus::Pending, OrderStatus::Processing),
        None
    );
    assert_eq!(
        derived_payment_status(PaymentMethod::Vnpay, PaymentStatus::Paid, OrderStatus::Delivered),
        None
    );
}

// ---- Discount math ----

#[test]
fn percentage_discount_floors_fractional_amounts() {
    assert_eq!(coupons::discount_amount(CouponType::Percentage, 10, 600_000), 60_000);
    assert_eq!(coupons::discount_amount(CouponType::Percentage, 10, 999), 99);
    assert_eq!(coupons::discount_amount(CouponType::Percentage, 0, 600_000), 0);
    assert_eq!(coupons::discount_amount(CouponType::Percentage, 100, 600_000), 600_000);
}

#[test]
fn fixed_discount_is_clamped_to_the_order_amount() {
    assert_eq!(coupons::discount_amount(CouponType::FixedAmount, 50_000, 600_000), 50_000);
    assert_eq!(coupons::discount_amount(CouponType::FixedAmount, 1_000_000, 600_000), 600_000);
}

#[test]
fn coupon_checks_cover_window_cap_and_minimum() {
    let now = Utc::now();
    let coupon = active_coupon(CouponType::Percentage, 10);
    assert!(coupons::check_coupon(&coupon, now, 600_000).is_ok());

    let mut early = coupon.clone();
    early.start_date = now + Duration::days(1);
    assert!(coupons::check_coupon(&early, now, 600_000).is_err());

    let mut lapsed = coupon.clone();
    lapsed.end_date = now - Duration::seconds(1);
    assert!(coupons::check_coupon(&lapsed, now, 600_000).is_err());

    let mut exhausted = coupon.clone();
    exhausted.used_count = exhausted.max_uses;
    assert!(coupons::check_coupon(&exhausted, now, 600_000).is_err());

    let mut pricey = coupon.clone();
    pricey.min_order_amount = 1_000_000;
    assert!(coupons::check_coupon(&pricey, now, 600_000).is_err());
    assert!(coupons::check_coupon(&pricey, now, 1_000_000).is_ok());
}

// ---- Seller input validation ----

fn input(start: NaiveDate, end: NaiveDate) -> CouponInput {
    CouponInput {
        code: "SUMMER10".to_string(),
        coupon_type: CouponType::Percentage,
        value: 10,
        start_date: start,
        end_date: end,
        max_uses: 100,
        min_order_amount: 0,
    }
}

#[test]
fn coupon_window_snaps_to_day_bounds() {
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let (lo, hi) = coupons::window_bounds(start, end);

    assert_eq!(lo.to_rfc3339(), "2024-06-01T00:00:00+00:00");
    assert_eq!(hi.to_rfc3339(), "2024-06-30T23:59:59+00:00");
}

#[test]
fn a_single_day_window_is_valid() {
    let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    assert!(coupons::validate_input(&input(day, day)).is_ok());
}

#[test]
fn inverted_windows_are_rejected() {
    let start = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    assert!(coupons::validate_input(&input(start, end)).is_err());
}

#[test]
fn percentage_values_over_100_are_rejected() {
    let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let mut bad = input(day, day);
    bad.value = 150;
    assert!(coupons::validate_input(&bad).is_err());
}

#[test]
fn non_positive_max_uses_is_rejected() {
    let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let mut bad = input(day, day);
    bad.max_uses = 0;
    assert!(coupons::validate_input(&bad).is_err());
}

// ---- Rank ladder ----

#[test]
fn rank_thresholds_partition_lifetime_spend() {
    assert_eq!(determine_rank(0), Rank::Iron);
    assert_eq!(determine_rank(4_999_999), Rank::Iron);
    assert_eq!(determine_rank(5_000_000), Rank::Bronze);
    assert_eq!(determine_rank(14_999_999), Rank::Bronze);
    assert_eq!(determine_rank(15_000_000), Rank::Silver);
    assert_eq!(determine_rank(30_000_000), Rank::Gold);
    assert_eq!(determine_rank(50_000_000), Rank::Platinum);
    assert_eq!(determine_rank(80_000_000), Rank::Diamond);
    assert_eq!(determine_rank(1_000_000_000), Rank::Diamond);
}

#[test]
fn rank_progress_interpolates_between_tiers() {
    assert_eq!(rank_progress(0, Rank::Iron), 0);
    assert_eq!(rank_progress(2_500_000, Rank::Iron), 50);
    assert_eq!(rank_progress(10_000_000, Rank::Bronze), 50);
    assert_eq!(rank_progress(80_000_000, Rank::Diamond), 100);
    assert_eq!(rank_progress(500_000_000, Rank::Diamond), 100);
}
