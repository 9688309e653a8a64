use sqlx::PgPool;
use std::env;
use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use storefront_backend::vnpay::VnpayConfig;
use storefront_backend::AppState;

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Recreates the test database and runs migrations. Returns None when
/// TEST_DATABASE_URL is not set, so the suite can run without a local
/// Postgres.
pub async fn init_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let test_url = match env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => return None,
    };
    let (admin_url, db_name) = split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(424242)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    let create_result = sqlx::query(&create_sql).execute(&admin_pool).await;
    if let Err(e) = create_result {
        eprintln!("create test db error: {e}");
        let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
        sqlx::query(&create_sql)
            .execute(&admin_pool)
            .await
            .expect("create test db retry");
    }

    let _ = sqlx::query("SELECT pg_advisory_unlock(424242)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    Some(TestDb { pool, _guard: guard })
}

pub fn build_state(pool: PgPool) -> AppState {
    AppState {
        pool,
        jwt_secret: "test-secret".to_string(),
        client_url: "http://localhost:5173".to_string(),
        vnpay: VnpayConfig {
            tmn_code: "TESTTMN1".to_string(),
            hash_secret: "test-vnpay-secret".to_string(),
            gateway_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:8080/api/payments/vnpay-return".to_string(),
        },
    }
}

pub async fn insert_product(pool: &PgPool, name: &str, offer_price: i64) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO products (name, offer_price) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(offer_price)
    .fetch_one(pool)
    .await
    .expect("insert product")
}

pub async fn insert_address(pool: &PgPool, user_id: &str) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO addresses (user_id, line, city) VALUES ($1, '1 Test St', 'Hanoi') RETURNING id",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("insert address")
}

pub async fn insert_cart_item(pool: &PgPool, user_id: &str, product_id: Uuid, quantity: i32) {
    sqlx::query("INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(pool)
        .await
        .expect("insert cart item");
}

pub async fn cart_size(pool: &PgPool, user_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("count cart items")
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_coupon(
    pool: &PgPool,
    code: &str,
    coupon_type: &str,
    value: i64,
    max_uses: i32,
    min_order_amount: i64,
    days_from_now: i64,
    days_until_end: i64,
) -> Uuid {
    sqlx::query_scalar(
        r#"INSERT INTO coupons
           (code, type, value, start_date, end_date, max_uses, min_order_amount, created_by)
           VALUES ($1, $2, $3,
                   NOW() + make_interval(days => $4::int),
                   NOW() + make_interval(days => $5::int),
                   $6, $7, 'seller-1')
           RETURNING id"#,
    )
    .bind(code)
    .bind(coupon_type)
    .bind(value)
    .bind(days_from_now as i32)
    .bind(days_until_end as i32)
    .bind(max_uses)
    .bind(min_order_amount)
    .fetch_one(pool)
    .await
    .expect("insert coupon")
}

pub async fn coupon_used_count(pool: &PgPool, code: &str) -> i32 {
    sqlx::query_scalar("SELECT used_count FROM coupons WHERE code = $1")
        .bind(code)
        .fetch_one(pool)
        .await
        .expect("select used_count")
}
