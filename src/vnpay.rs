// src/vnpay.rs
//
// VNPay gateway adapter: canonical parameter encoding, HMAC-SHA512
// signing, outbound redirect-URL construction, and inbound callback
// verification. The canonical form sorts parameters by their encoded key
// and replaces %20 with '+', matching what the gateway signs.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::ShopError;

/// Fixed prefix the gateway protocol forces into the free-text order-info
/// field; the order id rides behind it.
pub const ORDER_INFO_PREFIX: &str = "Thanh toan cho ma GD:";

pub const RESPONSE_CODE_SUCCESS: &str = "00";

#[derive(Clone)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub gateway_url: String,
    pub return_url: String,
}

fn encode_component(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}

/// Sorted, encoded `k=v&...` string used both for signing and for the
/// final query.
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode_component(k), encode_component(v)))
        .collect();
    encoded.sort_by(|a, b| a.0.cmp(&b.0));

    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sign(secret: &str, data: &str) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Builds the signed redirect URL the client is sent to. The gateway works
/// in minor units ×100, applied here and nowhere else.
pub fn build_payment_url(
    cfg: &VnpayConfig,
    order_id: Uuid,
    amount: i64,
    ip_addr: &str,
    now: DateTime<Utc>,
) -> String {
    let txn_ref = now.format("%d%H%M%S").to_string();
    let create_date = now.format("%Y%m%d%H%M%S").to_string();

    let params = vec![
        ("vnp_Version".to_string(), "2.1.0".to_string()),
        ("vnp_Command".to_string(), "pay".to_string()),
        ("vnp_TmnCode".to_string(), cfg.tmn_code.clone()),
        ("vnp_Locale".to_string(), "vn".to_string()),
        ("vnp_CurrCode".to_string(), "VND".to_string()),
        ("vnp_TxnRef".to_string(), txn_ref),
        (
            "vnp_OrderInfo".to_string(),
            format!("{ORDER_INFO_PREFIX}{order_id}"),
        ),
        ("vnp_OrderType".to_string(), "billpayment".to_string()),
        ("vnp_Amount".to_string(), (amount * 100).to_string()),
        ("vnp_ReturnUrl".to_string(), cfg.return_url.clone()),
        ("vnp_IpAddr".to_string(), ip_addr.to_string()),
        ("vnp_CreateDate".to_string(), create_date),
    ];

    let canonical = canonical_query(&params);
    let signature = sign(&cfg.hash_secret, &canonical);

    format!("{}?{}&vnp_SecureHash={}", cfg.gateway_url, canonical, signature)
}

/// Recomputes the signature over every parameter except the signature
/// fields themselves and compares in constant time. Forged success
/// redirects die here.
pub fn verify_signature(secret: &str, params: &HashMap<String, String>) -> Result<(), ShopError> {
    let supplied = params.get("vnp_SecureHash").ok_or(ShopError::Signature)?;
    let supplied = hex::decode(supplied).map_err(|_| ShopError::Signature)?;

    let rest: Vec<(String, String)> = params
        .iter()
        .filter(|(k, _)| k.as_str() != "vnp_SecureHash" && k.as_str() != "vnp_SecureHashType")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let canonical = canonical_query(&rest);
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(canonical.as_bytes());
    mac.verify_slice(&supplied).map_err(|_| ShopError::Signature)
}

/// Strict prefix-stripping of the order id out of `vnp_OrderInfo`; the
/// parsed id must be a well-formed UUID before any lookup.
pub fn extract_order_id(order_info: &str) -> Result<Uuid, ShopError> {
    let raw = order_info
        .strip_prefix(ORDER_INFO_PREFIX)
        .ok_or_else(|| ShopError::validation("malformed order info"))?
        .trim();

    Uuid::parse_str(raw).map_err(|_| ShopError::validation("malformed order id in order info"))
}
