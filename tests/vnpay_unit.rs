use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use storefront_backend::vnpay::{self, VnpayConfig};

fn config() -> VnpayConfig {
    VnpayConfig {
        tmn_code: "TESTTMN1".to_string(),
        hash_secret: "test-vnpay-secret".to_string(),
        gateway_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
        return_url: "http://localhost:8080/api/payments/vnpay-return".to_string(),
    }
}

fn signed_params(secret: &str, pairs: &[(&str, &str)]) -> HashMap<String, String> {
    let unsigned: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let signature = vnpay::sign(secret, &vnpay::canonical_query(&unsigned));

    let mut params: HashMap<String, String> = unsigned.into_iter().collect();
    params.insert("vnp_SecureHash".to_string(), signature);
    params
}

#[test]
fn canonical_query_sorts_and_encodes_spaces_as_plus() {
    let params = vec![
        (
            "vnp_OrderInfo".to_string(),
            "Thanh toan cho ma GD:abc".to_string(),
        ),
        ("vnp_Amount".to_string(), "54000000".to_string()),
        ("vnp_Command".to_string(), "pay".to_string()),
    ];

    assert_eq!(
        vnpay::canonical_query(&params),
        "vnp_Amount=54000000&vnp_Command=pay&vnp_OrderInfo=Thanh+toan+cho+ma+GD%3Aabc"
    );
}

#[test]
fn canonical_query_is_order_independent() {
    let a = vec![
        ("b".to_string(), "2".to_string()),
        ("a".to_string(), "1".to_string()),
    ];
    let b = vec![
        ("a".to_string(), "1".to_string()),
        ("b".to_string(), "2".to_string()),
    ];

    assert_eq!(vnpay::canonical_query(&a), vnpay::canonical_query(&b));
}

#[test]
fn verify_accepts_a_correctly_signed_callback() {
    let mut params = signed_params(
        "test-vnpay-secret",
        &[
            ("vnp_ResponseCode", "00"),
            ("vnp_TxnRef", "05102030"),
            ("vnp_Amount", "54000000"),
            ("vnp_OrderInfo", "Thanh toan cho ma GD:abc"),
        ],
    );
    // The hash-type marker is excluded from signing on both sides.
    params.insert("vnp_SecureHashType".to_string(), "HmacSHA512".to_string());

    assert!(vnpay::verify_signature("test-vnpay-secret", &params).is_ok());
}

#[test]
fn verify_rejects_a_tampered_parameter() {
    let mut params = signed_params(
        "test-vnpay-secret",
        &[("vnp_ResponseCode", "24"), ("vnp_TxnRef", "05102030")],
    );
    params.insert("vnp_ResponseCode".to_string(), "00".to_string());

    assert!(vnpay::verify_signature("test-vnpay-secret", &params).is_err());
}

#[test]
fn verify_rejects_a_missing_or_malformed_hash() {
    let mut params: HashMap<String, String> = HashMap::new();
    params.insert("vnp_ResponseCode".to_string(), "00".to_string());
    assert!(vnpay::verify_signature("test-vnpay-secret", &params).is_err());

    params.insert("vnp_SecureHash".to_string(), "not-hex".to_string());
    assert!(vnpay::verify_signature("test-vnpay-secret", &params).is_err());
}

#[test]
fn verify_rejects_a_wrong_secret() {
    let params = signed_params("some-other-secret", &[("vnp_ResponseCode", "00")]);
    assert!(vnpay::verify_signature("test-vnpay-secret", &params).is_err());
}

#[test]
fn payment_url_carries_minor_units_and_timestamps() {
    let cfg = config();
    let order_id = Uuid::new_v4();
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap();

    let url = vnpay::build_payment_url(&cfg, order_id, 540_000, "1.2.3.4", now);

    assert!(url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));
    assert!(url.contains("vnp_Amount=54000000"));
    assert!(url.contains("vnp_TxnRef=05102030"));
    assert!(url.contains("vnp_CreateDate=20240305102030"));
    assert!(url.contains(&format!("GD%3A{order_id}")));
    assert!(url.contains("&vnp_SecureHash="));
}

#[test]
fn payment_url_signature_verifies_after_decoding() {
    let cfg = config();
    let now = Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap();
    let url = vnpay::build_payment_url(&cfg, Uuid::new_v4(), 540_000, "1.2.3.4", now);

    let query = url.split_once('?').expect("query string").1;
    let params: HashMap<String, String> = query
        .split('&')
        .map(|pair| {
            let (k, v) = pair.split_once('=').expect("key=value");
            let decoded = urlencoding::decode(&v.replace('+', " "))
                .expect("valid encoding")
                .into_owned();
            (k.to_string(), decoded)
        })
        .collect();

    assert!(vnpay::verify_signature(&cfg.hash_secret, &params).is_ok());
}

#[test]
fn order_id_parses_out_of_the_order_info_field() {
    let id = Uuid::new_v4();
    let info = format!("{}{id}", vnpay::ORDER_INFO_PREFIX);
    assert_eq!(vnpay::extract_order_id(&info).unwrap(), id);

    // Gateways sometimes pad the free-text field with whitespace.
    let padded = format!("{} {id} ", vnpay::ORDER_INFO_PREFIX);
    assert_eq!(vnpay::extract_order_id(&padded).unwrap(), id);
}

#[test]
fn order_info_without_the_prefix_is_rejected() {
    let id = Uuid::new_v4();
    assert!(vnpay::extract_order_id(&id.to_string()).is_err());
    assert!(vnpay::extract_order_id("Thanh toan don hang:abc").is_err());
}

#[test]
fn order_info_with_a_malformed_id_is_rejected() {
    let info = format!("{}not-a-uuid", vnpay::ORDER_INFO_PREFIX);
    assert!(vnpay::extract_order_id(&info).is_err());

    let injected = format!("{}'; DROP TABLE orders; --", vnpay::ORDER_INFO_PREFIX);
    assert!(vnpay::extract_order_id(&injected).is_err());
}
