use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::orders::create_order,
        crate::api::orders::verify_payment,
        crate::api::payments::create_vnpay_payment,
        crate::api::coupons::validate_coupon
    ),
    components(
        schemas(
            crate::api::orders::CreateOrderRequest,
            crate::api::orders::VerifyPaymentRequest,
            crate::api::payments::CreatePaymentRequest,
            crate::api::coupons::ValidateCouponRequest,
            crate::pricing::LineItem,
            crate::models::Order,
            crate::models::OrderItem,
            crate::models::Coupon,
            crate::models::CouponSnapshot,
            crate::models::PaymentDetails
        )
    ),
    tags(
        (name = "orders", description = "Order creation and payment reconciliation"),
        (name = "payments", description = "VNPay gateway redirects"),
        (name = "coupons", description = "Coupon validation and claims")
    )
)]
pub struct ApiDoc;
