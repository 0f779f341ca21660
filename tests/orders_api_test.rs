//! End-to-end tests for the order endpoints, driven through the router.

mod common;

use axum::{
    body::Body,
    http::{Method, Request},
};
use common::{response_json, TestApp, GATEWAY_SECRET};
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_orders::{models::PaymentMethod, services::payments::sign_gateway_payment};
use tower::ServiceExt;

#[tokio::test]
async fn placed_order_is_listed_with_actions() {
    let app = TestApp::new();
    let order = app.place_order("alice", PaymentMethod::Cod, dec!(250)).await;
    assert_eq!(order["orderStatus"], "pending");
    assert_eq!(order["paymentStatus"], "pending");
    assert_eq!(order["actions"]["cancel"], true);
    assert_eq!(order["actions"]["retryPayment"], false);

    let response = app
        .as_user("alice", Method::GET, "/api/user/orders", None)
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let others = app.as_user("bob", Method::GET, "/api/user/orders", None).await;
    assert_eq!(response_json(others).await["data"], json!([]));
}

#[tokio::test]
async fn identity_headers_are_required_and_ownership_enforced() {
    let app = TestApp::new();
    let order = app.place_order("alice", PaymentMethod::Cod, dec!(100)).await;
    let id = order["id"].as_str().unwrap();

    let anonymous = app
        .request(Method::GET, "/api/user/orders", None, None)
        .await;
    assert_eq!(anonymous.status(), 401);

    let stranger = app
        .as_user("mallory", Method::GET, &format!("/api/user/orders/{}", id), None)
        .await;
    assert_eq!(stranger.status(), 404);

    let not_admin = app
        .as_user("alice", Method::GET, "/api/admin/orders", None)
        .await;
    assert_eq!(not_admin.status(), 403);
}

#[tokio::test]
async fn cancelling_a_wallet_order_refunds_the_balance() {
    let app = TestApp::new();
    app.credit("alice", "500").await;
    let order = app.place_order("alice", PaymentMethod::Wallet, dec!(300)).await;
    assert_eq!(order["paymentStatus"], "paid");
    assert_eq!(order["actions"]["downloadInvoice"], true);

    let response = app
        .as_user(
            "alice",
            Method::POST,
            &format!("/api/user/orders/{}/cancel", order["id"].as_str().unwrap()),
            Some(json!({ "reason": "Changed my mind" })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["orderStatus"], "cancelled");
    assert_eq!(body["data"]["cancellationReason"], "Changed my mind");

    let wallet = app.as_user("alice", Method::GET, "/api/user/wallet", None).await;
    let wallet = response_json(wallet).await;
    assert_eq!(wallet["data"]["balance"], "500");
    assert_eq!(wallet["data"]["transactions"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn admin_transitions_are_validated() {
    let app = TestApp::new();
    let order = app.place_order("alice", PaymentMethod::Cod, dec!(100)).await;
    let id = order["id"].as_str().unwrap();

    let skip = app.set_status(id, "delivered").await;
    assert_eq!(skip.status(), 400);
    let body = response_json(skip).await;
    assert_eq!(body["success"], false);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Cannot transition from status 'pending' to 'delivered'"));

    let unknown = app.set_status(id, "teleported").await;
    assert_eq!(unknown.status(), 400);

    let confirmed = app.set_status(id, "confirmed").await;
    assert_eq!(confirmed.status(), 200);
    let body = response_json(confirmed).await;
    assert_eq!(body["data"]["orderStatus"], "confirmed");
    assert_eq!(body["data"]["actions"]["advance"]["label"], "Mark as Shipped");
}

#[tokio::test]
async fn delivered_order_accepts_a_multipart_return() {
    let app = TestApp::new();
    let order = app.place_order("alice", PaymentMethod::Cod, dec!(400)).await;
    let id = order["id"].as_str().unwrap();
    for status in ["confirmed", "shipped", "delivered"] {
        assert_eq!(app.set_status(id, status).await.status(), 200);
    }

    let boundary = "storefront-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"reason\"\r\n\r\nArrived cracked\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"crack.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\nnot-really-a-jpeg\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/user/orders/{}/return", id))
        .header("x-user-id", "alice")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let response = storefront_orders::build_router(app.state.clone())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = response_json(response).await;
    assert_eq!(body["data"]["orderStatus"], "return_requested");
    assert_eq!(body["data"]["returnReason"], "Arrived cracked");
    assert_eq!(body["data"]["returnAttachments"], json!(["crack.jpg"]));

    let returned = app.set_status(id, "returned").await;
    assert_eq!(returned.status(), 200);
    let wallet = response_json(app.as_user("alice", Method::GET, "/api/user/wallet", None).await).await;
    assert_eq!(wallet["data"]["balance"], "400");
}

#[tokio::test]
async fn gateway_payment_round_trip() {
    let app = TestApp::new();
    let order = app.place_order("alice", PaymentMethod::Razorpay, dec!(199.99)).await;
    let id = order["id"].as_str().unwrap();

    let created = app
        .as_user(
            "alice",
            Method::POST,
            "/api/user/payments/razorpay/order",
            Some(json!({ "orderId": id })),
        )
        .await;
    assert_eq!(created.status(), 200);
    let session = response_json(created).await["data"].clone();
    assert_eq!(session["amount"], 19999);
    let gateway_order_id = session["gatewayOrderId"].as_str().unwrap();

    let verified = app
        .as_user(
            "alice",
            Method::POST,
            "/api/user/payments/razorpay/verify",
            Some(json!({
                "orderId": id,
                "razorpayOrderId": gateway_order_id,
                "razorpayPaymentId": "pay_42",
                "razorpaySignature": sign_gateway_payment(GATEWAY_SECRET, gateway_order_id, "pay_42"),
            })),
        )
        .await;
    assert_eq!(verified.status(), 200);
    let body = response_json(verified).await;
    assert_eq!(body["data"]["paymentStatus"], "paid");
    assert_eq!(body["data"]["orderStatus"], "confirmed");
}

#[tokio::test]
async fn bad_signature_fails_payment_and_offers_retry() {
    let app = TestApp::new();
    let order = app.place_order("alice", PaymentMethod::Razorpay, dec!(80)).await;
    let id = order["id"].as_str().unwrap();

    let session = response_json(
        app.as_user(
            "alice",
            Method::POST,
            "/api/user/payments/razorpay/order",
            Some(json!({ "orderId": id })),
        )
        .await,
    )
    .await["data"]
        .clone();

    let rejected = app
        .as_user(
            "alice",
            Method::POST,
            "/api/user/payments/razorpay/verify",
            Some(json!({
                "orderId": id,
                "razorpayOrderId": session["gatewayOrderId"],
                "razorpayPaymentId": "pay_1",
                "razorpaySignature": "00ff",
            })),
        )
        .await;
    assert_eq!(rejected.status(), 402);

    let current = response_json(
        app.as_user("alice", Method::GET, &format!("/api/user/orders/{}", id), None)
            .await,
    )
    .await["data"]
        .clone();
    assert_eq!(current["paymentStatus"], "failed");
    assert_eq!(current["actions"]["retryPayment"], true);
    assert_eq!(current["actions"]["cancel"], true);
    assert_eq!(current["actions"]["return"], false);
    assert_eq!(current["actions"]["downloadInvoice"], false);
}

#[tokio::test]
async fn wallet_retry_without_funds_leaves_order_unchanged() {
    let app = TestApp::new();
    let order = app.place_order("alice", PaymentMethod::Razorpay, dec!(120)).await;
    let id = order["id"].as_str().unwrap();

    let opened = app
        .as_user(
            "alice",
            Method::POST,
            "/api/user/payments/razorpay/order",
            Some(json!({ "orderId": id })),
        )
        .await;
    assert_eq!(opened.status(), 200);

    let failed = app
        .as_user(
            "alice",
            Method::POST,
            "/api/user/payments/razorpay/failure",
            Some(json!({ "orderId": id, "reason": "card declined" })),
        )
        .await;
    assert_eq!(failed.status(), 200);

    let retry_uri = format!("/api/user/orders/{}/retry-payment", id);
    let short = app
        .as_user("alice", Method::POST, &retry_uri, Some(json!({ "paymentMethod": "wallet" })))
        .await;
    assert_eq!(short.status(), 422);

    let current = response_json(
        app.as_user("alice", Method::GET, &format!("/api/user/orders/{}", id), None)
            .await,
    )
    .await["data"]
        .clone();
    assert_eq!(current["paymentStatus"], "failed");
    assert_eq!(current["paymentMethod"], "razorpay");

    app.credit("alice", "120").await;
    let paid = app
        .as_user("alice", Method::POST, &retry_uri, Some(json!({ "paymentMethod": "wallet" })))
        .await;
    assert_eq!(paid.status(), 200);
    let body = response_json(paid).await;
    assert_eq!(body["data"]["paymentStatus"], "paid");
    assert_eq!(body["data"]["paymentMethod"], "wallet");
}

#[tokio::test]
async fn coupons_health_and_metrics_are_served() {
    let app = TestApp::new();

    let coupons = response_json(app.as_user("alice", Method::GET, "/api/user/coupons", None).await).await;
    let codes: Vec<&str> = coupons["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["code"].as_str())
        .collect();
    assert_eq!(codes, vec!["FLAT100", "WELCOME10"]);

    let health = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(health.status(), 200);
    assert_eq!(response_json(health).await["status"], "up");

    app.place_order("alice", PaymentMethod::Cod, dec!(10)).await;
    let metrics = app.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(metrics.status(), 200);
    let bytes = axum::body::to_bytes(metrics.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("orders_placed_total"));
}

#[tokio::test]
async fn malformed_requests_get_json_error_envelopes() {
    let app = TestApp::new();

    let broken = Request::builder()
        .method(Method::POST)
        .uri("/api/user/orders")
        .header("x-user-id", "alice")
        .header("content-type", "application/json")
        .body(Body::from("{\"items\": [ oops"))
        .unwrap();
    let response = storefront_orders::build_router(app.state.clone())
        .oneshot(broken)
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().starts_with("Bad request"));

    let bad_id = app
        .as_user("alice", Method::GET, "/api/user/orders/not-a-uuid", None)
        .await;
    assert_eq!(bad_id.status(), 400);
    assert_eq!(response_json(bad_id).await["success"], false);

    let unknown = app.as_user("alice", Method::GET, "/api/user/nowhere", None).await;
    assert_eq!(unknown.status(), 404);
    assert_eq!(response_json(unknown).await["success"], false);
}

#[tokio::test]
async fn failure_report_is_refused_for_cash_on_delivery() {
    let app = TestApp::new();
    let order = app.place_order("alice", PaymentMethod::Cod, dec!(75)).await;
    let id = order["id"].as_str().unwrap();

    let report = app
        .as_user(
            "alice",
            Method::POST,
            "/api/user/payments/razorpay/failure",
            Some(json!({ "orderId": id, "reason": "dismissed" })),
        )
        .await;
    assert_eq!(report.status(), 400);

    for status in ["confirmed", "shipped", "delivered"] {
        assert_eq!(app.set_status(id, status).await.status(), 200);
    }
    let current = response_json(
        app.as_user("alice", Method::GET, &format!("/api/user/orders/{}", id), None)
            .await,
    )
    .await;
    assert_eq!(current["data"]["paymentStatus"], "paid");
}
