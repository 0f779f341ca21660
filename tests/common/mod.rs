#![allow(dead_code)]

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use storefront_orders::{
    build_router, config::AppConfig, events, events::EventSender, models::PaymentMethod, AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const GATEWAY_SECRET: &str = "development_gateway_secret_do_not_ship";

/// Router plus state over fresh in-memory stores.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub fn new() -> Self {
        let mut cfg = AppConfig::new("127.0.0.1".to_string(), 0, "test".to_string());
        cfg.seed_coupons = true;

        let (tx, rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(rx));
        let state = AppState::new(cfg, EventSender::new(tx));

        Self {
            router: build_router(state.clone()),
            state,
            _event_task: event_task,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        identity: Option<(&str, &str)>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user, role)) = identity {
            builder = builder.header("x-user-id", user).header("x-user-role", role);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn as_user(&self, user: &str, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some((user, "user"))).await
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(("admin-1", "admin")))
            .await
    }

    /// Places a single-line order and returns its JSON view.
    pub async fn place_order(&self, user: &str, method: PaymentMethod, price: Decimal) -> Value {
        let response = self
            .as_user(
                user,
                Method::POST,
                "/api/user/orders",
                Some(json!({
                    "items": [{
                        "productId": "sku-1",
                        "productName": "Ceramic mug",
                        "quantity": 1,
                        "price": price.to_string(),
                    }],
                    "paymentMethod": method,
                })),
            )
            .await;
        assert_eq!(response.status(), 201, "order placement failed");
        response_json(response).await["data"].clone()
    }

    pub async fn set_status(&self, order_id: &str, status: &str) -> Response {
        self.as_admin(
            Method::PATCH,
            &format!("/api/admin/orders/{}/status", order_id),
            Some(json!({ "status": status })),
        )
        .await
    }

    pub async fn credit(&self, user: &str, amount: &str) {
        let response = self
            .as_admin(
                Method::POST,
                &format!("/api/admin/wallets/{}/credit", user),
                Some(json!({ "amount": amount, "reason": "test top-up" })),
            )
            .await;
        assert_eq!(response.status(), 200, "wallet credit failed");
    }
}

/// Serves the full application on an ephemeral port for HTTP client tests.
pub async fn spawn_server() -> (String, AppState) {
    let app = TestApp::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener address");
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .expect("test server failed");
    });
    (format!("http://{}", addr), app.state)
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
