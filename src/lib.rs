//! Storefront order lifecycle library
//!
//! The REST service that owns orders, wallets and coupons, plus the typed
//! storefront client and the client-side flows built on it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod models;
pub mod services;
pub mod storefront;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::{sync::Arc, time::Duration};

/// Upper bound for multipart return uploads.
const RETURN_UPLOAD_LIMIT_BYTES: usize = 10 * 1024 * 1024;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: services::AppServices,
    pub health: health::HealthState,
}

impl AppState {
    pub fn new(config: config::AppConfig, event_sender: events::EventSender) -> Self {
        let event_sender = Arc::new(event_sender);
        let services = services::AppServices::new(&config, event_sender.clone());
        Self {
            config,
            event_sender,
            services,
            health: health::HealthState::default(),
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Customer and admin routes, mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    let user_orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order))
        .route(
            "/orders/:id/return",
            post(handlers::orders::request_return)
                .layer(DefaultBodyLimit::max(RETURN_UPLOAD_LIMIT_BYTES)),
        )
        .route(
            "/orders/:id/retry-payment",
            post(handlers::orders::retry_payment),
        );

    let user_payments = Router::new()
        .route(
            "/payments/razorpay/order",
            post(handlers::payments::create_gateway_order),
        )
        .route(
            "/payments/razorpay/verify",
            post(handlers::payments::verify_payment),
        )
        .route(
            "/payments/razorpay/failure",
            post(handlers::payments::report_failure),
        );

    let user_account = Router::new()
        .route("/wallet", get(handlers::wallet::get_wallet))
        .route("/coupons", get(handlers::coupons::list_coupons));

    let admin = Router::new()
        .route("/orders", get(handlers::admin::list_orders))
        .route(
            "/orders/:id/status",
            patch(handlers::admin::update_order_status),
        )
        .route(
            "/wallets/:user_id/credit",
            post(handlers::admin::credit_wallet),
        );

    Router::new()
        .nest(
            "/user",
            user_orders.merge(user_payments).merge(user_account),
        )
        .nest("/admin", admin)
}

/// Full application router: API, health, metrics and the request layers.
///
/// CORS is left to the caller since it depends on deployment configuration.
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/metrics",
            get(|| async move {
                match metrics::metrics_handler().await {
                    Ok(body) => (StatusCode::OK, body),
                    Err(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        String::from("metrics error"),
                    ),
                }
            }),
        )
        .nest("/api", api_routes())
        .fallback(route_not_found)
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn_with_state(timeout, enforce_timeout))
        .layer(axum::middleware::from_fn(request_logging_middleware))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> errors::ServiceError {
    errors::ServiceError::NotFound(format!("No route for {}", uri.path()))
}

/// Answers with a 408 envelope when the handler outlives the configured limit.
async fn enforce_timeout(
    State(limit): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let uri = request.uri().clone();
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            ::tracing::warn!(uri = %uri, limit_secs = limit.as_secs(), "Request timed out");
            errors::ServiceError::Timeout(format!("no response within {}s", limit.as_secs()))
                .into_response()
        }
    }
}

// Request logging middleware
async fn request_logging_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    ::tracing::debug!(method = %method, uri = %uri, "Incoming request");

    let response = next.run(request).await;

    ::tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}
