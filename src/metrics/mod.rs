//! Prometheus counters for the order lifecycle, exported at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ORDERS_PLACED: IntCounterVec = register_counter_vec(
        "orders_placed_total",
        "Total number of orders placed",
        &["payment_method"]
    );
    pub static ref ORDER_CANCELLATIONS: IntCounter =
        register_counter("order_cancellations_total", "Total number of order cancellations");
    pub static ref ORDER_RETURNS: IntCounter =
        register_counter("order_returns_requested_total", "Total number of return requests");
    pub static ref ORDER_STATUS_UPDATES: IntCounterVec = register_counter_vec(
        "order_status_updates_total",
        "Admin status updates by target status",
        &["status"]
    );
    pub static ref PAYMENT_RETRIES: IntCounterVec = register_counter_vec(
        "payment_retries_total",
        "Payment retry attempts by method",
        &["payment_method"]
    );
    pub static ref PAYMENT_VERIFICATIONS: IntCounterVec = register_counter_vec(
        "payment_verifications_total",
        "Gateway signature verifications by outcome",
        &["outcome"]
    );
}

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric can be created");
    if let Err(e) = REGISTRY.register(Box::new(counter.clone())) {
        tracing::warn!("failed to register metric {}: {}", name, e);
    }
    counter
}

fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), labels).expect("metric can be created");
    if let Err(e) = REGISTRY.register(Box::new(counter.clone())) {
        tracing::warn!("failed to register metric {}: {}", name, e);
    }
    counter
}

/// Renders every registered metric in the Prometheus text format.
pub async fn metrics_handler() -> Result<String, MetricsError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| MetricsError::ExportError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))
}
