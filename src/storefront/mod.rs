//! Client-side storefront behavior: which buttons an order shows, the
//! payment retry picker and the admin advance button.
//!
//! The flows talk to the service through [`StorefrontApi`], implemented by
//! [`crate::client::StorefrontClient`].

pub mod actions;
pub mod notifier;
pub mod payment_retry;
pub mod status_advance;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    client::ClientError,
    models::{Order, OrderStatus, PaymentMethod},
    services::payments::{GatewayOrder, VerifyPaymentRequest},
};

pub use actions::{OrderActions, OrderView};
pub use notifier::{Notifier, RecordingNotifier, Toast, TracingNotifier};
pub use payment_retry::{CheckoutGateway, CheckoutOutcome, PaymentRetryFlow, RetryState};
pub use status_advance::{advance, advance_label, next_status, StatusAdvance};

/// The service calls the storefront flows depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    async fn retry_payment(
        &self,
        order_id: Uuid,
        method: PaymentMethod,
    ) -> Result<Order, ClientError>;

    async fn create_gateway_order(&self, order_id: Uuid) -> Result<GatewayOrder, ClientError>;

    async fn verify_payment(&self, request: VerifyPaymentRequest) -> Result<Order, ClientError>;

    async fn report_payment_failure(
        &self,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<Order, ClientError>;

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, ClientError>;
}
