use async_trait::async_trait;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    client::ClientError,
    models::{Order, PaymentMethod},
    services::payments::{GatewayOrder, VerifyPaymentRequest},
    storefront::{notifier::Notifier, StorefrontApi},
};

/// What the hosted gateway checkout reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Completed {
        payment_id: String,
        signature: String,
    },
    /// Declined, errored, or dismissed by the shopper.
    Failed { reason: String },
}

/// The hosted checkout widget opened for a gateway order.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn open(&self, session: &GatewayOrder) -> CheckoutOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryState {
    #[default]
    Unselected,
    Selected(PaymentMethod),
}

/// Payment method picker for an order whose payment failed.
#[derive(Debug, Clone)]
pub struct PaymentRetryFlow {
    order_id: Uuid,
    state: RetryState,
}

impl PaymentRetryFlow {
    pub fn new(order_id: Uuid) -> Self {
        Self {
            order_id,
            state: RetryState::Unselected,
        }
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Selecting again replaces the previous choice.
    pub fn select(&mut self, method: PaymentMethod) {
        self.state = RetryState::Selected(method);
    }

    /// Dispatches the selected method to its backend call and reports the
    /// outcome through `notifier`. Nothing is retried automatically.
    #[instrument(skip_all, fields(order_id = %self.order_id))]
    pub async fn submit<A, G, N>(
        &self,
        api: &A,
        gateway: &G,
        notifier: &N,
    ) -> Result<Order, ClientError>
    where
        A: StorefrontApi + ?Sized,
        G: CheckoutGateway + ?Sized,
        N: Notifier + ?Sized,
    {
        let result = match self.state {
            RetryState::Unselected => Err(ClientError::Validation(
                "Please select a payment method".to_string(),
            )),
            RetryState::Selected(method @ (PaymentMethod::Wallet | PaymentMethod::Cod)) => {
                api.retry_payment(self.order_id, method).await
            }
            RetryState::Selected(PaymentMethod::Razorpay) => {
                self.pay_through_gateway(api, gateway).await
            }
        };

        match &result {
            Ok(order) => {
                info!(method = %order.payment_method, status = %order.payment_status, "Payment retry succeeded");
                notifier.success(success_message(order.payment_method));
            }
            Err(e) => {
                warn!(status = ?e.status(), "Payment retry failed: {}", e);
                notifier.error(&e.to_string());
            }
        }
        result
    }

    async fn pay_through_gateway<A, G>(&self, api: &A, gateway: &G) -> Result<Order, ClientError>
    where
        A: StorefrontApi + ?Sized,
        G: CheckoutGateway + ?Sized,
    {
        let session = api.create_gateway_order(self.order_id).await?;

        match gateway.open(&session).await {
            CheckoutOutcome::Completed {
                payment_id,
                signature,
            } => {
                api.verify_payment(VerifyPaymentRequest {
                    order_id: self.order_id,
                    razorpay_order_id: session.gateway_order_id,
                    razorpay_payment_id: payment_id,
                    razorpay_signature: signature,
                })
                .await
            }
            CheckoutOutcome::Failed { reason } => {
                if let Err(e) = api
                    .report_payment_failure(self.order_id, Some(reason.clone()))
                    .await
                {
                    warn!(status = ?e.status(), "Could not report gateway failure: {}", e);
                }
                Err(ClientError::Checkout(reason))
            }
        }
    }
}

fn success_message(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cod => "Payment method switched to cash on delivery",
        PaymentMethod::Wallet => "Payment completed from wallet",
        PaymentMethod::Razorpay => "Payment successful",
    }
}
