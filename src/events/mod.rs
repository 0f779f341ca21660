use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{OrderStatus, PaymentMethod},
};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// True once the event processor has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Sends an event, logging instead of failing when the processor is gone.
    ///
    /// Used after a state change has already been committed, where failing the
    /// request would misreport the outcome to the caller.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Domain events emitted by the order lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        user_id: String,
        total: Decimal,
        method: PaymentMethod,
    },
    OrderCancelled {
        order_id: Uuid,
        refunded: Option<Decimal>,
    },
    ReturnRequested(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    PaymentCaptured {
        order_id: Uuid,
        method: PaymentMethod,
    },
    PaymentFailed {
        order_id: Uuid,
        reason: String,
    },
    PaymentMethodChanged {
        order_id: Uuid,
        method: PaymentMethod,
    },
    WalletCredited {
        user_id: String,
        amount: Decimal,
        order_id: Option<Uuid>,
    },
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced {
                order_id,
                user_id,
                total,
                method,
            } => info!(%order_id, %user_id, %total, %method, "order placed"),
            Event::OrderCancelled { order_id, refunded } => {
                info!(%order_id, refunded = ?refunded, "order cancelled")
            }
            Event::ReturnRequested(order_id) => info!(%order_id, "return requested"),
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(%order_id, %old_status, %new_status, "order status changed"),
            Event::PaymentCaptured { order_id, method } => {
                info!(%order_id, %method, "payment captured")
            }
            Event::PaymentFailed { order_id, reason } => {
                warn!(%order_id, %reason, "payment failed")
            }
            Event::PaymentMethodChanged { order_id, method } => {
                info!(%order_id, %method, "payment method changed")
            }
            Event::WalletCredited {
                user_id,
                amount,
                order_id,
            } => info!(%user_id, %amount, order_id = ?order_id, "wallet credited"),
        }
    }

    info!("Event channel closed; stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_survives_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.is_closed());
        assert!(matches!(
            sender.send(Event::ReturnRequested(Uuid::new_v4())).await,
            Err(ServiceError::EventError(_))
        ));
        sender.publish(Event::ReturnRequested(Uuid::new_v4())).await;
    }
}
