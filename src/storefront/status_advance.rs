use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    client::ClientError,
    models::{Order, OrderStatus},
    storefront::{notifier::Notifier, StorefrontApi},
};

/// Forward edges an administrator can take with a single click.
const ADVANCE_MAP: [(OrderStatus, OrderStatus, &str); 4] = [
    (OrderStatus::Pending, OrderStatus::Confirmed, "Mark as Confirmed"),
    (OrderStatus::Confirmed, OrderStatus::Shipped, "Mark as Shipped"),
    (OrderStatus::Shipped, OrderStatus::Delivered, "Mark as Delivered"),
    (OrderStatus::ReturnRequested, OrderStatus::Returned, "Mark as Returned"),
];

/// The advance button offered to an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAdvance {
    pub label: String,
    pub next_status: OrderStatus,
}

pub fn next_status(current: OrderStatus) -> Option<OrderStatus> {
    ADVANCE_MAP
        .iter()
        .find(|(from, _, _)| *from == current)
        .map(|(_, to, _)| *to)
}

pub fn advance_label(current: OrderStatus) -> Option<&'static str> {
    ADVANCE_MAP
        .iter()
        .find(|(from, _, _)| *from == current)
        .map(|(_, _, label)| *label)
}

impl StatusAdvance {
    pub fn for_status(current: OrderStatus) -> Option<Self> {
        ADVANCE_MAP
            .iter()
            .find(|(from, _, _)| *from == current)
            .map(|(_, to, label)| StatusAdvance {
                label: (*label).to_string(),
                next_status: *to,
            })
    }
}

/// Sends the status update behind the advance button.
///
/// No legality check happens here; the service rejects illegal edges and the
/// rejection is surfaced through `notifier`.
#[instrument(skip(api, notifier), fields(status = %current))]
pub async fn advance<A, N>(
    api: &A,
    notifier: &N,
    order_id: Uuid,
    current: OrderStatus,
) -> Result<Order, ClientError>
where
    A: StorefrontApi + ?Sized,
    N: Notifier + ?Sized,
{
    let Some(next) = next_status(current) else {
        let err = ClientError::Validation(format!("No further status after {}", current));
        notifier.error(&err.to_string());
        return Err(err);
    };

    match api.update_order_status(order_id, next).await {
        Ok(order) => {
            info!(%order_id, %next, "Order advanced");
            notifier.success(&format!("Order marked as {}", next));
            Ok(order)
        }
        Err(e) => {
            notifier.error(&e.to_string());
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storefront::{notifier::RecordingNotifier, MockStorefrontApi};
    use assert_matches::assert_matches;
    use mockall::predicate::eq;
    use rstest::rstest;

    #[rstest]
    #[case(OrderStatus::Pending, Some(OrderStatus::Confirmed), Some("Mark as Confirmed"))]
    #[case(OrderStatus::Confirmed, Some(OrderStatus::Shipped), Some("Mark as Shipped"))]
    #[case(OrderStatus::Shipped, Some(OrderStatus::Delivered), Some("Mark as Delivered"))]
    #[case(OrderStatus::ReturnRequested, Some(OrderStatus::Returned), Some("Mark as Returned"))]
    #[case(OrderStatus::Delivered, None, None)]
    #[case(OrderStatus::Cancelled, None, None)]
    #[case(OrderStatus::Returned, None, None)]
    fn advance_map(
        #[case] current: OrderStatus,
        #[case] next: Option<OrderStatus>,
        #[case] label: Option<&str>,
    ) {
        assert_eq!(next_status(current), next);
        assert_eq!(advance_label(current), label);
    }

    #[tokio::test]
    async fn terminal_status_sends_nothing() {
        let api = MockStorefrontApi::new();
        let notifier = RecordingNotifier::default();

        let result = advance(&api, &notifier, Uuid::new_v4(), OrderStatus::Cancelled).await;
        assert_matches!(result, Err(ClientError::Validation(_)));
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn server_rejection_is_surfaced() {
        let order_id = Uuid::new_v4();
        let mut api = MockStorefrontApi::new();
        api.expect_update_order_status()
            .with(eq(order_id), eq(OrderStatus::Confirmed))
            .times(1)
            .returning(|_, _| {
                Err(ClientError::Server {
                    status: 400,
                    message: "Cannot transition from status 'cancelled' to 'confirmed'".into(),
                })
            });
        let notifier = RecordingNotifier::default();

        let result = advance(&api, &notifier, order_id, OrderStatus::Pending).await;
        assert_matches!(result, Err(ClientError::Server { status: 400, .. }));
        assert_eq!(
            notifier.errors(),
            vec!["Cannot transition from status 'cancelled' to 'confirmed'".to_string()]
        );
    }
}
