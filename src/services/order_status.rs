use crate::{errors::ServiceError, models::OrderStatus};

/// Validates if a status transition is allowed.
///
/// The service is the only authority on transition legality; storefront
/// clients never consult this table.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    match (from, to) {
        // From pending
        (Pending, Confirmed) => true,
        (Pending, Cancelled) => true,

        // From confirmed
        (Confirmed, Shipped) => true,
        (Confirmed, Cancelled) => true,

        // From shipped
        (Shipped, Delivered) => true,
        (Shipped, Cancelled) => true,

        // From delivered
        (Delivered, ReturnRequested) => true,

        // From return_requested
        (ReturnRequested, Returned) => true,

        // All other transitions, including same-status updates, are invalid
        _ => false,
    }
}

pub fn ensure_transition(from: OrderStatus, to: OrderStatus) -> Result<(), ServiceError> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidStatus(format!(
            "Cannot transition from status '{}' to '{}'",
            from, to
        )))
    }
}
