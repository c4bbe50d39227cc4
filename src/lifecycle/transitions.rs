use crate::models::order::OrderStatus;

/// Single source of truth for legal status edges. Everything that mutates an
/// order's status goes through this check; callers never compare raw states.
///
/// `Accepted` is stored-schema-only: nothing may enter it.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;

    match (from, to) {
        (Pending, Assigned) => true,
        (Assigned, InTransit) => true,
        // a worker may report delivery directly from assignment on short hops
        (Assigned, Delivered) => true,
        (InTransit, Delivered) => true,
        (Pending | Assigned | InTransit, Cancelled) => true,
        _ => false,
    }
}
