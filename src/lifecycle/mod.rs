use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::entities::order;

/// Lifecycle stages of an order. `Received` is terminal; a received-vs-final
/// quantity mismatch is a recorded discrepancy, not a separate stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum OrderStage {
    Created,
    Approved,
    Packed,
    Dispatched,
    Received,
}

impl OrderStage {
    /// The single valid successor stage, if any.
    pub fn next(self) -> Option<OrderStage> {
        match self {
            OrderStage::Created => Some(OrderStage::Approved),
            OrderStage::Approved => Some(OrderStage::Packed),
            OrderStage::Packed => Some(OrderStage::Dispatched),
            OrderStage::Dispatched => Some(OrderStage::Received),
            OrderStage::Received => None,
        }
    }

    /// Whether moving from `self` to `target` follows the lifecycle order.
    /// Transitions are not mutually excluded at the application layer; callers
    /// use this to log out-of-order writes, which land last-writer-wins.
    pub fn can_advance_to(self, target: OrderStage) -> bool {
        self.next() == Some(target)
    }

    /// Derives the furthest stage a header has reached from its markers.
    pub fn of_header(header: &order::Model) -> OrderStage {
        if header.order_rcvd_date.is_some() {
            OrderStage::Received
        } else if header.order_dispatched_date.is_some() {
            OrderStage::Dispatched
        } else if header.order_packed_date.is_some() {
            OrderStage::Packed
        } else if header.order_approved_date.is_some() {
            OrderStage::Approved
        } else {
            OrderStage::Created
        }
    }
}

static LAST_ORDER_STAMP: AtomicI64 = AtomicI64::new(0);
static LAST_GRV_STAMP: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp that never repeats within this process. Concurrent
/// callers in the same millisecond are bumped forward by one, so generated
/// numbers stay unique under burst load.
fn monotonic_millis(guard: &AtomicI64) -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut prev = guard.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(prev + 1);
        match guard.compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return candidate,
            Err(actual) => prev = actual,
        }
    }
}

/// Generates a unique order number, e.g. `ORD-1722793200123`.
pub fn order_number() -> String {
    format!("ORD-{}", monotonic_millis(&LAST_ORDER_STAMP))
}

/// Generates a unique goods-receipt number, e.g. `GRV-1722793200123`.
pub fn grv_number() -> String {
    format!("GRV-{}", monotonic_millis(&LAST_GRV_STAMP))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[test]
    fn order_numbers_unique_across_ten_thousand_calls() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(order_number()));
        }
    }

    #[test]
    fn order_number_matches_expected_pattern() {
        let n = order_number();
        let digits = n.strip_prefix("ORD-").expect("ORD- prefix");
        assert!(!digits.is_empty());
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn grv_numbers_are_prefixed_and_unique() {
        let a = grv_number();
        let b = grv_number();
        assert!(a.starts_with("GRV-"));
        assert_ne!(a, b);
    }

    #[rstest]
    #[case(OrderStage::Created, OrderStage::Approved, true)]
    #[case(OrderStage::Approved, OrderStage::Packed, true)]
    #[case(OrderStage::Packed, OrderStage::Dispatched, true)]
    #[case(OrderStage::Dispatched, OrderStage::Received, true)]
    #[case(OrderStage::Created, OrderStage::Packed, false)]
    #[case(OrderStage::Approved, OrderStage::Created, false)]
    #[case(OrderStage::Received, OrderStage::Created, false)]
    fn stages_advance_strictly_forward(
        #[case] from: OrderStage,
        #[case] to: OrderStage,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_advance_to(to), allowed);
    }

    #[test]
    fn received_is_terminal() {
        assert_eq!(OrderStage::Received.next(), None);
    }

    #[test]
    fn stage_is_derived_from_header_markers() {
        let mut header = order::Model {
            id: 1,
            order_no: "ORD-1".into(),
            store_name: "Store A".into(),
            date_time: Utc::now(),
            placed_by: "System".into(),
            order_complete: false,
            order_approved_by: None,
            order_approved_date: None,
            order_packed_by: None,
            order_packed_date: None,
            order_dispatch_by: None,
            order_dispatched_date: None,
            order_rcvd_date: None,
        };
        assert_eq!(OrderStage::of_header(&header), OrderStage::Created);

        header.order_approved_date = Some(Utc::now());
        assert_eq!(OrderStage::of_header(&header), OrderStage::Approved);

        header.order_dispatched_date = Some(Utc::now());
        assert_eq!(OrderStage::of_header(&header), OrderStage::Dispatched);

        header.order_rcvd_date = Some(Utc::now());
        assert_eq!(OrderStage::of_header(&header), OrderStage::Received);
    }
}
