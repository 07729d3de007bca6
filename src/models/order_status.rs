use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::PaymentStatus;

/// Lifecycle of a store order.
///
/// Orders move forward only; every edge is listed in
/// [`OrderStatus::allowed_transitions`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "ready_for_pickup")]
    ReadyForPickup,
    #[sea_orm(string_value = "claimed")]
    Claimed,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl OrderStatus {
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Processing, Cancelled],
            Processing => &[ReadyForPickup, Delivered, Cancelled],
            ReadyForPickup => &[Claimed, Completed, Cancelled],
            Claimed => &[Completed, Refunded],
            Delivered => &[Completed, Refunded],
            Completed | Cancelled | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Payment status implied by entering this status, if it changes.
    pub fn payment_effect(&self, current: PaymentStatus) -> Option<PaymentStatus> {
        match self {
            OrderStatus::Claimed | OrderStatus::Completed | OrderStatus::Delivered
                if current != PaymentStatus::Paid =>
            {
                Some(PaymentStatus::Paid)
            }
            OrderStatus::Refunded if current != PaymentStatus::Refunded => {
                Some(PaymentStatus::Refunded)
            }
            OrderStatus::Cancelled if current == PaymentStatus::Paid => {
                Some(PaymentStatus::Refunded)
            }
            _ => None,
        }
    }

    /// Message shown to the customer when their order enters this status.
    pub fn customer_message(&self, order_id: i32) -> String {
        match self {
            OrderStatus::Pending => format!("Your order #{} has been placed.", order_id),
            OrderStatus::Processing => format!("Your order #{} is being prepared.", order_id),
            OrderStatus::ReadyForPickup => {
                format!("Your order #{} is ready for pickup at the school store.", order_id)
            }
            OrderStatus::Claimed => format!("Your order #{} has been claimed.", order_id),
            OrderStatus::Completed => format!("Your order #{} is complete. Thank you!", order_id),
            OrderStatus::Delivered => format!("Your order #{} has been delivered.", order_id),
            OrderStatus::Cancelled => format!("Your order #{} has been cancelled.", order_id),
            OrderStatus::Refunded => format!("Your order #{} has been refunded.", order_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Processing)]
    #[case(OrderStatus::Pending, OrderStatus::Cancelled)]
    #[case(OrderStatus::Processing, OrderStatus::ReadyForPickup)]
    #[case(OrderStatus::Processing, OrderStatus::Delivered)]
    #[case(OrderStatus::ReadyForPickup, OrderStatus::Claimed)]
    #[case(OrderStatus::ReadyForPickup, OrderStatus::Completed)]
    #[case(OrderStatus::Claimed, OrderStatus::Completed)]
    #[case(OrderStatus::Delivered, OrderStatus::Refunded)]
    fn forward_edges_are_allowed(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert!(from.can_transition_to(to));
    }

    #[rstest]
    #[case(OrderStatus::Processing, OrderStatus::Pending)]
    #[case(OrderStatus::Pending, OrderStatus::Pending)]
    #[case(OrderStatus::Pending, OrderStatus::Completed)]
    #[case(OrderStatus::Claimed, OrderStatus::Cancelled)]
    #[case(OrderStatus::Completed, OrderStatus::Refunded)]
    #[case(OrderStatus::Cancelled, OrderStatus::Processing)]
    fn backward_and_skipping_edges_are_rejected(
        #[case] from: OrderStatus,
        #[case] to: OrderStatus,
    ) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::ReadyForPickup.is_terminal());
    }

    #[test]
    fn payment_side_effects() {
        assert_eq!(
            OrderStatus::Claimed.payment_effect(PaymentStatus::Pending),
            Some(PaymentStatus::Paid)
        );
        assert_eq!(OrderStatus::Completed.payment_effect(PaymentStatus::Paid), None);
        assert_eq!(
            OrderStatus::Cancelled.payment_effect(PaymentStatus::Paid),
            Some(PaymentStatus::Refunded)
        );
        assert_eq!(OrderStatus::Cancelled.payment_effect(PaymentStatus::Pending), None);
        assert_eq!(
            OrderStatus::Refunded.payment_effect(PaymentStatus::Paid),
            Some(PaymentStatus::Refunded)
        );
    }

    #[test]
    fn wire_names_are_snake_case() {
        assert_eq!(OrderStatus::ReadyForPickup.to_string(), "ready_for_pickup");
        assert_eq!(
            OrderStatus::from_str("ready_for_pickup").unwrap(),
            OrderStatus::ReadyForPickup
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::ReadyForPickup).unwrap(),
            "\"ready_for_pickup\""
        );
    }
}
