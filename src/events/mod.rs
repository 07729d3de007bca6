use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    errors::ServiceError,
    models::{MovementType, NotificationType, OrderStatus},
    notifications::{RealtimeMessage, ADMIN_ROOM},
    services::notifications::{NewNotification, NotificationService},
};

/// Domain events emitted after a transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: i32,
        user_id: i32,
        total_amount: Decimal,
        item_count: usize,
    },
    OrderStatusChanged {
        order_id: i32,
        user_id: i32,
        from: OrderStatus,
        to: OrderStatus,
        changed_by: i32,
        /// True when the order owner made the change (self-cancel)
        by_customer: bool,
    },
    StockMovementRecorded {
        movement_id: i32,
        product_id: i32,
        size: Option<String>,
        movement_type: MovementType,
        quantity: i32,
        new_stock: i32,
    },
    LowStock {
        product_id: i32,
        product_name: String,
        size: Option<String>,
        stock: i32,
        threshold: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Sends an event, logging instead of failing the caller.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropped domain event");
        }
    }
}

/// Drains the event channel, turning events into notifications.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifications: Arc<NotificationService>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(?event, "Received event");
        if let Err(e) = handle_event(&notifications, event).await {
            error!(error = %e, "Failed to handle event");
        }
    }

    info!("Event channel closed; event processing loop stopped");
}

/// Applies the notification fan-out for a single event.
pub async fn handle_event(
    notifications: &NotificationService,
    event: Event,
) -> Result<(), ServiceError> {
    match event {
        Event::OrderPlaced {
            order_id,
            user_id,
            total_amount,
            item_count,
        } => {
            notifications
                .create(NewNotification {
                    user_id: Some(user_id),
                    notification_type: NotificationType::OrderPlaced,
                    title: "Order placed".to_string(),
                    message: format!(
                        "Your order #{} has been placed and is awaiting processing.",
                        order_id
                    ),
                    related_id: Some(order_id),
                })
                .await?;
            notifications
                .create(NewNotification {
                    user_id: None,
                    notification_type: NotificationType::OrderPlaced,
                    title: format!("New order #{}", order_id),
                    message: format!(
                        "User {} placed order #{} with {} item(s), total {}.",
                        user_id, order_id, item_count, total_amount
                    ),
                    related_id: Some(order_id),
                })
                .await?;
        }
        Event::OrderStatusChanged {
            order_id,
            user_id,
            from,
            to,
            changed_by,
            by_customer,
        } => {
            let notification_type = if to == OrderStatus::Cancelled {
                NotificationType::OrderCancelled
            } else {
                NotificationType::OrderStatus
            };
            notifications
                .create(NewNotification {
                    user_id: Some(user_id),
                    notification_type,
                    title: format!("Order #{} {}", order_id, to.to_string().replace('_', " ")),
                    message: to.customer_message(order_id),
                    related_id: Some(order_id),
                })
                .await?;

            if by_customer {
                notifications
                    .create(NewNotification {
                        user_id: None,
                        notification_type,
                        title: format!("Order #{} {} by customer", order_id, to),
                        message: format!(
                            "User {} moved order #{} from {} to {}.",
                            changed_by, order_id, from, to
                        ),
                        related_id: Some(order_id),
                    })
                    .await?;
            }
        }
        Event::LowStock {
            product_id,
            product_name,
            size,
            stock,
            threshold,
        } => {
            let label = match &size {
                Some(size) => format!("{} (size {})", product_name, size),
                None => product_name,
            };
            notifications
                .create(NewNotification {
                    user_id: None,
                    notification_type: NotificationType::LowStock,
                    title: "Low stock alert".to_string(),
                    message: format!(
                        "{} has {} left (threshold {}).",
                        label, stock, threshold
                    ),
                    related_id: Some(product_id),
                })
                .await?;
        }
        Event::StockMovementRecorded {
            movement_id,
            product_id,
            size,
            movement_type,
            quantity,
            new_stock,
        } => {
            notifications.hub().publish(
                ADMIN_ROOM,
                RealtimeMessage::new(
                    NotificationType::StockUpdate.to_string(),
                    json!({
                        "movement_id": movement_id,
                        "product_id": product_id,
                        "size": size,
                        "movement_type": movement_type,
                        "quantity": quantity,
                        "new_stock": new_stock,
                    }),
                ),
            );
        }
    }

    Ok(())
}
