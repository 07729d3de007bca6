use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{
        cart_item::{self, Entity as CartItemEntity},
        order::{self, Entity as OrderEntity, Model as OrderModel},
        order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
        order_status_history::{
            self, Entity as OrderStatusHistoryEntity, Model as OrderStatusHistoryModel,
        },
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::{MovementType, OrderStatus, PaymentMethod, PaymentStatus},
    services::{
        carts::{normalize_size, resolve_purchasable},
        stock::{
            AppliedMovement, RecordMovement, StockService, REASON_ORDER_CANCELLED,
            REASON_ORDER_PLACED,
        },
        PageRequest,
    },
    PaginatedResponse,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutItem {
    pub product_id: i32,
    pub size: Option<String>,
    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity: i32,
}

/// Checkout request.
///
/// Without `items` the order is built from the cart, optionally restricted
/// to `cart_item_ids`. With `items` the cart is left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutInput {
    pub payment_method: PaymentMethod,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub cart_item_ids: Option<Vec<i32>>,
    pub items: Option<Vec<CheckoutItem>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusInput {
    pub status: OrderStatus,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Admin listing only
    pub user_id: Option<i32>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
    pub history: Vec<OrderStatusHistoryModel>,
}

/// A line to be ordered, before prices are resolved
struct RequestedLine {
    product_id: i32,
    size: Option<String>,
    quantity: i32,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    stock: StockService,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, stock: StockService, event_sender: EventSender) -> Self {
        Self {
            db,
            stock,
            event_sender,
        }
    }

    async fn requested_lines(
        &self,
        user_id: i32,
        input: &CheckoutInput,
    ) -> Result<(Vec<RequestedLine>, Vec<i32>), ServiceError> {
        if let Some(items) = &input.items {
            if input.cart_item_ids.is_some() {
                return Err(ServiceError::ValidationError(
                    "Provide either items or cart_item_ids, not both".to_string(),
                ));
            }
            let mut merged: Vec<RequestedLine> = Vec::new();
            for item in items {
                item.validate()?;
                let size = normalize_size(item.size.as_deref());
                match merged
                    .iter_mut()
                    .find(|l| l.product_id == item.product_id && l.size == size)
                {
                    Some(line) => line.quantity += item.quantity,
                    None => merged.push(RequestedLine {
                        product_id: item.product_id,
                        size,
                        quantity: item.quantity,
                    }),
                }
            }
            return Ok((merged, Vec::new()));
        }

        let mut query = CartItemEntity::find().filter(cart_item::Column::UserId.eq(user_id));
        if let Some(ids) = &input.cart_item_ids {
            query = query.filter(cart_item::Column::Id.is_in(ids.clone()));
        }
        let cart = query
            .order_by_asc(cart_item::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        if let Some(ids) = &input.cart_item_ids {
            if let Some(missing) = ids.iter().find(|id| !cart.iter().any(|c| c.id == **id)) {
                return Err(ServiceError::not_found("Cart item", missing));
            }
        }

        let consumed = cart.iter().map(|c| c.id).collect();
        let lines = cart
            .into_iter()
            .map(|c| RequestedLine {
                product_id: c.product_id,
                size: c.size,
                quantity: c.quantity,
            })
            .collect();
        Ok((lines, consumed))
    }

    /// Places an order: snapshots prices, takes the stock out and empties the
    /// consumed cart lines in one transaction
    #[instrument(skip(self, input))]
    pub async fn checkout(
        &self,
        user_id: i32,
        input: CheckoutInput,
    ) -> Result<OrderDetails, ServiceError> {
        input.validate()?;
        let (lines, consumed_cart_ids) = self.requested_lines(user_id, &input).await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Nothing to check out; the cart is empty".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start checkout transaction");
            ServiceError::db_error(e)
        })?;

        let mut priced = Vec::with_capacity(lines.len());
        let mut total = Decimal::ZERO;
        for line in &lines {
            let target = resolve_purchasable(&txn, line.product_id, line.size.as_deref()).await?;
            if line.quantity > target.available() {
                return Err(ServiceError::InsufficientStock(format!(
                    "{} has {} available, requested {}",
                    target.label(),
                    target.available(),
                    line.quantity
                )));
            }
            let unit_price = target.unit_price();
            let subtotal = unit_price * Decimal::from(line.quantity);
            total += subtotal;
            priced.push((line, target.product.name, unit_price, subtotal));
        }

        let now = Utc::now();
        let order = order::ActiveModel {
            user_id: Set(user_id),
            status: Set(OrderStatus::Pending),
            payment_method: Set(input.payment_method),
            payment_status: Set(PaymentStatus::Pending),
            total_amount: Set(total),
            notes: Set(input.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        let mut applied: Vec<AppliedMovement> = Vec::with_capacity(priced.len());
        for (line, product_name, unit_price, subtotal) in priced {
            order_item::ActiveModel {
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                product_name: Set(product_name),
                size: Set(line.size.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(unit_price),
                subtotal: Set(subtotal),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;

            let mut movement =
                RecordMovement::new(line.product_id, MovementType::StockOut, line.quantity)
                    .with_reason(REASON_ORDER_PLACED)
                    .with_order(order.id);
            movement.size = line.size.clone();
            applied.push(StockService::apply_in_txn(&txn, &movement, Some(user_id)).await?);
        }

        Self::append_history(&txn, order.id, None, OrderStatus::Pending, user_id, Some("Order placed".to_string()))
            .await?;

        if !consumed_cart_ids.is_empty() {
            CartItemEntity::delete_many()
                .filter(cart_item::Column::UserId.eq(user_id))
                .filter(cart_item::Column::Id.is_in(consumed_cart_ids))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit checkout");
            ServiceError::db_error(e)
        })?;

        metrics::counter!("school_store_orders_placed", 1);
        info!(order_id = order.id, user_id, total = %total, "Order placed");

        for movement in &applied {
            self.stock.publish(movement).await;
        }
        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                user_id,
                total_amount: total,
                item_count: lines.len(),
            })
            .await;

        self.details(order).await
    }

    async fn append_history<C: ConnectionTrait>(
        conn: &C,
        order_id: i32,
        from: Option<OrderStatus>,
        to: OrderStatus,
        changed_by: i32,
        note: Option<String>,
    ) -> Result<OrderStatusHistoryModel, ServiceError> {
        order_status_history::ActiveModel {
            order_id: Set(order_id),
            from_status: Set(from),
            to_status: Set(to),
            changed_by: Set(Some(changed_by)),
            note: Set(note),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)
    }

    async fn find_order(&self, id: i32) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Order", id))
    }

    /// Loads an order the viewer may see; other users' orders read as missing
    async fn find_visible(&self, id: i32, viewer: &AuthUser) -> Result<OrderModel, ServiceError> {
        let order = self.find_order(id).await?;
        if !viewer.can_access(order.user_id) {
            return Err(ServiceError::not_found("Order", id));
        }
        Ok(order)
    }

    async fn items_for(&self, order_ids: Vec<i32>) -> Result<HashMap<i32, Vec<OrderItemModel>>, ServiceError> {
        let mut grouped: HashMap<i32, Vec<OrderItemModel>> = HashMap::new();
        if order_ids.is_empty() {
            return Ok(grouped);
        }
        for item in OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_item::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
        {
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn load_history(&self, order_id: i32) -> Result<Vec<OrderStatusHistoryModel>, ServiceError> {
        OrderStatusHistoryEntity::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_history::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn details(&self, order: OrderModel) -> Result<OrderDetails, ServiceError> {
        let items = self
            .items_for(vec![order.id])
            .await?
            .remove(&order.id)
            .unwrap_or_default();
        let history = self.load_history(order.id).await?;
        Ok(OrderDetails {
            order,
            items,
            history,
        })
    }

    #[instrument(skip(self, viewer), fields(viewer = viewer.user_id))]
    pub async fn get(&self, id: i32, viewer: &AuthUser) -> Result<OrderDetails, ServiceError> {
        let order = self.find_visible(id, viewer).await?;
        self.details(order).await
    }

    pub async fn history(
        &self,
        id: i32,
        viewer: &AuthUser,
    ) -> Result<Vec<OrderStatusHistoryModel>, ServiceError> {
        self.find_visible(id, viewer).await?;
        self.load_history(id).await
    }

    async fn list(
        &self,
        user_id: Option<i32>,
        filter: &OrderFilter,
    ) -> Result<PaginatedResponse<OrderWithItems>, ServiceError> {
        let page = PageRequest::new(filter.page, filter.limit);
        let mut query = OrderEntity::find();
        if let Some(user_id) = user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .paginate(&*self.db, page.limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let orders = paginator
            .fetch_page(page.index())
            .await
            .map_err(ServiceError::db_error)?;

        let mut items = self.items_for(orders.iter().map(|o| o.id).collect()).await?;
        let rows = orders
            .into_iter()
            .map(|order| OrderWithItems {
                items: items.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect();
        Ok(PaginatedResponse::new(rows, total, page))
    }

    /// The caller's own orders, newest first
    pub async fn list_for_user(
        &self,
        user_id: i32,
        filter: &OrderFilter,
    ) -> Result<PaginatedResponse<OrderWithItems>, ServiceError> {
        self.list(Some(user_id), filter).await
    }

    /// Every order, optionally narrowed to one customer
    pub async fn list_all(
        &self,
        filter: &OrderFilter,
    ) -> Result<PaginatedResponse<OrderWithItems>, ServiceError> {
        self.list(filter.user_id, filter).await
    }

    /// Admin status change along an allowed edge
    #[instrument(skip(self, actor, input), fields(order_id = id, next = %input.status))]
    pub async fn update_status(
        &self,
        id: i32,
        input: UpdateStatusInput,
        actor: &AuthUser,
    ) -> Result<OrderDetails, ServiceError> {
        input.validate()?;
        if !actor.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only admins can change order status".to_string(),
            ));
        }
        self.transition(id, input.status, actor.user_id, input.note, false)
            .await
    }

    /// Customer self-cancel, allowed only while the order is pending
    #[instrument(skip(self, user), fields(order_id = id, user_id = user.user_id))]
    pub async fn cancel(
        &self,
        id: i32,
        user: &AuthUser,
        note: Option<String>,
    ) -> Result<OrderDetails, ServiceError> {
        let order = self.find_order(id).await?;
        if order.user_id != user.user_id {
            return Err(ServiceError::not_found("Order", id));
        }
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} is {} and can no longer be cancelled",
                id, order.status
            )));
        }
        let note = note.or_else(|| Some("Cancelled by customer".to_string()));
        self.transition(id, OrderStatus::Cancelled, user.user_id, note, true)
            .await
    }

    async fn transition(
        &self,
        id: i32,
        next: OrderStatus,
        actor_id: i32,
        note: Option<String>,
        by_customer: bool,
    ) -> Result<OrderDetails, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let order = OrderEntity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;

        let current = order.status;
        if current == next {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} is already {}",
                id, current
            )));
        }
        if !current.can_transition_to(next) {
            warn!(order_id = id, from = %current, to = %next, "Rejected order status transition");
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot move order {} from {} to {}",
                id, current, next
            )));
        }

        let payment_status = next
            .payment_effect(order.payment_status)
            .unwrap_or(order.payment_status);

        let updated = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(next))
            .col_expr(order::Column::PaymentStatus, Expr::value(payment_status))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(id))
            .filter(order::Column::Status.eq(current))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "Order {} changed while updating its status",
                id
            )));
        }

        Self::append_history(&txn, id, Some(current), next, actor_id, note).await?;

        let mut applied = Vec::new();
        if next == OrderStatus::Cancelled {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.eq(id))
                .order_by_asc(order_item::Column::Id)
                .all(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            for item in items {
                let mut movement =
                    RecordMovement::new(item.product_id, MovementType::StockIn, item.quantity)
                        .with_reason(REASON_ORDER_CANCELLED)
                        .with_order(id);
                movement.size = item.size;
                applied.push(StockService::apply_in_txn(&txn, &movement, Some(actor_id)).await?);
            }
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = id, "Failed to commit status change");
            ServiceError::db_error(e)
        })?;

        metrics::counter!(
            "school_store_order_status_transitions",
            1,
            "to" => next.to_string()
        );
        info!(order_id = id, from = %current, to = %next, actor_id, "Order status changed");

        for movement in &applied {
            self.stock.publish(movement).await;
        }
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: id,
                user_id: order.user_id,
                from: current,
                to: next,
                changed_by: actor_id,
                by_customer,
            })
            .await;

        let order = self.find_order(id).await?;
        self.details(order).await
    }
}
