use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as ProductEntity},
        product_size::{self, Entity as ProductSizeEntity},
        stock_movement::{self, Entity as StockMovementEntity, Model as StockMovementModel},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::MovementType,
    services::PageRequest,
    PaginatedResponse,
};

/// Ledger reason used for stock loaded when a product or size is created
pub const REASON_INITIAL_STOCK: &str = "initial_stock";
/// Ledger reason used when checkout consumes stock
pub const REASON_ORDER_PLACED: &str = "order_placed";
/// Ledger reason used when a cancelled order returns its stock
pub const REASON_ORDER_CANCELLED: &str = "order_cancelled";

/// A stock movement request.
///
/// `stock_in` and `stock_out` take a positive `quantity`. A
/// `stock_adjustment` takes either a signed non-zero `quantity` or an
/// absolute `target_stock`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordMovement {
    pub product_id: i32,
    #[validate(length(min = 1, max = 32))]
    pub size: Option<String>,
    pub movement_type: MovementType,
    pub quantity: Option<i32>,
    #[validate(range(min = 0))]
    pub target_stock: Option<i32>,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub order_id: Option<i32>,
}

impl RecordMovement {
    pub fn new(product_id: i32, movement_type: MovementType, quantity: i32) -> Self {
        Self {
            product_id,
            size: None,
            movement_type,
            quantity: Some(quantity),
            target_stock: None,
            reason: None,
            notes: None,
            order_id: None,
        }
    }

    pub fn target(product_id: i32, target_stock: i32) -> Self {
        Self {
            quantity: None,
            target_stock: Some(target_stock),
            ..Self::new(product_id, MovementType::StockAdjustment, 0)
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_order(mut self, order_id: i32) -> Self {
        self.order_id = Some(order_id);
        self
    }

    fn normalized_size(&self) -> Option<String> {
        self.size
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Validates the quantity fields and returns the delta when it does not
    /// depend on the current level.
    fn fixed_delta(&self) -> Result<Option<i32>, ServiceError> {
        match (self.movement_type, self.quantity, self.target_stock) {
            (MovementType::StockAdjustment, Some(_), Some(_)) => Err(ServiceError::ValidationError(
                "Provide either quantity or target_stock for an adjustment, not both".to_string(),
            )),
            (MovementType::StockAdjustment, Some(0), None) => Err(ServiceError::ValidationError(
                "Adjustment quantity must not be zero".to_string(),
            )),
            (MovementType::StockAdjustment, Some(q), None) => Ok(Some(q)),
            (MovementType::StockAdjustment, None, Some(_)) => Ok(None),
            (MovementType::StockAdjustment, None, None) => Err(ServiceError::ValidationError(
                "Adjustment requires quantity or target_stock".to_string(),
            )),
            (kind, _, Some(_)) => Err(ServiceError::ValidationError(format!(
                "target_stock is only valid for stock_adjustment, not {}",
                kind
            ))),
            (kind, Some(q), None) if q > 0 => Ok(Some(kind.signed_delta(q))),
            (kind, _, None) => Err(ServiceError::ValidationError(format!(
                "{} quantity must be greater than zero",
                kind
            ))),
        }
    }
}

/// Result of a movement applied inside a transaction
#[derive(Debug, Clone)]
pub struct AppliedMovement {
    pub movement: StockMovementModel,
    pub product_name: String,
    /// Product total after the movement
    pub product_stock: i32,
}

impl AppliedMovement {
    /// Events to publish once the surrounding transaction has committed
    pub fn events(&self, low_stock_threshold: i32) -> Vec<Event> {
        let m = &self.movement;
        let mut events = vec![Event::StockMovementRecorded {
            movement_id: m.id,
            product_id: m.product_id,
            size: m.size.clone(),
            movement_type: m.movement_type,
            quantity: m.quantity,
            new_stock: m.new_stock,
        }];

        if m.quantity < 0 && m.new_stock <= low_stock_threshold {
            events.push(Event::LowStock {
                product_id: m.product_id,
                product_name: self.product_name.clone(),
                size: m.size.clone(),
                stock: m.new_stock,
                threshold: low_stock_threshold,
            });
        }
        events
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MovementFilter {
    pub product_id: Option<i32>,
    pub size: Option<String>,
    pub movement_type: Option<MovementType>,
    pub order_id: Option<i32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SizeStockLevel {
    pub size: String,
    /// Value held on the size row
    pub stock: i32,
    /// Sum of the ledger for this size
    pub derived_stock: i64,
    pub consistent: bool,
}

/// Current stock of a product, stored and derived from the ledger
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockLevel {
    pub product_id: i32,
    pub product_name: String,
    pub stock: i32,
    pub derived_stock: i64,
    pub sizes: Vec<SizeStockLevel>,
    pub consistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LowStockItem {
    pub product_id: i32,
    pub product_name: String,
    pub size: Option<String>,
    pub stock: i32,
}

#[derive(Clone)]
pub struct StockService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    low_stock_threshold: i32,
}

impl StockService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, low_stock_threshold: i32) -> Self {
        Self {
            db,
            event_sender,
            low_stock_threshold,
        }
    }

    pub fn low_stock_threshold(&self) -> i32 {
        self.low_stock_threshold
    }

    /// Records a movement in its own transaction and publishes the resulting events
    #[instrument(skip(self, input), fields(product_id = input.product_id, movement_type = %input.movement_type))]
    pub async fn record_movement(
        &self,
        input: RecordMovement,
        performed_by: Option<i32>,
    ) -> Result<StockMovementModel, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start stock movement transaction");
            ServiceError::db_error(e)
        })?;

        let applied = Self::apply_in_txn(&txn, &input, performed_by).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit stock movement");
            ServiceError::db_error(e)
        })?;

        self.publish(&applied).await;
        Ok(applied.movement)
    }

    /// Publishes the events of a committed movement
    pub async fn publish(&self, applied: &AppliedMovement) {
        for event in applied.events(self.low_stock_threshold) {
            self.event_sender.send_or_log(event).await;
        }
    }

    /// Applies a movement on the caller's connection or transaction.
    ///
    /// Locks the product (and size) rows, rejects results below zero and
    /// updates the stored levels only if they still hold the values read.
    pub async fn apply_in_txn<C>(
        conn: &C,
        input: &RecordMovement,
        performed_by: Option<i32>,
    ) -> Result<AppliedMovement, ServiceError>
    where
        C: ConnectionTrait,
    {
        let fixed_delta = input.fixed_delta()?;
        let size = input.normalized_size();

        let product = ProductEntity::find_by_id(input.product_id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Product", input.product_id))?;

        let size_count = ProductSizeEntity::find()
            .filter(product_size::Column::ProductId.eq(product.id))
            .count(conn)
            .await
            .map_err(ServiceError::db_error)?;

        let size_row = match (size_count > 0, size.as_deref()) {
            (true, None) => {
                return Err(ServiceError::ValidationError(format!(
                    "Product {} has sizes; a size is required",
                    product.id
                )))
            }
            (false, Some(_)) => {
                return Err(ServiceError::ValidationError(format!(
                    "Product {} has no sizes",
                    product.id
                )))
            }
            (true, Some(name)) => Some(
                ProductSizeEntity::find()
                    .filter(product_size::Column::ProductId.eq(product.id))
                    .filter(product_size::Column::Size.eq(name))
                    .lock_exclusive()
                    .one(conn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Size {} not found for product {}",
                            name, product.id
                        ))
                    })?,
            ),
            (false, None) => None,
        };

        let previous_stock = size_row.as_ref().map_or(product.stock, |s| s.stock);
        let delta = match (fixed_delta, input.target_stock) {
            (Some(delta), _) => delta,
            (None, Some(target)) => target - previous_stock,
            (None, None) => {
                return Err(ServiceError::ValidationError(
                    "Movement has no quantity".to_string(),
                ))
            }
        };
        if delta == 0 {
            return Err(ServiceError::ValidationError(
                "Adjustment does not change the stock level".to_string(),
            ));
        }

        let label = size
            .as_deref()
            .map(|s| format!("product {} size {}", product.id, s))
            .unwrap_or_else(|| format!("product {}", product.id));

        let new_stock = previous_stock
            .checked_add(delta)
            .ok_or_else(|| ServiceError::ValidationError("Stock quantity overflow".to_string()))?;
        let product_stock = product
            .stock
            .checked_add(delta)
            .ok_or_else(|| ServiceError::ValidationError("Stock quantity overflow".to_string()))?;
        if new_stock < 0 || product_stock < 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "{} has {}, requested {}",
                label, previous_stock, -delta
            )));
        }

        let now = Utc::now();

        if let Some(row) = &size_row {
            let updated = ProductSizeEntity::update_many()
                .col_expr(product_size::Column::Stock, Expr::value(new_stock))
                .col_expr(product_size::Column::UpdatedAt, Expr::value(now))
                .filter(product_size::Column::Id.eq(row.id))
                .filter(product_size::Column::Stock.eq(row.stock))
                .exec(conn)
                .await
                .map_err(ServiceError::db_error)?;
            if updated.rows_affected == 0 {
                warn!(%label, "Size stock changed concurrently");
                return Err(ServiceError::ConcurrentModification(format!(
                    "Stock of {} changed while recording the movement",
                    label
                )));
            }
        }

        let updated = ProductEntity::update_many()
            .col_expr(product::Column::Stock, Expr::value(product_stock))
            .col_expr(product::Column::UpdatedAt, Expr::value(now))
            .filter(product::Column::Id.eq(product.id))
            .filter(product::Column::Stock.eq(product.stock))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if updated.rows_affected == 0 {
            warn!(%label, "Product stock changed concurrently");
            return Err(ServiceError::ConcurrentModification(format!(
                "Stock of product {} changed while recording the movement",
                product.id
            )));
        }

        let movement = stock_movement::ActiveModel {
            product_id: Set(product.id),
            size: Set(size),
            movement_type: Set(input.movement_type),
            quantity: Set(delta),
            reason: Set(input.reason.clone()),
            notes: Set(input.notes.clone()),
            previous_stock: Set(previous_stock),
            new_stock: Set(new_stock),
            performed_by: Set(performed_by),
            order_id: Set(input.order_id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;

        metrics::counter!(
            "school_store_stock_movements",
            1,
            "movement_type" => input.movement_type.to_string()
        );
        info!(
            movement_id = movement.id,
            %label,
            delta,
            previous_stock,
            new_stock,
            "Stock movement recorded"
        );

        Ok(AppliedMovement {
            movement,
            product_name: product.name,
            product_stock,
        })
    }

    /// Ledger entries, newest first
    #[instrument(skip(self, filter))]
    pub async fn list_movements(
        &self,
        filter: &MovementFilter,
    ) -> Result<PaginatedResponse<StockMovementModel>, ServiceError> {
        let page = PageRequest::new(filter.page, filter.limit);
        let mut query = StockMovementEntity::find();

        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(size) = filter.size.as_deref().filter(|s| !s.is_empty()) {
            query = query.filter(stock_movement::Column::Size.eq(size));
        }
        if let Some(kind) = filter.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(kind));
        }
        if let Some(order_id) = filter.order_id {
            query = query.filter(stock_movement::Column::OrderId.eq(order_id));
        }
        if let Some(from) = filter.from {
            query = query.filter(stock_movement::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(stock_movement::Column::CreatedAt.lte(to));
        }

        let paginator = query
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .paginate(&*self.db, page.limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.index())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(PaginatedResponse::new(items, total, page))
    }

    /// Stored stock next to the level rebuilt from the ledger
    #[instrument(skip(self))]
    pub async fn current_stock(&self, product_id: i32) -> Result<StockLevel, ServiceError> {
        let db = &*self.db;
        let product = ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Product", product_id))?;

        let sizes = ProductSizeEntity::find()
            .filter(product_size::Column::ProductId.eq(product_id))
            .order_by_asc(product_size::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let entries: Vec<(Option<String>, i32)> = StockMovementEntity::find()
            .select_only()
            .column(stock_movement::Column::Size)
            .column(stock_movement::Column::Quantity)
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .into_tuple()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut per_size: BTreeMap<String, i64> = BTreeMap::new();
        let mut derived_total: i64 = 0;
        for (size, quantity) in entries {
            derived_total += i64::from(quantity);
            if let Some(size) = size {
                *per_size.entry(size).or_default() += i64::from(quantity);
            }
        }

        let sizes: Vec<SizeStockLevel> = sizes
            .into_iter()
            .map(|row| {
                let derived = per_size.get(&row.size).copied().unwrap_or(0);
                SizeStockLevel {
                    consistent: derived == i64::from(row.stock),
                    size: row.size,
                    stock: row.stock,
                    derived_stock: derived,
                }
            })
            .collect();

        let sizes_sum: i64 = sizes.iter().map(|s| i64::from(s.stock)).sum();
        let consistent = derived_total == i64::from(product.stock)
            && sizes.iter().all(|s| s.consistent)
            && (sizes.is_empty() || sizes_sum == i64::from(product.stock));

        if !consistent {
            warn!(product_id, "Stored stock disagrees with the ledger");
        }

        Ok(StockLevel {
            product_id,
            product_name: product.name,
            stock: product.stock,
            derived_stock: derived_total,
            sizes,
            consistent,
        })
    }

    /// Active products, or their sizes, at or below the threshold
    #[instrument(skip(self))]
    pub async fn low_stock(&self, threshold: Option<i32>) -> Result<Vec<LowStockItem>, ServiceError> {
        let threshold = threshold.unwrap_or(self.low_stock_threshold);
        let db = &*self.db;

        let products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_asc(product::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let sizes = ProductSizeEntity::find()
            .order_by_asc(product_size::Column::ProductId)
            .order_by_asc(product_size::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let sized: HashSet<i32> = sizes.iter().map(|s| s.product_id).collect();
        let mut items = Vec::new();

        for product in &products {
            if sized.contains(&product.id) {
                for size in sizes
                    .iter()
                    .filter(|s| s.product_id == product.id && s.stock <= threshold)
                {
                    items.push(LowStockItem {
                        product_id: product.id,
                        product_name: product.name.clone(),
                        size: Some(size.size.clone()),
                        stock: size.stock,
                    });
                }
            } else if product.stock <= threshold {
                items.push(LowStockItem {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    size: None,
                    stock: product.stock,
                });
            }
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn stock_in_and_out_need_positive_quantity() {
        assert_eq!(
            RecordMovement::new(1, MovementType::StockIn, 4).fixed_delta().unwrap(),
            Some(4)
        );
        assert_eq!(
            RecordMovement::new(1, MovementType::StockOut, 4).fixed_delta().unwrap(),
            Some(-4)
        );
        assert_matches!(
            RecordMovement::new(1, MovementType::StockOut, 0).fixed_delta(),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            RecordMovement::new(1, MovementType::StockIn, -2).fixed_delta(),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn adjustments_take_signed_quantity_or_target() {
        assert_eq!(
            RecordMovement::new(1, MovementType::StockAdjustment, -3)
                .fixed_delta()
                .unwrap(),
            Some(-3)
        );
        assert_eq!(RecordMovement::target(1, 10).fixed_delta().unwrap(), None);
        assert_matches!(
            RecordMovement::new(1, MovementType::StockAdjustment, 0).fixed_delta(),
            Err(ServiceError::ValidationError(_))
        );

        let mut both = RecordMovement::target(1, 10);
        both.quantity = Some(2);
        assert_matches!(both.fixed_delta(), Err(ServiceError::ValidationError(_)));

        let mut target_on_stock_in = RecordMovement::target(1, 10);
        target_on_stock_in.movement_type = MovementType::StockIn;
        assert_matches!(
            target_on_stock_in.fixed_delta(),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn blank_size_is_treated_as_none() {
        let input = RecordMovement::new(1, MovementType::StockIn, 1).with_size("  ");
        assert_eq!(input.normalized_size(), None);
        let input = RecordMovement::new(1, MovementType::StockIn, 1).with_size(" M ");
        assert_eq!(input.normalized_size().as_deref(), Some("M"));
    }

    fn applied(quantity: i32, new_stock: i32) -> AppliedMovement {
        AppliedMovement {
            movement: StockMovementModel {
                id: 1,
                product_id: 3,
                size: Some("M".into()),
                movement_type: MovementType::StockOut,
                quantity,
                reason: None,
                notes: None,
                previous_stock: new_stock - quantity,
                new_stock,
                performed_by: None,
                order_id: None,
                created_at: Utc::now(),
            },
            product_name: "PE Shirt".into(),
            product_stock: new_stock,
        }
    }

    #[test]
    fn low_stock_event_only_on_decrease_to_threshold() {
        assert_eq!(applied(-2, 5).events(5).len(), 2);
        assert_eq!(applied(-2, 6).events(5).len(), 1);
        assert_eq!(applied(2, 3).events(5).len(), 1);
        assert_matches!(
            applied(-2, 0).events(5).last(),
            Some(Event::LowStock { stock: 0, threshold: 5, .. })
        );
    }
}
