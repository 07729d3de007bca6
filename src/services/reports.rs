use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity},
        product_size::{Entity as ProductSizeEntity, Model as ProductSizeModel},
    },
    errors::ServiceError,
    models::{OrderStatus, PaymentStatus},
};

/// Optional reporting window over order creation time
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportPeriod {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub total_products: u64,
    pub active_products: u64,
    pub low_stock_count: usize,
    pub low_stock_threshold: i32,
    pub total_orders: usize,
    pub pending_orders: u64,
    pub orders_by_status: BTreeMap<String, u64>,
    /// Sum of paid order totals within the period
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopProduct {
    pub product_id: i32,
    pub product_name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryValuation {
    pub total_units: i64,
    /// Stock valued at `original_price`; products without one count as zero
    pub cost_value: Decimal,
    pub retail_value: Decimal,
    pub potential_margin: Decimal,
}

/// Read-only aggregation over the catalog and orders
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DbPool>,
    low_stock_threshold: i32,
}

impl ReportService {
    pub fn new(db: Arc<DbPool>, low_stock_threshold: i32) -> Self {
        Self {
            db,
            low_stock_threshold,
        }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, period: &ReportPeriod) -> Result<DashboardSummary, ServiceError> {
        let db = &*self.db;

        let total_products = ProductEntity::find()
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        let active: Vec<(i32, i32)> = ProductEntity::find()
            .select_only()
            .column(product::Column::Id)
            .column(product::Column::Stock)
            .filter(product::Column::IsActive.eq(true))
            .into_tuple()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let sizes = ProductSizeEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let sized: HashSet<i32> = sizes.iter().map(|s| s.product_id).collect();
        let active_ids: HashSet<i32> = active.iter().map(|(id, _)| *id).collect();

        let low_unsized = active
            .iter()
            .filter(|(id, stock)| !sized.contains(id) && *stock <= self.low_stock_threshold)
            .count();
        let low_sizes = sizes
            .iter()
            .filter(|s| active_ids.contains(&s.product_id) && s.stock <= self.low_stock_threshold)
            .count();

        let mut query = OrderEntity::find()
            .select_only()
            .column(order::Column::Status)
            .column(order::Column::PaymentStatus)
            .column(order::Column::TotalAmount);
        if let Some(from) = period.from {
            query = query.filter(order::Column::CreatedAt.gte(from));
        }
        if let Some(to) = period.to {
            query = query.filter(order::Column::CreatedAt.lte(to));
        }
        let orders: Vec<(OrderStatus, PaymentStatus, Decimal)> = query
            .into_tuple()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut orders_by_status: BTreeMap<String, u64> = BTreeMap::new();
        let mut revenue = Decimal::ZERO;
        for (status, payment_status, total) in &orders {
            *orders_by_status.entry(status.to_string()).or_default() += 1;
            if *payment_status == PaymentStatus::Paid {
                revenue += *total;
            }
        }
        let pending_orders = orders_by_status
            .get(&OrderStatus::Pending.to_string())
            .copied()
            .unwrap_or(0);

        Ok(DashboardSummary {
            total_products,
            active_products: active.len() as u64,
            low_stock_count: low_unsized + low_sizes,
            low_stock_threshold: self.low_stock_threshold,
            total_orders: orders.len(),
            pending_orders,
            orders_by_status,
            revenue,
        })
    }

    /// Best sellers by units across orders that were not cancelled or refunded
    #[instrument(skip(self))]
    pub async fn top_products(&self, limit: usize) -> Result<Vec<TopProduct>, ServiceError> {
        let db = &*self.db;
        let excluded = [OrderStatus::Cancelled, OrderStatus::Refunded];
        let counted: Vec<i32> = OrderEntity::find()
            .select_only()
            .column(order::Column::Id)
            .filter(order::Column::Status.is_not_in(excluded))
            .into_tuple()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        if counted.is_empty() {
            return Ok(Vec::new());
        }

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(counted))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut totals: HashMap<i32, TopProduct> = HashMap::new();
        for item in items {
            let entry = totals.entry(item.product_id).or_insert_with(|| TopProduct {
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                units_sold: 0,
                revenue: Decimal::ZERO,
            });
            entry.units_sold += i64::from(item.quantity);
            entry.revenue += item.subtotal;
        }

        let mut ranked: Vec<TopProduct> = totals.into_values().collect();
        ranked.sort_by(|a, b| {
            b.units_sold
                .cmp(&a.units_sold)
                .then(b.revenue.cmp(&a.revenue))
                .then(a.product_id.cmp(&b.product_id))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Values stock at cost and at retail; sized stock uses each size's
    /// price override when it has one
    #[instrument(skip(self))]
    pub async fn inventory_valuation(&self) -> Result<InventoryValuation, ServiceError> {
        let db = &*self.db;
        let products = ProductEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let mut sizes: HashMap<i32, Vec<ProductSizeModel>> = HashMap::new();
        for size in ProductSizeEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
        {
            sizes.entry(size.product_id).or_default().push(size);
        }

        let mut total_units = 0i64;
        let mut cost_value = Decimal::ZERO;
        let mut retail_value = Decimal::ZERO;
        for product in products {
            let (units, retail) = match sizes.get(&product.id) {
                Some(rows) => rows.iter().fold((0i32, Decimal::ZERO), |(units, value), s| {
                    (
                        units + s.stock,
                        value + Decimal::from(s.stock) * s.price.unwrap_or(product.price),
                    )
                }),
                None => (product.stock, Decimal::from(product.stock) * product.price),
            };
            total_units += i64::from(units);
            retail_value += retail;
            if let Some(cost) = product.original_price {
                cost_value += Decimal::from(units) * cost;
            }
        }

        Ok(InventoryValuation {
            total_units,
            cost_value,
            retail_value,
            potential_margin: retail_value - cost_value,
        })
    }
}
