use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::{
    db::DbPool,
    entities::{
        cart_item::{self, Entity as CartItemEntity},
        category::Entity as CategoryEntity,
        order::{self, Entity as OrderEntity},
        order_item::{self, Entity as OrderItemEntity},
        product::{self, Entity as ProductEntity, Model as ProductModel},
        product_image::{self, Entity as ProductImageEntity, Model as ProductImageModel},
        product_size::{self, Entity as ProductSizeEntity, Model as ProductSizeModel},
        stock_movement::{self, Entity as StockMovementEntity},
    },
    errors::ServiceError,
    models::{MovementType, OrderStatus},
    services::{
        stock::{AppliedMovement, RecordMovement, StockService, REASON_INITIAL_STOCK},
        PageRequest,
    },
    PaginatedResponse,
};

fn validate_money(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        let mut err = ValidationError::new("money");
        err.message = Some("Amount cannot be negative".into());
        return Err(err);
    }
    if value.scale() > 2 {
        let mut err = ValidationError::new("money");
        err.message = Some("Amount cannot have more than two decimal places".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SizeInput {
    #[validate(length(min = 1, max = 32, message = "Size must be 1-32 characters"))]
    pub size: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i32,
    #[validate(custom = "validate_money")]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ImageInput {
    #[validate(length(min = 1, max = 1024, message = "Image URL must be 1-1024 characters"))]
    pub url: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255, message = "Product name must be 1-255 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom = "validate_money")]
    pub price: Decimal,
    #[validate(custom = "validate_money")]
    pub original_price: Option<Decimal>,
    pub category_id: Option<i32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Opening stock for products without sizes
    #[serde(default)]
    #[validate(range(min = 0))]
    pub initial_stock: i32,
    #[serde(default)]
    pub sizes: Vec<SizeInput>,
    #[serde(default)]
    pub images: Vec<ImageInput>,
}

fn default_active() -> bool {
    true
}

/// Catalog fields only; stock changes go through the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "validate_money")]
    pub price: Option<Decimal>,
    #[validate(custom = "validate_money")]
    pub original_price: Option<Decimal>,
    pub category_id: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductFilter {
    pub category_id: Option<i32>,
    /// Case-insensitive match on the product name
    pub search: Option<String>,
    pub active_only: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: ProductModel,
    pub sizes: Vec<ProductSizeModel>,
    pub images: Vec<ProductImageModel>,
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DbPool>,
    stock: StockService,
}

impl ProductService {
    pub fn new(db: Arc<DbPool>, stock: StockService) -> Self {
        Self { db, stock }
    }

    async fn ensure_category(&self, category_id: Option<i32>) -> Result<(), ServiceError> {
        if let Some(id) = category_id {
            CategoryEntity::find_by_id(id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::InvalidInput(format!("Category {} does not exist", id)))?;
        }
        Ok(())
    }

    async fn find_product(&self, id: i32) -> Result<ProductModel, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }

    async fn details_for(
        &self,
        products: Vec<ProductModel>,
    ) -> Result<Vec<ProductDetails>, ServiceError> {
        let ids: Vec<i32> = products.iter().map(|p| p.id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sizes: HashMap<i32, Vec<ProductSizeModel>> = HashMap::new();
        for size in ProductSizeEntity::find()
            .filter(product_size::Column::ProductId.is_in(ids.clone()))
            .order_by_asc(product_size::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
        {
            sizes.entry(size.product_id).or_default().push(size);
        }

        let mut images: HashMap<i32, Vec<ProductImageModel>> = HashMap::new();
        for image in ProductImageEntity::find()
            .filter(product_image::Column::ProductId.is_in(ids))
            .order_by_asc(product_image::Column::SortOrder)
            .order_by_asc(product_image::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
        {
            images.entry(image.product_id).or_default().push(image);
        }

        Ok(products
            .into_iter()
            .map(|product| ProductDetails {
                sizes: sizes.remove(&product.id).unwrap_or_default(),
                images: images.remove(&product.id).unwrap_or_default(),
                product,
            })
            .collect())
    }

    #[instrument(skip(self, filter))]
    pub async fn list(
        &self,
        filter: &ProductFilter,
    ) -> Result<PaginatedResponse<ProductDetails>, ServiceError> {
        let page = PageRequest::new(filter.page, filter.limit);
        let mut query = ProductEntity::find();

        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if filter.active_only.unwrap_or(false) {
            query = query.filter(product::Column::IsActive.eq(true));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(product::Column::Name.contains(term));
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .order_by_asc(product::Column::Id)
            .paginate(&*self.db, page.limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let products = paginator
            .fetch_page(page.index())
            .await
            .map_err(ServiceError::db_error)?;

        let items = self.details_for(products).await?;
        Ok(PaginatedResponse::new(items, total, page))
    }

    pub async fn get(&self, id: i32) -> Result<ProductDetails, ServiceError> {
        let product = self.find_product(id).await?;
        self.details_for(vec![product])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }

    /// Creates a product; opening stock is written to the ledger as `initial_stock`
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        input: CreateProductInput,
        actor: Option<i32>,
    ) -> Result<ProductDetails, ServiceError> {
        input.validate()?;
        for size in &input.sizes {
            size.validate()?;
        }
        for image in &input.images {
            image.validate()?;
        }

        let mut seen = HashSet::new();
        for size in &input.sizes {
            if !seen.insert(size.size.trim().to_lowercase()) {
                return Err(ServiceError::ValidationError(format!(
                    "Duplicate size '{}'",
                    size.size
                )));
            }
        }
        if !input.sizes.is_empty() && input.initial_stock > 0 {
            return Err(ServiceError::ValidationError(
                "Products with sizes take their opening stock per size".to_string(),
            ));
        }
        self.ensure_category(input.category_id).await?;

        let now = Utc::now();
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let product = product::ActiveModel {
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            price: Set(input.price),
            original_price: Set(input.original_price),
            stock: Set(0),
            category_id: Set(input.category_id),
            is_active: Set(input.is_active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        for size in &input.sizes {
            product_size::ActiveModel {
                product_id: Set(product.id),
                size: Set(size.size.trim().to_string()),
                stock: Set(0),
                price: Set(size.price),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }

        let primary = input
            .images
            .iter()
            .position(|image| image.is_primary)
            .unwrap_or(0);
        for (index, image) in input.images.iter().enumerate() {
            product_image::ActiveModel {
                product_id: Set(product.id),
                url: Set(image.url.clone()),
                is_primary: Set(index == primary),
                sort_order: Set(index as i32),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }

        let mut applied: Vec<AppliedMovement> = Vec::new();
        if input.sizes.is_empty() {
            if input.initial_stock > 0 {
                let movement =
                    RecordMovement::new(product.id, MovementType::StockIn, input.initial_stock)
                        .with_reason(REASON_INITIAL_STOCK);
                applied.push(StockService::apply_in_txn(&txn, &movement, actor).await?);
            }
        } else {
            for size in input.sizes.iter().filter(|s| s.stock > 0) {
                let movement = RecordMovement::new(product.id, MovementType::StockIn, size.stock)
                    .with_size(size.size.trim())
                    .with_reason(REASON_INITIAL_STOCK);
                applied.push(StockService::apply_in_txn(&txn, &movement, actor).await?);
            }
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit product creation");
            ServiceError::db_error(e)
        })?;

        for movement in &applied {
            self.stock.publish(movement).await;
        }

        info!(product_id = product.id, "Product created");
        self.get(product.id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i32,
        input: UpdateProductInput,
    ) -> Result<ProductDetails, ServiceError> {
        input.validate()?;
        let existing = self.find_product(id).await?;
        self.ensure_category(input.category_id).await?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(original_price) = input.original_price {
            active.original_price = Set(Some(original_price));
        }
        if let Some(category_id) = input.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        self.get(id).await
    }

    pub async fn set_active(&self, id: i32, is_active: bool) -> Result<ProductModel, ServiceError> {
        let existing = self.find_product(id).await?;
        let mut active: product::ActiveModel = existing.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Removes a product that no order references, with its sizes, images,
    /// cart lines and ledger
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        self.find_product(id).await?;

        let ordered = OrderItemEntity::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if ordered > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product {} appears in {} order line(s); deactivate it instead",
                id, ordered
            )));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        CartItemEntity::delete_many()
            .filter(cart_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        StockMovementEntity::delete_many()
            .filter(stock_movement::Column::ProductId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        ProductSizeEntity::delete_many()
            .filter(product_size::Column::ProductId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        ProductImageEntity::delete_many()
            .filter(product_image::Column::ProductId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        ProductEntity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(product_id = id, "Product deleted");
        Ok(())
    }

    /// Adds a size variant; its opening stock goes through the ledger
    #[instrument(skip(self, input), fields(size = %input.size))]
    pub async fn add_size(
        &self,
        product_id: i32,
        input: SizeInput,
        actor: Option<i32>,
    ) -> Result<ProductSizeModel, ServiceError> {
        input.validate()?;
        let name = input.size.trim().to_string();

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let product = ProductEntity::find_by_id(product_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Product", product_id))?;

        let existing: Vec<ProductSizeModel> = ProductSizeEntity::find()
            .filter(product_size::Column::ProductId.eq(product_id))
            .all(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.iter().any(|s| s.size.eq_ignore_ascii_case(&name)) {
            return Err(ServiceError::Conflict(format!(
                "Product {} already has size {}",
                product_id, name
            )));
        }
        if existing.is_empty() && product.stock != 0 {
            return Err(ServiceError::Conflict(format!(
                "Product {} holds {} unsized unit(s); adjust them to zero before adding sizes",
                product_id, product.stock
            )));
        }

        let now = Utc::now();
        let size = product_size::ActiveModel {
            product_id: Set(product_id),
            size: Set(name.clone()),
            stock: Set(0),
            price: Set(input.price),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        let applied = if input.stock > 0 {
            let movement = RecordMovement::new(product_id, MovementType::StockIn, input.stock)
                .with_size(name)
                .with_reason(REASON_INITIAL_STOCK);
            Some(StockService::apply_in_txn(&txn, &movement, actor).await?)
        } else {
            None
        };
        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(applied) = applied {
            self.stock.publish(&applied).await;
        }

        ProductSizeEntity::find_by_id(size.id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Size", size.id))
    }

    async fn find_size(&self, product_id: i32, size_id: i32) -> Result<ProductSizeModel, ServiceError> {
        ProductSizeEntity::find_by_id(size_id)
            .filter(product_size::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Size", size_id))
    }

    pub async fn update_size_price(
        &self,
        product_id: i32,
        size_id: i32,
        price: Option<Decimal>,
    ) -> Result<ProductSizeModel, ServiceError> {
        if let Some(price) = &price {
            validate_money(price).map_err(|e| {
                ServiceError::ValidationError(
                    e.message.map(|m| m.to_string()).unwrap_or_else(|| "Invalid price".into()),
                )
            })?;
        }
        let size = self.find_size(product_id, size_id).await?;
        let mut active: product_size::ActiveModel = size.into();
        active.price = Set(price);
        active.updated_at = Set(Utc::now());
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Removes an empty size variant and any cart lines pointing at it.
    ///
    /// Refused while an order that can still be cancelled or refunded holds
    /// the size.
    #[instrument(skip(self))]
    pub async fn remove_size(&self, product_id: i32, size_id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        ProductEntity::find_by_id(product_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Product", product_id))?;
        let size = ProductSizeEntity::find_by_id(size_id)
            .filter(product_size::Column::ProductId.eq(product_id))
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Size", size_id))?;

        if size.stock != 0 {
            return Err(ServiceError::Conflict(format!(
                "Size {} still holds {} unit(s); adjust it to zero first",
                size.size, size.stock
            )));
        }

        let open_orders = OrderItemEntity::find()
            .inner_join(OrderEntity)
            .filter(order_item::Column::ProductId.eq(product_id))
            .filter(order_item::Column::Size.eq(size.size.clone()))
            .filter(order::Column::Status.is_not_in([
                OrderStatus::Completed,
                OrderStatus::Cancelled,
                OrderStatus::Refunded,
            ]))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if open_orders > 0 {
            return Err(ServiceError::Conflict(format!(
                "Size {} is on {} open order line(s)",
                size.size, open_orders
            )));
        }

        CartItemEntity::delete_many()
            .filter(cart_item::Column::ProductId.eq(product_id))
            .filter(cart_item::Column::Size.eq(size.size.clone()))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        ProductSizeEntity::delete_by_id(size.id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(product_id, size = %size.size, "Size removed");
        Ok(())
    }

    /// Adds an image; the first image of a product becomes its primary one
    pub async fn add_image(
        &self,
        product_id: i32,
        input: ImageInput,
    ) -> Result<ProductImageModel, ServiceError> {
        input.validate()?;
        self.find_product(product_id).await?;

        let count = ProductImageEntity::find()
            .filter(product_image::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let is_primary = input.is_primary || count == 0;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        if is_primary {
            ProductImageEntity::update_many()
                .col_expr(product_image::Column::IsPrimary, Expr::value(false))
                .filter(product_image::Column::ProductId.eq(product_id))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;
        }
        let image = product_image::ActiveModel {
            product_id: Set(product_id),
            url: Set(input.url),
            is_primary: Set(is_primary),
            sort_order: Set(count as i32),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        Ok(image)
    }

    /// Removes an image, promoting the next one when the primary goes
    pub async fn remove_image(&self, product_id: i32, image_id: i32) -> Result<(), ServiceError> {
        let image = ProductImageEntity::find_by_id(image_id)
            .filter(product_image::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Image", image_id))?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        ProductImageEntity::delete_by_id(image.id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        if image.is_primary {
            let next = ProductImageEntity::find()
                .filter(product_image::Column::ProductId.eq(product_id))
                .order_by_asc(product_image::Column::SortOrder)
                .order_by_asc(product_image::Column::Id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            if let Some(next) = next {
                let mut active: product_image::ActiveModel = next.into();
                active.is_primary = Set(true);
                active.update(&txn).await.map_err(ServiceError::db_error)?;
            }
        }
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(())
    }
}
