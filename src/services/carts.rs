use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        cart_item::{self, Entity as CartItemEntity, Model as CartItemModel},
        product::{self, Entity as ProductEntity, Model as ProductModel},
        product_image::{self, Entity as ProductImageEntity},
        product_size::{self, Entity as ProductSizeEntity, Model as ProductSizeModel},
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddToCartInput {
    pub product_id: i32,
    pub size: Option<String>,
    #[validate(range(min = 1, max = 999, message = "Quantity must be between 1 and 999"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemInput {
    /// Zero removes the line
    #[validate(range(min = 0, max = 999))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub size: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub available_stock: i32,
    /// Product is active and has enough stock for this line
    pub is_available: bool,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub item_count: i32,
    pub subtotal: Decimal,
}

pub(crate) fn normalize_size(size: Option<&str>) -> Option<String> {
    size.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A purchasable product/size pair with its current availability
pub(crate) struct Purchasable {
    pub product: ProductModel,
    pub size: Option<ProductSizeModel>,
}

impl Purchasable {
    pub fn available(&self) -> i32 {
        self.size.as_ref().map_or(self.product.stock, |s| s.stock)
    }

    pub fn unit_price(&self) -> Decimal {
        self.size
            .as_ref()
            .and_then(|s| s.price)
            .unwrap_or(self.product.price)
    }

    pub fn label(&self) -> String {
        match &self.size {
            Some(size) => format!("{} (size {})", self.product.name, size.size),
            None => self.product.name.clone(),
        }
    }
}

/// Resolves a product and optional size for purchase, enforcing the size rules
pub(crate) async fn resolve_purchasable<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    size: Option<&str>,
) -> Result<Purchasable, ServiceError> {
    let product = ProductEntity::find_by_id(product_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::not_found("Product", product_id))?;

    if !product.is_active {
        return Err(ServiceError::InvalidOperation(format!(
            "Product {} is not available for purchase",
            product.name
        )));
    }

    let sizes = ProductSizeEntity::find()
        .filter(product_size::Column::ProductId.eq(product_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let size = match (sizes.is_empty(), size) {
        (true, None) => None,
        (true, Some(_)) => {
            return Err(ServiceError::ValidationError(format!(
                "{} does not come in sizes",
                product.name
            )))
        }
        (false, None) => {
            return Err(ServiceError::ValidationError(format!(
                "Choose a size for {}",
                product.name
            )))
        }
        (false, Some(name)) => Some(
            sizes
                .into_iter()
                .find(|s| s.size == name)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Size {} not found for {}", name, product.name))
                })?,
        ),
    };

    Ok(Purchasable { product, size })
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    async fn find_line(&self, user_id: i32, item_id: i32) -> Result<CartItemModel, ServiceError> {
        CartItemEntity::find_by_id(item_id)
            .filter(cart_item::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Cart item", item_id))
    }

    /// The user's cart with prices resolved against the current catalog
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: i32) -> Result<CartView, ServiceError> {
        let db = &*self.db;
        let lines = CartItemEntity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .order_by_asc(cart_item::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let product_ids: Vec<i32> = lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<i32, ProductModel> = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let sizes: Vec<ProductSizeModel> = ProductSizeEntity::find()
            .filter(product_size::Column::ProductId.is_in(product_ids.clone()))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let mut primary_images: HashMap<i32, String> = HashMap::new();
        for image in ProductImageEntity::find()
            .filter(product_image::Column::ProductId.is_in(product_ids))
            .filter(product_image::Column::IsPrimary.eq(true))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
        {
            primary_images.entry(image.product_id).or_insert(image.url);
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let Some(product) = products.get(&line.product_id) else {
                continue;
            };
            let size = line.size.as_deref().and_then(|name| {
                sizes
                    .iter()
                    .find(|s| s.product_id == line.product_id && s.size == name)
            });
            let available = match (&line.size, size) {
                (Some(_), Some(size)) => size.stock,
                (Some(_), None) => 0,
                (None, _) => product.stock,
            };
            let unit_price = size.and_then(|s| s.price).unwrap_or(product.price);

            items.push(CartLine {
                id: line.id,
                product_id: product.id,
                product_name: product.name.clone(),
                size: line.size.clone(),
                quantity: line.quantity,
                unit_price,
                line_total: unit_price * Decimal::from(line.quantity),
                available_stock: available,
                is_available: product.is_active && line.quantity <= available,
                image_url: primary_images.get(&product.id).cloned(),
            });
        }

        let subtotal: Decimal = items.iter().map(|l| l.line_total).sum();
        let item_count: i32 = items.iter().map(|l| l.quantity).sum();
        Ok(CartView {
            items,
            item_count,
            subtotal,
        })
    }

    /// Adds a line or merges it into an existing line for the same product and size
    #[instrument(skip(self, input), fields(product_id = input.product_id))]
    pub async fn add(&self, user_id: i32, input: AddToCartInput) -> Result<CartView, ServiceError> {
        input.validate()?;
        let db = &*self.db;
        let size = normalize_size(input.size.as_deref());
        let target = resolve_purchasable(db, input.product_id, size.as_deref()).await?;

        let mut existing = CartItemEntity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(input.product_id));
        existing = match &size {
            Some(size) => existing.filter(cart_item::Column::Size.eq(size.clone())),
            None => existing.filter(cart_item::Column::Size.is_null()),
        };
        let existing = existing.one(db).await.map_err(ServiceError::db_error)?;

        let wanted = existing.as_ref().map_or(0, |l| l.quantity) + input.quantity;
        if wanted > target.available() {
            return Err(ServiceError::InsufficientStock(format!(
                "{} has {} available, cart would hold {}",
                target.label(),
                target.available(),
                wanted
            )));
        }

        let now = Utc::now();
        match existing {
            Some(line) => {
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(wanted);
                active.updated_at = Set(now);
                active.update(db).await.map_err(ServiceError::db_error)?;
            }
            None => {
                cart_item::ActiveModel {
                    user_id: Set(user_id),
                    product_id: Set(input.product_id),
                    size: Set(size),
                    quantity: Set(wanted),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(db)
                .await
                .map_err(ServiceError::db_error)?;
            }
        }

        info!(user_id, product_id = input.product_id, quantity = wanted, "Cart updated");
        self.list(user_id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_quantity(
        &self,
        user_id: i32,
        item_id: i32,
        input: UpdateCartItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let line = self.find_line(user_id, item_id).await?;
        if input.quantity == 0 {
            return self.remove(user_id, item_id).await;
        }

        let target =
            resolve_purchasable(&*self.db, line.product_id, line.size.as_deref()).await?;
        if input.quantity > target.available() {
            return Err(ServiceError::InsufficientStock(format!(
                "{} has {} available, requested {}",
                target.label(),
                target.available(),
                input.quantity
            )));
        }

        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(input.quantity);
        active.updated_at = Set(Utc::now());
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        self.list(user_id).await
    }

    pub async fn remove(&self, user_id: i32, item_id: i32) -> Result<CartView, ServiceError> {
        let line = self.find_line(user_id, item_id).await?;
        CartItemEntity::delete_by_id(line.id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        self.list(user_id).await
    }

    pub async fn clear(&self, user_id: i32) -> Result<u64, ServiceError> {
        let result = CartItemEntity::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }
}
