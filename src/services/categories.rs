use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        category::{self, Entity as CategoryEntity, Model as CategoryModel},
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100, message = "Category name must be 1-100 characters"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DbPool>,
}

impl CategoryService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        CategoryEntity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn get(&self, id: i32) -> Result<CategoryModel, ServiceError> {
        CategoryEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Category", id))
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i32>) -> Result<(), ServiceError> {
        let mut query = CategoryEntity::find().filter(category::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(category::Column::Id.ne(id));
        }
        let taken = query
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CategoryInput) -> Result<CategoryModel, ServiceError> {
        input.validate()?;
        let name = input.name.trim().to_string();
        self.ensure_name_free(&name, None).await?;

        let now = Utc::now();
        let model = category::ActiveModel {
            name: Set(name),
            description: Set(input.description),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(category_id = model.id, "Category created");
        Ok(model)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: i32, input: CategoryInput) -> Result<CategoryModel, ServiceError> {
        input.validate()?;
        let existing = self.get(id).await?;
        let name = input.name.trim().to_string();
        self.ensure_name_free(&name, Some(id)).await?;

        let mut active: category::ActiveModel = existing.into();
        active.name = Set(name);
        active.description = Set(input.description);
        active.updated_at = Set(Utc::now());
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Deletes a category that no product references
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        self.get(id).await?;

        let in_use = ProductEntity::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if in_use > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category {} is used by {} product(s)",
                id, in_use
            )));
        }

        CategoryEntity::delete_by_id(id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(category_id = id, "Category deleted");
        Ok(())
    }
}
