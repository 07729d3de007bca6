use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::IntoParams;

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::notification::{self, Entity as NotificationEntity, Model as NotificationModel},
    errors::ServiceError,
    models::NotificationType,
    notifications::{user_room, RealtimeHub, RealtimeMessage, ADMIN_ROOM},
    services::PageRequest,
    PaginatedResponse,
};

/// Server-side notification trigger input
#[derive(Debug, Clone)]
pub struct NewNotification {
    /// `None` addresses the admin feed
    pub user_id: Option<i32>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread_only: bool,
    /// Only notifications created after this instant
    pub since: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DbPool>,
    hub: RealtimeHub,
}

impl NotificationService {
    pub fn new(db: Arc<DbPool>, hub: RealtimeHub) -> Self {
        Self { db, hub }
    }

    pub fn hub(&self) -> &RealtimeHub {
        &self.hub
    }

    /// Persists a notification and pushes it to the matching realtime room
    #[instrument(skip(self, input), fields(user_id = ?input.user_id, kind = %input.notification_type))]
    pub async fn create(&self, input: NewNotification) -> Result<NotificationModel, ServiceError> {
        let model = notification::ActiveModel {
            user_id: Set(input.user_id),
            notification_type: Set(input.notification_type),
            title: Set(input.title),
            message: Set(input.message),
            related_id: Set(input.related_id),
            is_read: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to persist notification");
            ServiceError::db_error(e)
        })?;

        metrics::counter!("school_store_notifications_created", 1);

        let room = match model.user_id {
            Some(user_id) => user_room(user_id),
            None => ADMIN_ROOM.to_string(),
        };
        match serde_json::to_value(&model) {
            Ok(payload) => {
                let delivered = self
                    .hub
                    .publish(&room, RealtimeMessage::new("notification", payload));
                info!(notification_id = model.id, room = %room, delivered, "Notification created");
            }
            Err(e) => warn!(error = %e, "Failed to serialize notification for realtime push"),
        }

        Ok(model)
    }

    fn owned_by(user_id: i32) -> Condition {
        Condition::all().add(notification::Column::UserId.eq(user_id))
    }

    fn admin_feed() -> Condition {
        Condition::all().add(notification::Column::UserId.is_null())
    }

    /// Rows the actor may mutate in bulk: their own, plus the admin feed for admins
    fn mutable_by(actor: &AuthUser) -> Condition {
        let mut scope = Condition::any().add(Self::owned_by(actor.user_id));
        if actor.is_admin() {
            scope = scope.add(Self::admin_feed());
        }
        scope
    }

    async fn list(
        &self,
        scope: Condition,
        filter: &NotificationFilter,
    ) -> Result<PaginatedResponse<NotificationModel>, ServiceError> {
        let page = PageRequest::new(filter.page, filter.limit);

        let mut query = NotificationEntity::find().filter(scope);
        if filter.unread_only {
            query = query.filter(notification::Column::IsRead.eq(false));
        }
        if let Some(since) = filter.since {
            query = query.filter(notification::Column::CreatedAt.gt(since));
        }

        let paginator = query
            .order_by_desc(notification::Column::CreatedAt)
            .order_by_desc(notification::Column::Id)
            .paginate(&*self.db, page.limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.index())
            .await
            .map_err(ServiceError::db_error)?;

        Ok(PaginatedResponse::new(items, total, page))
    }

    /// Polling feed for a single user, newest first
    #[instrument(skip(self, filter))]
    pub async fn list_for_user(
        &self,
        user_id: i32,
        filter: &NotificationFilter,
    ) -> Result<PaginatedResponse<NotificationModel>, ServiceError> {
        self.list(Self::owned_by(user_id), filter).await
    }

    /// Admin broadcast feed
    #[instrument(skip(self, filter))]
    pub async fn list_admin(
        &self,
        filter: &NotificationFilter,
    ) -> Result<PaginatedResponse<NotificationModel>, ServiceError> {
        self.list(Self::admin_feed(), filter).await
    }

    pub async fn unread_count(
        &self,
        actor: &AuthUser,
        include_admin_feed: bool,
    ) -> Result<u64, ServiceError> {
        let scope = if include_admin_feed {
            Self::mutable_by(actor)
        } else {
            Condition::any().add(Self::owned_by(actor.user_id))
        };

        NotificationEntity::find()
            .filter(scope)
            .filter(notification::Column::IsRead.eq(false))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Loads a notification the actor is allowed to touch.
    ///
    /// Another user's row reads as missing; the admin feed is forbidden to
    /// non-admins.
    async fn find_for_actor(
        &self,
        id: i32,
        actor: &AuthUser,
    ) -> Result<NotificationModel, ServiceError> {
        let row = NotificationEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Notification", id))?;

        match row.user_id {
            Some(owner) if owner == actor.user_id => Ok(row),
            Some(_) => Err(ServiceError::not_found("Notification", id)),
            None if actor.is_admin() => Ok(row),
            None => Err(ServiceError::Forbidden(
                "Only admins can manage admin notifications".to_string(),
            )),
        }
    }

    #[instrument(skip(self, actor), fields(actor = actor.user_id))]
    pub async fn mark_read(
        &self,
        id: i32,
        actor: &AuthUser,
    ) -> Result<NotificationModel, ServiceError> {
        let row = self.find_for_actor(id, actor).await?;
        if row.is_read {
            return Ok(row);
        }

        let mut active: notification::ActiveModel = row.into();
        active.is_read = Set(true);
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Marks every unread notification in the actor's scope as read
    #[instrument(skip(self, actor), fields(actor = actor.user_id))]
    pub async fn mark_all_read(&self, actor: &AuthUser) -> Result<u64, ServiceError> {
        let result = NotificationEntity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(Self::mutable_by(actor))
            .filter(notification::Column::IsRead.eq(false))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }

    #[instrument(skip(self, actor), fields(actor = actor.user_id))]
    pub async fn delete(&self, id: i32, actor: &AuthUser) -> Result<(), ServiceError> {
        let row = self.find_for_actor(id, actor).await?;
        NotificationEntity::delete_by_id(row.id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }

    /// Deletes read notifications in the actor's scope
    #[instrument(skip(self, actor), fields(actor = actor.user_id))]
    pub async fn delete_read(&self, actor: &AuthUser) -> Result<u64, ServiceError> {
        let result = NotificationEntity::delete_many()
            .filter(Self::mutable_by(actor))
            .filter(notification::Column::IsRead.eq(true))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }
}
