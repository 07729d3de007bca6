use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};

use super::common::{AffectedRows, CountResponse};
use crate::{
    auth::{AdminUser, AuthUser},
    entities::notification::Model as NotificationModel,
    services::notifications::NotificationFilter,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/read", delete(delete_read))
        .route("/notifications/:id", delete(delete_notification))
        .route("/notifications/:id/read", post(mark_read))
        .route("/admin/notifications", get(list_admin_notifications))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    summary = "Poll my notifications",
    params(NotificationFilter),
    responses(
        (status = 200, description = "Newest first", body = ApiResponse<PaginatedResponse<NotificationModel>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(mut filter): Query<NotificationFilter>,
) -> ApiResult<PaginatedResponse<NotificationModel>> {
    filter.limit = Some(state.config.clamp_page_size(filter.limit));
    let page = state
        .services
        .notifications
        .list_for_user(user.user_id, &filter)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/notifications",
    summary = "Poll the admin feed",
    params(NotificationFilter),
    responses(
        (status = 200, description = "Admin broadcasts, newest first", body = ApiResponse<PaginatedResponse<NotificationModel>>),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Notifications"
)]
pub async fn list_admin_notifications(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(mut filter): Query<NotificationFilter>,
) -> ApiResult<PaginatedResponse<NotificationModel>> {
    filter.limit = Some(state.config.clamp_page_size(filter.limit));
    let page = state.services.notifications.list_admin(&filter).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    description = "Admins also count unread admin-feed entries",
    responses(
        (status = 200, description = "Unread notifications", body = ApiResponse<CountResponse>)
    ),
    security(("Bearer" = [])),
    tag = "Notifications"
)]
pub async fn unread_count(State(state): State<AppState>, user: AuthUser) -> ApiResult<CountResponse> {
    let count = state
        .services
        .notifications
        .unread_count(&user, user.is_admin())
        .await?;
    Ok(Json(ApiResponse::success(CountResponse { count })))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    params(("id" = i32, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked read", body = ApiResponse<NotificationModel>),
        (status = 403, description = "Admin feed entry, caller is not an admin", body = crate::errors::ErrorResponse),
        (status = 404, description = "Notification not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Notifications"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<NotificationModel> {
    let notification = state.services.notifications.mark_read(id, &user).await?;
    Ok(Json(ApiResponse::success(notification)))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    responses(
        (status = 200, description = "Rows marked read", body = ApiResponse<AffectedRows>)
    ),
    security(("Bearer" = [])),
    tag = "Notifications"
)]
pub async fn mark_all_read(State(state): State<AppState>, user: AuthUser) -> ApiResult<AffectedRows> {
    let affected = state.services.notifications.mark_all_read(&user).await?;
    Ok(Json(ApiResponse::success(AffectedRows { affected })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    params(("id" = i32, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<AffectedRows>),
        (status = 404, description = "Notification not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Notifications"
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<AffectedRows> {
    state.services.notifications.delete(id, &user).await?;
    Ok(Json(ApiResponse::success(AffectedRows::one())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/notifications/read",
    responses(
        (status = 200, description = "Read notifications deleted", body = ApiResponse<AffectedRows>)
    ),
    security(("Bearer" = [])),
    tag = "Notifications"
)]
pub async fn delete_read(State(state): State<AppState>, user: AuthUser) -> ApiResult<AffectedRows> {
    let affected = state.services.notifications.delete_read(&user).await?;
    Ok(Json(ApiResponse::success(AffectedRows { affected })))
}
