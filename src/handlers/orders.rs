use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::common::created;
use crate::{
    auth::{AdminUser, AuthUser},
    entities::order_status_history::Model as OrderStatusHistoryModel,
    errors::ServiceError,
    services::orders::{
        CheckoutInput, OrderDetails, OrderFilter, OrderWithItems, UpdateStatusInput,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CancelOrderRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/checkout", post(checkout))
        .route("/orders", get(list_my_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/history", get(order_history))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/status", put(update_order_status))
        .route("/admin/orders", get(list_all_orders))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/checkout",
    summary = "Check out",
    description = "Builds an order from the cart (or a subset of it, or explicit items), takes the stock out and clears the consumed cart lines",
    request_body = CheckoutInput,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<OrderDetails>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Empty cart, inactive product or invalid size", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CheckoutInput>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetails>>), ServiceError> {
    let order = state.services.orders.checkout(user.user_id, input).await?;
    Ok(created(order))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List my orders",
    params(OrderFilter),
    responses(
        (status = 200, description = "The caller's orders, newest first", body = ApiResponse<PaginatedResponse<OrderWithItems>>)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(mut filter): Query<OrderFilter>,
) -> ApiResult<PaginatedResponse<OrderWithItems>> {
    filter.limit = Some(state.config.clamp_page_size(filter.limit));
    let orders = state
        .services
        .orders
        .list_for_user(user.user_id, &filter)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    summary = "List all orders",
    params(OrderFilter),
    responses(
        (status = 200, description = "Every order, newest first", body = ApiResponse<PaginatedResponse<OrderWithItems>>),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(mut filter): Query<OrderFilter>,
) -> ApiResult<PaginatedResponse<OrderWithItems>> {
    filter.limit = Some(state.config.clamp_page_size(filter.limit));
    let orders = state.services.orders.list_all(&filter).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items and status history", body = ApiResponse<OrderDetails>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<OrderDetails> {
    let order = state.services.orders.get(id, &user).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/history",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Status changes, oldest first", body = ApiResponse<Vec<OrderStatusHistoryModel>>)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn order_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Vec<OrderStatusHistoryModel>> {
    let history = state.services.orders.history(id, &user).await?;
    Ok(Json(ApiResponse::success(history)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = i32, Path, description = "Order id")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled and its stock returned", body = ApiResponse<OrderDetails>),
        (status = 400, description = "Order is no longer pending", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    body: Option<Json<CancelOrderRequest>>,
) -> ApiResult<OrderDetails> {
    let Json(request) = body.unwrap_or_default();
    request.validate()?;
    let order = state
        .services
        .orders
        .cancel(id, &user, request.reason)
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        order,
        format!("Order {} has been cancelled", id),
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    description = "Moves an order along an allowed edge; cancelling returns the stock and marks paid orders refunded",
    params(("id" = i32, Path, description = "Order id")),
    request_body = UpdateStatusInput,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderDetails>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order changed concurrently", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
    Json(input): Json<UpdateStatusInput>,
) -> ApiResult<OrderDetails> {
    let order = state
        .services
        .orders
        .update_status(id, input, &admin)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
