use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::common::created;
use crate::{
    auth::AdminUser,
    entities::stock_movement::Model as StockMovementModel,
    errors::ServiceError,
    services::stock::{LowStockItem, MovementFilter, RecordMovement, StockLevel},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LowStockQuery {
    /// Overrides the configured threshold
    pub threshold: Option<i32>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/inventory/movements",
            post(record_movement).get(list_movements),
        )
        .route("/inventory/products/:id/stock", get(product_stock))
        .route("/inventory/low-stock", get(low_stock))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/movements",
    summary = "Record a stock movement",
    description = "Appends a stock_in, stock_out or stock_adjustment entry and updates the stored level. Results below zero are rejected.",
    request_body = RecordMovement,
    responses(
        (status = 201, description = "Movement recorded", body = ApiResponse<StockMovementModel>),
        (status = 400, description = "Invalid movement", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Stock changed concurrently", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Inventory"
)]
pub async fn record_movement(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(input): Json<RecordMovement>,
) -> Result<(StatusCode, Json<ApiResponse<StockMovementModel>>), ServiceError> {
    let movement = state
        .services
        .stock
        .record_movement(input, Some(admin.user_id))
        .await?;
    Ok(created(movement))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/movements",
    params(MovementFilter),
    responses(
        (status = 200, description = "Ledger entries, newest first", body = ApiResponse<PaginatedResponse<StockMovementModel>>)
    ),
    security(("Bearer" = [])),
    tag = "Inventory"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(mut filter): Query<MovementFilter>,
) -> ApiResult<PaginatedResponse<StockMovementModel>> {
    filter.limit = Some(state.config.clamp_page_size(filter.limit));
    let movements = state.services.stock.list_movements(&filter).await?;
    Ok(Json(ApiResponse::success(movements)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/products/{id}/stock",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Stored level next to the ledger-derived level", body = ApiResponse<StockLevel>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Inventory"
)]
pub async fn product_stock(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i32>,
) -> ApiResult<StockLevel> {
    let level = state.services.stock.current_stock(id).await?;
    Ok(Json(ApiResponse::success(level)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    params(LowStockQuery),
    responses(
        (status = 200, description = "Active products or sizes at or below the threshold", body = ApiResponse<Vec<LowStockItem>>)
    ),
    security(("Bearer" = [])),
    tag = "Inventory"
)]
pub async fn low_stock(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<LowStockQuery>,
) -> ApiResult<Vec<LowStockItem>> {
    let items = state.services.stock.low_stock(query.threshold).await?;
    Ok(Json(ApiResponse::success(items)))
}
