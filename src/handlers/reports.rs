use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::AdminUser,
    services::reports::{DashboardSummary, InventoryValuation, ReportPeriod, TopProduct},
    ApiResponse, ApiResult, AppState,
};

const DEFAULT_TOP_PRODUCTS: usize = 10;
const MAX_TOP_PRODUCTS: usize = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TopProductsQuery {
    pub limit: Option<usize>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/dashboard", get(dashboard))
        .route("/reports/top-products", get(top_products))
        .route("/reports/inventory-valuation", get(inventory_valuation))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard",
    params(ReportPeriod),
    responses(
        (status = 200, description = "Store overview", body = ApiResponse<DashboardSummary>),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Reports"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(period): Query<ReportPeriod>,
) -> ApiResult<DashboardSummary> {
    let summary = state.services.reports.dashboard(&period).await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/top-products",
    params(TopProductsQuery),
    responses(
        (status = 200, description = "Best sellers by units", body = ApiResponse<Vec<TopProduct>>)
    ),
    security(("Bearer" = [])),
    tag = "Reports"
)]
pub async fn top_products(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<TopProductsQuery>,
) -> ApiResult<Vec<TopProduct>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_PRODUCTS)
        .clamp(1, MAX_TOP_PRODUCTS);
    let products = state.services.reports.top_products(limit).await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/inventory-valuation",
    responses(
        (status = 200, description = "Stock valued at cost and at retail", body = ApiResponse<InventoryValuation>)
    ),
    security(("Bearer" = [])),
    tag = "Reports"
)]
pub async fn inventory_valuation(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<InventoryValuation> {
    let valuation = state.services.reports.inventory_valuation().await?;
    Ok(Json(ApiResponse::success(valuation)))
}
