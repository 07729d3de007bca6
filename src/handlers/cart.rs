use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};

use super::common::AffectedRows;
use crate::{
    auth::AuthUser,
    services::carts::{AddToCartInput, CartView, UpdateCartItemInput},
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:id", put(update_item).delete(remove_item))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart priced against the current catalog", body = ApiResponse<CartView>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<CartView> {
    let cart = state.services.carts.list(user.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddToCartInput,
    responses(
        (status = 200, description = "Item added or merged into an existing line", body = ApiResponse<CartView>),
        (status = 400, description = "Inactive product or missing size", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<AddToCartInput>,
) -> ApiResult<CartView> {
    let cart = state.services.carts.add(user.user_id, input).await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{id}",
    params(("id" = i32, Path, description = "Cart item id")),
    request_body = UpdateCartItemInput,
    responses(
        (status = 200, description = "Quantity changed; zero removes the line", body = ApiResponse<CartView>),
        (status = 404, description = "Cart item not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(input): Json<UpdateCartItemInput>,
) -> ApiResult<CartView> {
    let cart = state
        .services
        .carts
        .update_quantity(user.user_id, id, input)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{id}",
    params(("id" = i32, Path, description = "Cart item id")),
    responses(
        (status = 200, description = "Line removed", body = ApiResponse<CartView>)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<CartView> {
    let cart = state.services.carts.remove(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart emptied", body = ApiResponse<AffectedRows>)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<AffectedRows> {
    let affected = state.services.carts.clear(user.user_id).await?;
    Ok(Json(ApiResponse::success(AffectedRows { affected })))
}
