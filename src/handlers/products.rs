use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::{created, AffectedRows};
use crate::{
    auth::{AdminUser, AuthUser},
    entities::{
        product::Model as ProductModel, product_image::Model as ProductImageModel,
        product_size::Model as ProductSizeModel,
    },
    errors::ServiceError,
    services::products::{
        CreateProductInput, ImageInput, ProductDetails, ProductFilter, SizeInput,
        UpdateProductInput,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SizePriceRequest {
    /// `null` falls back to the product price
    pub price: Option<Decimal>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/:id/active", put(set_product_active))
        .route("/products/:id/sizes", post(add_size))
        .route(
            "/products/:id/sizes/:size_id",
            put(update_size_price).delete(remove_size),
        )
        .route("/products/:id/images", post(add_image))
        .route("/products/:id/images/:image_id", delete(remove_image))
}

fn is_admin(user: &Option<AuthUser>) -> bool {
    user.as_ref().is_some_and(AuthUser::is_admin)
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    description = "Customers only see active products; admins may list inactive ones too",
    params(ProductFilter),
    responses(
        (status = 200, description = "Products with sizes and images", body = ApiResponse<PaginatedResponse<ProductDetails>>)
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Query(mut filter): Query<ProductFilter>,
) -> ApiResult<PaginatedResponse<ProductDetails>> {
    if !is_admin(&user) {
        filter.active_only = Some(true);
    }
    filter.limit = Some(state.config.clamp_page_size(filter.limit));
    let products = state.services.products.list(&filter).await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductDetails>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<ProductDetails> {
    let product = state.services.products.get(id).await?;
    if !product.product.is_active && !is_admin(&user) {
        return Err(ServiceError::not_found("Product", id));
    }
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created; initial stock is recorded in the ledger", body = ApiResponse<ProductDetails>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(input): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductDetails>>), ServiceError> {
    let product = state
        .services
        .products
        .create(input, Some(admin.user_id))
        .await?;
    Ok(created(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductDetails>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i32>,
    Json(input): Json<UpdateProductInput>,
) -> ApiResult<ProductDetails> {
    let product = state.services.products.update(id, input).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}/active",
    params(("id" = i32, Path, description = "Product id")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Visibility changed", body = ApiResponse<ProductModel>)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn set_product_active(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i32>,
    Json(body): Json<SetActiveRequest>,
) -> ApiResult<ProductModel> {
    let product = state.services.products.set_active(id, body.is_active).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted", body = ApiResponse<AffectedRows>),
        (status = 409, description = "Product appears on orders; deactivate it instead", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i32>,
) -> ApiResult<AffectedRows> {
    state.services.products.delete(id).await?;
    Ok(Json(ApiResponse::success(AffectedRows::one())))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/sizes",
    params(("id" = i32, Path, description = "Product id")),
    request_body = SizeInput,
    responses(
        (status = 201, description = "Size added", body = ApiResponse<ProductSizeModel>),
        (status = 409, description = "Size already exists", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn add_size(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
    Json(input): Json<SizeInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductSizeModel>>), ServiceError> {
    let size = state
        .services
        .products
        .add_size(id, input, Some(admin.user_id))
        .await?;
    Ok(created(size))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}/sizes/{size_id}",
    params(
        ("id" = i32, Path, description = "Product id"),
        ("size_id" = i32, Path, description = "Size id")
    ),
    request_body = SizePriceRequest,
    responses(
        (status = 200, description = "Size price updated", body = ApiResponse<ProductSizeModel>)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn update_size_price(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path((id, size_id)): Path<(i32, i32)>,
    Json(body): Json<SizePriceRequest>,
) -> ApiResult<ProductSizeModel> {
    let size = state
        .services
        .products
        .update_size_price(id, size_id, body.price)
        .await?;
    Ok(Json(ApiResponse::success(size)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}/sizes/{size_id}",
    params(
        ("id" = i32, Path, description = "Product id"),
        ("size_id" = i32, Path, description = "Size id")
    ),
    responses(
        (status = 200, description = "Size removed", body = ApiResponse<AffectedRows>),
        (status = 409, description = "Size still holds stock", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn remove_size(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path((id, size_id)): Path<(i32, i32)>,
) -> ApiResult<AffectedRows> {
    state.services.products.remove_size(id, size_id).await?;
    Ok(Json(ApiResponse::success(AffectedRows::one())))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/images",
    params(("id" = i32, Path, description = "Product id")),
    request_body = ImageInput,
    responses(
        (status = 201, description = "Image attached", body = ApiResponse<ProductImageModel>)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn add_image(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i32>,
    Json(input): Json<ImageInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductImageModel>>), ServiceError> {
    let image = state.services.products.add_image(id, input).await?;
    Ok(created(image))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}/images/{image_id}",
    params(
        ("id" = i32, Path, description = "Product id"),
        ("image_id" = i32, Path, description = "Image id")
    ),
    responses(
        (status = 200, description = "Image removed", body = ApiResponse<AffectedRows>)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn remove_image(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path((id, image_id)): Path<(i32, i32)>,
) -> ApiResult<AffectedRows> {
    state.services.products.remove_image(id, image_id).await?;
    Ok(Json(ApiResponse::success(AffectedRows::one())))
}
