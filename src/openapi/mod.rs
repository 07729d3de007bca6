use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School Store API",
        version = "1.0.0",
        description = r#"
# School Store API

Backend for a school store: catalog, cart and checkout, order status tracking,
a stock-movement ledger and notifications.

## Authentication

Bearer tokens (HS256) carry the user id in `sub` and a `role` of `admin` or
`customer`:

```
Authorization: Bearer <token>
```

## Responses

Successful responses are wrapped in `{ success, data, message, errors, meta }`.
Failures return an `ErrorResponse` with the matching HTTP status.

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100).
"#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Catalog", description = "Categories, products, sizes and images"),
        (name = "Inventory", description = "Stock-movement ledger"),
        (name = "Cart", description = "Shopping cart"),
        (name = "Orders", description = "Checkout and order status workflow"),
        (name = "Notifications", description = "Notification polling"),
        (name = "Reports", description = "Simple aggregates for the admin dashboard"),
        (name = "Health", description = "Health check")
    ),
    paths(
        crate::handlers::health::health,

        // Catalog
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::set_product_active,
        crate::handlers::products::delete_product,
        crate::handlers::products::add_size,
        crate::handlers::products::update_size_price,
        crate::handlers::products::remove_size,
        crate::handlers::products::add_image,
        crate::handlers::products::remove_image,

        // Inventory
        crate::handlers::inventory::record_movement,
        crate::handlers::inventory::list_movements,
        crate::handlers::inventory::product_stock,
        crate::handlers::inventory::low_stock,

        // Cart
        crate::handlers::cart::get_cart,
        crate::handlers::cart::add_item,
        crate::handlers::cart::update_item,
        crate::handlers::cart::remove_item,
        crate::handlers::cart::clear_cart,

        // Orders
        crate::handlers::orders::checkout,
        crate::handlers::orders::list_my_orders,
        crate::handlers::orders::list_all_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::order_history,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::update_order_status,

        // Notifications
        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::list_admin_notifications,
        crate::handlers::notifications::unread_count,
        crate::handlers::notifications::mark_read,
        crate::handlers::notifications::mark_all_read,
        crate::handlers::notifications::delete_notification,
        crate::handlers::notifications::delete_read,

        // Reports
        crate::handlers::reports::dashboard,
        crate::handlers::reports::top_products,
        crate::handlers::reports::inventory_valuation,
    ),
    components(
        schemas(
            crate::models::OrderStatus,
            crate::models::PaymentMethod,
            crate::models::PaymentStatus,
            crate::models::MovementType,
            crate::models::NotificationType,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serves the generated document at `/api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}
