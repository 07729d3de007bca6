mod common;

use assert_matches::assert_matches;
use common::{TestApp, CUSTOMER_ID, OTHER_CUSTOMER_ID};
use rust_decimal_macros::dec;
use school_store_api::{
    errors::ServiceError,
    services::carts::{AddToCartInput, UpdateCartItemInput},
};

fn add(product_id: i32, size: Option<&str>, quantity: i32) -> AddToCartInput {
    AddToCartInput {
        product_id,
        size: size.map(str::to_string),
        quantity,
    }
}

#[tokio::test]
async fn adding_the_same_product_twice_merges_lines() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let product = app.seed_product("Pen", dec!(15.00), 10).await;
    let id = product.product.id;

    carts.add(CUSTOMER_ID, add(id, None, 2)).await.expect("first add");
    let cart = carts.add(CUSTOMER_ID, add(id, None, 3)).await.expect("second add");

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.items[0].line_total, dec!(75.00));
    assert_eq!(cart.item_count, 5);
    assert_eq!(cart.subtotal, dec!(75.00));
    assert!(cart.items[0].is_available);
}

#[tokio::test]
async fn cart_quantity_cannot_exceed_stock() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let product = app.seed_product("Calculator", dec!(600.00), 2).await;
    let id = product.product.id;

    carts.add(CUSTOMER_ID, add(id, None, 2)).await.expect("add");
    let result = carts.add(CUSTOMER_ID, add(id, None, 1)).await;
    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));

    let cart = carts.list(CUSTOMER_ID).await.expect("cart");
    assert_eq!(cart.items[0].quantity, 2);

    let line = cart.items[0].id;
    let result = carts
        .update_quantity(CUSTOMER_ID, line, UpdateCartItemInput { quantity: 3 })
        .await;
    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));
}

#[tokio::test]
async fn sized_products_need_a_known_size() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let shirt = app
        .seed_sized_product("PE Shirt", dec!(250.00), &[("S", 2), ("M", 5)])
        .await;
    let plain = app.seed_product("Pen", dec!(15.00), 10).await;

    assert_matches!(
        carts.add(CUSTOMER_ID, add(shirt.product.id, None, 1)).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        carts.add(CUSTOMER_ID, add(shirt.product.id, Some("XL"), 1)).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        carts.add(CUSTOMER_ID, add(plain.product.id, Some("M"), 1)).await,
        Err(ServiceError::ValidationError(_))
    );

    carts
        .add(CUSTOMER_ID, add(shirt.product.id, Some("S"), 1))
        .await
        .expect("add S");
    let cart = carts
        .add(CUSTOMER_ID, add(shirt.product.id, Some("M"), 4))
        .await
        .expect("add M");
    assert_eq!(cart.items.len(), 2, "each size is its own line");

    assert_matches!(
        carts.add(CUSTOMER_ID, add(shirt.product.id, Some("S"), 2)).await,
        Err(ServiceError::InsufficientStock(_))
    );
}

#[tokio::test]
async fn inactive_products_cannot_be_added() {
    let app = TestApp::new().await;
    let product = app.seed_product("Old Logo Mug", dec!(120.00), 10).await;
    app.state
        .services
        .products
        .set_active(product.product.id, false)
        .await
        .expect("deactivate");

    let result = app
        .state
        .services
        .carts
        .add(CUSTOMER_ID, add(product.product.id, None, 1))
        .await;
    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn zero_quantity_removes_the_line() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let product = app.seed_product("Pen", dec!(15.00), 10).await;

    let cart = carts
        .add(CUSTOMER_ID, add(product.product.id, None, 2))
        .await
        .expect("add");
    let line = cart.items[0].id;

    let cart = carts
        .update_quantity(CUSTOMER_ID, line, UpdateCartItemInput { quantity: 0 })
        .await
        .expect("update to zero");
    assert!(cart.items.is_empty());
    assert_eq!(cart.subtotal, dec!(0));
}

#[tokio::test]
async fn cart_lines_belong_to_one_user() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let product = app.seed_product("Pen", dec!(15.00), 10).await;

    let cart = carts
        .add(CUSTOMER_ID, add(product.product.id, None, 1))
        .await
        .expect("add");
    let line = cart.items[0].id;

    assert_matches!(
        carts.remove(OTHER_CUSTOMER_ID, line).await,
        Err(ServiceError::NotFound(_))
    );
    assert!(carts
        .list(OTHER_CUSTOMER_ID)
        .await
        .expect("other cart")
        .items
        .is_empty());

    assert_eq!(carts.clear(CUSTOMER_ID).await.expect("clear"), 1);
    assert!(carts.list(CUSTOMER_ID).await.expect("cart").items.is_empty());
}

#[tokio::test]
async fn size_price_overrides_the_product_price() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let shirt = app
        .seed_sized_product("Uniform Blouse", dec!(300.00), &[("S", 5), ("XL", 5)])
        .await;
    let xl = shirt
        .sizes
        .iter()
        .find(|s| s.size == "XL")
        .expect("XL size")
        .id;
    services
        .products
        .update_size_price(shirt.product.id, xl, Some(dec!(340.00)))
        .await
        .expect("set XL price");

    services
        .carts
        .add(CUSTOMER_ID, add(shirt.product.id, Some("S"), 1))
        .await
        .expect("add S");
    let cart = services
        .carts
        .add(CUSTOMER_ID, add(shirt.product.id, Some("XL"), 1))
        .await
        .expect("add XL");

    assert_eq!(cart.subtotal, dec!(640.00));
}
