//! Catalog rules: category and product deletion, size removal and images.

mod common;

use assert_matches::assert_matches;
use common::{TestApp, ADMIN_ID, CUSTOMER_ID};
use rust_decimal_macros::dec;
use school_store_api::{
    errors::ServiceError,
    models::PaymentMethod,
    services::{
        categories::CategoryInput,
        orders::{CheckoutInput, CheckoutItem},
        products::{ImageInput, SizeInput, UpdateProductInput},
    },
};

fn image(url: &str, is_primary: bool) -> ImageInput {
    ImageInput {
        url: url.to_string(),
        is_primary,
    }
}

#[tokio::test]
async fn category_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    let services = &app.state.services;

    let uniforms = services
        .categories
        .create(CategoryInput {
            name: "Uniforms".to_string(),
            description: None,
        })
        .await
        .expect("create category");
    assert_matches!(
        services
            .categories
            .create(CategoryInput {
                name: "Uniforms".to_string(),
                description: None,
            })
            .await,
        Err(ServiceError::Conflict(_))
    );

    let polo = app.seed_product("School Polo", dec!(350.00), 5).await;
    services
        .products
        .update(
            polo.product.id,
            UpdateProductInput {
                category_id: Some(uniforms.id),
                ..Default::default()
            },
        )
        .await
        .expect("assign category");

    assert_matches!(
        services.categories.delete(uniforms.id).await,
        Err(ServiceError::Conflict(_))
    );

    services
        .products
        .delete(polo.product.id)
        .await
        .expect("unordered product can be deleted");
    services
        .categories
        .delete(uniforms.id)
        .await
        .expect("empty category can be deleted");
    assert_matches!(
        services.categories.get(uniforms.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn ordered_product_cannot_be_deleted() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let pencil = app.seed_product("Pencil", dec!(12.00), 20).await;

    services
        .orders
        .checkout(
            CUSTOMER_ID,
            CheckoutInput {
                payment_method: PaymentMethod::Cash,
                notes: None,
                cart_item_ids: None,
                items: Some(vec![CheckoutItem {
                    product_id: pencil.product.id,
                    size: None,
                    quantity: 2,
                }]),
            },
        )
        .await
        .expect("checkout");

    assert_matches!(
        services.products.delete(pencil.product.id).await,
        Err(ServiceError::Conflict(_))
    );

    let retired = services
        .products
        .set_active(pencil.product.id, false)
        .await
        .expect("deactivate instead");
    assert!(!retired.is_active);
    assert_eq!(retired.stock, 18);
}

#[tokio::test]
async fn sizes_with_stock_cannot_be_removed() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let shirt = app
        .seed_sized_product("PE Shirt", dec!(250.00), &[("S", 2), ("M", 0)])
        .await;
    let shirt_id = shirt.product.id;
    let size_id = |name: &str| {
        shirt
            .sizes
            .iter()
            .find(|s| s.size == name)
            .map(|s| s.id)
            .expect("seeded size")
    };

    assert_matches!(
        services.products.remove_size(shirt_id, size_id("S")).await,
        Err(ServiceError::Conflict(_))
    );
    services
        .products
        .remove_size(shirt_id, size_id("M"))
        .await
        .expect("empty size is removed");
    assert_matches!(
        services.products.remove_size(shirt_id, size_id("M")).await,
        Err(ServiceError::NotFound(_))
    );

    assert_matches!(
        services
            .products
            .add_size(
                shirt_id,
                SizeInput {
                    size: "s".to_string(),
                    stock: 1,
                    price: None,
                },
                Some(ADMIN_ID),
            )
            .await,
        Err(ServiceError::Conflict(_))
    );
    let large = services
        .products
        .add_size(
            shirt_id,
            SizeInput {
                size: "L".to_string(),
                stock: 4,
                price: Some(dec!(270.00)),
            },
            Some(ADMIN_ID),
        )
        .await
        .expect("add size");
    assert_eq!(large.stock, 4);

    let level = services.stock.current_stock(shirt_id).await.expect("level");
    assert_eq!(level.stock, 6);
    assert!(level.consistent);
}

#[tokio::test]
async fn unsized_stock_blocks_the_first_size() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Logo Mug", dec!(120.00), 3).await;

    assert_matches!(
        app.state
            .services
            .products
            .add_size(
                mug.product.id,
                SizeInput {
                    size: "Large".to_string(),
                    stock: 1,
                    price: None,
                },
                Some(ADMIN_ID),
            )
            .await,
        Err(ServiceError::Conflict(_))
    );
}

#[tokio::test]
async fn products_keep_exactly_one_primary_image() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;
    let bag = app.seed_product("Drawstring Bag", dec!(180.00), 6).await;
    let id = bag.product.id;

    let front = products
        .add_image(id, image("https://cdn.example/bag-front.jpg", false))
        .await
        .expect("first image");
    assert!(front.is_primary, "first image becomes primary");

    let back = products
        .add_image(id, image("https://cdn.example/bag-back.jpg", false))
        .await
        .expect("second image");
    assert!(!back.is_primary);

    let detail = products
        .add_image(id, image("https://cdn.example/bag-detail.jpg", true))
        .await
        .expect("third image");
    assert!(detail.is_primary);

    let images = products.get(id).await.expect("product").images;
    assert_eq!(images.len(), 3);
    assert_eq!(images.iter().filter(|i| i.is_primary).count(), 1);

    products
        .remove_image(id, detail.id)
        .await
        .expect("remove primary");
    let images = products.get(id).await.expect("product").images;
    assert_eq!(images.len(), 2);
    let primary: Vec<i32> = images.iter().filter(|i| i.is_primary).map(|i| i.id).collect();
    assert_eq!(primary, vec![front.id], "next image in order is promoted");

    products
        .remove_image(id, back.id)
        .await
        .expect("remove secondary");
    let images = products.get(id).await.expect("product").images;
    assert_eq!(images.len(), 1);
    assert!(images[0].is_primary);

    assert_matches!(
        products.remove_image(id, back.id).await,
        Err(ServiceError::NotFound(_))
    );
}
