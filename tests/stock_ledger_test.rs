//! Stock-movement ledger: stored levels, per-size stock and low-stock alerts.

mod common;

use assert_matches::assert_matches;
use common::{TestApp, ADMIN_ID};
use rust_decimal_macros::dec;
use school_store_api::{
    errors::ServiceError,
    events::Event,
    models::MovementType,
    services::{
        notifications::NotificationFilter,
        stock::{MovementFilter, RecordMovement},
    },
};

#[tokio::test]
async fn stock_in_and_out_update_the_stored_level_and_the_ledger() {
    let app = TestApp::new().await;
    let stock = app.state.services.stock.clone();
    let product = app.seed_product("Notebook", dec!(45.00), 10).await;
    let id = product.product.id;

    let received = stock
        .record_movement(
            RecordMovement::new(id, MovementType::StockIn, 15).with_reason("delivery"),
            Some(ADMIN_ID),
        )
        .await
        .expect("stock in");
    assert_eq!(received.quantity, 15);
    assert_eq!(received.previous_stock, 10);
    assert_eq!(received.new_stock, 25);
    assert_eq!(received.performed_by, Some(ADMIN_ID));

    let issued = stock
        .record_movement(RecordMovement::new(id, MovementType::StockOut, 4), Some(ADMIN_ID))
        .await
        .expect("stock out");
    assert_eq!(issued.quantity, -4);
    assert_eq!(issued.new_stock, 21);

    let level = stock.current_stock(id).await.expect("current stock");
    assert_eq!(level.stock, 21);
    assert_eq!(level.derived_stock, 21);
    assert!(level.consistent);

    let ledger = stock
        .list_movements(&MovementFilter {
            product_id: Some(id),
            ..Default::default()
        })
        .await
        .expect("ledger");
    assert_eq!(ledger.total, 3);
    assert_eq!(ledger.items[0].id, issued.id, "newest entry first");
    assert_eq!(ledger.items[2].reason.as_deref(), Some("initial_stock"));
}

#[tokio::test]
async fn stock_never_goes_negative() {
    let app = TestApp::new().await;
    let stock = app.state.services.stock.clone();
    let product = app.seed_product("Pencil", dec!(12.00), 3).await;
    let id = product.product.id;

    let result = stock
        .record_movement(RecordMovement::new(id, MovementType::StockOut, 4), Some(ADMIN_ID))
        .await;
    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));

    let negative_adjustment = stock
        .record_movement(
            RecordMovement::new(id, MovementType::StockAdjustment, -5),
            Some(ADMIN_ID),
        )
        .await;
    assert_matches!(negative_adjustment, Err(ServiceError::InsufficientStock(_)));

    let level = stock.current_stock(id).await.expect("current stock");
    assert_eq!(level.stock, 3);
    assert!(level.consistent);

    let ledger = stock
        .list_movements(&MovementFilter {
            product_id: Some(id),
            ..Default::default()
        })
        .await
        .expect("ledger");
    assert_eq!(ledger.total, 1, "rejected movements leave no entry");
}

#[tokio::test]
async fn adjustments_accept_a_target_level() {
    let app = TestApp::new().await;
    let stock = app.state.services.stock.clone();
    let product = app.seed_product("Ruler", dec!(20.00), 8).await;
    let id = product.product.id;

    let counted = stock
        .record_movement(RecordMovement::target(id, 6).with_reason("stock count"), Some(ADMIN_ID))
        .await
        .expect("adjust to target");
    assert_eq!(counted.movement_type, MovementType::StockAdjustment);
    assert_eq!(counted.quantity, -2);
    assert_eq!(counted.new_stock, 6);

    let unchanged = stock
        .record_movement(RecordMovement::target(id, 6), Some(ADMIN_ID))
        .await;
    assert_matches!(unchanged, Err(ServiceError::ValidationError(_)));

    let zero = stock
        .record_movement(RecordMovement::new(id, MovementType::StockIn, 0), Some(ADMIN_ID))
        .await;
    assert_matches!(zero, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn sized_products_track_stock_per_size() {
    let app = TestApp::new().await;
    let stock = app.state.services.stock.clone();
    let product = app
        .seed_sized_product("PE Shirt", dec!(250.00), &[("S", 5), ("M", 10)])
        .await;
    let id = product.product.id;
    assert_eq!(product.product.stock, 15);

    let missing_size = stock
        .record_movement(RecordMovement::new(id, MovementType::StockIn, 1), Some(ADMIN_ID))
        .await;
    assert_matches!(missing_size, Err(ServiceError::ValidationError(_)));

    let unknown_size = stock
        .record_movement(
            RecordMovement::new(id, MovementType::StockIn, 1).with_size("XXL"),
            Some(ADMIN_ID),
        )
        .await;
    assert_matches!(unknown_size, Err(ServiceError::NotFound(_)));

    let out = stock
        .record_movement(
            RecordMovement::new(id, MovementType::StockOut, 3).with_size("M"),
            Some(ADMIN_ID),
        )
        .await
        .expect("size stock out");
    assert_eq!(out.size.as_deref(), Some("M"));
    assert_eq!(out.previous_stock, 10);
    assert_eq!(out.new_stock, 7);

    let too_many = stock
        .record_movement(
            RecordMovement::new(id, MovementType::StockOut, 6).with_size("S"),
            Some(ADMIN_ID),
        )
        .await;
    assert_matches!(too_many, Err(ServiceError::InsufficientStock(_)));

    let level = stock.current_stock(id).await.expect("current stock");
    assert_eq!(level.stock, 12);
    assert!(level.consistent);
    let medium = level
        .sizes
        .iter()
        .find(|s| s.size == "M")
        .expect("size M present");
    assert_eq!(medium.stock, 7);
    assert_eq!(medium.derived_stock, 7);
}

#[tokio::test]
async fn dropping_to_the_threshold_raises_one_low_stock_alert() {
    let app = TestApp::new().await;
    let stock = app.state.services.stock.clone();
    let product = app.seed_product("Eraser", dec!(8.00), 7).await;
    let id = product.product.id;
    app.drain_events().await;

    stock
        .record_movement(RecordMovement::new(id, MovementType::StockOut, 1), Some(ADMIN_ID))
        .await
        .expect("above threshold");
    let events = app.drain_events().await;
    assert!(!events.iter().any(|e| matches!(e, Event::LowStock { .. })));

    stock
        .record_movement(RecordMovement::new(id, MovementType::StockOut, 2), Some(ADMIN_ID))
        .await
        .expect("reaches threshold");
    let events = app.drain_events().await;
    assert_matches!(
        events.iter().find(|e| matches!(e, Event::LowStock { .. })),
        Some(Event::LowStock { stock: 4, threshold: 5, .. })
    );

    // Restocking never alerts, even while still low
    stock
        .record_movement(RecordMovement::new(id, MovementType::StockIn, 1), Some(ADMIN_ID))
        .await
        .expect("restock");
    let events = app.drain_events().await;
    assert!(!events.iter().any(|e| matches!(e, Event::LowStock { .. })));

    let feed = app
        .state
        .services
        .notifications
        .list_admin(&NotificationFilter::default())
        .await
        .expect("admin feed");
    assert_eq!(feed.total, 1);
    assert_eq!(feed.items[0].title, "Low stock alert");
    assert_eq!(feed.items[0].related_id, Some(id));

    let low = stock.low_stock(None).await.expect("low stock report");
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].product_id, id);
    assert_eq!(low[0].stock, 5);
}
