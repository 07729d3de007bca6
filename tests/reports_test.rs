mod common;

use common::{TestApp, CUSTOMER_ID};
use rust_decimal_macros::dec;
use school_store_api::{
    models::{OrderStatus, PaymentMethod},
    services::{
        orders::{CheckoutInput, CheckoutItem, UpdateStatusInput},
        products::{CreateProductInput, SizeInput},
        reports::ReportPeriod,
    },
};

fn buy(product_id: i32, quantity: i32) -> CheckoutInput {
    CheckoutInput {
        payment_method: PaymentMethod::Cash,
        notes: None,
        cart_item_ids: None,
        items: Some(vec![CheckoutItem {
            product_id,
            size: None,
            quantity,
        }]),
    }
}

async fn advance(app: &TestApp, order_id: i32, path: &[OrderStatus]) {
    for status in path {
        app.state
            .services
            .orders
            .update_status(
                order_id,
                UpdateStatusInput {
                    status: *status,
                    note: None,
                },
                &TestApp::admin(),
            )
            .await
            .expect("advance order");
    }
}

#[tokio::test]
async fn reports_aggregate_orders_and_stock() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let notebook = app.seed_product("Notebook", dec!(45.00), 10).await;
    let pen = app.seed_product("Pen", dec!(15.00), 4).await;
    app.seed_sized_product("PE Shirt", dec!(250.00), &[("S", 2), ("M", 8)])
        .await;

    let claimed = services
        .orders
        .checkout(CUSTOMER_ID, buy(notebook.product.id, 3))
        .await
        .expect("order a");
    advance(
        &app,
        claimed.order.id,
        &[
            OrderStatus::Processing,
            OrderStatus::ReadyForPickup,
            OrderStatus::Claimed,
        ],
    )
    .await;

    let cancelled = services
        .orders
        .checkout(CUSTOMER_ID, buy(pen.product.id, 2))
        .await
        .expect("order b");
    advance(&app, cancelled.order.id, &[OrderStatus::Cancelled]).await;

    services
        .orders
        .checkout(CUSTOMER_ID, buy(notebook.product.id, 1))
        .await
        .expect("order c");

    let summary = services
        .reports
        .dashboard(&ReportPeriod::default())
        .await
        .expect("dashboard");
    assert_eq!(summary.total_products, 3);
    assert_eq!(summary.active_products, 3);
    // Pen (4) and shirt size S (2)
    assert_eq!(summary.low_stock_count, 2);
    assert_eq!(summary.low_stock_threshold, 5);
    assert_eq!(summary.total_orders, 3);
    assert_eq!(summary.pending_orders, 1);
    assert_eq!(summary.orders_by_status.get("claimed"), Some(&1));
    assert_eq!(summary.orders_by_status.get("cancelled"), Some(&1));
    assert_eq!(summary.revenue, dec!(135.00));

    let top = services.reports.top_products(10).await.expect("top products");
    assert_eq!(top.len(), 1, "cancelled orders are not sales");
    assert_eq!(top[0].product_id, notebook.product.id);
    assert_eq!(top[0].units_sold, 4);
    assert_eq!(top[0].revenue, dec!(180.00));

    let valuation = services
        .reports
        .inventory_valuation()
        .await
        .expect("valuation");
    assert_eq!(valuation.total_units, 20);
    assert_eq!(valuation.retail_value, dec!(2830.00));
    assert_eq!(valuation.cost_value, dec!(165.00));
    assert_eq!(valuation.potential_margin, dec!(2665.00));
}

#[tokio::test]
async fn dashboard_period_filters_orders() {
    let app = TestApp::new().await;
    let product = app.seed_product("Notebook", dec!(45.00), 10).await;
    app.state
        .services
        .orders
        .checkout(CUSTOMER_ID, buy(product.product.id, 1))
        .await
        .expect("order");

    let future = ReportPeriod {
        from: Some(chrono::Utc::now() + chrono::Duration::days(1)),
        to: None,
    };
    let summary = app
        .state
        .services
        .reports
        .dashboard(&future)
        .await
        .expect("dashboard");
    assert_eq!(summary.total_orders, 0);
    assert_eq!(summary.revenue, dec!(0));
    assert_eq!(summary.total_products, 1);
}

#[tokio::test]
async fn valuation_uses_size_price_overrides() {
    let app = TestApp::new().await;
    app.state
        .services
        .products
        .create(
            CreateProductInput {
                name: "Varsity Jacket".to_string(),
                description: None,
                price: dec!(800.00),
                original_price: Some(dec!(500.00)),
                category_id: None,
                is_active: true,
                initial_stock: 0,
                sizes: vec![
                    SizeInput {
                        size: "M".to_string(),
                        stock: 2,
                        price: None,
                    },
                    SizeInput {
                        size: "XXL".to_string(),
                        stock: 3,
                        price: Some(dec!(900.00)),
                    },
                ],
                images: Vec::new(),
            },
            Some(common::ADMIN_ID),
        )
        .await
        .expect("create jacket");

    let valuation = app
        .state
        .services
        .reports
        .inventory_valuation()
        .await
        .expect("valuation");
    assert_eq!(valuation.total_units, 5);
    assert_eq!(valuation.retail_value, dec!(4300.00));
    assert_eq!(valuation.cost_value, dec!(2500.00));
    assert_eq!(valuation.potential_margin, dec!(1800.00));
}
