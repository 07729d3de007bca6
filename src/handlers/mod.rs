pub mod cart;
pub mod categories;
pub mod common;
pub mod health;
pub mod inventory;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod realtime;
pub mod reports;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::notifications::RealtimeHub;
use crate::services::{
    carts::CartService, categories::CategoryService, notifications::NotificationService,
    orders::OrderService, products::ProductService, reports::ReportService, stock::StockService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService>,
    pub stock: Arc<StockService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub notifications: Arc<NotificationService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        hub: RealtimeHub,
        config: &AppConfig,
    ) -> Self {
        let stock = StockService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.low_stock_threshold,
        );

        Self {
            categories: Arc::new(CategoryService::new(db_pool.clone())),
            products: Arc::new(ProductService::new(db_pool.clone(), stock.clone())),
            carts: Arc::new(CartService::new(db_pool.clone())),
            orders: Arc::new(OrderService::new(
                db_pool.clone(),
                stock.clone(),
                event_sender,
            )),
            notifications: Arc::new(NotificationService::new(db_pool.clone(), hub)),
            reports: Arc::new(ReportService::new(db_pool, config.low_stock_threshold)),
            stock: Arc::new(stock),
        }
    }
}
