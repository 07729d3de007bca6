#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Duration;
use rust_decimal::Decimal;
use serde_json::Value;
use school_store_api::{
    auth::{issue_token, AuthUser},
    config::AppConfig,
    db,
    events::{self, Event},
    models::Role,
    services::products::{CreateProductInput, ProductDetails, SizeInput},
    AppState,
};
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const ADMIN_ID: i32 = 1;
pub const CUSTOMER_ID: i32 = 100;
pub const OTHER_CUSTOMER_ID: i32 = 200;

/// Helper harness for an application state backed by an in-memory SQLite database.
///
/// Events are not processed in the background; call [`TestApp::drain_events`]
/// to run the notification fan-out for everything emitted so far.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    events: Mutex<mpsc::Receiver<Event>>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            "test".to_string(),
        );
        cfg.low_stock_threshold = 5;
        cfg.event_channel_capacity = 4096;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::EventSender::channel(cfg.event_channel_capacity);
        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = school_store_api::app(state.clone());

        Self {
            router,
            state,
            events: Mutex::new(event_rx),
        }
    }

    pub fn admin() -> AuthUser {
        AuthUser {
            user_id: ADMIN_ID,
            role: Role::Admin,
        }
    }

    pub fn customer() -> AuthUser {
        AuthUser {
            user_id: CUSTOMER_ID,
            role: Role::Customer,
        }
    }

    pub fn other_customer() -> AuthUser {
        AuthUser {
            user_id: OTHER_CUSTOMER_ID,
            role: Role::Customer,
        }
    }

    pub fn token_for(user: AuthUser) -> String {
        issue_token(JWT_SECRET, user.user_id, user.role, Duration::hours(1))
            .expect("sign test token")
    }

    pub fn admin_token(&self) -> String {
        Self::token_for(Self::admin())
    }

    pub fn customer_token(&self) -> String {
        Self::token_for(Self::customer())
    }

    /// Runs the notification fan-out for every queued event; returns how many were handled.
    pub async fn drain_events(&self) -> Vec<Event> {
        let mut rx = self.events.lock().await;
        let mut handled = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events::handle_event(&self.state.services.notifications, event.clone())
                .await
                .expect("event handling failed");
            handled.push(event);
        }
        handled
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> ProductDetails {
        self.state
            .services
            .products
            .create(
                CreateProductInput {
                    name: name.to_string(),
                    description: Some(format!("{} for tests", name)),
                    price,
                    original_price: Some(price / Decimal::from(2)),
                    category_id: None,
                    is_active: true,
                    initial_stock: stock,
                    sizes: Vec::new(),
                    images: Vec::new(),
                },
                Some(ADMIN_ID),
            )
            .await
            .expect("seed product for tests")
    }

    pub async fn seed_sized_product(
        &self,
        name: &str,
        price: Decimal,
        sizes: &[(&str, i32)],
    ) -> ProductDetails {
        self.state
            .services
            .products
            .create(
                CreateProductInput {
                    name: name.to_string(),
                    description: None,
                    price,
                    original_price: None,
                    category_id: None,
                    is_active: true,
                    initial_stock: 0,
                    sizes: sizes
                        .iter()
                        .map(|(size, stock)| SizeInput {
                            size: size.to_string(),
                            stock: *stock,
                            price: None,
                        })
                        .collect(),
                    images: Vec::new(),
                },
                Some(ADMIN_ID),
            )
            .await
            .expect("seed sized product for tests")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
