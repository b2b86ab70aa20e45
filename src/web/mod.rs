use axum::{Router, http::Method, routing::get};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::monitor::TargetRegistry;
use crate::web::routes::website_routes;

pub use error::AppError;

pub mod error;
pub mod models;
pub mod routes;

pub struct AppState {
    pub db_pool: Arc<DatabaseConnection>,
    pub registry: Arc<TargetRegistry>,
    /// Held by every handler that changes a website, across both the registry
    /// change and the database write, so the two are always applied (and
    /// rolled back) in the same order.
    pub mutation_lock: Mutex<()>,
}

impl AppState {
    pub fn new(db_pool: Arc<DatabaseConnection>, registry: Arc<TargetRegistry>) -> Self {
        Self {
            db_pool,
            registry,
            mutation_lock: Mutex::new(()),
        }
    }
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest("/api/websites", website_routes::create_website_router())
        .with_state(app_state)
        .layer(cors)
}
