//! Catalog Search Library
//!
//! Product search over a Meilisearch index with a database fallback, plus the catalog store,
//! index synchronisation and the HTTP surface that serve it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod migrator;
pub mod openapi;
pub mod search;
pub mod services;
pub mod tracing;

use axum::{http::HeaderValue, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};

use crate::catalog::SeaOrmCatalog;
use crate::events::{Event, EventSender};
use crate::health::{DatabaseProbe, HealthState, SearchIndexProbe};
use crate::search::MeilisearchIndex;
use crate::services::{
    catalog_admin::CatalogAdminService, index_sync::IndexSynchronizer,
    product_search::ProductSearchService,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: EventSender,
    pub index: Arc<MeilisearchIndex>,
    pub search: ProductSearchService,
    pub admin: CatalogAdminService,
    pub sync: IndexSynchronizer,
}

impl AppState {
    /// Wires the services together. The returned receiver must be drained by
    /// [`events::process_events`] with [`AppState::sync`] as the handler.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        index: Arc<MeilisearchIndex>,
    ) -> (Self, mpsc::Receiver<Event>) {
        let catalog = Arc::new(SeaOrmCatalog::new(db.clone()));
        let (event_sender, event_rx) = EventSender::channel(config.event_channel_capacity);

        let search = ProductSearchService::new(index.clone(), catalog.clone());
        let sync = IndexSynchronizer::new(
            catalog,
            index.clone(),
            config.search.reindex_batch_size,
        );
        let admin = CatalogAdminService::new(db.clone(), event_sender.clone());

        let state = Self {
            db,
            config,
            event_sender,
            index,
            search,
            admin,
            sync,
        };
        (state, event_rx)
    }
}

pub fn api_v1_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .merge(handlers::search::search_routes())
        .merge(handlers::catalog::catalog_routes())
        .nest("/admin", handlers::admin::admin_routes(state))
}

async fn api_status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "catalog-search",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// CORS policy: configured origins, permissive in development, same-origin otherwise
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.is_development() {
        ::tracing::info!("Using permissive CORS in development");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

/// Full application router: API, health, docs and the shared middleware stack
pub fn build_router(state: AppState) -> Router {
    let health_state = HealthState::new(vec![
        Arc::new(DatabaseProbe(state.db.clone())),
        Arc::new(SearchIndexProbe(state.index.clone())),
    ]);
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(|| async { "catalog-search up" }))
        .nest("/api/v1", api_v1_routes(&state))
        .with_state(state)
        .nest("/health", health::health_routes(health_state))
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
}
