/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`) - overall status
 * - Readiness check (`/health/ready`) - whether the service can take traffic
 * - Liveness check (`/health/live`) - process is alive, no dependency checks
 * - Detailed health check (`/health/details`) - per component status
 *
 * The database is critical. The search index is not: while it is down searches are served
 * from the database, so the service reports `degraded` rather than `down`.
 */

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::search::MeilisearchIndex;

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Degraded,
}

impl HealthStatus {
    fn status_code(self) -> StatusCode {
        match self {
            HealthStatus::Up | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Health check detail
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthDetail {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Overall health information
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub details: BTreeMap<String, HealthDetail>,
}

/// A dependency the service talks to
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a failure takes the whole service down
    fn critical(&self) -> bool;

    async fn check(&self) -> Result<(), String>;
}

pub struct DatabaseProbe(pub Arc<DatabaseConnection>);

#[async_trait]
impl HealthProbe for DatabaseProbe {
    fn name(&self) -> &'static str {
        "database"
    }

    fn critical(&self) -> bool {
        true
    }

    async fn check(&self) -> Result<(), String> {
        self.0.ping().await.map_err(|e| e.to_string())
    }
}

pub struct SearchIndexProbe(pub Arc<MeilisearchIndex>);

#[async_trait]
impl HealthProbe for SearchIndexProbe {
    fn name(&self) -> &'static str {
        "search_index"
    }

    fn critical(&self) -> bool {
        false
    }

    async fn check(&self) -> Result<(), String> {
        self.0.health().await.map_err(|e| e.to_string())
    }
}

/// Health check state
#[derive(Clone)]
pub struct HealthState {
    probes: Arc<Vec<Arc<dyn HealthProbe>>>,
    health_cache: Arc<RwLock<HealthInfo>>,
    start_time: SystemTime,
}

impl HealthState {
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        Self {
            probes: Arc::new(probes),
            health_cache: Arc::new(RwLock::new(HealthInfo {
                status: HealthStatus::Up,
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: Utc::now(),
                uptime_seconds: 0,
                details: BTreeMap::new(),
            })),
            start_time: SystemTime::now(),
        }
    }

    /// Calculate system uptime
    pub fn uptime(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }

    /// Runs every probe and stores the result
    pub async fn update_health(&self) -> HealthInfo {
        let mut details = BTreeMap::new();
        let mut overall = HealthStatus::Up;

        for probe in self.probes.iter() {
            let (status, message) = match probe.check().await {
                Ok(()) => (HealthStatus::Up, None),
                Err(e) if probe.critical() => {
                    warn!(component = probe.name(), error = %e, "Health check failed");
                    overall = HealthStatus::Down;
                    (HealthStatus::Down, Some(e))
                }
                Err(e) => {
                    warn!(component = probe.name(), error = %e, "Health check degraded");
                    if overall == HealthStatus::Up {
                        overall = HealthStatus::Degraded;
                    }
                    (HealthStatus::Down, Some(e))
                }
            };
            details.insert(
                probe.name().to_string(),
                HealthDetail {
                    status,
                    message,
                    timestamp: Utc::now(),
                },
            );
        }

        let mut health = self.health_cache.write().await;
        health.status = overall;
        health.timestamp = Utc::now();
        health.uptime_seconds = self.uptime();
        health.details = details;
        health.clone()
    }
}

/// Basic health check endpoint
pub async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    let health = state.update_health().await;

    (
        health.status.status_code(),
        Json(json!({
            "status": health.status,
            "version": health.version,
            "timestamp": health.timestamp,
        })),
    )
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    let health = state.update_health().await;
    info!(status = ?health.status, "Readiness check");

    (
        health.status.status_code(),
        Json(json!({
            "ready": health.status != HealthStatus::Down,
            "status": health.status,
            "timestamp": health.timestamp,
        })),
    )
}

/// Liveness check endpoint
pub async fn liveness_check(State(state): State<HealthState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "uptime_seconds": state.uptime(),
            "timestamp": Utc::now(),
        })),
    )
}

/// Detailed health check endpoint
pub async fn detailed_health(State(state): State<HealthState>) -> impl IntoResponse {
    let health = state.update_health().await;
    (health.status.status_code(), Json(health))
}

/// Creates router with health check endpoints
pub fn health_routes(state: HealthState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
        .route("/details", get(detailed_health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProbe {
        name: &'static str,
        critical: bool,
        healthy: bool,
    }

    #[async_trait]
    impl HealthProbe for StaticProbe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn critical(&self) -> bool {
            self.critical
        }

        async fn check(&self) -> Result<(), String> {
            if self.healthy {
                Ok(())
            } else {
                Err(format!("{} unreachable", self.name))
            }
        }
    }

    fn state(db_up: bool, index_up: bool) -> HealthState {
        HealthState::new(vec![
            Arc::new(StaticProbe {
                name: "database",
                critical: true,
                healthy: db_up,
            }),
            Arc::new(StaticProbe {
                name: "search_index",
                critical: false,
                healthy: index_up,
            }),
        ])
    }

    #[tokio::test]
    async fn all_up() {
        let health = state(true, true).update_health().await;
        assert_eq!(health.status, HealthStatus::Up);
        assert_eq!(health.details.len(), 2);
    }

    #[tokio::test]
    async fn index_down_is_degraded() {
        let health = state(true, false).update_health().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.status.status_code(), StatusCode::OK);
        assert_eq!(
            health.details["search_index"].message.as_deref(),
            Some("search_index unreachable")
        );
    }

    #[tokio::test]
    async fn database_down_is_down() {
        let health = state(false, false).update_health().await;
        assert_eq!(health.status, HealthStatus::Down);
        assert_eq!(
            health.status.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
