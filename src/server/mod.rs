pub mod analysis_routes;
pub mod debug_routes;
pub mod errors;
pub mod sse_routes;

use crate::analysis::llm::LlmClient;
use crate::influxdb::InfluxClient;
use crate::k8s::resources::ResourceClient;
use crate::pod_spec_cache::PodSpecCache;
use crate::resource_buffers::ResourceBufferMap;
use crate::schedulers::cache_cleanup::CleanupStats;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use chrono_tz::Tz;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

/// Everything the request handlers share. Cloning is cheap; the heavy parts
/// are behind `Arc`s or are cheap handles themselves.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub influx: InfluxClient,
    pub llm: LlmClient,
    pub pod_spec_cache: Arc<PodSpecCache>,
    pub buffers: Arc<ResourceBufferMap>,
    pub resources: Arc<ResourceClient>,
    pub cleanup_stats: Arc<Mutex<CleanupStats>>,
    pub display_timezone: Tz,
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/sse/k6data/:job_name", get(sse_routes::sse_k6data))
        .route(
            "/analysis/history/:test_history_id",
            get(analysis_routes::get_analysis_history),
        )
        .route("/analysis/health", get(analysis_routes::health_check))
        .route("/debug/cache/status", get(debug_routes::get_cache_status))
        .route("/debug/cache/cleanup", post(debug_routes::force_cache_cleanup))
        .route(
            "/debug/bottleneck-analysis/:test_history_id",
            get(debug_routes::get_bottleneck_analysis),
        )
        .layer(cors)
        .with_state(state)
}
