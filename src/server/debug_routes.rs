use crate::analysis::bottleneck::BottleneckDetector;
use crate::analysis::orchestrator::load_detector_input;
use crate::dao;
use crate::server::errors::ServerError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, instrument};

/// `GET /debug/cache/status`: pod-spec cache, buffer map and sweep stats.
#[instrument(name = "Get cache status", skip(state))]
pub async fn get_cache_status(State(state): State<AppState>) -> Json<Value> {
    let cache_status = state.pod_spec_cache.status().await;
    let cached_pods = state.pod_spec_cache.cached_pods().await;
    let buffer_status = state.buffers.status().await;
    let cleanup_stats = state.cleanup_stats.lock().await.clone();

    Json(json!({
        "pod_spec_cache": cache_status,
        "cached_pods": cached_pods,
        "resource_buffers": buffer_status,
        "cleanup": cleanup_stats,
    }))
}

/// `POST /debug/cache/cleanup`: manual sweep, same rules as the controller.
#[instrument(name = "Force cache cleanup", skip(state))]
pub async fn force_cache_cleanup(State(state): State<AppState>) -> Json<Value> {
    info!("Manual cache cleanup requested");

    let cache_dropped = state.pod_spec_cache.cleanup().await;
    let buffers_dropped = state
        .buffers
        .cleanup_stale(chrono::Duration::minutes(30))
        .await;

    let mut stats = state.cleanup_stats.lock().await;
    stats.total_cleanups += 1;
    stats.pod_cache_cleanups += cache_dropped as u64;
    stats.metrics_buffer_cleanups += buffers_dropped.len() as u64;
    stats.last_cleanup_time = Some(Utc::now());

    Json(json!({
        "pod_cache_cleaned": cache_dropped,
        "metrics_buffers_cleaned": buffers_dropped.len(),
        "cleaned_jobs": buffers_dropped,
    }))
}

/// `GET /debug/bottleneck-analysis/{test_history_id}`: runs the detector
/// over the stored series and returns the problems plus the rendered LLM
/// context.
#[instrument(name = "Ad-hoc bottleneck analysis", skip(state))]
pub async fn get_bottleneck_analysis(
    Path(test_history_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ServerError> {
    if dao::test_history::fetch_by_id(test_history_id, &state.db)
        .await?
        .is_none()
    {
        return Err(ServerError::NotFound(format!(
            "Test history {test_history_id}"
        )));
    }

    let (perf, resources) = load_detector_input(&state.db, test_history_id).await?;
    let detector = BottleneckDetector::new(state.display_timezone);
    let problems = detector.detect_all(&perf, Some(&resources));
    let context = detector.generate_ai_analysis_context(&problems);

    Ok(Json(json!({
        "test_history_id": test_history_id,
        "performance_points": perf.len(),
        "resource_pods": resources.len(),
        "problems": problems,
        "ai_analysis_context": context,
    })))
}
