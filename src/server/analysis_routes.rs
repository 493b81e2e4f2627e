use crate::dao;
use crate::server::errors::ServerError;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u64>,
    pub analysis_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisHistoryEntry {
    pub id: i32,
    pub analysis_category: String,
    pub analysis_type: String,
    pub summary: String,
    pub analysis_result: Value,
    pub model_name: String,
    pub analyzed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub llm_status: &'static str,
    pub database_status: &'static str,
    pub available_models: Vec<String>,
}

/// `GET /analysis/history/{test_history_id}`: stored analyses, newest first.
#[instrument(name = "Get analysis history", skip(state))]
pub async fn get_analysis_history(
    Path(test_history_id): Path<i32>,
    Query(params): Query<HistoryParams>,
    State(state): State<AppState>,
) -> Result<Json<Vec<AnalysisHistoryEntry>>, ServerError> {
    let limit = params.limit.unwrap_or(10);
    if !(1..=100).contains(&limit) {
        return Err(ServerError::Invalid(format!(
            "limit must be within 1..100, got {limit}"
        )));
    }

    if dao::test_history::fetch_by_id(test_history_id, &state.db)
        .await?
        .is_none()
    {
        return Err(ServerError::NotFound(format!(
            "Test history {test_history_id}"
        )));
    }

    let rows = dao::analysis::fetch_for_test(
        test_history_id,
        params.analysis_type.as_deref(),
        limit,
        &state.db,
    )
    .await?;

    let entries = rows
        .into_iter()
        .map(|row| AnalysisHistoryEntry {
            id: row.id,
            summary: extract_summary(&row.analysis_result),
            analysis_category: row.analysis_category,
            analysis_type: row.analysis_type,
            analysis_result: row.analysis_result,
            model_name: row.model_name,
            analyzed_at: row.analyzed_at,
        })
        .collect();

    Ok(Json(entries))
}

/// `GET /analysis/health`: LLM and database reachability in one view.
#[instrument(name = "Analysis health check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (llm_ok, available_models) = match state.llm.available_models().await {
        Ok(models) => (true, models),
        Err(_) => (false, Vec::new()),
    };
    let db_ok = state.db.ping().await.is_ok();

    let status = match (db_ok, llm_ok) {
        (true, true) => "healthy",
        (true, false) => "degraded",
        (false, _) => "unhealthy",
    };

    Json(HealthResponse {
        status,
        llm_status: if llm_ok { "healthy" } else { "unreachable" },
        database_status: if db_ok { "healthy" } else { "unreachable" },
        available_models,
    })
}

fn extract_summary(result: &Value) -> String {
    result
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or("No summary available")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_comes_from_result_json() {
        let result = json!({"summary": "All good", "detailed_analysis": "..."});
        assert_eq!(extract_summary(&result), "All good");
    }

    #[test]
    fn missing_summary_has_placeholder() {
        assert_eq!(extract_summary(&json!({})), "No summary available");
        assert_eq!(extract_summary(&json!([1, 2])), "No summary available");
    }
}
