use crate::entities::{scenario_history, test_history};
use crate::influxdb::AggregateMetrics;
use anyhow::{self, Context};
use chrono::Utc;
use sea_orm::*;

pub async fn fetch_by_id(
    id: i32,
    db: &DatabaseConnection,
) -> anyhow::Result<Option<test_history::Model>> {
    test_history::Entity::find_by_id(id)
        .one(db)
        .await
        .context(format!("Error fetching test history with id {id}"))
}

pub async fn fetch_by_job_name(
    job_name: &str,
    db: &DatabaseConnection,
) -> anyhow::Result<Option<test_history::Model>> {
    test_history::Entity::find()
        .filter(test_history::Column::JobName.eq(job_name))
        .one(db)
        .await
        .context(format!("Error fetching test history for job {job_name}"))
}

pub async fn fetch_scenarios(
    test_history_id: i32,
    db: &DatabaseConnection,
) -> anyhow::Result<Vec<scenario_history::Model>> {
    scenario_history::Entity::find()
        .filter(scenario_history::Column::TestHistoryId.eq(test_history_id))
        .all(db)
        .await
        .context(format!(
            "Error fetching scenarios for test history {test_history_id}"
        ))
}

/// Writes the job-wide aggregate metrics onto a run.
pub async fn update_with_metrics(
    test: &test_history::Model,
    metrics: &AggregateMetrics,
    db: &DatabaseConnection,
) -> anyhow::Result<()> {
    let mut active = test.clone().into_active_model();
    active.total_requests = ActiveValue::Set(Some(metrics.total_requests));
    active.failed_requests = ActiveValue::Set(Some(metrics.failed_requests));
    active.max_tps = ActiveValue::Set(Some(metrics.max_tps));
    active.min_tps = ActiveValue::Set(Some(metrics.min_tps));
    active.avg_tps = ActiveValue::Set(Some(metrics.avg_tps));
    active.max_response_time = ActiveValue::Set(Some(metrics.max_response_time));
    active.min_response_time = ActiveValue::Set(Some(metrics.min_response_time));
    active.avg_response_time = ActiveValue::Set(Some(metrics.avg_response_time));
    active.p50_response_time = ActiveValue::Set(Some(metrics.p50_response_time));
    active.p95_response_time = ActiveValue::Set(Some(metrics.p95_response_time));
    active.p99_response_time = ActiveValue::Set(Some(metrics.p99_response_time));
    active.max_error_rate = ActiveValue::Set(Some(metrics.max_error_rate));
    active.min_error_rate = ActiveValue::Set(Some(metrics.min_error_rate));
    active.avg_error_rate = ActiveValue::Set(Some(metrics.avg_error_rate));
    active.max_vus = ActiveValue::Set(metrics.max_vus);
    active.min_vus = ActiveValue::Set(metrics.min_vus);
    active.avg_vus = ActiveValue::Set(metrics.avg_vus);
    active.test_duration = ActiveValue::Set(Some(metrics.test_duration));
    active
        .update(db)
        .await
        .context("Error updating test history metrics")?;
    Ok(())
}

pub async fn update_scenario_with_metrics(
    scenario: &scenario_history::Model,
    metrics: &AggregateMetrics,
    db: &DatabaseConnection,
) -> anyhow::Result<()> {
    let mut active = scenario.clone().into_active_model();
    active.total_requests = ActiveValue::Set(Some(metrics.total_requests));
    active.failed_requests = ActiveValue::Set(Some(metrics.failed_requests));
    active.max_tps = ActiveValue::Set(Some(metrics.max_tps));
    active.min_tps = ActiveValue::Set(Some(metrics.min_tps));
    active.avg_tps = ActiveValue::Set(Some(metrics.avg_tps));
    active.max_response_time = ActiveValue::Set(Some(metrics.max_response_time));
    active.min_response_time = ActiveValue::Set(Some(metrics.min_response_time));
    active.avg_response_time = ActiveValue::Set(Some(metrics.avg_response_time));
    active.p50_response_time = ActiveValue::Set(Some(metrics.p50_response_time));
    active.p95_response_time = ActiveValue::Set(Some(metrics.p95_response_time));
    active.p99_response_time = ActiveValue::Set(Some(metrics.p99_response_time));
    active.max_error_rate = ActiveValue::Set(Some(metrics.max_error_rate));
    active.min_error_rate = ActiveValue::Set(Some(metrics.min_error_rate));
    active.avg_error_rate = ActiveValue::Set(Some(metrics.avg_error_rate));
    active.test_duration = ActiveValue::Set(Some(metrics.test_duration));
    active
        .update(db)
        .await
        .context("Error updating scenario history metrics")?;
    Ok(())
}

pub async fn mark_completed(
    test: &test_history::Model,
    db: &DatabaseConnection,
) -> anyhow::Result<()> {
    let mut active = test.clone().into_active_model();
    active.is_completed = ActiveValue::Set(true);
    active.completed_at = ActiveValue::Set(Some(Utc::now()));
    active
        .update(db)
        .await
        .context("Error marking test history as completed")?;
    Ok(())
}

pub async fn mark_analysis_completed(
    test_history_id: i32,
    db: &DatabaseConnection,
) -> anyhow::Result<()> {
    let test = fetch_by_id(test_history_id, db)
        .await?
        .context(format!("Test history {test_history_id} not found"))?;
    let mut active = test.into_active_model();
    active.is_analysis_completed = ActiveValue::Set(true);
    active.analysis_completed_at = ActiveValue::Set(Some(Utc::now()));
    active
        .update(db)
        .await
        .context("Error marking analysis as completed")?;
    Ok(())
}
