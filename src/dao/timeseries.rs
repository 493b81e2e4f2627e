use crate::entities::{test_metrics_timeseries, test_resource_timeseries};
use crate::influxdb::IntervalMetrics;
use crate::k8s::resources::PodResourceSpec;
use anyhow::{self, Context};
use chrono::{DateTime, Utc};
use sea_orm::*;

/// One 10 s performance bucket ready for persistence.
#[derive(Debug, Clone)]
pub struct MetricsBucket {
    pub timestamp: DateTime<Utc>,
    /// `None` marks the job-wide series.
    pub scenario_history_id: Option<i32>,
    pub metrics: IntervalMetrics,
}

pub async fn save_metrics_buckets<C: ConnectionTrait>(
    test_history_id: i32,
    buckets: &[MetricsBucket],
    db: &C,
) -> anyhow::Result<usize> {
    if buckets.is_empty() {
        return Ok(0);
    }
    let rows: Vec<test_metrics_timeseries::ActiveModel> = buckets
        .iter()
        .map(|bucket| test_metrics_timeseries::ActiveModel {
            id: ActiveValue::NotSet,
            scenario_history_id: ActiveValue::Set(bucket.scenario_history_id),
            test_history_id: ActiveValue::Set(test_history_id),
            timestamp: ActiveValue::Set(bucket.timestamp),
            tps: ActiveValue::Set(Some(bucket.metrics.tps)),
            error_rate: ActiveValue::Set(Some(bucket.metrics.error_rate)),
            vus: ActiveValue::Set(Some(bucket.metrics.vus)),
            avg_response_time: ActiveValue::Set(Some(bucket.metrics.avg_response_time)),
            p95_response_time: ActiveValue::Set(Some(bucket.metrics.p95_response_time)),
            p99_response_time: ActiveValue::Set(Some(bucket.metrics.p99_response_time)),
        })
        .collect();

    let count = rows.len();
    test_metrics_timeseries::Entity::insert_many(rows)
        .exec(db)
        .await
        .context("Error inserting metrics timeseries rows")?;
    Ok(count)
}

/// One gap-filled resource sample ready for persistence.
#[derive(Debug, Clone)]
pub struct ResourceBucket {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

pub async fn save_resource_buckets<C: ConnectionTrait>(
    scenario_history_id: i32,
    server_infra_id: i32,
    metric_type: &str,
    unit: &str,
    buckets: &[ResourceBucket],
    spec: Option<&PodResourceSpec>,
    db: &C,
) -> anyhow::Result<usize> {
    if buckets.is_empty() {
        return Ok(0);
    }
    let rows: Vec<test_resource_timeseries::ActiveModel> = buckets
        .iter()
        .map(|bucket| test_resource_timeseries::ActiveModel {
            id: ActiveValue::NotSet,
            scenario_history_id: ActiveValue::Set(scenario_history_id),
            server_infra_id: ActiveValue::Set(server_infra_id),
            metric_type: ActiveValue::Set(metric_type.to_string()),
            unit: ActiveValue::Set(unit.to_string()),
            timestamp: ActiveValue::Set(bucket.timestamp),
            value: ActiveValue::Set(bucket.value.max(0.0)),
            cpu_request_millicores: ActiveValue::Set(spec.map(|s| s.cpu_request_millicores)),
            cpu_limit_millicores: ActiveValue::Set(spec.map(|s| s.cpu_limit_millicores)),
            memory_request_mb: ActiveValue::Set(spec.map(|s| s.memory_request_mb)),
            memory_limit_mb: ActiveValue::Set(spec.map(|s| s.memory_limit_mb)),
        })
        .collect();

    let count = rows.len();
    test_resource_timeseries::Entity::insert_many(rows)
        .exec(db)
        .await
        .context("Error inserting resource timeseries rows")?;
    Ok(count)
}

/// Job-wide performance series (scenario id null), time ascending.
pub async fn fetch_overall_series(
    test_history_id: i32,
    db: &DatabaseConnection,
) -> anyhow::Result<Vec<test_metrics_timeseries::Model>> {
    test_metrics_timeseries::Entity::find()
        .filter(test_metrics_timeseries::Column::TestHistoryId.eq(test_history_id))
        .filter(test_metrics_timeseries::Column::ScenarioHistoryId.is_null())
        .order_by_asc(test_metrics_timeseries::Column::Timestamp)
        .all(db)
        .await
        .context(format!(
            "Error fetching overall series for test {test_history_id}"
        ))
}

/// Resource samples for every scenario of a test, time ascending.
pub async fn fetch_resource_series(
    scenario_history_ids: &[i32],
    db: &DatabaseConnection,
) -> anyhow::Result<Vec<test_resource_timeseries::Model>> {
    if scenario_history_ids.is_empty() {
        return Ok(Vec::new());
    }
    test_resource_timeseries::Entity::find()
        .filter(
            test_resource_timeseries::Column::ScenarioHistoryId
                .is_in(scenario_history_ids.iter().copied()),
        )
        .order_by_asc(test_resource_timeseries::Column::Timestamp)
        .all(db)
        .await
        .context("Error fetching resource series")
}
