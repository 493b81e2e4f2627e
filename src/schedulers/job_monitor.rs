use crate::analysis::orchestrator::AnalysisOrchestrator;
use crate::config::Settings;
use crate::dao;
use crate::dao::timeseries::{MetricsBucket, ResourceBucket};
use crate::entities::{scenario_history, test_history};
use crate::influxdb::{InfluxClient, ResourceSample};
use crate::k8s::resources::{PodResourceSpec, ResourceClient};
use crate::k8s::jobs::JobClient;
use crate::k8s::K8sClient;
use crate::metrics_buffer::{MetricKind, SmartMetricsBuffer};
use crate::pod_spec_cache::PodSpecCache;
use anyhow::Result;
use chrono::Duration as ChronoDuration;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Watches generator jobs for completion and runs the ingestion pipeline:
/// aggregates, per-scenario aggregates, 10 s time series, gap-filled
/// resource series, completion flag, then analysis on a separate task.
///
/// Every step checks its "already done" flag before writing, so a tick that
/// failed halfway is safe to retry.
pub struct JobMonitorController {
    db: DatabaseConnection,
    jobs: JobClient,
    influx: InfluxClient,
    resources: ResourceClient,
    pod_spec_cache: Arc<PodSpecCache>,
    orchestrator: Arc<AnalysisOrchestrator>,
    poll_interval: Duration,
    auto_delete_jobs: bool,
}

impl JobMonitorController {
    pub fn new(
        db: DatabaseConnection,
        k8s: K8sClient,
        influx: InfluxClient,
        pod_spec_cache: Arc<PodSpecCache>,
        orchestrator: Arc<AnalysisOrchestrator>,
        settings: &Settings,
    ) -> Self {
        Self {
            db,
            jobs: JobClient::new(k8s.clone(), &settings.kubernetes.plog_namespace),
            influx,
            resources: ResourceClient::new(k8s, &settings.kubernetes.test_namespace),
            pod_spec_cache,
            orchestrator,
            poll_interval: Duration::from_secs(settings.scheduler.poll_interval),
            auto_delete_jobs: settings.scheduler.auto_delete_completed_jobs,
        }
    }

    pub async fn run_loop(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Job monitor started with {}s interval",
            self.poll_interval.as_secs()
        );
        loop {
            if let Err(e) = self.tick().await {
                warn!("Job monitor tick failed: {e:#}");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => {
                    info!("Job monitor stopping");
                    return;
                }
            }
        }
    }

    pub async fn tick(&self) -> Result<()> {
        let completed = self.jobs.list_completed_jobs().await?;
        for job in completed {
            if let Err(e) = self.process_job(&job.name).await {
                warn!("Failed to process completed job {}: {e:#}", job.name);
            }
        }
        Ok(())
    }

    async fn process_job(&self, job_name: &str) -> Result<()> {
        let Some(test) = dao::test_history::fetch_by_job_name(job_name, &self.db).await? else {
            debug!("No test history for job {job_name}, skipping foreign job");
            return Ok(());
        };
        if test.is_completed {
            return Ok(());
        }

        // Missing aggregates mean the store has not ingested the run yet;
        // leave the run open and retry next tick.
        let Some(overall) = self.influx.overall_metrics(job_name).await? else {
            info!("Metrics for job {job_name} not ready yet");
            return Ok(());
        };
        dao::test_history::update_with_metrics(&test, &overall, &self.db).await?;
        info!("Updated overall metrics for job {job_name}");

        let scenarios = dao::test_history::fetch_scenarios(test.id, &self.db).await?;
        for scenario in &scenarios {
            match self.influx.scenario_metrics(&scenario.scenario_tag).await? {
                Some(metrics) => {
                    dao::test_history::update_scenario_with_metrics(scenario, &metrics, &self.db)
                        .await?;
                }
                None => warn!(
                    "No metrics found for scenario {} - skipping update",
                    scenario.scenario_tag
                ),
            }
        }

        self.ingest_timeseries(&test, &scenarios).await?;
        self.ingest_resources(&test, &scenarios).await?;

        dao::test_history::mark_completed(&test, &self.db).await?;

        // Analysis runs on its own task; the monitor never blocks on the LLM.
        let orchestrator = self.orchestrator.clone();
        let test_id = test.id;
        tokio::spawn(async move {
            if let Err(e) = orchestrator.run(test_id).await {
                error!("Analysis for test {test_id} failed: {e:#}");
            }
        });

        if self.auto_delete_jobs {
            if let Err(e) = self.jobs.delete_completed_job(job_name).await {
                warn!("Could not delete completed job {job_name}: {e:#}");
            }
        }

        info!("Successfully processed completed job {job_name}");
        Ok(())
    }

    /// Walks the run in 10 s windows and persists one bucket per window for
    /// the job-wide series plus one per scenario tag with data.
    async fn ingest_timeseries(
        &self,
        test: &test_history::Model,
        scenarios: &[scenario_history::Model],
    ) -> Result<()> {
        let Some((start, end)) = self.influx.test_time_range(&test.job_name).await? else {
            warn!("No time range found for job {}", test.job_name);
            return Ok(());
        };

        let scenario_ids: HashMap<&str, i32> = scenarios
            .iter()
            .map(|s| (s.scenario_tag.as_str(), s.id))
            .collect();
        let tag_values = self.influx.scenario_names(&test.job_name).await?;

        let mut buckets = Vec::new();
        let mut current = start;
        while current < end {
            let interval_end = (current + ChronoDuration::seconds(10)).min(end);

            if let Some(metrics) = self
                .influx
                .interval_metrics(&test.job_name, current, interval_end, None)
                .await?
            {
                buckets.push(MetricsBucket {
                    timestamp: current,
                    scenario_history_id: None,
                    metrics,
                });
            }

            for tag in &tag_values {
                let Some(scenario_id) = scenario_ids.get(tag.as_str()) else {
                    continue;
                };
                if let Some(metrics) = self
                    .influx
                    .interval_metrics(&test.job_name, current, interval_end, Some(tag))
                    .await?
                {
                    buckets.push(MetricsBucket {
                        timestamp: current,
                        scenario_history_id: Some(*scenario_id),
                        metrics,
                    });
                }
            }

            current = interval_end;
        }

        let saved = dao::timeseries::save_metrics_buckets(test.id, &buckets, &self.db).await?;
        info!("Saved {saved} timeseries buckets for job {}", test.job_name);
        Ok(())
    }

    /// Collects CPU/memory series for every pod backing the tested
    /// endpoints, gap-fills them, tags them with the pod's resource spec and
    /// persists them per scenario.
    async fn ingest_resources(
        &self,
        test: &test_history::Model,
        scenarios: &[scenario_history::Model],
    ) -> Result<()> {
        let Some((start, end)) = self.influx.test_time_range(&test.job_name).await? else {
            warn!(
                "No time range found for job {} - skipping resource metrics",
                test.job_name
            );
            return Ok(());
        };
        let extended_start = start - ChronoDuration::minutes(1);
        let extended_end = end + ChronoDuration::minutes(1);

        for scenario in scenarios {
            let Some(spec_id) =
                dao::openapi::spec_id_for_endpoint(scenario.endpoint_id, &self.db).await?
            else {
                warn!("Scenario {} has no spec behind its endpoint", scenario.id);
                continue;
            };
            let infras = dao::server_infra::fetch_by_spec_id(spec_id, &self.db).await?;
            if infras.is_empty() {
                warn!("No server infra found for scenario {}", scenario.id);
            }

            for infra in infras {
                let resource_spec = self.pod_spec(&infra.name).await;

                let cpu = self
                    .influx
                    .cpu_metrics(&infra.name, extended_start, extended_end)
                    .await?;
                let cpu_buckets = interpolate_samples(&cpu, &format!("{}/cpu", infra.name));
                dao::timeseries::save_resource_buckets(
                    scenario.id,
                    infra.id,
                    "cpu",
                    "millicores",
                    &cpu_buckets,
                    resource_spec.as_ref(),
                    &self.db,
                )
                .await?;

                let memory = self
                    .influx
                    .memory_metrics(&infra.name, extended_start, extended_end)
                    .await?;
                let memory_buckets =
                    interpolate_samples(&memory, &format!("{}/memory", infra.name));
                dao::timeseries::save_resource_buckets(
                    scenario.id,
                    infra.id,
                    "memory",
                    "mb",
                    &memory_buckets,
                    resource_spec.as_ref(),
                    &self.db,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn pod_spec(&self, pod_name: &str) -> Option<PodResourceSpec> {
        if let Some(spec) = self.pod_spec_cache.get(pod_name).await {
            return Some(spec);
        }
        match self.resources.pod_aggregated_resources(pod_name).await {
            Ok(spec) => {
                self.pod_spec_cache.insert(pod_name, spec.clone()).await;
                Some(spec)
            }
            Err(e) => {
                warn!("Could not read resource spec for pod {pod_name}: {e:#}");
                None
            }
        }
    }
}

/// Fills 10 s gaps in a resource series with buffer predictions. Samples are
/// assumed time-ascending on 10 s boundaries (the store's GROUP BY output).
fn interpolate_samples(samples: &[ResourceSample], metric_name: &str) -> Vec<ResourceBucket> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };
    let last = samples[samples.len() - 1];

    let by_second: HashMap<i64, f64> = samples
        .iter()
        .map(|s| (s.timestamp.timestamp(), s.value))
        .collect();

    let mut buffer = SmartMetricsBuffer::new(metric_name, MetricKind::Absolute, f64::MAX);
    let mut buckets = Vec::new();
    let mut ts = first.timestamp;
    while ts <= last.timestamp {
        match by_second.get(&ts.timestamp()) {
            Some(value) => {
                buffer.add_value(*value, false, Some(ts));
                buckets.push(ResourceBucket {
                    timestamp: ts,
                    value: *value,
                });
            }
            None => {
                let predicted = buffer.predict_next().unwrap_or(0.0);
                buffer.add_value(predicted, true, Some(ts));
                buckets.push(ResourceBucket {
                    timestamp: ts,
                    value: buffer.last_value().unwrap_or(predicted),
                });
            }
        }
        ts += ChronoDuration::seconds(10);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(offset: i64, value: f64) -> ResourceSample {
        ResourceSample {
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
                + ChronoDuration::seconds(offset),
            value,
        }
    }

    #[test]
    fn empty_series_interpolates_to_nothing() {
        assert!(interpolate_samples(&[], "cpu").is_empty());
    }

    #[test]
    fn contiguous_series_passes_through() {
        let samples = vec![sample(0, 100.0), sample(10, 110.0), sample(20, 120.0)];
        let buckets = interpolate_samples(&samples, "cpu");
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[1].value, 110.0);
    }

    #[test]
    fn gaps_are_filled_with_predictions() {
        // 30 s hole between the second and third actual samples.
        let samples = vec![
            sample(0, 100.0),
            sample(10, 110.0),
            sample(50, 150.0),
        ];
        let buckets = interpolate_samples(&samples, "cpu");
        assert_eq!(buckets.len(), 6);
        // The filled values continue the rising trend rather than dropping
        // to zero.
        assert!(buckets[2].value > 100.0);
        assert!(buckets[3].value > 100.0);
        assert_eq!(buckets[5].value, 150.0);
    }
}
