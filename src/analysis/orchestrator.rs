use crate::analysis::bottleneck::{
    BottleneckDetector, PerfPoint, PodResourceSeries, ResourceUsagePoint,
};
use crate::analysis::llm::LlmClient;
use crate::analysis::parser::{self, SingleAnalysis};
use crate::analysis::preprocess::TimeseriesPreprocessor;
use crate::config::LlmSettings;
use crate::dao;
use crate::entities::{scenario_history, server_infra, test_history, test_resource_timeseries};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sea_orm::DatabaseConnection;
use std::collections::{BTreeMap, HashMap};
use tracing::{error, info, warn};

/// Runs the full diagnostic pipeline for one completed test: loads the
/// stored series, gathers detector evidence, asks the LLM for the unified
/// report, and persists the five analysis sections.
///
/// LLM and parser failures never propagate; they degrade to fallback
/// analyses so run completion is never blocked on the model.
pub struct AnalysisOrchestrator {
    db: DatabaseConnection,
    llm: LlmClient,
    detector: BottleneckDetector,
    preprocessor: TimeseriesPreprocessor,
}

impl AnalysisOrchestrator {
    pub fn new(db: DatabaseConnection, llm_settings: &LlmSettings, display_timezone: Tz) -> Self {
        Self {
            db,
            llm: LlmClient::new(llm_settings),
            detector: BottleneckDetector::new(display_timezone),
            preprocessor: TimeseriesPreprocessor::default(),
        }
    }

    pub async fn run(&self, test_history_id: i32) -> Result<()> {
        info!("Starting analysis for test history {test_history_id}");

        let test = dao::test_history::fetch_by_id(test_history_id, &self.db)
            .await?
            .context(format!("Test history {test_history_id} not found"))?;
        let scenarios = dao::test_history::fetch_scenarios(test_history_id, &self.db).await?;
        let (perf, resources) = load_detector_input(&self.db, test_history_id).await?;

        let problems = self.detector.detect_all(&perf, Some(&resources));
        let evidence = self.detector.generate_ai_analysis_context(&problems);

        let cleaned = self.preprocessor.trim_noise(&perf);
        let series_summary = self.preprocessor.summarize(&cleaned);

        let prompt = build_prompt(&test, &scenarios, &series_summary, &evidence);

        let (analyses, model_name) = match self.llm.generate(&prompt).await {
            Ok(raw) => match parser::parse_unified_response(&raw) {
                Some(analyses) => (analyses, self.llm.model_name().to_string()),
                None => {
                    warn!("LLM response for test {test_history_id} failed to parse, using fallbacks");
                    (parser::fallback_analyses(), "fallback".to_string())
                }
            },
            Err(e) => {
                error!("LLM call failed for test {test_history_id}: {e:#}");
                (parser::fallback_analyses(), "fallback".to_string())
            }
        };

        self.persist(test_history_id, &analyses, &model_name).await?;
        dao::test_history::mark_analysis_completed(test_history_id, &self.db).await?;

        info!(
            "Analysis for test history {test_history_id} completed with model {model_name} \
             ({} problems detected)",
            problems.len()
        );
        Ok(())
    }

    async fn persist(
        &self,
        test_history_id: i32,
        analyses: &[SingleAnalysis],
        model_name: &str,
    ) -> Result<()> {
        let analyzed_at = Utc::now();
        for analysis in analyses {
            dao::analysis::insert(
                test_history_id,
                "comprehensive",
                analysis.analysis_type.as_str(),
                serde_json::to_value(analysis).context("Error serialising analysis result")?,
                model_name,
                analyzed_at,
                &self.db,
            )
            .await?;
        }
        Ok(())
    }
}

/// Loads the stored series of a test in detector form: the job-wide
/// performance buckets plus per-pod usage percentages.
pub async fn load_detector_input(
    db: &DatabaseConnection,
    test_history_id: i32,
) -> Result<(Vec<PerfPoint>, Vec<PodResourceSeries>)> {
    let overall = dao::timeseries::fetch_overall_series(test_history_id, db).await?;
    let perf: Vec<PerfPoint> = overall
        .iter()
        .map(|row| PerfPoint {
            timestamp: row.timestamp,
            tps: row.tps.unwrap_or(0.0),
            error_rate: row.error_rate.unwrap_or(0.0),
            vus: row.vus.unwrap_or(0) as f64,
            avg_response_time: row.avg_response_time.unwrap_or(0.0),
        })
        .collect();

    let scenarios = dao::test_history::fetch_scenarios(test_history_id, db).await?;
    let scenario_ids: Vec<i32> = scenarios.iter().map(|s| s.id).collect();
    let resource_rows = dao::timeseries::fetch_resource_series(&scenario_ids, db).await?;

    let infras = dao::openapi::server_infras_for_test(test_history_id, db).await?;
    let pod_names: HashMap<i32, String> = infras
        .iter()
        .map(|infra: &server_infra::Model| (infra.id, infra.name.clone()))
        .collect();

    Ok((perf, build_resource_series(&resource_rows, &pod_names)))
}

/// Groups raw resource rows per pod and converts values to percentages of
/// the recorded limits. Rows without a positive limit yield `None` for that
/// metric.
pub fn build_resource_series(
    rows: &[test_resource_timeseries::Model],
    pod_names: &HashMap<i32, String>,
) -> Vec<PodResourceSeries> {
    let mut per_pod: BTreeMap<i32, BTreeMap<DateTime<Utc>, ResourceUsagePoint>> = BTreeMap::new();

    for row in rows {
        let points = per_pod.entry(row.server_infra_id).or_default();
        let point = points.entry(row.timestamp).or_insert(ResourceUsagePoint {
            timestamp: row.timestamp,
            cpu_usage_percent: None,
            memory_usage_percent: None,
        });

        match row.metric_type.as_str() {
            "cpu" => {
                if let Some(limit) = row.cpu_limit_millicores.filter(|l| *l > 0.0) {
                    point.cpu_usage_percent = Some(row.value / limit * 100.0);
                }
            }
            "memory" => {
                if let Some(limit) = row.memory_limit_mb.filter(|l| *l > 0.0) {
                    point.memory_usage_percent = Some(row.value / limit * 100.0);
                }
            }
            other => warn!("Unknown resource metric type: {other}"),
        }
    }

    per_pod
        .into_iter()
        .map(|(server_infra_id, points)| PodResourceSeries {
            pod_name: pod_names
                .get(&server_infra_id)
                .cloned()
                .unwrap_or_else(|| format!("server-infra-{server_infra_id}")),
            samples: points.into_values().collect(),
        })
        .collect()
}

fn build_prompt(
    test: &test_history::Model,
    scenarios: &[scenario_history::Model],
    series_summary: &str,
    evidence: &str,
) -> String {
    let mut sections = Vec::new();

    sections.push(format!(
        "You are a performance engineer reviewing a load test.\n\n\
         # Test run\n\
         Title: {}\n\
         Total requests: {}, failed: {}, duration: {:.0}s\n\
         TPS avg/min/max: {:.1} / {:.1} / {:.1}\n\
         Response time avg/p95/p99: {:.1} / {:.1} / {:.1} ms\n\
         Error rate avg/max: {:.2}% / {:.2}%",
        test.title,
        test.total_requests.unwrap_or(0),
        test.failed_requests.unwrap_or(0),
        test.test_duration.unwrap_or(0.0),
        test.avg_tps.unwrap_or(0.0),
        test.min_tps.unwrap_or(0.0),
        test.max_tps.unwrap_or(0.0),
        test.avg_response_time.unwrap_or(0.0),
        test.p95_response_time.unwrap_or(0.0),
        test.p99_response_time.unwrap_or(0.0),
        test.avg_error_rate.unwrap_or(0.0),
        test.max_error_rate.unwrap_or(0.0),
    ));

    if !scenarios.is_empty() {
        let lines: Vec<String> = scenarios
            .iter()
            .map(|s| {
                format!(
                    "- {} (tag {}): avg TPS {:.1}, avg RT {:.1}ms, avg error {:.2}%",
                    s.name,
                    s.scenario_tag,
                    s.avg_tps.unwrap_or(0.0),
                    s.avg_response_time.unwrap_or(0.0),
                    s.avg_error_rate.unwrap_or(0.0),
                )
            })
            .collect();
        sections.push(format!("# Scenarios\n{}", lines.join("\n")));
    }

    sections.push(format!("# Time-series summary\n{series_summary}"));

    if !evidence.is_empty() {
        sections.push(evidence.to_string());
    }

    sections.push(
        "# Response format\n\
         Answer with a single JSON object with the keys `comprehensive`, `response_time`, \
         `tps`, `error_rate` and `resource_usage`. Each key maps to an object with `summary` \
         (string), `detailed_analysis` (string), `insights` (array of {category, message, \
         severity, recommendation}) and `performance_score` (number 0-100)."
            .to_string(),
    );

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resource_row(
        server_infra_id: i32,
        metric_type: &str,
        value: f64,
        ts_offset: i64,
    ) -> test_resource_timeseries::Model {
        test_resource_timeseries::Model {
            id: 0,
            scenario_history_id: 1,
            server_infra_id,
            metric_type: metric_type.to_string(),
            unit: if metric_type == "cpu" { "millicores" } else { "mb" }.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
                + chrono::Duration::seconds(ts_offset),
            value,
            cpu_request_millicores: Some(250.0),
            cpu_limit_millicores: Some(1000.0),
            memory_request_mb: Some(256.0),
            memory_limit_mb: Some(512.0),
        }
    }

    #[test]
    fn groups_rows_per_pod_and_converts_to_percent() {
        let rows = vec![
            resource_row(7, "cpu", 500.0, 0),
            resource_row(7, "memory", 256.0, 0),
            resource_row(7, "cpu", 800.0, 10),
        ];
        let mut names = HashMap::new();
        names.insert(7, "api-pod".to_string());

        let series = build_resource_series(&rows, &names);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].pod_name, "api-pod");
        assert_eq!(series[0].samples.len(), 2);
        assert_eq!(series[0].samples[0].cpu_usage_percent, Some(50.0));
        assert_eq!(series[0].samples[0].memory_usage_percent, Some(50.0));
        assert_eq!(series[0].samples[1].cpu_usage_percent, Some(80.0));
    }

    #[test]
    fn missing_limit_yields_no_percentage() {
        let mut row = resource_row(1, "cpu", 500.0, 0);
        row.cpu_limit_millicores = None;
        let series = build_resource_series(&[row], &HashMap::new());
        assert_eq!(series[0].samples[0].cpu_usage_percent, None);
        assert!(series[0].pod_name.contains("server-infra-1"));
    }
}
