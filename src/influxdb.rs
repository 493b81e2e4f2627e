use crate::config::InfluxDbSettings;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

/// Client for the metrics store's InfluxQL HTTP API (Influx 1.x `/query`).
///
/// Exposes strongly typed query functions only; callers never see query
/// strings. A series with no points yields `None`/empty, never an error;
/// only transport and decode failures propagate.
#[derive(Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    query_url: String,
    database: String,
}

/// Whole-run aggregates for one job or one scenario tag. VUS statistics are
/// only collected for the job-wide aggregate.
#[derive(Debug, Clone, Default)]
pub struct AggregateMetrics {
    pub total_requests: i64,
    pub failed_requests: i64,
    pub max_tps: f64,
    pub min_tps: f64,
    pub avg_tps: f64,
    pub avg_response_time: f64,
    pub max_response_time: f64,
    pub min_response_time: f64,
    pub p50_response_time: f64,
    pub p95_response_time: f64,
    pub p99_response_time: f64,
    pub max_error_rate: f64,
    pub min_error_rate: f64,
    pub avg_error_rate: f64,
    pub max_vus: Option<f64>,
    pub min_vus: Option<f64>,
    pub avg_vus: Option<f64>,
    pub test_duration: f64,
}

/// One 10 s performance bucket.
#[derive(Debug, Clone, Default)]
pub struct IntervalMetrics {
    pub tps: f64,
    pub error_rate: f64,
    pub vus: i32,
    pub avg_response_time: f64,
    pub p95_response_time: f64,
    pub p99_response_time: f64,
}

/// One container-resource sample.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Last-10-seconds snapshot used by the realtime stream.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LiveMetrics {
    pub tps: f64,
    pub vus: i32,
    pub response_time: f64,
    pub error_rate: f64,
}

#[derive(Deserialize)]
struct QueryResponse {
    results: Vec<QueryResult>,
}

#[derive(Deserialize)]
struct QueryResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Default)]
struct Series {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl Series {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn f64_at(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.values.get(row)?.get(idx)?.as_f64()
    }

    fn first_f64(&self, column: &str) -> Option<f64> {
        self.f64_at(0, column)
    }

    fn timestamp_at(&self, row: usize) -> Option<DateTime<Utc>> {
        let idx = self.column_index("time")?;
        let millis = self.values.get(row)?.get(idx)?.as_i64()?;
        DateTime::from_timestamp_millis(millis)
    }
}

fn quote_tag(value: &str) -> String {
    value.replace('\'', "\\'")
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl InfluxClient {
    pub fn new(settings: &InfluxDbSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            query_url: settings.query_url(),
            database: settings.database.clone(),
        }
    }

    async fn query(&self, q: &str) -> Result<Option<Series>> {
        debug!(query = q, "influx query");
        let response = self
            .http
            .get(&self.query_url)
            .query(&[
                ("db", self.database.as_str()),
                ("q", q),
                ("epoch", "ms"),
            ])
            .send()
            .await
            .context("Error querying metrics store")?
            .error_for_status()
            .context("Metrics store returned an error status")?;

        let mut decoded: QueryResponse = response
            .json()
            .await
            .context("Error decoding metrics store response")?;

        let Some(result) = decoded.results.drain(..).next() else {
            return Ok(None);
        };
        if let Some(error) = result.error {
            warn!("Metrics store query error: {error}");
            return Ok(None);
        }
        Ok(result.series.into_iter().next())
    }

    async fn scalar(&self, q: &str, column: &str) -> Result<Option<f64>> {
        Ok(self.query(q).await?.and_then(|s| s.first_f64(column)))
    }

    /// First and last `http_reqs` timestamps for the job.
    pub async fn test_time_range(
        &self,
        job_name: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let job = quote_tag(job_name);
        let first = self
            .query(&format!(
                "SELECT \"value\" FROM \"http_reqs\" WHERE \"job_name\" = '{job}' ORDER BY time ASC LIMIT 1"
            ))
            .await?
            .and_then(|s| s.timestamp_at(0));
        let last = self
            .query(&format!(
                "SELECT \"value\" FROM \"http_reqs\" WHERE \"job_name\" = '{job}' ORDER BY time DESC LIMIT 1"
            ))
            .await?
            .and_then(|s| s.timestamp_at(0));

        Ok(match (first, last) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        })
    }

    /// Distinct `scenario` tag values seen for the job.
    pub async fn scenario_names(&self, job_name: &str) -> Result<Vec<String>> {
        let job = quote_tag(job_name);
        let series = self
            .query(&format!(
                "SHOW TAG VALUES FROM \"http_reqs\" WITH KEY = \"scenario\" WHERE \"job_name\" = '{job}'"
            ))
            .await?;

        let Some(series) = series else {
            return Ok(Vec::new());
        };
        let Some(idx) = series.column_index("value") else {
            return Ok(Vec::new());
        };
        Ok(series
            .values
            .iter()
            .filter_map(|row| row.get(idx)?.as_str().map(str::to_string))
            .collect())
    }

    /// Whole-run aggregate for one tag. `None` when the store has no
    /// `http_reqs` points for it yet.
    async fn aggregate_metrics(
        &self,
        tag_key: &str,
        tag_value: &str,
        include_vus: bool,
    ) -> Result<Option<AggregateMetrics>> {
        let tag = quote_tag(tag_value);
        let selector = format!("\"{tag_key}\" = '{tag}'");

        let total_requests = self
            .scalar(
                &format!(
                    "SELECT SUM(\"value\") as total_requests FROM \"http_reqs\" WHERE {selector}"
                ),
                "total_requests",
            )
            .await?;
        let Some(total_requests) = total_requests else {
            debug!("No metrics found for {tag_key}={tag_value}");
            return Ok(None);
        };

        let failed_requests = self
            .scalar(
                &format!(
                    "SELECT SUM(\"value\") as failed_requests FROM \"http_reqs\" WHERE {selector} AND \"status\" !~ /^2../"
                ),
                "failed_requests",
            )
            .await?
            .unwrap_or(0.0);

        let tps = self
            .query(&format!(
                "SELECT MAX(tps) as max_tps, MIN(tps) as min_tps, MEAN(tps) as avg_tps FROM \
                 (SELECT SUM(\"value\")/5 as tps FROM \"http_reqs\" WHERE {selector} GROUP BY time(5s) fill(none))"
            ))
            .await?
            .unwrap_or_default();

        let response_times = self
            .query(&format!(
                "SELECT MEAN(\"value\") as avg_rt, MAX(\"value\") as max_rt, MIN(\"value\") as min_rt, \
                 PERCENTILE(\"value\", 50) as p50_rt, PERCENTILE(\"value\", 95) as p95_rt, \
                 PERCENTILE(\"value\", 99) as p99_rt FROM \"http_req_duration\" WHERE {selector}"
            ))
            .await?
            .unwrap_or_default();

        let error_rates = self
            .query(&format!(
                "SELECT MIN(\"err\") as min_err, MAX(\"err\") as max_err, MEAN(\"err\") as avg_err FROM \
                 (SELECT MEAN(\"value\") as err FROM \"http_req_failed\" WHERE {selector} GROUP BY time(5s) fill(none))"
            ))
            .await?
            .unwrap_or_default();

        let (max_vus, min_vus, avg_vus) = if include_vus {
            let vus = self
                .query(&format!(
                    "SELECT MAX(\"value\") as max_vus, MIN(\"value\") as min_vus, MEAN(\"value\") as avg_vus \
                     FROM \"vus\" WHERE {selector}"
                ))
                .await?
                .unwrap_or_default();
            (
                vus.first_f64("max_vus"),
                vus.first_f64("min_vus"),
                vus.first_f64("avg_vus"),
            )
        } else {
            (None, None, None)
        };

        let test_duration = match self.tag_time_range(&selector).await? {
            Some((start, end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            None => 0.0,
        };

        // http_req_failed carries 0/1 samples, so the bucketed means are
        // fractions; stored error rates are percentages.
        Ok(Some(AggregateMetrics {
            total_requests: total_requests as i64,
            failed_requests: failed_requests as i64,
            max_tps: tps.first_f64("max_tps").unwrap_or(0.0),
            min_tps: tps.first_f64("min_tps").unwrap_or(0.0),
            avg_tps: tps.first_f64("avg_tps").unwrap_or(0.0),
            avg_response_time: response_times.first_f64("avg_rt").unwrap_or(0.0),
            max_response_time: response_times.first_f64("max_rt").unwrap_or(0.0),
            min_response_time: response_times.first_f64("min_rt").unwrap_or(0.0),
            p50_response_time: response_times.first_f64("p50_rt").unwrap_or(0.0),
            p95_response_time: response_times.first_f64("p95_rt").unwrap_or(0.0),
            p99_response_time: response_times.first_f64("p99_rt").unwrap_or(0.0),
            max_error_rate: error_rates.first_f64("max_err").unwrap_or(0.0) * 100.0,
            min_error_rate: error_rates.first_f64("min_err").unwrap_or(0.0) * 100.0,
            avg_error_rate: error_rates.first_f64("avg_err").unwrap_or(0.0) * 100.0,
            max_vus,
            min_vus,
            avg_vus,
            test_duration,
        }))
    }

    async fn tag_time_range(
        &self,
        selector: &str,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let first = self
            .query(&format!(
                "SELECT \"value\" FROM \"http_reqs\" WHERE {selector} ORDER BY time ASC LIMIT 1"
            ))
            .await?
            .and_then(|s| s.timestamp_at(0));
        let last = self
            .query(&format!(
                "SELECT \"value\" FROM \"http_reqs\" WHERE {selector} ORDER BY time DESC LIMIT 1"
            ))
            .await?
            .and_then(|s| s.timestamp_at(0));
        Ok(match (first, last) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        })
    }

    pub async fn overall_metrics(&self, job_name: &str) -> Result<Option<AggregateMetrics>> {
        self.aggregate_metrics("job_name", job_name, true).await
    }

    pub async fn scenario_metrics(&self, scenario_tag: &str) -> Result<Option<AggregateMetrics>> {
        self.aggregate_metrics("scenario", scenario_tag, false).await
    }

    /// Metrics for one 10 s window, job-wide or filtered to a scenario tag.
    pub async fn interval_metrics(
        &self,
        job_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        scenario: Option<&str>,
    ) -> Result<Option<IntervalMetrics>> {
        let mut selector = format!(
            "\"job_name\" = '{}' AND time >= '{}' AND time < '{}'",
            quote_tag(job_name),
            rfc3339(start),
            rfc3339(end)
        );
        if let Some(scenario) = scenario {
            selector.push_str(&format!(" AND \"scenario\" = '{}'", quote_tag(scenario)));
        }

        let total_requests = self
            .scalar(
                &format!("SELECT SUM(\"value\") as total FROM \"http_reqs\" WHERE {selector}"),
                "total",
            )
            .await?
            .unwrap_or(0.0);
        if total_requests <= 0.0 {
            return Ok(None);
        }

        let error_requests = self
            .scalar(
                &format!(
                    "SELECT SUM(\"value\") as errors FROM \"http_reqs\" WHERE {selector} AND \"status\" !~ /^2../"
                ),
                "errors",
            )
            .await?
            .unwrap_or(0.0);

        let vus = self
            .scalar(
                &format!("SELECT LAST(\"value\") as vus FROM \"vus\" WHERE {selector}"),
                "vus",
            )
            .await?
            .unwrap_or(0.0);

        let response_times = self
            .query(&format!(
                "SELECT MEAN(\"value\") as avg_rt, PERCENTILE(\"value\", 95) as p95_rt, \
                 PERCENTILE(\"value\", 99) as p99_rt FROM \"http_req_duration\" WHERE {selector}"
            ))
            .await?
            .unwrap_or_default();

        Ok(Some(IntervalMetrics {
            tps: total_requests / 10.0,
            error_rate: error_requests / total_requests * 100.0,
            vus: vus as i32,
            avg_response_time: response_times.first_f64("avg_rt").unwrap_or(0.0),
            p95_response_time: response_times.first_f64("p95_rt").unwrap_or(0.0),
            p99_response_time: response_times.first_f64("p99_rt").unwrap_or(0.0),
        }))
    }

    /// 10 s bucketed CPU usage in millicores for one pod.
    pub async fn cpu_metrics(
        &self,
        pod_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ResourceSample>> {
        let query = format!(
            "SELECT non_negative_derivative(mean(\"container_cpu_usage_seconds_total\"), 1s) * 1000 as cpu_millicores \
             FROM \"cadvisor_metrics\" WHERE \"pod\" = '{}' AND \"container\" = '' AND \"image\" = '' \
             AND time >= '{}' AND time < '{}' GROUP BY time(10s) fill(linear)",
            quote_tag(pod_name),
            rfc3339(start),
            rfc3339(end)
        );
        self.resource_samples(&query, "cpu_millicores").await
    }

    /// 10 s bucketed working-set memory in MB for one pod.
    pub async fn memory_metrics(
        &self,
        pod_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ResourceSample>> {
        let query = format!(
            "SELECT mean(\"container_memory_working_set_bytes\") / 1048576 as memory_mb \
             FROM \"cadvisor_metrics\" WHERE \"pod\" = '{}' AND \"container\" = '' AND \"image\" = '' \
             AND time >= '{}' AND time < '{}' GROUP BY time(10s) fill(linear)",
            quote_tag(pod_name),
            rfc3339(start),
            rfc3339(end)
        );
        self.resource_samples(&query, "memory_mb").await
    }

    async fn resource_samples(&self, query: &str, column: &str) -> Result<Vec<ResourceSample>> {
        let Some(series) = self.query(query).await? else {
            return Ok(Vec::new());
        };
        let mut samples = Vec::new();
        for row in 0..series.values.len() {
            let (Some(timestamp), Some(value)) =
                (series.timestamp_at(row), series.f64_at(row, column))
            else {
                continue;
            };
            samples.push(ResourceSample { timestamp, value });
        }
        Ok(samples)
    }

    /// Live job-wide numbers over the trailing 10 s.
    pub async fn live_metrics(&self, job_name: &str, scenario: Option<&str>) -> Result<LiveMetrics> {
        let mut selector = format!("time > now() - 10s AND \"job_name\" = '{}'", quote_tag(job_name));
        if let Some(scenario) = scenario {
            selector.push_str(&format!(" AND \"scenario\" = '{}'", quote_tag(scenario)));
        }

        let total = self
            .scalar(
                &format!("SELECT SUM(\"value\") as total FROM \"http_reqs\" WHERE {selector}"),
                "total",
            )
            .await?
            .unwrap_or(0.0);
        let failed = self
            .scalar(
                &format!("SELECT COUNT(\"value\") as errors FROM \"http_req_failed\" WHERE {selector}"),
                "errors",
            )
            .await?
            .unwrap_or(0.0);
        let requests = self
            .scalar(
                &format!("SELECT COUNT(\"value\") as requests FROM \"http_reqs\" WHERE {selector}"),
                "requests",
            )
            .await?
            .unwrap_or(0.0);
        let vus = self
            .scalar(
                &format!("SELECT LAST(\"value\") as vus FROM \"vus\" WHERE {selector}"),
                "vus",
            )
            .await?;
        let response_time = self
            .scalar(
                &format!("SELECT MEAN(\"value\") as latency FROM \"http_req_duration\" WHERE {selector}"),
                "latency",
            )
            .await?
            .unwrap_or(0.0);

        Ok(LiveMetrics {
            tps: total / 10.0,
            vus: vus.unwrap_or(0.0) as i32,
            response_time,
            error_rate: if requests > 0.0 {
                failed / requests * 100.0
            } else {
                0.0
            },
        })
    }

    /// Most recent CPU sample (millicores) for a pod, from the trailing 30 s.
    pub async fn current_cpu_millicores(&self, pod_name: &str) -> Result<Option<f64>> {
        let query = format!(
            "SELECT non_negative_derivative(mean(\"container_cpu_usage_seconds_total\"), 1s) * 1000 as cpu_millicores \
             FROM \"cadvisor_metrics\" WHERE \"pod\" = '{}' AND \"container\" = '' AND \"image\" = '' \
             AND time > now() - 30s GROUP BY time(10s) fill(none)",
            quote_tag(pod_name)
        );
        let samples = self.resource_samples(&query, "cpu_millicores").await?;
        Ok(samples.last().map(|s| s.value))
    }

    /// Most recent working-set memory sample (MB) for a pod.
    pub async fn current_memory_mb(&self, pod_name: &str) -> Result<Option<f64>> {
        let query = format!(
            "SELECT mean(\"container_memory_working_set_bytes\") / 1048576 as memory_mb \
             FROM \"cadvisor_metrics\" WHERE \"pod\" = '{}' AND \"container\" = '' AND \"image\" = '' \
             AND time > now() - 30s GROUP BY time(10s) fill(none)",
            quote_tag(pod_name)
        );
        let samples = self.resource_samples(&query, "memory_mb").await?;
        Ok(samples.last().map(|s| s.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_from(json: &str) -> Series {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn reads_scalar_columns_by_name() {
        let series = series_from(
            r#"{"columns":["time","total_requests"],"values":[[1700000000000, 6000]]}"#,
        );
        assert_eq!(series.first_f64("total_requests"), Some(6000.0));
        assert_eq!(series.first_f64("missing"), None);
    }

    #[test]
    fn reads_epoch_millis_timestamps() {
        let series =
            series_from(r#"{"columns":["time","value"],"values":[[1700000000000, 1.0]]}"#);
        let ts = series.timestamp_at(0).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn null_cells_read_as_none() {
        let series = series_from(r#"{"columns":["time","vus"],"values":[[1700000000000, null]]}"#);
        assert_eq!(series.first_f64("vus"), None);
    }

    #[test]
    fn missing_series_decodes_to_empty() {
        let decoded: QueryResponse = serde_json::from_str(r#"{"results":[{}]}"#).unwrap();
        assert!(decoded.results[0].series.is_empty());
    }

    #[test]
    fn tag_values_are_quoted() {
        assert_eq!(quote_tag("job'; DROP"), "job\\'; DROP");
    }
}
