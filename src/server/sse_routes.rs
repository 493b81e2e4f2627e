use crate::dao;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IncludeMode {
    All,
    K6Only,
    ResourcesOnly,
}

impl IncludeMode {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_lowercase).as_deref() {
            None | Some("all") => IncludeMode::All,
            Some("k6_only") => IncludeMode::K6Only,
            Some("resources_only") => IncludeMode::ResourcesOnly,
            Some(other) => {
                warn!("Invalid include parameter '{other}', using 'all'");
                IncludeMode::All
            }
        }
    }

    fn wants_k6(&self) -> bool {
        !matches!(self, IncludeMode::ResourcesOnly)
    }

    fn wants_resources(&self) -> bool {
        !matches!(self, IncludeMode::K6Only)
    }
}

#[derive(Debug, Deserialize)]
pub struct SseParams {
    pub include: Option<String>,
}

/// `GET /sse/k6data/{job_name}`: one JSON frame every 5 seconds while the
/// client stays connected. Closing the connection ends the emitter; the
/// prediction buffers stay behind for the cleanup controller.
pub async fn sse_k6data(
    Path(job_name): Path<String>,
    Query(params): Query<SseParams>,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let include = IncludeMode::parse(params.include.as_deref());
    info!("Starting SSE stream for job {job_name} (include={include:?})");

    let stream = stream::unfold(
        (state, job_name, include),
        |(state, job_name, include)| async move {
            let frame = compose_frame(&state, &job_name, include).await;
            let event = Event::default().json_data(&frame).unwrap_or_else(|e| {
                warn!("Failed to serialise SSE frame: {e}");
                Event::default().data("{}")
            });

            tokio::time::sleep(Duration::from_secs(5)).await;
            Some((Ok(event), (state, job_name, include)))
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// One frame: timestamp, job-wide aggregate, per-scenario numbers and
/// predicted resource percentages. A metrics-store failure produces a zeroed
/// frame with an `error` field instead of ending the stream.
async fn compose_frame(state: &AppState, job_name: &str, include: IncludeMode) -> Value {
    let timestamp = chrono::Utc::now()
        .with_timezone(&state.display_timezone)
        .to_rfc3339();

    let mut frame = json!({
        "timestamp": timestamp,
        "overall": { "tps": 0.0, "vus": 0, "response_time": 0.0, "error_rate": 0.0 },
        "scenarios": [],
    });
    if include.wants_resources() {
        frame["resources"] = json!([]);
    }

    if include.wants_k6() {
        match compose_k6_metrics(state, job_name).await {
            Ok((overall, scenarios)) => {
                frame["overall"] = overall;
                frame["scenarios"] = scenarios;
            }
            Err(e) => {
                warn!("SSE k6 metrics failed for job {job_name}: {e:#}");
                frame["error"] = json!(e.to_string());
                return frame;
            }
        }
    }

    if include.wants_resources() {
        match compose_resource_metrics(state, job_name).await {
            Ok(resources) => frame["resources"] = resources,
            Err(e) => {
                warn!("SSE resource metrics failed for job {job_name}: {e:#}");
                frame["error"] = json!(e.to_string());
            }
        }
    }

    frame
}

async fn compose_k6_metrics(
    state: &AppState,
    job_name: &str,
) -> anyhow::Result<(Value, Value)> {
    let overall = state.influx.live_metrics(job_name, None).await?;

    let mut scenarios = Vec::new();
    for scenario in state.influx.scenario_names(job_name).await? {
        let mut live = state.influx.live_metrics(job_name, Some(&scenario)).await?;
        // A scenario without its own VUS samples inherits the job-wide count.
        if live.vus == 0 {
            live.vus = overall.vus;
        }
        scenarios.push(json!({
            "name": scenario,
            "scenario_tag": scenario,
            "tps": live.tps,
            "vus": live.vus,
            "response_time": live.response_time,
            "error_rate": live.error_rate,
        }));
    }

    Ok((
        json!({
            "tps": overall.tps,
            "vus": overall.vus,
            "response_time": overall.response_time,
            "error_rate": overall.error_rate,
        }),
        Value::Array(scenarios),
    ))
}

async fn compose_resource_metrics(state: &AppState, job_name: &str) -> anyhow::Result<Value> {
    let Some(test) = dao::test_history::fetch_by_job_name(job_name, &state.db).await? else {
        debug!("No test history for streamed job {job_name}");
        return Ok(json!([]));
    };
    let infras = dao::openapi::server_infras_for_test(test.id, &state.db).await?;

    let mut resources = Vec::new();
    for infra in infras {
        match compose_pod_resource(state, job_name, &infra.name, &infra.service_type).await {
            Ok(entry) => resources.push(entry),
            Err(e) => {
                // One broken pod must not take down the whole frame.
                warn!("Skipping pod {} in SSE frame: {e:#}", infra.name);
            }
        }
    }
    Ok(Value::Array(resources))
}

async fn compose_pod_resource(
    state: &AppState,
    job_name: &str,
    pod_name: &str,
    service_type: &str,
) -> anyhow::Result<Value> {
    let spec = match state.pod_spec_cache.get(pod_name).await {
        Some(spec) => spec,
        None => {
            let spec = state.resources.pod_aggregated_resources(pod_name).await?;
            state.pod_spec_cache.insert(pod_name, spec.clone()).await;
            spec
        }
    };

    let cpu_raw = state.influx.current_cpu_millicores(pod_name).await?;
    let cpu_percent = cpu_raw.and_then(|millicores| {
        (spec.cpu_limit_millicores > 0.0)
            .then(|| millicores / spec.cpu_limit_millicores * 100.0)
    });
    let memory_raw = state.influx.current_memory_mb(pod_name).await?;
    let memory_percent = memory_raw.and_then(|mb| {
        (spec.memory_limit_mb > 0.0).then(|| mb / spec.memory_limit_mb * 100.0)
    });

    let (cpu, memory) = state
        .buffers
        .with_pod_buffers(job_name, pod_name, |buffers| {
            let cpu = advance_buffer(&mut buffers.cpu, cpu_percent);
            let memory = advance_buffer(&mut buffers.memory, memory_percent);
            (cpu, memory)
        })
        .await;

    Ok(json!({
        "pod_name": pod_name,
        "service_type": service_type,
        "cpu_usage_percent": cpu.value,
        "memory_usage_percent": memory.value,
        "cpu_is_predicted": cpu.is_predicted,
        "memory_is_predicted": memory.is_predicted,
        "specs": {
            "cpu_limit_millicores": spec.cpu_limit_millicores,
            "memory_limit_mb": spec.memory_limit_mb,
        },
        "prediction_info": {
            "cpu_streak": cpu.streak,
            "memory_streak": memory.streak,
            "cpu_confidence": cpu.confidence,
            "memory_confidence": memory.confidence,
        },
    }))
}

struct BufferedValue {
    value: f64,
    is_predicted: bool,
    streak: u32,
    confidence: f64,
}

/// Pushes the observed value into the buffer, or a prediction when the store
/// had nothing. An empty buffer with no prediction yields 0.0.
fn advance_buffer(
    buffer: &mut crate::metrics_buffer::SmartMetricsBuffer,
    observed: Option<f64>,
) -> BufferedValue {
    match observed {
        Some(value) => {
            buffer.add_value(value, false, None);
            BufferedValue {
                value: buffer.last_value().unwrap_or(value),
                is_predicted: false,
                streak: buffer.prediction_streak(),
                confidence: buffer.current_confidence(),
            }
        }
        None => match buffer.predict_next() {
            Some(predicted) => {
                buffer.add_value(predicted, true, None);
                BufferedValue {
                    value: buffer.last_value().unwrap_or(predicted),
                    is_predicted: true,
                    streak: buffer.prediction_streak(),
                    confidence: buffer.current_confidence(),
                }
            }
            None => BufferedValue {
                value: 0.0,
                is_predicted: true,
                streak: 0,
                confidence: 0.0,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics_buffer::SmartMetricsBuffer;

    #[test]
    fn include_mode_parsing() {
        assert_eq!(IncludeMode::parse(None), IncludeMode::All);
        assert_eq!(IncludeMode::parse(Some("all")), IncludeMode::All);
        assert_eq!(IncludeMode::parse(Some("K6_ONLY")), IncludeMode::K6Only);
        assert_eq!(
            IncludeMode::parse(Some("resources_only")),
            IncludeMode::ResourcesOnly
        );
        assert_eq!(IncludeMode::parse(Some("bogus")), IncludeMode::All);
    }

    #[test]
    fn observed_value_is_actual() {
        let mut buffer = SmartMetricsBuffer::percentage("cpu");
        let result = advance_buffer(&mut buffer, Some(42.0));
        assert_eq!(result.value, 42.0);
        assert!(!result.is_predicted);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn missing_value_falls_back_to_prediction() {
        let mut buffer = SmartMetricsBuffer::percentage("cpu");
        buffer.add_value(40.0, false, None);
        let result = advance_buffer(&mut buffer, None);
        assert!(result.is_predicted);
        assert!(result.value > 0.0);
        assert_eq!(result.streak, 1);
    }

    #[test]
    fn empty_buffer_yields_zero() {
        let mut buffer = SmartMetricsBuffer::percentage("cpu");
        let result = advance_buffer(&mut buffer, None);
        assert_eq!(result.value, 0.0);
        assert!(result.is_predicted);
    }
}
