use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use itertools::Itertools;
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// One 10 s performance bucket fed to the detector.
#[derive(Debug, Clone, Copy)]
pub struct PerfPoint {
    pub timestamp: DateTime<Utc>,
    pub tps: f64,
    pub error_rate: f64,
    pub vus: f64,
    pub avg_response_time: f64,
}

/// Resource usage of one pod over the run, as percentages of its limits.
#[derive(Debug, Clone)]
pub struct PodResourceSeries {
    pub pod_name: String,
    pub samples: Vec<ResourceUsagePoint>,
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceUsagePoint {
    pub timestamp: DateTime<Utc>,
    pub cpu_usage_percent: Option<f64>,
    pub memory_usage_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    ResponseTimeSpike,
    VusTpsMismatch,
    CpuOverload,
    MemoryExhaustion,
    ErrorRateSurge,
    OutOfMemoryKill,
}

impl ProblemType {
    fn display_name(&self) -> &'static str {
        match self {
            ProblemType::ResponseTimeSpike => "Response time surge",
            ProblemType::VusTpsMismatch => "Throughput ceiling",
            ProblemType::CpuOverload => "CPU overload",
            ProblemType::MemoryExhaustion => "Memory exhaustion",
            ProblemType::ErrorRateSurge => "Error rate surge",
            ProblemType::OutOfMemoryKill => "OOM kill",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            ProblemType::ResponseTimeSpike => "⏱️",
            ProblemType::VusTpsMismatch => "📈",
            ProblemType::CpuOverload => "🔥",
            ProblemType::MemoryExhaustion => "💾",
            ProblemType::ErrorRateSurge => "❌",
            ProblemType::OutOfMemoryKill => "💥",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    fn mark(&self) -> &'static str {
        match self {
            Severity::Critical => "🚨",
            Severity::Warning => "⚠️",
            Severity::Normal => "ℹ️",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

/// One detected sustained problem, packaged as evidence for the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceProblem {
    pub problem_type: ProblemType,
    pub severity: Severity,
    pub confidence: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub root_cause_description: String,
    pub detected_evidence: Vec<String>,
    pub performance_impact: String,
    pub ai_prompt_context: String,
    pub metric_details: serde_json::Value,
}

/// Deterministic bottleneck detector over the collected time series.
///
/// Every rule requires a sustained multi-bucket pattern; a single outlier
/// never fires. Running the detector twice on the same input yields
/// structurally equal output.
pub struct BottleneckDetector {
    display_timezone: Tz,
    response_time_increase_threshold_percent: f64,
    response_time_user_noticeable_ms: f64,
    vus_increase_threshold_percent: f64,
    tps_stagnation_threshold_percent: f64,
    high_cpu_usage_threshold_percent: f64,
    high_memory_usage_threshold_percent: f64,
    error_rate_spike_threshold_percent: f64,
    memory_drop_threshold_percent: f64,
    minimum_data_points: usize,
}

impl BottleneckDetector {
    pub fn new(display_timezone: Tz) -> Self {
        Self {
            display_timezone,
            response_time_increase_threshold_percent: 200.0,
            response_time_user_noticeable_ms: 100.0,
            vus_increase_threshold_percent: 30.0,
            tps_stagnation_threshold_percent: 10.0,
            high_cpu_usage_threshold_percent: 80.0,
            high_memory_usage_threshold_percent: 85.0,
            error_rate_spike_threshold_percent: 5.0,
            memory_drop_threshold_percent: 30.0,
            minimum_data_points: 4,
        }
    }

    /// Runs every rule family and returns the merged, non-overlapping set.
    pub fn detect_all(
        &self,
        perf: &[PerfPoint],
        resources: Option<&[PodResourceSeries]>,
    ) -> Vec<PerformanceProblem> {
        if perf.len() < self.minimum_data_points {
            tracing::warn!(
                "Not enough performance buckets ({}) for bottleneck detection",
                perf.len()
            );
            return Vec::new();
        }

        let mut sorted: Vec<PerfPoint> = perf.to_vec();
        sorted.sort_by_key(|p| p.timestamp);

        let mut problems = Vec::new();
        problems.extend(self.detect_response_time_surges(&sorted));
        problems.extend(self.detect_vus_tps_mismatches(&sorted));
        problems.extend(self.detect_error_rate_surges(&sorted));

        if let Some(resources) = resources {
            problems.extend(self.detect_cpu_overload(&sorted, resources));
            problems.extend(self.detect_memory_exhaustion(&sorted, resources));
            problems.extend(self.detect_oom_kills(&sorted, resources));

            let matched = match_performance_to_resources(&sorted, resources);
            if matched.len() >= 5 {
                problems.extend(self.correlate_cpu_response_time(&matched));
                problems.extend(self.correlate_memory_tps(&matched));
                problems.extend(self.correlate_limits_errors(&matched));
                problems.extend(self.detect_saturation(&matched));
            }
        }

        self.merge_overlapping(problems)
    }

    fn fmt_time(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.display_timezone)
            .format("%H:%M:%S")
            .to_string()
    }

    fn detect_response_time_surges(&self, data: &[PerfPoint]) -> Vec<PerformanceProblem> {
        let mut problems = Vec::new();
        if data.len() < 8 {
            return problems;
        }

        let baseline = mean(data[..5].iter().map(|p| p.avg_response_time));
        if baseline <= 0.0 {
            return problems;
        }

        let window = 4;
        let mut i = 5;
        while i + window <= data.len() {
            let slice = &data[i..i + window];
            let current = mean(slice.iter().map(|p| p.avg_response_time));
            let increase_percent = (current - baseline) / baseline * 100.0;

            let user_noticeable = current > self.response_time_user_noticeable_ms;
            let significant = increase_percent > self.response_time_increase_threshold_percent;
            if user_noticeable && significant {
                let started_at = slice[0].timestamp;
                let ended_at = slice[window - 1].timestamp;
                let duration = (ended_at - started_at).num_seconds() as f64;

                let severity = if increase_percent > 300.0 {
                    Severity::Critical
                } else if increase_percent > 150.0 {
                    Severity::Warning
                } else {
                    Severity::Normal
                };

                let root_cause = response_time_surge_cause(baseline, current, increase_percent);
                problems.push(PerformanceProblem {
                    problem_type: ProblemType::ResponseTimeSpike,
                    severity,
                    confidence: (0.7 + increase_percent / 400.0).min(0.95),
                    started_at,
                    ended_at,
                    duration_seconds: duration,
                    root_cause_description: root_cause.to_string(),
                    detected_evidence: vec![
                        format!("Baseline response time: {baseline:.1}ms"),
                        format!("Surge response time: {current:.1}ms"),
                        format!("Increase: {increase_percent:.1}%"),
                        format!("Sustained for {duration:.0}s"),
                    ],
                    performance_impact: format!(
                        "Response time rose by {increase_percent:.1}%, degrading user experience."
                    ),
                    ai_prompt_context: format!(
                        "**Response time surge ({}~{})**: baseline {baseline:.1}ms rose to \
                         {current:.1}ms ({increase_percent:.1}% increase). {root_cause}",
                        self.fmt_time(started_at),
                        self.fmt_time(ended_at),
                    ),
                    metric_details: json!({
                        "baseline_response_time_ms": baseline,
                        "surge_response_time_ms": current,
                        "increase_rate_percent": increase_percent,
                        "duration_seconds": duration,
                    }),
                });

                // Skip half a window so one long surge is not reported per bucket.
                i += window / 2;
            }
            i += 1;
        }
        problems
    }

    fn detect_vus_tps_mismatches(&self, data: &[PerfPoint]) -> Vec<PerformanceProblem> {
        let mut problems = Vec::new();
        let window = 6;
        if data.len() < window {
            return problems;
        }

        let mut i = 0;
        while i + window <= data.len() {
            let slice = &data[i..i + window];
            let vus_start = slice[0].vus;
            let vus_end = slice[window - 1].vus;
            let tps_start = slice[0].tps;
            let tps_end = slice[window - 1].tps;

            if vus_start <= 0.0 || tps_start <= 0.0 {
                i += 1;
                continue;
            }

            let vus_increase = (vus_end - vus_start) / vus_start * 100.0;
            let tps_change = (tps_end - tps_start) / tps_start * 100.0;

            if vus_increase > self.vus_increase_threshold_percent
                && tps_change < self.tps_stagnation_threshold_percent
            {
                let rising_pairs = slice
                    .windows(2)
                    .filter(|pair| pair[1].vus >= pair[0].vus)
                    .count();
                // The ramp must be sustained, not one jump surrounded by noise.
                if (rising_pairs as f64) < (window - 1) as f64 * 0.8 {
                    i += 1;
                    continue;
                }

                let started_at = slice[0].timestamp;
                let ended_at = slice[window - 1].timestamp;
                let duration = (ended_at - started_at).num_seconds() as f64;

                let severity = if vus_increase > 80.0 && tps_change < 5.0 {
                    Severity::Critical
                } else if vus_increase > 50.0 {
                    Severity::Warning
                } else {
                    Severity::Normal
                };

                let root_cause = vus_tps_mismatch_cause(vus_increase, tps_change);
                problems.push(PerformanceProblem {
                    problem_type: ProblemType::VusTpsMismatch,
                    severity,
                    confidence: (0.6 + vus_increase / 100.0).min(0.9),
                    started_at,
                    ended_at,
                    duration_seconds: duration,
                    root_cause_description: root_cause.to_string(),
                    detected_evidence: vec![
                        format!(
                            "VUS: {vus_start:.0} -> {vus_end:.0} ({vus_increase:.1}% increase)"
                        ),
                        format!("TPS: {tps_start:.1} -> {tps_end:.1} ({tps_change:.1}% change)"),
                        format!(
                            "Monotone VUS pairs: {:.0}%",
                            rising_pairs as f64 / (window - 1) as f64 * 100.0
                        ),
                        format!("Sustained for {duration:.0}s"),
                    ],
                    performance_impact: format!(
                        "Despite {vus_increase:.1}% more virtual users, throughput changed only \
                         {tps_change:.1}%: the system reached its processing limit."
                    ),
                    ai_prompt_context: format!(
                        "**Throughput ceiling ({}~{})**: VUS grew from {vus_start:.0} to \
                         {vus_end:.0} ({vus_increase:.1}%) but TPS changed only {tps_change:.1}%. \
                         {root_cause}",
                        self.fmt_time(started_at),
                        self.fmt_time(ended_at),
                    ),
                    metric_details: json!({
                        "vus_start": vus_start,
                        "vus_end": vus_end,
                        "vus_increase_rate_percent": vus_increase,
                        "tps_start": tps_start,
                        "tps_end": tps_end,
                        "tps_change_rate_percent": tps_change,
                        "duration_seconds": duration,
                    }),
                });

                i += window / 2;
            }
            i += 1;
        }
        problems
    }

    fn detect_error_rate_surges(&self, data: &[PerfPoint]) -> Vec<PerformanceProblem> {
        let mut problems = Vec::new();
        let window = 6;
        if data.len() < window {
            return problems;
        }

        let baseline_len = (data.len() / 3).max(3);
        let baseline = mean(data[..baseline_len.min(data.len())].iter().map(|p| p.error_rate));

        let mut i = 0;
        while i + window <= data.len() {
            let slice = &data[i..i + window];
            let avg_error = mean(slice.iter().map(|p| p.error_rate));
            let max_error = slice
                .iter()
                .map(|p| p.error_rate)
                .fold(f64::MIN, f64::max);

            let threshold = (baseline * 3.0).max(self.error_rate_spike_threshold_percent);
            if avg_error > threshold && avg_error > baseline + 1.0 {
                let started_at = slice[0].timestamp;
                let ended_at = slice[window - 1].timestamp;
                let duration = (ended_at - started_at).num_seconds() as f64;

                let severity = if avg_error > 15.0 {
                    Severity::Critical
                } else if avg_error > 8.0 {
                    Severity::Warning
                } else {
                    Severity::Normal
                };

                let root_cause = error_rate_surge_cause(baseline, avg_error, max_error);
                let multiplier = avg_error / baseline.max(0.1);
                problems.push(PerformanceProblem {
                    problem_type: ProblemType::ErrorRateSurge,
                    severity,
                    confidence: (0.7 + avg_error / 20.0).min(0.95),
                    started_at,
                    ended_at,
                    duration_seconds: duration,
                    root_cause_description: root_cause.to_string(),
                    detected_evidence: vec![
                        format!("Baseline error rate: {baseline:.2}%"),
                        format!("Surge average error rate: {avg_error:.2}%"),
                        format!("Surge peak error rate: {max_error:.2}%"),
                        format!("Spike multiplier: {multiplier:.1}x"),
                    ],
                    performance_impact: format!(
                        "Error rate surged to {avg_error:.1}%, hurting service stability."
                    ),
                    ai_prompt_context: format!(
                        "**Error rate surge ({}~{})**: baseline {baseline:.1}% jumped to \
                         {avg_error:.1}%. {root_cause}",
                        self.fmt_time(started_at),
                        self.fmt_time(ended_at),
                    ),
                    metric_details: json!({
                        "baseline_error_rate_percent": baseline,
                        "surge_avg_error_rate_percent": avg_error,
                        "surge_max_error_rate_percent": max_error,
                        "spike_multiplier": multiplier,
                        "duration_seconds": duration,
                    }),
                });

                i += window / 2;
            }
            i += 1;
        }
        problems
    }

    fn detect_cpu_overload(
        &self,
        perf: &[PerfPoint],
        resources: &[PodResourceSeries],
    ) -> Vec<PerformanceProblem> {
        let mut problems = Vec::new();
        let window = 6;
        if perf.len() < window {
            return problems;
        }

        let mut i = 0;
        while i + window <= perf.len() {
            let slice = &perf[i..i + window];
            let window_start = slice[0].timestamp;
            let window_end = slice[window - 1].timestamp;

            let cpu_usages =
                resource_values_in_range(resources, window_start, window_end, |p| {
                    p.cpu_usage_percent
                });
            if cpu_usages.is_empty() {
                i += 1;
                continue;
            }
            let affected_pods =
                pods_with_samples_in_range(resources, window_start, window_end);

            let avg_cpu = mean(cpu_usages.iter().copied());
            let max_cpu = cpu_usages.iter().copied().fold(f64::MIN, f64::max);
            let avg_rt = mean(slice.iter().map(|p| p.avg_response_time));

            if avg_cpu > self.high_cpu_usage_threshold_percent && avg_rt > 200.0 {
                let duration = (window_end - window_start).num_seconds() as f64;
                let severity = if max_cpu > 95.0 {
                    Severity::Critical
                } else if avg_cpu > 90.0 {
                    Severity::Warning
                } else {
                    Severity::Normal
                };

                problems.push(PerformanceProblem {
                    problem_type: ProblemType::CpuOverload,
                    severity,
                    confidence: 0.85,
                    started_at: window_start,
                    ended_at: window_end,
                    duration_seconds: duration,
                    root_cause_description: format!(
                        "CPU usage at {avg_cpu:.1}% indicates overload."
                    ),
                    detected_evidence: vec![
                        format!("Average CPU usage: {avg_cpu:.1}%"),
                        format!("Peak CPU usage: {max_cpu:.1}%"),
                        format!("Average response time: {avg_rt:.1}ms"),
                        format!("Affected pods: {affected_pods}"),
                    ],
                    performance_impact: format!(
                        "High CPU usage delayed responses to {avg_rt:.1}ms."
                    ),
                    ai_prompt_context: format!(
                        "**CPU overload**: average CPU usage {avg_cpu:.1}% with responses delayed \
                         to {avg_rt:.1}ms. Optimise CPU-bound work or scale horizontally."
                    ),
                    metric_details: json!({
                        "avg_cpu_usage_percent": avg_cpu,
                        "max_cpu_usage_percent": max_cpu,
                        "avg_response_time_ms": avg_rt,
                        "affected_pods_count": affected_pods,
                    }),
                });

                i += window / 2;
            }
            i += 1;
        }
        problems
    }

    fn detect_memory_exhaustion(
        &self,
        perf: &[PerfPoint],
        resources: &[PodResourceSeries],
    ) -> Vec<PerformanceProblem> {
        let mut problems = Vec::new();
        let window = 6;
        if perf.len() < window {
            return problems;
        }

        let mut i = 0;
        while i + window <= perf.len() {
            let slice = &perf[i..i + window];
            let window_start = slice[0].timestamp;
            let window_end = slice[window - 1].timestamp;

            let memory_usages =
                resource_values_in_range(resources, window_start, window_end, |p| {
                    p.memory_usage_percent
                });
            if memory_usages.is_empty() {
                i += 1;
                continue;
            }
            let affected_pods =
                pods_with_samples_in_range(resources, window_start, window_end);

            let avg_memory = mean(memory_usages.iter().copied());
            let max_memory = memory_usages.iter().copied().fold(f64::MIN, f64::max);
            let avg_error = mean(slice.iter().map(|p| p.error_rate));

            if avg_memory > self.high_memory_usage_threshold_percent
                && avg_error > self.error_rate_spike_threshold_percent
            {
                let duration = (window_end - window_start).num_seconds() as f64;
                let severity = if max_memory > 95.0 {
                    Severity::Critical
                } else {
                    Severity::Warning
                };

                problems.push(PerformanceProblem {
                    problem_type: ProblemType::MemoryExhaustion,
                    severity,
                    confidence: 0.90,
                    started_at: window_start,
                    ended_at: window_end,
                    duration_seconds: duration,
                    root_cause_description: format!(
                        "Memory usage at {avg_memory:.1}% risks exhaustion."
                    ),
                    detected_evidence: vec![
                        format!("Average memory usage: {avg_memory:.1}%"),
                        format!("Peak memory usage: {max_memory:.1}%"),
                        format!("Average error rate: {avg_error:.1}%"),
                        format!("Affected pods: {affected_pods}"),
                    ],
                    performance_impact: format!(
                        "High memory usage drove the error rate to {avg_error:.1}%."
                    ),
                    ai_prompt_context: format!(
                        "**Memory exhaustion**: memory usage {avg_memory:.1}% with error rate \
                         {avg_error:.1}%. Check for leaks or raise the memory limit."
                    ),
                    metric_details: json!({
                        "avg_memory_usage_percent": avg_memory,
                        "max_memory_usage_percent": max_memory,
                        "avg_error_rate_percent": avg_error,
                        "affected_pods_count": affected_pods,
                    }),
                });

                i += window / 2;
            }
            i += 1;
        }
        problems
    }

    /// OOM kills show up as a sharp working-set drop whose timing lines up
    /// with an error spike. One problem per pod at most.
    fn detect_oom_kills(
        &self,
        perf: &[PerfPoint],
        resources: &[PodResourceSeries],
    ) -> Vec<PerformanceProblem> {
        let mut problems = Vec::new();

        let mut error_spikes = Vec::new();
        for pair in perf.windows(2) {
            let previous = pair[0].error_rate;
            let current = pair[1].error_rate;
            if current > previous + 3.0 && current > 5.0 {
                error_spikes.push((pair[1].timestamp, current));
            }
        }
        if error_spikes.is_empty() {
            return problems;
        }

        for pod in resources {
            let samples = &pod.samples;
            if samples.len() < 10 {
                continue;
            }

            'scan: for i in 5..=(samples.len() - 5) {
                let before: Vec<f64> = samples[i - 5..i]
                    .iter()
                    .filter_map(|p| p.memory_usage_percent)
                    .collect();
                let after: Vec<f64> = samples[i..i + 5]
                    .iter()
                    .filter_map(|p| p.memory_usage_percent)
                    .collect();
                if before.is_empty() || after.is_empty() {
                    continue;
                }

                let before_avg = mean(before.iter().copied());
                let after_avg = mean(after.iter().copied());
                if before_avg <= 0.0 {
                    continue;
                }

                let drop_percent = (before_avg - after_avg) / before_avg * 100.0;
                if drop_percent <= self.memory_drop_threshold_percent {
                    continue;
                }
                let drop_time = samples[i].timestamp;

                for (spike_time, spike_error) in &error_spikes {
                    let gap = (drop_time - *spike_time).num_seconds().abs();
                    if gap < 45 {
                        let started_at = drop_time.min(*spike_time);
                        let ended_at = drop_time.max(*spike_time);
                        problems.push(PerformanceProblem {
                            problem_type: ProblemType::OutOfMemoryKill,
                            severity: Severity::Critical,
                            confidence: 0.95,
                            started_at,
                            ended_at,
                            duration_seconds: gap as f64,
                            root_cause_description:
                                "An out-of-memory kill terminated the pod.".to_string(),
                            detected_evidence: vec![
                                format!(
                                    "Pod {} memory dropped {drop_percent:.1}%",
                                    pod.pod_name
                                ),
                                format!("Concurrent error rate spike to {spike_error:.1}%"),
                                format!("Time correlation: within {gap}s"),
                                format!("Memory before the drop: {before_avg:.1}%"),
                            ],
                            performance_impact:
                                "The OOM-killed pod restarted, interrupting service."
                                    .to_string(),
                            ai_prompt_context: format!(
                                "**OOM kill**: pod {} was terminated for lack of memory. Its \
                                 working set dropped {drop_percent:.1}% while the error rate \
                                 spiked to {spike_error:.1}%. Raising the memory limit is urgent.",
                                pod.pod_name
                            ),
                            metric_details: json!({
                                "pod_name": pod.pod_name,
                                "before_memory_percent": before_avg,
                                "after_memory_percent": after_avg,
                                "memory_drop_rate_percent": drop_percent,
                                "concurrent_error_rate_percent": spike_error,
                                "time_correlation_seconds": gap,
                            }),
                        });
                        break 'scan;
                    }
                }
            }
        }
        problems
    }

    fn correlate_cpu_response_time(&self, matched: &[MatchedPoint]) -> Vec<PerformanceProblem> {
        let mut problems = Vec::new();
        let baseline_rt = mean(matched[..3].iter().map(|p| p.response_time));
        if baseline_rt <= 0.0 {
            return problems;
        }

        let mut run_start: Option<usize> = None;
        for i in 0..=matched.len() {
            let correlated = matched.get(i).map(|point| {
                point.avg_cpu_percent >= 80.0 && point.response_time >= baseline_rt * 2.0
            });
            match (correlated, run_start) {
                (Some(true), None) => run_start = Some(i),
                (Some(true), Some(_)) => {}
                (_, Some(start)) => {
                    let run_len = i - start;
                    if run_len >= 3 {
                        let last = &matched[i - 1];
                        problems.push(PerformanceProblem {
                            problem_type: ProblemType::CpuOverload,
                            severity: Severity::Warning,
                            confidence: 0.85,
                            started_at: matched[start].timestamp,
                            ended_at: last.timestamp,
                            duration_seconds: (run_len * 5) as f64,
                            root_cause_description: format!(
                                "CPU overload ({:.1}%) correlates with rising response times.",
                                last.max_cpu_percent
                            ),
                            detected_evidence: vec![
                                format!("Average CPU {:.1}%", last.avg_cpu_percent),
                                format!(
                                    "Response time {:.0}ms ({:.1}x baseline)",
                                    last.response_time,
                                    last.response_time / baseline_rt
                                ),
                            ],
                            performance_impact: format!(
                                "Response time {baseline_rt:.0}ms -> {:.0}ms",
                                last.response_time
                            ),
                            ai_prompt_context:
                                "CPU load and response time rose together; recommend scaling CPU."
                                    .to_string(),
                            metric_details: json!({
                                "cpu_usage_percent": last.avg_cpu_percent,
                                "response_time_ms": last.response_time,
                                "baseline_response_time_ms": baseline_rt,
                            }),
                        });
                    }
                    run_start = None;
                }
                (None, None) => {}
                (Some(false), None) => {}
            }
        }
        problems
    }

    fn correlate_memory_tps(&self, matched: &[MatchedPoint]) -> Vec<PerformanceProblem> {
        let baseline_tps = mean(matched[..3].iter().map(|p| p.tps));
        if baseline_tps <= 0.0 {
            return Vec::new();
        }

        let correlated: Vec<&MatchedPoint> = matched
            .iter()
            .filter(|point| {
                point.avg_memory_percent >= 85.0 && point.tps <= baseline_tps * 0.7
            })
            .collect();
        if correlated.len() < 3 {
            return Vec::new();
        }

        let first = correlated[0];
        let last = correlated[correlated.len() - 1];
        vec![PerformanceProblem {
            problem_type: ProblemType::MemoryExhaustion,
            severity: Severity::Warning,
            confidence: 0.80,
            started_at: first.timestamp,
            ended_at: last.timestamp,
            duration_seconds: (correlated.len() * 5) as f64,
            root_cause_description: format!(
                "Memory pressure ({:.1}%) correlates with reduced TPS.",
                last.max_memory_percent
            ),
            detected_evidence: vec![
                format!("Average memory {:.1}%", last.avg_memory_percent),
                format!(
                    "TPS {:.1} ({:.1}x baseline)",
                    last.tps,
                    last.tps / baseline_tps
                ),
            ],
            performance_impact: format!("TPS {baseline_tps:.1} -> {:.1}", last.tps),
            ai_prompt_context:
                "Throughput dropped while memory stayed high; recommend more memory.".to_string(),
            metric_details: json!({
                "memory_usage_percent": last.avg_memory_percent,
                "tps_current": last.tps,
                "tps_baseline": baseline_tps,
            }),
        }]
    }

    fn correlate_limits_errors(&self, matched: &[MatchedPoint]) -> Vec<PerformanceProblem> {
        let baseline_error = mean(matched[..3].iter().map(|p| p.error_rate));
        let mut problems = Vec::new();

        for point in matched {
            let near_limit = point.avg_cpu_percent >= 90.0 || point.avg_memory_percent >= 90.0;
            let error_high =
                point.error_rate >= baseline_error * 3.0 && point.error_rate >= 5.0;
            if near_limit && error_high {
                problems.push(PerformanceProblem {
                    problem_type: ProblemType::ErrorRateSurge,
                    severity: Severity::Critical,
                    confidence: 0.90,
                    started_at: point.timestamp,
                    ended_at: point.timestamp,
                    duration_seconds: 5.0,
                    root_cause_description:
                        "Errors surged while resources pressed against their limits.".to_string(),
                    detected_evidence: vec![
                        format!(
                            "CPU {:.1}%, memory {:.1}%",
                            point.avg_cpu_percent, point.avg_memory_percent
                        ),
                        format!(
                            "Error rate {:.1}% ({:.1}x baseline)",
                            point.error_rate,
                            point.error_rate / baseline_error.max(0.1)
                        ),
                    ],
                    performance_impact: format!(
                        "Error rate {baseline_error:.1}% -> {:.1}%",
                        point.error_rate
                    ),
                    ai_prompt_context:
                        "Errors track resource limits; recommend immediate scale-out.".to_string(),
                    metric_details: json!({
                        "cpu_usage_percent": point.avg_cpu_percent,
                        "memory_usage_percent": point.avg_memory_percent,
                        "error_rate_percent": point.error_rate,
                    }),
                });
            }
        }
        problems
    }

    fn detect_saturation(&self, matched: &[MatchedPoint]) -> Vec<PerformanceProblem> {
        let saturated: Vec<&MatchedPoint> = matched
            .iter()
            .filter(|point| point.avg_cpu_percent >= 75.0 && point.avg_memory_percent >= 80.0)
            .collect();
        if saturated.len() < 4 {
            return Vec::new();
        }

        let first = saturated[0];
        let last = saturated[saturated.len() - 1];
        let avg_rt = mean(saturated.iter().map(|p| p.response_time));
        let avg_tps = mean(saturated.iter().map(|p| p.tps));
        let avg_error = mean(saturated.iter().map(|p| p.error_rate));
        let duration = (saturated.len() * 5) as f64;

        vec![PerformanceProblem {
            problem_type: ProblemType::CpuOverload,
            severity: Severity::Critical,
            confidence: 0.95,
            started_at: first.timestamp,
            ended_at: last.timestamp,
            duration_seconds: duration,
            root_cause_description:
                "Simultaneous CPU and memory saturation degraded the whole system.".to_string(),
            detected_evidence: vec![
                format!(
                    "CPU avg {:.1}%, memory avg {:.1}%",
                    last.avg_cpu_percent, last.avg_memory_percent
                ),
                format!("Saturated for {duration:.0}s"),
                format!(
                    "Response time {avg_rt:.0}ms, TPS {avg_tps:.1}, error rate {avg_error:.1}%"
                ),
            ],
            performance_impact: "System-wide degradation; immediate scaling required."
                .to_string(),
            ai_prompt_context:
                "CPU and memory saturated together; recommend urgent resource expansion."
                    .to_string(),
            metric_details: json!({
                "avg_cpu_percent": last.avg_cpu_percent,
                "avg_memory_percent": last.avg_memory_percent,
                "saturation_duration_seconds": duration,
                "avg_response_time_ms": avg_rt,
                "avg_tps": avg_tps,
                "avg_error_rate_percent": avg_error,
            }),
        }]
    }

    /// Collapses overlapping or near-adjacent (≤5 s) same-type problems into
    /// one: union interval, higher severity, max confidence, merged evidence.
    fn merge_overlapping(&self, problems: Vec<PerformanceProblem>) -> Vec<PerformanceProblem> {
        let mut merged = Vec::new();

        let by_type = problems
            .into_iter()
            .into_group_map_by(|problem| problem.problem_type);
        let mut types: Vec<ProblemType> = by_type.keys().copied().collect();
        types.sort_by_key(|t| format!("{t:?}"));

        for problem_type in types {
            let mut group = by_type[&problem_type].clone();
            group.sort_by_key(|p| p.started_at);

            let mut iter = group.into_iter();
            let Some(mut current) = iter.next() else {
                continue;
            };
            for next in iter {
                let adjacent = next.started_at <= current.ended_at
                    || (next.started_at - current.ended_at).num_seconds() <= 5;
                if adjacent {
                    current = self.merge_pair(current, next);
                } else {
                    merged.push(current);
                    current = next;
                }
            }
            merged.push(current);
        }

        merged.sort_by_key(|p| p.started_at);
        merged
    }

    fn merge_pair(
        &self,
        a: PerformanceProblem,
        b: PerformanceProblem,
    ) -> PerformanceProblem {
        let started_at = a.started_at.min(b.started_at);
        let ended_at = a.ended_at.max(b.ended_at);
        let duration = (ended_at - started_at).num_seconds() as f64;

        let mut evidence = a.detected_evidence.clone();
        for item in &b.detected_evidence {
            if !evidence.contains(item) {
                evidence.push(item.clone());
            }
        }

        let mut details = a.metric_details.clone();
        if let (Some(target), Some(source)) = (details.as_object_mut(), b.metric_details.as_object())
        {
            for (key, value) in source {
                target.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let context = format!(
            "**{} sustained ({}~{}, {duration:.0}s)**: {} {}",
            a.problem_type.display_name(),
            self.fmt_time(started_at),
            self.fmt_time(ended_at),
            headline_metrics(&details),
            a.root_cause_description,
        );

        PerformanceProblem {
            problem_type: a.problem_type,
            severity: a.severity.max(b.severity),
            confidence: a.confidence.max(b.confidence),
            started_at,
            ended_at,
            duration_seconds: duration,
            root_cause_description: a.root_cause_description,
            detected_evidence: evidence,
            performance_impact: a.performance_impact,
            ai_prompt_context: context,
            metric_details: details,
        }
    }

    /// Renders the merged problem set as the Markdown context handed to the
    /// LLM: a timeline snapshot, per-problem sections by severity, and the
    /// fixed analysis-request trailer.
    pub fn generate_ai_analysis_context(&self, problems: &[PerformanceProblem]) -> String {
        if problems.is_empty() {
            return String::new();
        }

        let mut parts = vec![
            "## 🔍 자동 탐지된 성능 문제 분석 결과\n".to_string(),
            "Time-series analysis detected the following performance problems:\n".to_string(),
        ];

        let timeline = self.timeline_summary(problems);
        if !timeline.is_empty() {
            parts.push("## ⏰ 시간대별 문제 발생 타임라인".to_string());
            parts.push(String::new());
            parts.push(timeline);
            parts.push(String::new());
        }

        parts.push("## 📋 탐지된 문제 상세 분석".to_string());
        parts.push(String::new());

        let mut sorted: Vec<&PerformanceProblem> = problems.iter().collect();
        sorted.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.started_at.cmp(&b.started_at)));

        for (i, problem) in sorted.iter().enumerate() {
            parts.push(format!(
                "### {}. {} {} ({})",
                i + 1,
                problem.severity.mark(),
                problem.problem_type.display_name(),
                problem.severity
            ));
            parts.push(format!(
                "**Window**: {} ~ {} ({:.0}s)",
                self.fmt_time(problem.started_at),
                self.fmt_time(problem.ended_at),
                problem.duration_seconds
            ));
            parts.push(format!("**Confidence**: {:.0}%", problem.confidence * 100.0));
            parts.push(format!("**Description**: {}", problem.root_cause_description));
            if !problem.ai_prompt_context.is_empty() {
                parts.push(format!("**Analysis hint**: {}", problem.ai_prompt_context));
            }
            parts.push(String::new());
        }

        parts.extend(
            [
                "## 📊 종합 분석 요청",
                "",
                "Considering every problem detected above, please analyse:",
                "",
                "1. **Timeline patterns**: ordering and relationships between the problems",
                "2. **Root causes**: how the detected problems interact and what drives them",
                "3. **Priorities**: which problem to fix first and why",
                "4. **Concrete remediation**: actionable fixes per problem",
                "5. **Prevention**: how to stop these problems from recurring",
                "",
                "**Important**: ground the analysis in the detected timings and numbers above.",
            ]
            .iter()
            .map(|s| s.to_string()),
        );

        parts.join("\n")
    }

    /// One snapshot line per >=60 s step showing which problems are active.
    fn timeline_summary(&self, problems: &[PerformanceProblem]) -> String {
        #[derive(Clone, Copy)]
        enum Edge {
            Start,
            End,
        }

        let mut events: Vec<(DateTime<Utc>, Edge, usize)> = Vec::new();
        for (idx, problem) in problems.iter().enumerate() {
            events.push((problem.started_at, Edge::Start, idx));
            events.push((problem.ended_at, Edge::End, idx));
        }
        events.sort_by_key(|(ts, _, _)| *ts);

        let mut active: Vec<usize> = Vec::new();
        let mut lines: Vec<String> = Vec::new();
        let mut last_time: Option<DateTime<Utc>> = None;

        for (ts, edge, idx) in events {
            match edge {
                Edge::Start => active.push(idx),
                Edge::End => active.retain(|&i| i != idx),
            }

            let new_step = match last_time {
                None => true,
                Some(last) => (ts - last).num_seconds() >= 60,
            };
            if new_step {
                if !active.is_empty() {
                    let summary = active
                        .iter()
                        .map(|&i| {
                            let problem = &problems[i];
                            format!(
                                "{} {}{}",
                                problem.problem_type.icon(),
                                problem.problem_type.display_name(),
                                problem.severity.mark()
                            )
                        })
                        .join(" | ");
                    lines.push(format!(
                        "- **{}**: {summary}",
                        ts.with_timezone(&self.display_timezone).format("%H:%M")
                    ));
                }
                last_time = Some(ts);
            }
        }

        lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy)]
struct MatchedPoint {
    timestamp: DateTime<Utc>,
    tps: f64,
    response_time: f64,
    error_rate: f64,
    avg_cpu_percent: f64,
    max_cpu_percent: f64,
    avg_memory_percent: f64,
    max_memory_percent: f64,
}

/// Pairs each performance bucket with the pod samples within ±5 s of it.
/// Buckets with no nearby resource data are dropped.
fn match_performance_to_resources(
    perf: &[PerfPoint],
    resources: &[PodResourceSeries],
) -> Vec<MatchedPoint> {
    let mut matched = Vec::new();
    for point in perf {
        let mut cpu = Vec::new();
        let mut memory = Vec::new();
        for pod in resources {
            for sample in &pod.samples {
                if (point.timestamp - sample.timestamp).num_seconds().abs() <= 5 {
                    if let Some(value) = sample.cpu_usage_percent {
                        cpu.push(value);
                    }
                    if let Some(value) = sample.memory_usage_percent {
                        memory.push(value);
                    }
                }
            }
        }
        if cpu.is_empty() || memory.is_empty() {
            continue;
        }
        matched.push(MatchedPoint {
            timestamp: point.timestamp,
            tps: point.tps,
            response_time: point.avg_response_time,
            error_rate: point.error_rate,
            avg_cpu_percent: mean(cpu.iter().copied()),
            max_cpu_percent: cpu.iter().copied().fold(f64::MIN, f64::max),
            avg_memory_percent: mean(memory.iter().copied()),
            max_memory_percent: memory.iter().copied().fold(f64::MIN, f64::max),
        });
    }
    matched
}

fn resource_values_in_range(
    resources: &[PodResourceSeries],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    value: impl Fn(&ResourceUsagePoint) -> Option<f64>,
) -> Vec<f64> {
    let slack = chrono::Duration::seconds(5);
    resources
        .iter()
        .flat_map(|pod| pod.samples.iter())
        .filter(|sample| sample.timestamp >= start - slack && sample.timestamp <= end + slack)
        .filter_map(value)
        .collect()
}

fn pods_with_samples_in_range(
    resources: &[PodResourceSeries],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> usize {
    let slack = chrono::Duration::seconds(5);
    resources
        .iter()
        .filter(|pod| {
            pod.samples
                .iter()
                .any(|s| s.timestamp >= start - slack && s.timestamp <= end + slack)
        })
        .count()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn headline_metrics(details: &serde_json::Value) -> String {
    let mut parts = Vec::new();
    if let (Some(baseline), Some(surge)) = (
        details.get("baseline_response_time_ms").and_then(|v| v.as_f64()),
        details.get("surge_response_time_ms").and_then(|v| v.as_f64()),
    ) {
        if baseline > 0.0 {
            parts.push(format!(
                "response time {baseline:.1}ms -> {surge:.1}ms ({:.0}% up)",
                (surge - baseline) / baseline * 100.0
            ));
        }
    }
    if let Some(cpu) = details.get("avg_cpu_percent").and_then(|v| v.as_f64()) {
        parts.push(format!("CPU {cpu:.1}%"));
    }
    if let Some(memory) = details.get("avg_memory_percent").and_then(|v| v.as_f64()) {
        parts.push(format!("memory {memory:.1}%"));
    }
    if let Some(tps) = details.get("tps_current").and_then(|v| v.as_f64()) {
        parts.push(format!("TPS {tps:.1}"));
    }
    if let Some(error) = details
        .get("surge_avg_error_rate_percent")
        .and_then(|v| v.as_f64())
    {
        parts.push(format!("error rate {error:.1}%"));
    }
    if parts.is_empty() {
        "see metric details".to_string()
    } else {
        parts.join(" | ")
    }
}

fn response_time_surge_cause(baseline: f64, current: f64, increase: f64) -> &'static str {
    if increase > 500.0 {
        "The system is fully overloaded; reduce load or scale out immediately."
    } else if increase > 200.0 {
        "CPU overload or a database bottleneck is likely; check resource monitoring."
    } else if baseline < 100.0 && current > 500.0 {
        "Network latency or an external API dependency is suspected."
    } else {
        "An application-level bottleneck is the most likely cause."
    }
}

fn vus_tps_mismatch_cause(vus_increase: f64, tps_change: f64) -> &'static str {
    if tps_change < 0.0 {
        "TPS is falling, so the system is past saturation; check CPU and memory."
    } else if vus_increase > 100.0 && tps_change < 5.0 {
        "A database connection pool or thread pool limit has probably been reached."
    } else if vus_increase > 50.0 {
        "A CPU bottleneck or I/O wait is limiting throughput."
    } else {
        "The application's concurrency handling may have reached its limit."
    }
}

fn error_rate_surge_cause(baseline: f64, surge_avg: f64, surge_max: f64) -> &'static str {
    if surge_max > 50.0 {
        "The system is fully overloaded; shed load or restart the service."
    } else if surge_avg > 20.0 {
        "Memory pressure or a database connection failure is suspected."
    } else if surge_avg > baseline * 10.0 {
        "A specific feature or external dependency probably failed."
    } else {
        "Transient resource shortage or network latency raised the error rate."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn detector() -> BottleneckDetector {
        BottleneckDetector::new(chrono_tz::Asia::Seoul)
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn perf_series(
        tps: &[f64],
        error: &[f64],
        vus: &[f64],
        rt: &[f64],
        step_seconds: i64,
    ) -> Vec<PerfPoint> {
        let base = base_time();
        (0..tps.len())
            .map(|i| PerfPoint {
                timestamp: base + chrono::Duration::seconds(i as i64 * step_seconds),
                tps: tps[i],
                error_rate: error[i],
                vus: vus[i],
                avg_response_time: rt[i],
            })
            .collect()
    }

    fn flat(value: f64, len: usize) -> Vec<f64> {
        vec![value; len]
    }

    #[test]
    fn too_few_points_detect_nothing() {
        let perf = perf_series(&[1.0; 3], &[0.0; 3], &[1.0; 3], &[50.0; 3], 10);
        assert!(detector().detect_all(&perf, None).is_empty());
    }

    #[test]
    fn steady_series_detects_nothing() {
        let perf = perf_series(
            &flat(500.0, 12),
            &flat(0.5, 12),
            &flat(100.0, 12),
            &flat(50.0, 12),
            10,
        );
        assert!(detector().detect_all(&perf, None).is_empty());
    }

    #[test]
    fn detects_response_time_surge() {
        let mut rt = flat(50.0, 12);
        for value in rt.iter_mut().skip(5) {
            *value = 400.0;
        }
        let perf = perf_series(&flat(500.0, 12), &flat(0.5, 12), &flat(100.0, 12), &rt, 10);

        let problems = detector().detect_all(&perf, None);
        let surge: Vec<_> = problems
            .iter()
            .filter(|p| p.problem_type == ProblemType::ResponseTimeSpike)
            .collect();
        assert_eq!(surge.len(), 1, "adjacent windows must merge into one problem");
        assert_eq!(surge[0].severity, Severity::Critical);
        let increase = surge[0].metric_details["increase_rate_percent"]
            .as_f64()
            .unwrap();
        assert!(increase > 600.0);
    }

    #[test]
    fn detects_vus_tps_mismatch() {
        let vus = [100.0, 140.0, 160.0, 180.0, 200.0, 220.0];
        let tps = [500.0, 505.0, 498.0, 510.0, 503.0, 500.0];
        let perf = perf_series(&tps, &flat(0.5, 6), &vus, &flat(80.0, 6), 10);

        let problems = detector().detect_all(&perf, None);
        let mismatches: Vec<_> = problems
            .iter()
            .filter(|p| p.problem_type == ProblemType::VusTpsMismatch)
            .collect();
        assert_eq!(mismatches.len(), 1);

        let details = &mismatches[0].metric_details;
        let vus_rate = details["vus_increase_rate_percent"].as_f64().unwrap();
        let tps_rate = details["tps_change_rate_percent"].as_f64().unwrap();
        assert!((vus_rate - 120.0).abs() < 1.0, "vus increase {vus_rate}");
        assert!(tps_rate.abs() < 2.0, "tps change {tps_rate}");
    }

    #[test]
    fn detects_error_rate_surge() {
        let mut error = flat(0.5, 12);
        for value in error.iter_mut().skip(6) {
            *value = 20.0;
        }
        let perf = perf_series(
            &flat(500.0, 12),
            &error,
            &flat(100.0, 12),
            &flat(50.0, 12),
            10,
        );

        let problems = detector().detect_all(&perf, None);
        let surges: Vec<_> = problems
            .iter()
            .filter(|p| p.problem_type == ProblemType::ErrorRateSurge)
            .collect();
        assert!(!surges.is_empty());
        assert!(surges.iter().all(|p| p.severity >= Severity::Warning));
    }

    #[test]
    fn detects_oom_kill_once_per_pod() {
        let base = base_time();
        // 2% error until a spike to 8% twenty seconds after the memory drop.
        let mut error = flat(2.0, 12);
        for value in error.iter_mut().skip(7) {
            *value = 8.0;
        }
        let perf = perf_series(
            &flat(500.0, 12),
            &error,
            &flat(100.0, 12),
            &flat(50.0, 12),
            10,
        );

        let memory_mb = [800.0, 810.0, 790.0, 820.0, 805.0, 300.0, 310.0, 295.0, 305.0, 290.0];
        let samples: Vec<ResourceUsagePoint> = memory_mb
            .iter()
            .enumerate()
            .map(|(i, mb)| ResourceUsagePoint {
                timestamp: base + chrono::Duration::seconds(i as i64 * 5 + 30),
                cpu_usage_percent: Some(40.0),
                memory_usage_percent: Some(mb / 1000.0 * 100.0),
            })
            .collect();
        let resources = vec![PodResourceSeries {
            pod_name: "P".to_string(),
            samples,
        }];

        let problems = detector().detect_all(&perf, Some(&resources));
        let ooms: Vec<_> = problems
            .iter()
            .filter(|p| p.problem_type == ProblemType::OutOfMemoryKill)
            .collect();
        assert_eq!(ooms.len(), 1);
        assert_eq!(ooms[0].severity, Severity::Critical);
        assert_eq!(ooms[0].metric_details["pod_name"], "P");
    }

    #[test]
    fn detector_is_idempotent() {
        let mut rt = flat(50.0, 12);
        for value in rt.iter_mut().skip(5) {
            *value = 400.0;
        }
        let perf = perf_series(&flat(500.0, 12), &flat(0.5, 12), &flat(100.0, 12), &rt, 10);

        let detector = detector();
        let first = detector.detect_all(&perf, None);
        let second = detector.detect_all(&perf, None);
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn merged_problems_of_same_type_do_not_overlap() {
        let mut rt = flat(50.0, 24);
        for value in rt.iter_mut().skip(5) {
            *value = 400.0;
        }
        let perf = perf_series(
            &flat(500.0, 24),
            &flat(0.5, 24),
            &flat(100.0, 24),
            &rt,
            10,
        );

        let problems = detector().detect_all(&perf, None);
        let mut by_type: std::collections::HashMap<_, Vec<_>> = std::collections::HashMap::new();
        for problem in &problems {
            by_type
                .entry(problem.problem_type)
                .or_default()
                .push(problem);
        }
        for group in by_type.values() {
            let mut sorted = group.clone();
            sorted.sort_by_key(|p| p.started_at);
            for pair in sorted.windows(2) {
                assert!(
                    pair[1].started_at > pair[0].ended_at,
                    "same-type problems overlap after merge"
                );
            }
        }
    }

    #[test]
    fn context_orders_by_severity_and_contains_trailer() {
        let mut rt = flat(50.0, 12);
        for value in rt.iter_mut().skip(5) {
            *value = 400.0;
        }
        let mut error = flat(0.5, 12);
        for value in error.iter_mut().skip(6) {
            *value = 9.0;
        }
        let perf = perf_series(&flat(500.0, 12), &error, &flat(100.0, 12), &rt, 10);

        let detector = detector();
        let problems = detector.detect_all(&perf, None);
        let context = detector.generate_ai_analysis_context(&problems);
        assert!(context.contains("종합 분석 요청"));
        assert!(context.contains("타임라인"));
        let critical_pos = context.find("🚨").unwrap_or(usize::MAX);
        let warning_pos = context.find("⚠️").unwrap_or(usize::MAX);
        assert!(critical_pos < warning_pos, "critical sections come first");
    }

    #[test]
    fn empty_problem_set_renders_empty_context() {
        assert!(detector().generate_ai_analysis_context(&[]).is_empty());
    }
}
