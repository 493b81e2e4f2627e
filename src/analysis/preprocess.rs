use crate::analysis::bottleneck::PerfPoint;
use itertools::Itertools;

/// Noise removal for series handed to the LLM: the warm-up and ramp-down
/// edges of a run say little about steady-state behaviour, and single TPS
/// outliers would dominate a short summary.
pub struct TimeseriesPreprocessor {
    startup_trim: f64,
    shutdown_trim: f64,
    outlier_sigma: f64,
}

impl Default for TimeseriesPreprocessor {
    fn default() -> Self {
        Self {
            startup_trim: 0.10,
            shutdown_trim: 0.05,
            outlier_sigma: 2.5,
        }
    }
}

impl TimeseriesPreprocessor {
    /// Drops the first 10% and last 5% of the series, then any bucket whose
    /// TPS sits beyond 2.5 sigma of the trimmed mean. Series shorter than 10
    /// buckets pass through untouched.
    pub fn trim_noise(&self, series: &[PerfPoint]) -> Vec<PerfPoint> {
        if series.len() < 10 {
            return series.to_vec();
        }

        let mut sorted: Vec<PerfPoint> = series.to_vec();
        sorted.sort_by_key(|p| p.timestamp);

        let total = sorted.len();
        let start_trim = (total as f64 * self.startup_trim) as usize;
        let end_trim = (total as f64 * self.shutdown_trim) as usize;

        let trimmed: Vec<PerfPoint> = if start_trim + end_trim >= total {
            let start = total / 4;
            let end = total * 3 / 4;
            sorted[start..end].to_vec()
        } else {
            sorted[start_trim..total - end_trim].to_vec()
        };

        self.drop_tps_outliers(trimmed)
    }

    fn drop_tps_outliers(&self, series: Vec<PerfPoint>) -> Vec<PerfPoint> {
        if series.len() < 4 {
            return series;
        }
        let mean = series.iter().map(|p| p.tps).sum::<f64>() / series.len() as f64;
        let variance = series
            .iter()
            .map(|p| (p.tps - mean).powi(2))
            .sum::<f64>()
            / (series.len() - 1) as f64;
        let stddev = variance.sqrt();
        if stddev == 0.0 {
            return series;
        }

        series
            .into_iter()
            .filter(|p| ((p.tps - mean) / stddev).abs() <= self.outlier_sigma)
            .collect()
    }

    /// A compact textual summary of the cleaned series for the prompt.
    pub fn summarize(&self, series: &[PerfPoint]) -> String {
        if series.is_empty() {
            return "No time-series data available.".to_string();
        }

        let tps_avg = series.iter().map(|p| p.tps).sum::<f64>() / series.len() as f64;
        let (tps_min, tps_max) = series
            .iter()
            .map(|p| p.tps)
            .minmax()
            .into_option()
            .unwrap_or((0.0, 0.0));
        let rt_avg =
            series.iter().map(|p| p.avg_response_time).sum::<f64>() / series.len() as f64;
        let rt_max = series
            .iter()
            .map(|p| p.avg_response_time)
            .fold(f64::MIN, f64::max);
        let error_avg = series.iter().map(|p| p.error_rate).sum::<f64>() / series.len() as f64;
        let error_max = series.iter().map(|p| p.error_rate).fold(f64::MIN, f64::max);
        let vus_max = series.iter().map(|p| p.vus).fold(f64::MIN, f64::max);

        format!(
            "Steady-state over {} buckets: TPS avg {tps_avg:.1} (min {tps_min:.1}, max {tps_max:.1}), \
             response time avg {rt_avg:.1}ms (max {rt_max:.1}ms), error rate avg {error_avg:.2}% \
             (max {error_max:.2}%), peak VUS {vus_max:.0}.",
            series.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn series(tps: &[f64]) -> Vec<PerfPoint> {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        tps.iter()
            .enumerate()
            .map(|(i, &tps)| PerfPoint {
                timestamp: base + chrono::Duration::seconds(i as i64 * 10),
                tps,
                error_rate: 0.5,
                vus: 100.0,
                avg_response_time: 50.0,
            })
            .collect()
    }

    #[test]
    fn short_series_pass_through() {
        let input = series(&[1.0; 8]);
        assert_eq!(TimeseriesPreprocessor::default().trim_noise(&input).len(), 8);
    }

    #[test]
    fn trims_edges_of_long_series() {
        let input = series(&[100.0; 20]);
        let trimmed = TimeseriesPreprocessor::default().trim_noise(&input);
        // 20 buckets: 2 dropped at the start, 1 at the end.
        assert_eq!(trimmed.len(), 17);
        assert_eq!(trimmed[0].timestamp, input[2].timestamp);
    }

    #[test]
    fn drops_tps_outliers() {
        let mut tps = vec![100.0; 20];
        tps[10] = 100_000.0;
        let trimmed = TimeseriesPreprocessor::default().trim_noise(&series(&tps));
        assert!(trimmed.iter().all(|p| p.tps < 1000.0));
        assert_eq!(trimmed.len(), 16);
    }

    #[test]
    fn summary_contains_headline_numbers() {
        let summary = TimeseriesPreprocessor::default().summarize(&series(&[100.0; 5]));
        assert!(summary.contains("TPS avg 100.0"));
        assert!(summary.contains("error rate avg 0.50%"));
    }
}
