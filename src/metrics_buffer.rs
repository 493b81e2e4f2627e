use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// How a buffered metric is clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Clamped into `[0, max_value]`.
    Percentage,
    /// Clamped into `[0, +inf)`.
    Absolute,
}

/// Bounded FIFO of recent samples with forward-interpolation prediction.
///
/// Used in two places: the SSE stream bridges missing live samples with
/// predictions, and the job monitor gap-fills stored resource series. Each
/// sample carries a confidence in `[0, 1]`; actual observations are 1.0 and
/// consecutive predictions decay. Once the prediction streak reaches
/// `max_prediction_streak` the buffer stops extrapolating the trend and
/// falls back to exponential decay of the last actual value.
#[derive(Debug)]
pub struct SmartMetricsBuffer {
    metric_name: String,
    kind: MetricKind,
    max_value: f64,
    window_size: usize,
    max_prediction_streak: u32,
    alpha: f64,
    values: VecDeque<f64>,
    timestamps: VecDeque<DateTime<Utc>>,
    is_predicted: VecDeque<bool>,
    confidence: VecDeque<f64>,
    prediction_streak: u32,
}

impl SmartMetricsBuffer {
    pub fn new(metric_name: &str, kind: MetricKind, max_value: f64) -> Self {
        Self {
            metric_name: metric_name.to_string(),
            kind,
            max_value,
            window_size: 10,
            max_prediction_streak: 6,
            alpha: 0.3,
            values: VecDeque::with_capacity(10),
            timestamps: VecDeque::with_capacity(10),
            is_predicted: VecDeque::with_capacity(10),
            confidence: VecDeque::with_capacity(10),
            prediction_streak: 0,
        }
    }

    pub fn percentage(metric_name: &str) -> Self {
        Self::new(metric_name, MetricKind::Percentage, 100.0)
    }

    fn clamp(&self, value: f64) -> f64 {
        match self.kind {
            MetricKind::Percentage => value.clamp(0.0, self.max_value),
            MetricKind::Absolute => value.max(0.0),
        }
    }

    pub fn add_value(&mut self, value: f64, predicted: bool, timestamp: Option<DateTime<Utc>>) {
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let value = self.clamp(value);

        let confidence = if predicted {
            // The streak is capped so the decay fallback cannot run away.
            self.prediction_streak =
                (self.prediction_streak + 1).min(self.max_prediction_streak + 1);
            (1.0 - self.prediction_streak as f64 * 0.15).max(0.2)
        } else {
            self.prediction_streak = 0;
            1.0
        };

        if self.values.len() == self.window_size {
            self.values.pop_front();
            self.timestamps.pop_front();
            self.is_predicted.pop_front();
            self.confidence.pop_front();
        }
        self.values.push_back(value);
        self.timestamps.push_back(timestamp);
        self.is_predicted.push_back(predicted);
        self.confidence.push_back(confidence);

        tracing::debug!(
            metric = %self.metric_name,
            value,
            predicted,
            confidence,
            streak = self.prediction_streak,
            "buffered sample"
        );

        // An actual value after a run of predictions lets us shrink the
        // accumulated error retroactively.
        if !predicted && self.values.len() >= 2 && self.is_predicted[self.values.len() - 2] {
            self.correct_previous_predictions(value);
        }
    }

    pub fn predict_next(&self) -> Option<f64> {
        if self.values.is_empty() {
            tracing::warn!(metric = %self.metric_name, "no values in buffer for prediction");
            return None;
        }

        if self.prediction_streak >= self.max_prediction_streak {
            return Some(self.exponential_decay_fallback());
        }

        if self.values.len() == 1 {
            return Some(self.values[0]);
        }

        let slope = self.weighted_slope();
        let base = self.smoothed_base_value();
        Some(self.clamp(base + slope * 5.0))
    }

    /// Confidence-weighted mean of the finite-difference slopes over the
    /// last three samples (fewer if the buffer is shorter).
    fn weighted_slope(&self) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }

        let use_count = self.values.len().min(3);
        let start = self.values.len() - use_count;

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for i in (start + 1)..self.values.len() {
            let mut dt = (self.timestamps[i] - self.timestamps[i - 1]).num_milliseconds() as f64
                / 1000.0;
            if dt <= 0.0 {
                dt = 5.0;
            }
            let slope = (self.values[i] - self.values[i - 1]) / dt;
            let weight = self.confidence[i] * self.confidence[i - 1];
            weighted_sum += slope * weight;
            weight_sum += weight;
        }

        if weight_sum > 0.0 {
            weighted_sum / weight_sum
        } else {
            0.0
        }
    }

    fn smoothed_base_value(&self) -> f64 {
        let n = self.values.len();
        if n == 1 {
            return self.values[0];
        }
        let current = self.values[n - 1];
        let previous = self.values[n - 2];
        let adjusted_alpha = self.alpha * self.confidence[n - 1];
        adjusted_alpha * current + (1.0 - adjusted_alpha) * previous
    }

    fn exponential_decay_fallback(&self) -> f64 {
        let last_actual = self
            .is_predicted
            .iter()
            .zip(self.values.iter())
            .rev()
            .find(|(predicted, _)| !**predicted)
            .map(|(_, value)| *value)
            .unwrap_or(self.values[0]);

        let exponent = self.prediction_streak - self.max_prediction_streak + 1;
        last_actual * 0.95_f64.powi(exponent as i32)
    }

    /// Shift the trailing run of predicted entries toward the recovered
    /// actual value, strongest for the most recent prediction.
    fn correct_previous_predictions(&mut self, actual: f64) {
        let n = self.values.len();
        if n < 2 {
            return;
        }

        let last_predicted = self.values[n - 2];
        let error = actual - last_predicted;

        for i in 0..(n - 1) {
            let idx = n - 2 - i;
            if !self.is_predicted[idx] {
                break;
            }
            let correction = error * 0.5_f64.powi(i as i32) * 0.3;
            self.values[idx] = self.clamp(self.values[idx] + correction);
        }
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.back().copied()
    }

    pub fn last_is_predicted(&self) -> bool {
        self.is_predicted.back().copied().unwrap_or(false)
    }

    pub fn current_confidence(&self) -> f64 {
        self.confidence.back().copied().unwrap_or(0.0)
    }

    pub fn prediction_streak(&self) -> u32 {
        self.prediction_streak
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(base: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
        Some(base + Duration::seconds(secs))
    }

    #[test]
    fn clamps_percentage_values() {
        let mut buffer = SmartMetricsBuffer::percentage("cpu");
        buffer.add_value(150.0, false, None);
        assert_eq!(buffer.last_value(), Some(100.0));
        buffer.add_value(-5.0, false, None);
        assert_eq!(buffer.last_value(), Some(0.0));
    }

    #[test]
    fn actual_value_resets_streak_and_confidence() {
        let mut buffer = SmartMetricsBuffer::percentage("cpu");
        buffer.add_value(50.0, false, None);
        buffer.add_value(52.0, true, None);
        buffer.add_value(54.0, true, None);
        assert_eq!(buffer.prediction_streak(), 2);
        assert!((buffer.current_confidence() - 0.7).abs() < 1e-9);

        buffer.add_value(53.0, false, None);
        assert_eq!(buffer.prediction_streak(), 0);
        assert_eq!(buffer.current_confidence(), 1.0);
    }

    #[test]
    fn confidence_floor_is_point_two() {
        let mut buffer = SmartMetricsBuffer::percentage("mem");
        buffer.add_value(50.0, false, None);
        for _ in 0..8 {
            buffer.add_value(50.0, true, None);
        }
        assert!(buffer.current_confidence() >= 0.2);
        assert!(buffer.current_confidence() <= 1.0);
    }

    #[test]
    fn streak_is_capped_past_the_limit() {
        let mut buffer = SmartMetricsBuffer::percentage("mem");
        buffer.add_value(50.0, false, None);
        for _ in 0..20 {
            buffer.add_value(50.0, true, None);
        }
        assert_eq!(buffer.prediction_streak(), 7);
    }

    #[test]
    fn empty_buffer_has_no_prediction() {
        let buffer = SmartMetricsBuffer::percentage("cpu");
        assert!(buffer.predict_next().is_none());
    }

    #[test]
    fn single_value_predicts_itself() {
        let mut buffer = SmartMetricsBuffer::percentage("cpu");
        buffer.add_value(42.0, false, None);
        assert_eq!(buffer.predict_next(), Some(42.0));
    }

    #[test]
    fn rising_trend_predicts_upward() {
        let base = Utc::now();
        let mut buffer = SmartMetricsBuffer::percentage("cpu");
        buffer.add_value(30.0, false, at(base, 0));
        buffer.add_value(40.0, false, at(base, 5));
        buffer.add_value(50.0, false, at(base, 10));

        let prediction = buffer.predict_next().unwrap();
        // slope 2/s over 5 s on a base smoothed toward the latest value
        assert!(prediction > 50.0, "prediction {prediction} should continue the trend");
        assert!(prediction <= 100.0);
    }

    #[test]
    fn streak_limit_switches_to_decay() {
        let base = Utc::now();
        let mut buffer = SmartMetricsBuffer::percentage("cpu");
        buffer.add_value(80.0, false, at(base, 0));
        for i in 1..=6 {
            let predicted = buffer.predict_next().unwrap();
            buffer.add_value(predicted, true, at(base, i * 5));
        }
        assert_eq!(buffer.prediction_streak(), 6);

        // streak == max: fallback decays from the last actual value
        let fallback = buffer.predict_next().unwrap();
        assert!((fallback - 80.0 * 0.95).abs() < 1e-9);
    }

    #[test]
    fn retro_correction_shifts_predictions_toward_actual() {
        let base = Utc::now();
        let mut buffer = SmartMetricsBuffer::percentage("cpu");
        buffer.add_value(30.0, false, at(base, 0));
        buffer.add_value(40.0, false, at(base, 5));
        buffer.add_value(50.0, false, at(base, 10));

        let mut predicted = Vec::new();
        for i in 0..3 {
            let p = buffer.predict_next().unwrap();
            buffer.add_value(p, true, at(base, 15 + i * 5));
            predicted.push(buffer.last_value().unwrap());
        }

        let before: Vec<f64> = buffer.values.iter().copied().collect();
        let last_predicted = before[before.len() - 1];
        buffer.add_value(45.0, false, at(base, 30));
        assert_eq!(buffer.prediction_streak(), 0);

        let error = 45.0 - last_predicted;
        let after: Vec<f64> = buffer.values.iter().copied().collect();
        let n = after.len();
        // entries at distance 0..3 before the actual were predictions
        for i in 0..3 {
            let idx = n - 2 - i;
            let expected = (before[idx] + error * 0.5_f64.powi(i as i32) * 0.3).clamp(0.0, 100.0);
            assert!(
                (after[idx] - expected).abs() < 1e-9,
                "prediction at distance {i} corrected {} -> {}, expected {}",
                before[idx],
                after[idx],
                expected
            );
        }
    }

    #[test]
    fn window_is_bounded_to_ten() {
        let mut buffer = SmartMetricsBuffer::percentage("cpu");
        for i in 0..25 {
            buffer.add_value(i as f64, false, None);
        }
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.last_value(), Some(24.0));
    }
}
