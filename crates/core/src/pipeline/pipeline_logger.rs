use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for one prediction run.
///
/// The use case reports stage durations and counters here instead of
/// writing to a log directly, so callers decide how much of it surfaces.
pub trait PipelineLogger: Send {
    /// Record how long a named stage took, in milliseconds.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a counter such as the number of sampled frames.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Used by tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Accumulates timings and counters for one run and writes a one-line
/// summary through the `log` facade at debug level.
///
/// Every line is prefixed with `label` (typically the request id) so
/// concurrent runs can be told apart.
pub struct LogPipelineLogger {
    label: String,
    timings: BTreeMap<String, f64>,
    metrics: BTreeMap<String, f64>,
    start_time: Instant,
}

impl LogPipelineLogger {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut parts = vec![format!("[{}] pipeline {elapsed_ms:.0}ms", self.label)];
        parts.extend(
            self.timings
                .iter()
                .map(|(stage, ms)| format!("{stage}={ms:.1}ms")),
        );
        parts.extend(
            self.metrics
                .iter()
                .map(|(name, value)| format!("{name}={value}")),
        );
        Some(parts.join(" "))
    }

    /// Total milliseconds recorded for `stage`.
    pub fn timing_for(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).copied()
    }

    pub fn metric_for(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        *self.timings.entry(stage.to_string()).or_default() += duration_ms;
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    fn info(&mut self, message: &str) {
        log::debug!("[{}] {message}", self.label);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::debug!("{text}");
        }
    }
}
