//! Performance metrics collection for generator requests.
//!
//! Tracks the full lifecycle of each request and aggregates the results:
//! - Latency: mean / median / p95 / p99 / min / max / standard deviation
//! - Tokens: input, output, and total counts
//! - Cost: estimated from token usage and a static per-model price table
//! - Throughput: requests per second and tokens per second
//! - SLO checks: latency, error-rate, throughput, and cost limits
//!
//! A request moves through exactly two states: started, then ended (with or
//! without an error). [`PerformanceCollector::start_request`] returns a
//! [`RequestHandle`] that is **consumed** by
//! [`PerformanceCollector::end_request`], so ending the same request twice
//! does not compile. Generating a report while requests are still in flight
//! is an error.
//!
//! The collector is not thread-safe; callers invoking it from concurrent
//! contexts must serialize access themselves.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-1M-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

/// Look up pricing for a model. Local models are free; unknown models are
/// treated as free as well.
#[must_use]
pub fn model_pricing(model: &str) -> Option<ModelPricing> {
    let (input, output) = match model {
        // Local models - free, listed for completeness
        "llama3.1:8b" | "llama3.2:latest" | "mistral:7b" => (0.0, 0.0),

        // Commercial models, for cost comparison
        "gpt-4" => (30.0, 60.0),
        "gpt-4-turbo" => (10.0, 30.0),
        "gpt-3.5-turbo" => (0.5, 1.5),
        "claude-3-opus" => (15.0, 75.0),
        "claude-3-sonnet" => (3.0, 15.0),
        "claude-3-haiku" => (0.25, 1.25),

        _ => return None,
    };
    Some(ModelPricing { input, output })
}

/// Token usage reported when a request ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub model: String,
}

impl TokenUsage {
    #[must_use]
    pub fn new(input_tokens: u32, output_tokens: u32, model: impl Into<String>) -> Self {
        Self {
            input_tokens,
            output_tokens,
            model: model.into(),
        }
    }
}

/// Lifecycle record for a single request.
///
/// Created when the request starts; finalized exactly once when it ends.
/// Never mutated after finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub request_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Wall-clock latency in milliseconds
    pub latency_ms: Option<f64>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub model: Option<String>,
    /// Estimated cost in dollars
    pub cost: Option<f64>,
    pub success: bool,
    pub error: Option<String>,
}

/// Immutable snapshot computed from the recorded metrics at
/// report-generation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    /// 0.0 - 1.0
    pub error_rate: f64,

    // Latency metrics, in milliseconds
    pub mean_latency: f64,
    pub median_latency: f64,
    pub p95_latency: f64,
    pub p99_latency: f64,
    pub min_latency: f64,
    pub max_latency: f64,
    pub std_deviation: f64,

    // Token metrics
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_tokens: u64,
    pub mean_input_tokens: f64,
    pub mean_output_tokens: f64,

    // Cost metrics, in dollars
    pub total_cost: f64,
    pub mean_cost: f64,

    // Throughput
    /// Wall-clock span in seconds, floored at 1ms
    pub duration: f64,
    pub requests_per_second: f64,
    pub tokens_per_second: f64,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Caller-supplied performance thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSLO {
    /// Maximum p95 latency in milliseconds
    pub max_p95_latency: f64,

    /// Maximum p99 latency in milliseconds
    pub max_p99_latency: f64,

    /// Maximum error rate, 0.0 - 1.0
    pub max_error_rate: f64,

    /// Minimum requests per second, if throughput matters
    pub min_throughput: Option<f64>,

    /// Maximum mean cost per request in dollars
    pub max_cost_per_request: Option<f64>,
}

/// Result of checking a report against an SLO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SLOResult {
    pub passed: bool,

    /// One human-readable string per breached dimension
    pub violations: Vec<String>,

    /// The report the check was performed against
    pub report: PerformanceReport,
}

/// Handle for an in-flight request, returned by
/// [`PerformanceCollector::start_request`].
///
/// Consumed by [`PerformanceCollector::end_request`]; a handle cannot be
/// ended twice.
#[derive(Debug)]
pub struct RequestHandle {
    request_id: String,
}

impl RequestHandle {
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

/// Records request lifecycles and produces aggregate reports.
///
/// # Example
///
/// ```
/// use evalguard::performance::{PerformanceCollector, TokenUsage};
///
/// # fn main() -> anyhow::Result<()> {
/// let mut collector = PerformanceCollector::new();
///
/// let handle = collector.start_request();
/// // ... make the generator call ...
/// collector.end_request(handle, Some(TokenUsage::new(100, 50, "llama3.1:8b")), None)?;
///
/// let report = collector.generate_report()?;
/// assert_eq!(report.total_requests, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct PerformanceCollector {
    metrics: Vec<PerformanceMetric>,
    active_requests: HashMap<String, PerformanceMetric>,
    request_counter: u64,
}

impl PerformanceCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a new request.
    ///
    /// Allocates a unique id (monotonic counter + timestamp) and records the
    /// start time. The returned handle must be passed to
    /// [`end_request`](Self::end_request) to finalize the metric.
    pub fn start_request(&mut self) -> RequestHandle {
        self.request_counter += 1;
        let now = Utc::now();
        let request_id = format!("req_{}_{}", self.request_counter, now.timestamp_millis());

        let metric = PerformanceMetric {
            request_id: request_id.clone(),
            start_time: now,
            end_time: None,
            latency_ms: None,
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            model: None,
            cost: None,
            success: true,
            error: None,
        };

        self.active_requests.insert(request_id.clone(), metric);

        RequestHandle { request_id }
    }

    /// End a request, recording latency and optional usage.
    ///
    /// Passing an `error` marks the request as failed. The handle is
    /// consumed, so a request can only be ended once.
    ///
    /// # Errors
    ///
    /// Returns an error when the request id is unknown (e.g. the collector
    /// was cleared while the request was in flight).
    pub fn end_request(
        &mut self,
        handle: RequestHandle,
        usage: Option<TokenUsage>,
        error: Option<&str>,
    ) -> Result<()> {
        let Some(mut metric) = self.active_requests.remove(&handle.request_id) else {
            bail!("Request {} not found", handle.request_id);
        };

        let now = Utc::now();
        metric.end_time = Some(now);
        metric.latency_ms = Some(elapsed_ms(metric.start_time, now));

        if let Some(error) = error {
            metric.success = false;
            metric.error = Some(error.to_string());
        }

        if let Some(usage) = usage {
            metric.input_tokens = Some(usage.input_tokens);
            metric.output_tokens = Some(usage.output_tokens);
            metric.total_tokens = Some(usage.input_tokens + usage.output_tokens);
            metric.cost = Some(calculate_cost(&usage));
            metric.model = Some(usage.model);
        }

        self.metrics.push(metric);
        Ok(())
    }

    /// Record an already-finalized metric, bypassing the start/end lifecycle.
    ///
    /// Useful for importing pre-computed measurements.
    pub fn record_metric(&mut self, metric: PerformanceMetric) {
        self.metrics.push(metric);
    }

    /// All recorded (finalized) metrics.
    #[must_use]
    pub fn metrics(&self) -> &[PerformanceMetric] {
        &self.metrics
    }

    /// Recorded metrics filtered by success/failure.
    #[must_use]
    pub fn metrics_by_status(&self, success: bool) -> Vec<&PerformanceMetric> {
        self.metrics.iter().filter(|m| m.success == success).collect()
    }

    /// Recorded metrics filtered by model name.
    #[must_use]
    pub fn metrics_by_model(&self, model: &str) -> Vec<&PerformanceMetric> {
        self.metrics
            .iter()
            .filter(|m| m.model.as_deref() == Some(model))
            .collect()
    }

    /// Number of requests started but not yet ended.
    #[must_use]
    pub fn active_request_count(&self) -> usize {
        self.active_requests.len()
    }

    /// Drop all recorded metrics and in-flight requests. Useful when
    /// starting a new test run.
    pub fn clear(&mut self) {
        self.metrics.clear();
        self.active_requests.clear();
        self.request_counter = 0;
    }

    /// Generate an aggregate report over all recorded metrics.
    ///
    /// Throughput uses the wall-clock span from the earliest start to the
    /// latest end across all metrics, successes and failures alike, floored
    /// at 1ms so near-instant batches do not divide by zero.
    ///
    /// # Errors
    ///
    /// Returns an error when any request is still in flight, when no
    /// metrics have been recorded, or when no successful request carries
    /// latency data.
    pub fn generate_report(&self) -> Result<PerformanceReport> {
        if !self.active_requests.is_empty() {
            bail!(
                "Cannot generate report: {} request(s) still active",
                self.active_requests.len()
            );
        }
        if self.metrics.is_empty() {
            bail!("No metrics recorded");
        }

        let successful: Vec<&PerformanceMetric> =
            self.metrics.iter().filter(|m| m.success).collect();
        let failed_count = self.metrics.len() - successful.len();

        let mut latencies: Vec<f64> = successful.iter().filter_map(|m| m.latency_ms).collect();
        latencies.sort_by(f64::total_cmp);

        if latencies.is_empty() {
            bail!("No successful requests with latency data to generate report");
        }

        let mean_latency = mean(&latencies);
        let std_deviation = std_deviation(&latencies, mean_latency);

        let input_tokens: Vec<f64> = successful
            .iter()
            .map(|m| f64::from(m.input_tokens.unwrap_or(0)))
            .collect();
        let output_tokens: Vec<f64> = successful
            .iter()
            .map(|m| f64::from(m.output_tokens.unwrap_or(0)))
            .collect();
        let costs: Vec<f64> = successful.iter().map(|m| m.cost.unwrap_or(0.0)).collect();

        // Wall-clock range over all metrics, failures included
        let min_time = self
            .metrics
            .iter()
            .map(|m| m.start_time)
            .min()
            .unwrap_or_else(Utc::now);
        let max_time = self
            .metrics
            .iter()
            .map(|m| m.end_time.unwrap_or(m.start_time))
            .max()
            .unwrap_or(min_time);

        let duration = (elapsed_ms(min_time, max_time) / 1000.0).max(0.001);

        let total_input_tokens: u64 = successful
            .iter()
            .map(|m| u64::from(m.input_tokens.unwrap_or(0)))
            .sum();
        let total_output_tokens: u64 = successful
            .iter()
            .map(|m| u64::from(m.output_tokens.unwrap_or(0)))
            .sum();
        let total_tokens = total_input_tokens + total_output_tokens;
        let total_cost: f64 = costs.iter().sum();

        Ok(PerformanceReport {
            total_requests: self.metrics.len(),
            successful_requests: successful.len(),
            failed_requests: failed_count,
            error_rate: failed_count as f64 / self.metrics.len() as f64,

            mean_latency,
            median_latency: percentile(&latencies, 50.0),
            p95_latency: percentile(&latencies, 95.0),
            p99_latency: percentile(&latencies, 99.0),
            min_latency: latencies[0],
            max_latency: latencies[latencies.len() - 1],
            std_deviation,

            total_input_tokens,
            total_output_tokens,
            total_tokens,
            mean_input_tokens: mean(&input_tokens),
            mean_output_tokens: mean(&output_tokens),

            total_cost,
            mean_cost: mean(&costs),

            duration,
            requests_per_second: self.metrics.len() as f64 / duration,
            tokens_per_second: total_tokens as f64 / duration,

            start_time: min_time,
            end_time: max_time,
        })
    }

    /// Render the report as a fixed-format human-readable text block.
    ///
    /// # Errors
    ///
    /// Same conditions as [`generate_report`](Self::generate_report).
    pub fn report_text(&self) -> Result<String> {
        let report = self.generate_report()?;

        Ok(format!(
            "Performance Report\n\
             ==================\n\
             \n\
             Requests:\n\
             \x20 Total: {}\n\
             \x20 Successful: {}\n\
             \x20 Failed: {}\n\
             \x20 Error Rate: {:.2}%\n\
             \n\
             Latency (ms):\n\
             \x20 Mean: {:.2}\n\
             \x20 Median: {:.2}\n\
             \x20 P95: {:.2}\n\
             \x20 P99: {:.2}\n\
             \x20 Min: {:.2}\n\
             \x20 Max: {:.2}\n\
             \x20 Std Dev: {:.2}\n\
             \n\
             Tokens:\n\
             \x20 Total Input: {}\n\
             \x20 Total Output: {}\n\
             \x20 Total: {}\n\
             \x20 Mean Input: {:.0}\n\
             \x20 Mean Output: {:.0}\n\
             \n\
             Cost:\n\
             \x20 Total: ${:.6}\n\
             \x20 Mean per Request: ${:.6}\n\
             \n\
             Throughput:\n\
             \x20 Duration: {:.2}s\n\
             \x20 Requests/sec: {:.2}\n\
             \x20 Tokens/sec: {:.0}\n\
             \n\
             Time Range:\n\
             \x20 Start: {}\n\
             \x20 End: {}",
            report.total_requests,
            report.successful_requests,
            report.failed_requests,
            report.error_rate * 100.0,
            report.mean_latency,
            report.median_latency,
            report.p95_latency,
            report.p99_latency,
            report.min_latency,
            report.max_latency,
            report.std_deviation,
            report.total_input_tokens,
            report.total_output_tokens,
            report.total_tokens,
            report.mean_input_tokens,
            report.mean_output_tokens,
            report.total_cost,
            report.mean_cost,
            report.duration,
            report.requests_per_second,
            report.tokens_per_second,
            report.start_time.to_rfc3339(),
            report.end_time.to_rfc3339(),
        ))
    }

    /// Check the current metrics against a service level objective.
    ///
    /// Every breached dimension produces a violation string; breached SLOs
    /// are results, not errors.
    ///
    /// # Errors
    ///
    /// Same conditions as [`generate_report`](Self::generate_report).
    pub fn check_slo(&self, slo: &PerformanceSLO) -> Result<SLOResult> {
        let report = self.generate_report()?;
        let mut violations = Vec::new();

        if report.p95_latency > slo.max_p95_latency {
            violations.push(format!(
                "P95 latency {:.0}ms exceeds SLO {}ms",
                report.p95_latency, slo.max_p95_latency
            ));
        }

        if report.p99_latency > slo.max_p99_latency {
            violations.push(format!(
                "P99 latency {:.0}ms exceeds SLO {}ms",
                report.p99_latency, slo.max_p99_latency
            ));
        }

        if report.error_rate > slo.max_error_rate {
            violations.push(format!(
                "Error rate {:.1}% exceeds SLO {:.1}%",
                report.error_rate * 100.0,
                slo.max_error_rate * 100.0
            ));
        }

        if let Some(min_throughput) = slo.min_throughput {
            if report.requests_per_second < min_throughput {
                violations.push(format!(
                    "Throughput {:.1} req/s below SLO {min_throughput} req/s",
                    report.requests_per_second
                ));
            }
        }

        if let Some(max_cost) = slo.max_cost_per_request {
            if report.mean_cost > max_cost {
                violations.push(format!(
                    "Mean cost ${:.6} exceeds SLO ${max_cost:.6}",
                    report.mean_cost
                ));
            }
        }

        Ok(SLOResult {
            passed: violations.is_empty(),
            violations,
            report,
        })
    }
}

/// Cost in dollars for the given usage. Pricing is per 1M tokens; unknown
/// models cost nothing.
fn calculate_cost(usage: &TokenUsage) -> f64 {
    let Some(pricing) = model_pricing(&usage.model) else {
        return 0.0;
    };

    let input_cost = (f64::from(usage.input_tokens) / 1_000_000.0) * pricing.input;
    let output_cost = (f64::from(usage.output_tokens) / 1_000_000.0) * pricing.output;

    input_cost + output_cost
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let elapsed = end.signed_duration_since(start);
    elapsed
        .num_microseconds()
        .map_or_else(|| elapsed.num_milliseconds() as f64, |us| us as f64 / 1000.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divide by n, not n-1): the recorded
/// metrics are a complete census of the run, not a sample.
fn std_deviation(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Nearest-rank percentile over ascending-sorted values:
/// `index = ceil(p/100 * n) - 1`, clamped to `[0, n-1]`.
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted_values.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted_values.len() - 1);
    sorted_values[index]
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// Build a finalized metric with a fixed latency, for deterministic
    /// statistics tests.
    fn fixed_metric(id: &str, latency_ms: f64, success: bool) -> PerformanceMetric {
        let start = Utc::now();
        let end = start + Duration::milliseconds(latency_ms as i64);
        PerformanceMetric {
            request_id: id.to_string(),
            start_time: start,
            end_time: Some(end),
            latency_ms: Some(latency_ms),
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            model: None,
            cost: None,
            success,
            error: if success { None } else { Some("boom".to_string()) },
        }
    }

    #[test]
    fn test_start_and_end_request() {
        let mut collector = PerformanceCollector::new();
        let handle = collector.start_request();
        assert_eq!(collector.active_request_count(), 1);

        collector
            .end_request(handle, Some(TokenUsage::new(100, 50, "llama3.1:8b")), None)
            .unwrap();

        assert_eq!(collector.active_request_count(), 0);
        let metrics = collector.metrics();
        assert_eq!(metrics.len(), 1);
        assert!(metrics[0].success);
        assert_eq!(metrics[0].input_tokens, Some(100));
        assert_eq!(metrics[0].output_tokens, Some(50));
        assert_eq!(metrics[0].total_tokens, Some(150));
        assert!(metrics[0].latency_ms.is_some());
        assert!(metrics[0].end_time.is_some());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let mut collector = PerformanceCollector::new();
        let h1 = collector.start_request();
        let h2 = collector.start_request();
        assert_ne!(h1.request_id(), h2.request_id());
    }

    #[test]
    fn test_error_tracking() {
        let mut collector = PerformanceCollector::new();
        let handle = collector.start_request();
        collector.end_request(handle, None, Some("timeout")).unwrap();

        let metrics = collector.metrics();
        assert!(!metrics[0].success);
        assert_eq!(metrics[0].error.as_deref(), Some("timeout"));
        assert_eq!(collector.metrics_by_status(false).len(), 1);
        assert_eq!(collector.metrics_by_status(true).len(), 0);
    }

    #[test]
    fn test_end_unknown_request_is_error() {
        let mut collector = PerformanceCollector::new();
        let handle = collector.start_request();
        collector.clear();

        let result = collector.end_request(handle, None, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_cost_calculation() {
        // gpt-4: $30 / 1M input, $60 / 1M output
        let usage = TokenUsage::new(1_000_000, 500_000, "gpt-4");
        let cost = calculate_cost(&usage);
        assert!((cost - 60.0).abs() < 1e-9);

        // Local and unknown models are free
        assert_eq!(calculate_cost(&TokenUsage::new(1000, 1000, "llama3.1:8b")), 0.0);
        assert_eq!(calculate_cost(&TokenUsage::new(1000, 1000, "some-unknown-model")), 0.0);
    }

    #[test]
    fn test_report_uniform_latencies() {
        let mut collector = PerformanceCollector::new();
        for i in 0..10 {
            collector.record_metric(fixed_metric(&format!("req_{i}"), 100.0, true));
        }

        let report = collector.generate_report().unwrap();
        assert_eq!(report.total_requests, 10);
        assert_eq!(report.successful_requests, 10);
        assert!((report.mean_latency - 100.0).abs() < 1e-9);
        assert!((report.median_latency - 100.0).abs() < 1e-9);
        assert!((report.std_deviation - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_monotonicity() {
        let mut collector = PerformanceCollector::new();
        for i in 1..=100 {
            collector.record_metric(fixed_metric(&format!("req_{i}"), f64::from(i) * 10.0, true));
        }

        let report = collector.generate_report().unwrap();
        assert!(report.median_latency <= report.p95_latency);
        assert!(report.p95_latency <= report.p99_latency);
        assert!(report.p99_latency <= report.max_latency);
        assert!(report.min_latency <= report.median_latency);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        // ceil(0.5 * 10) - 1 = 4 -> values[4] = 5
        assert_eq!(percentile(&values, 50.0), 5.0);
        // ceil(0.95 * 10) - 1 = 9 -> values[9] = 10
        assert_eq!(percentile(&values, 95.0), 10.0);
        assert_eq!(percentile(&[42.0], 99.0), 42.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_report_with_no_metrics_is_error() {
        let collector = PerformanceCollector::new();
        assert!(collector.generate_report().is_err());
    }

    #[test]
    fn test_report_with_active_request_is_error() {
        let mut collector = PerformanceCollector::new();
        collector.record_metric(fixed_metric("done", 100.0, true));
        let _handle = collector.start_request();

        let result = collector.generate_report();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("still active"));
    }

    #[test]
    fn test_report_with_only_failures_is_error() {
        let mut collector = PerformanceCollector::new();
        let mut failed = fixed_metric("req_1", 100.0, false);
        failed.latency_ms = None;
        collector.record_metric(failed);

        assert!(collector.generate_report().is_err());
    }

    #[test]
    fn test_error_rate_counts_failures() {
        let mut collector = PerformanceCollector::new();
        for i in 0..8 {
            collector.record_metric(fixed_metric(&format!("ok_{i}"), 100.0, true));
        }
        for i in 0..2 {
            collector.record_metric(fixed_metric(&format!("bad_{i}"), 100.0, false));
        }

        let report = collector.generate_report().unwrap();
        assert_eq!(report.total_requests, 10);
        assert_eq!(report.failed_requests, 2);
        assert!((report.error_rate - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_floors_duration() {
        let mut collector = PerformanceCollector::new();
        // Single near-instant request: duration must floor at 1ms
        let now = Utc::now();
        collector.record_metric(PerformanceMetric {
            request_id: "fast".to_string(),
            start_time: now,
            end_time: Some(now),
            latency_ms: Some(0.0),
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            model: None,
            cost: None,
            success: true,
            error: None,
        });

        let report = collector.generate_report().unwrap();
        assert!((report.duration - 0.001).abs() < 1e-12);
        assert!(report.requests_per_second.is_finite());
        assert!(report.tokens_per_second.is_finite());
    }

    #[test]
    fn test_slo_check_passing() {
        let mut collector = PerformanceCollector::new();
        for i in 0..10 {
            collector.record_metric(fixed_metric(&format!("req_{i}"), 100.0, true));
        }

        let slo = PerformanceSLO {
            max_p95_latency: 2000.0,
            max_p99_latency: 5000.0,
            max_error_rate: 0.01,
            min_throughput: None,
            max_cost_per_request: None,
        };

        let result = collector.check_slo(&slo).unwrap();
        assert!(result.passed);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_slo_check_failing_reports_each_dimension() {
        let mut collector = PerformanceCollector::new();
        for i in 0..9 {
            collector.record_metric(fixed_metric(&format!("req_{i}"), 3000.0, true));
        }
        collector.record_metric(fixed_metric("bad", 3000.0, false));

        let slo = PerformanceSLO {
            max_p95_latency: 2000.0,
            max_p99_latency: 2500.0,
            max_error_rate: 0.01,
            min_throughput: None,
            max_cost_per_request: None,
        };

        let result = collector.check_slo(&slo).unwrap();
        assert!(!result.passed);
        assert_eq!(result.violations.len(), 3);
        assert!(result.violations[0].contains("P95"));
        assert!(result.violations[1].contains("P99"));
        assert!(result.violations[2].contains("Error rate"));
    }

    #[test]
    fn test_metrics_filtering_by_model() {
        let mut collector = PerformanceCollector::new();
        let h1 = collector.start_request();
        collector
            .end_request(h1, Some(TokenUsage::new(10, 10, "gpt-4")), None)
            .unwrap();
        let h2 = collector.start_request();
        collector
            .end_request(h2, Some(TokenUsage::new(10, 10, "claude-3-haiku")), None)
            .unwrap();

        assert_eq!(collector.metrics_by_model("gpt-4").len(), 1);
        assert_eq!(collector.metrics_by_model("claude-3-haiku").len(), 1);
        assert_eq!(collector.metrics_by_model("mistral:7b").len(), 0);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut collector = PerformanceCollector::new();
        let _ = collector.start_request();
        collector.record_metric(fixed_metric("req", 100.0, true));

        collector.clear();
        assert_eq!(collector.metrics().len(), 0);
        assert_eq!(collector.active_request_count(), 0);
        assert!(collector.generate_report().is_err());
    }

    #[test]
    fn test_report_text_format() {
        let mut collector = PerformanceCollector::new();
        for i in 0..3 {
            collector.record_metric(fixed_metric(&format!("req_{i}"), 150.0, true));
        }

        let text = collector.report_text().unwrap();
        assert!(text.starts_with("Performance Report"));
        assert!(text.contains("Latency (ms):"));
        assert!(text.contains("Mean: 150.00"));
        assert!(text.contains("Requests/sec:"));
        assert!(text.contains("Time Range:"));
    }

    #[test]
    fn test_token_totals_in_report() {
        let mut collector = PerformanceCollector::new();
        let h1 = collector.start_request();
        collector
            .end_request(h1, Some(TokenUsage::new(100, 50, "gpt-3.5-turbo")), None)
            .unwrap();
        let h2 = collector.start_request();
        collector
            .end_request(h2, Some(TokenUsage::new(200, 100, "gpt-3.5-turbo")), None)
            .unwrap();

        let report = collector.generate_report().unwrap();
        assert_eq!(report.total_input_tokens, 300);
        assert_eq!(report.total_output_tokens, 150);
        assert_eq!(report.total_tokens, 450);
        assert!((report.mean_input_tokens - 150.0).abs() < 1e-9);
        assert!(report.total_cost > 0.0);
    }
}
