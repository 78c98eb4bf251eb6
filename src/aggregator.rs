//! Cross-run metrics aggregation and regression monitoring.
//!
//! Collects test-run summaries over time to enable:
//! - Trend analysis (quality and performance over time)
//! - Regression detection (degradation alerts with severity tiers)
//! - Historical comparison (before/after model or prompt changes)
//! - Dashboard reporting (current system health)
//!
//! Run history is a bounded, append-only JSON log on disk, capped at
//! [`MAX_HISTORY_RUNS`] rows with oldest-first eviction. Corrupt history is
//! logged and treated as empty (self-healing on the next write), never
//! fatal. Regression alerts are results, not errors.
//!
//! The aggregator assumes a single instance per log file; concurrent
//! processes appending to the same path require external serialization.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use prometheus::{Encoder, GaugeVec, IntGaugeVec, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Similarity drop that triggers a warning (fraction of baseline).
pub const DEFAULT_SIMILARITY_DROP_THRESHOLD: f64 = 0.1;
/// Latency increase that triggers a warning (fraction of baseline).
pub const DEFAULT_LATENCY_INCREASE_THRESHOLD: f64 = 0.25;
/// Pass-rate drop that triggers a warning (absolute).
pub const DEFAULT_PASS_RATE_DROP_THRESHOLD: f64 = 0.05;
/// Minimum recorded runs before a baseline exists.
pub const DEFAULT_MIN_TEST_RUNS: usize = 3;

/// Similarity drop escalating a warning to critical.
pub const CRITICAL_SIMILARITY_DROP_THRESHOLD: f64 = 0.2;
/// Latency increase escalating a warning to critical.
pub const CRITICAL_LATENCY_INCREASE_THRESHOLD: f64 = 0.5;
/// Pass-rate drop escalating a warning to critical.
pub const CRITICAL_PASS_RATE_DROP_THRESHOLD: f64 = 0.1;

/// Minimum runs in the window before a trend is computed.
pub const MIN_RUNS_FOR_TREND: usize = 5;
/// Half-to-half similarity change beyond which the trend is not stable.
pub const TREND_CHANGE_THRESHOLD: f64 = 0.05;

/// Hard cap on the history log; oldest rows evicted first.
pub const MAX_HISTORY_RUNS: usize = 100;
/// Default number of recent runs in the baseline window.
pub const DEFAULT_BASELINE_RUNS: usize = 10;

/// One durable row of run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRunResult {
    pub timestamp: DateTime<Utc>,
    pub test_suite: String,
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Run duration in milliseconds
    pub duration: f64,

    // Quality metrics
    pub avg_similarity: Option<f64>,
    pub avg_bleu_score: Option<f64>,

    // Performance metrics
    pub avg_latency: Option<f64>,
    pub p95_latency: Option<f64>,
    pub p99_latency: Option<f64>,
    pub avg_tokens: Option<f64>,
    pub total_cost: Option<f64>,

    // Security metrics
    pub security_violations: Option<usize>,
    pub avg_risk_score: Option<f64>,

    // Environment
    pub model: Option<String>,
    pub version: Option<String>,
    pub notes: Option<String>,
}

/// Direction of the quality trend over the baseline window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}

impl Trend {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Degrading => "degrading",
        }
    }
}

/// Rolling baseline over the most recent runs. Recomputed on demand, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    /// Window description, e.g. "last_10_runs"
    pub period: String,
    pub test_runs: usize,
    pub avg_pass_rate: f64,
    pub avg_similarity: f64,
    pub avg_latency: f64,
    pub trend: Trend,
}

/// Alert severity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// One regression detected by comparing the latest run to the baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionAlert {
    pub severity: AlertSeverity,

    /// Which axis regressed: "similarity", "latency", or "pass_rate"
    pub metric: String,

    pub current: f64,
    pub baseline: f64,
    pub percent_change: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Thresholds controlling when regression alerts fire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// e.g. 0.1 = 10% similarity drop triggers an alert
    pub similarity_drop: f64,

    /// e.g. 0.25 = 25% latency increase triggers an alert
    pub latency_increase: f64,

    /// e.g. 0.05 = 5 percentage point pass-rate drop triggers an alert
    pub pass_rate_drop: f64,

    /// Minimum recorded runs before alerting
    pub min_test_runs: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            similarity_drop: DEFAULT_SIMILARITY_DROP_THRESHOLD,
            latency_increase: DEFAULT_LATENCY_INCREASE_THRESHOLD,
            pass_rate_drop: DEFAULT_PASS_RATE_DROP_THRESHOLD,
            min_test_runs: DEFAULT_MIN_TEST_RUNS,
        }
    }
}

/// Persists run summaries, computes rolling baselines, and raises
/// regression alerts.
///
/// # Example
///
/// ```no_run
/// use evalguard::aggregator::MetricsAggregator;
///
/// # fn main() -> anyhow::Result<()> {
/// let aggregator = MetricsAggregator::new("data/metrics")?;
///
/// // After each test run: aggregator.record_test_run(result)?;
/// for alert in aggregator.check_for_regressions() {
///     eprintln!("{}", alert.message);
/// }
/// println!("{}", aggregator.generate_dashboard());
/// # Ok(())
/// # }
/// ```
pub struct MetricsAggregator {
    history_file: PathBuf,
    thresholds: AlertThresholds,
}

impl MetricsAggregator {
    /// Create an aggregator storing history at
    /// `<data_dir>/test-history.json`. The directory and an empty history
    /// file are created if absent.
    ///
    /// # Errors
    ///
    /// Fails when the data directory cannot be created or the history file
    /// cannot be initialized.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let history_file = data_dir.join("test-history.json");
        if !history_file.exists() {
            let file = File::create(&history_file).with_context(|| {
                format!("Failed to create history file: {}", history_file.display())
            })?;
            serde_json::to_writer_pretty(BufWriter::new(file), &Vec::<TestRunResult>::new())
                .context("Failed to initialize history file")?;
        }

        Ok(Self {
            history_file,
            thresholds: AlertThresholds::default(),
        })
    }

    /// Replace the alert thresholds.
    pub fn set_thresholds(&mut self, thresholds: AlertThresholds) {
        self.thresholds = thresholds;
    }

    /// Append a run to the history log.
    ///
    /// The log is capped at [`MAX_HISTORY_RUNS`] rows; the oldest rows are
    /// evicted first.
    ///
    /// # Errors
    ///
    /// Fails when the history file cannot be written.
    pub fn record_test_run(&self, result: TestRunResult) -> Result<()> {
        let mut history = self.load_history();
        history.push(result);

        if history.len() > MAX_HISTORY_RUNS {
            let excess = history.len() - MAX_HISTORY_RUNS;
            history.drain(..excess);
        }

        self.save_history(&history)
    }

    /// The most recent `count` runs, oldest first.
    #[must_use]
    pub fn recent_runs(&self, count: usize) -> Vec<TestRunResult> {
        let history = self.load_history();
        let start = history.len().saturating_sub(count);
        history[start..].to_vec()
    }

    /// Runs recorded within the last `days` days.
    #[must_use]
    pub fn runs_for_period(&self, days: i64) -> Vec<TestRunResult> {
        let cutoff = Utc::now() - Duration::days(days);
        self.load_history()
            .into_iter()
            .filter(|r| r.timestamp >= cutoff)
            .collect()
    }

    /// Compute the baseline over the most recent `runs` rows.
    ///
    /// Returns `None` when fewer than `min_test_runs` rows exist.
    /// `avg_pass_rate` aggregates passed/total over the whole window;
    /// `avg_similarity` and `avg_latency` average the rows that carry the
    /// value.
    #[must_use]
    pub fn calculate_baseline(&self, runs: usize) -> Option<AggregatedMetrics> {
        let recent = self.recent_runs(runs);

        if recent.len() < self.thresholds.min_test_runs {
            return None;
        }

        let total_tests: usize = recent.iter().map(|r| r.total_tests).sum();
        let total_passed: usize = recent.iter().map(|r| r.passed).sum();

        let similarities: Vec<f64> = recent.iter().filter_map(|r| r.avg_similarity).collect();
        let latencies: Vec<f64> = recent.iter().filter_map(|r| r.avg_latency).collect();

        Some(AggregatedMetrics {
            period: format!("last_{runs}_runs"),
            test_runs: recent.len(),
            avg_pass_rate: if total_tests > 0 {
                total_passed as f64 / total_tests as f64
            } else {
                0.0
            },
            avg_similarity: mean(&similarities),
            avg_latency: mean(&latencies),
            trend: calculate_trend(&recent),
        })
    }

    /// Compare the latest run to the current baseline and return one alert
    /// per regressed axis (similarity drop, latency increase, pass-rate
    /// drop). Axes are independent; a run can raise zero to three alerts.
    ///
    /// Thresholds are strict: a change exactly at the threshold does not
    /// fire.
    #[must_use]
    pub fn check_for_regressions(&self) -> Vec<RegressionAlert> {
        let history = self.load_history();

        if history.len() < self.thresholds.min_test_runs + 1 {
            return Vec::new();
        }

        let Some(latest) = history.last() else {
            return Vec::new();
        };
        let Some(baseline) = self.calculate_baseline(DEFAULT_BASELINE_RUNS) else {
            return Vec::new();
        };

        let mut alerts = Vec::new();

        // Similarity drop
        if let Some(current_similarity) = latest.avg_similarity {
            if baseline.avg_similarity > 0.0 {
                let change =
                    (current_similarity - baseline.avg_similarity) / baseline.avg_similarity;

                if change < -self.thresholds.similarity_drop {
                    let severity = if change <= -CRITICAL_SIMILARITY_DROP_THRESHOLD {
                        AlertSeverity::Critical
                    } else {
                        AlertSeverity::Warning
                    };
                    alerts.push(RegressionAlert {
                        severity,
                        metric: "similarity".to_string(),
                        current: current_similarity,
                        baseline: baseline.avg_similarity,
                        percent_change: change * 100.0,
                        message: format!(
                            "Similarity dropped {:.1}% ({current_similarity:.2} vs baseline {:.2})",
                            (change * 100.0).abs(),
                            baseline.avg_similarity
                        ),
                        timestamp: latest.timestamp,
                    });
                }
            }
        }

        // Latency increase
        if let Some(current_latency) = latest.avg_latency {
            if baseline.avg_latency > 0.0 {
                let change = (current_latency - baseline.avg_latency) / baseline.avg_latency;

                if change > self.thresholds.latency_increase {
                    let severity = if change >= CRITICAL_LATENCY_INCREASE_THRESHOLD {
                        AlertSeverity::Critical
                    } else {
                        AlertSeverity::Warning
                    };
                    alerts.push(RegressionAlert {
                        severity,
                        metric: "latency".to_string(),
                        current: current_latency,
                        baseline: baseline.avg_latency,
                        percent_change: change * 100.0,
                        message: format!(
                            "Latency increased {:.1}% ({current_latency:.0}ms vs baseline {:.0}ms)",
                            change * 100.0,
                            baseline.avg_latency
                        ),
                        timestamp: latest.timestamp,
                    });
                }
            }
        }

        // Pass-rate drop (absolute percentage points)
        let current_pass_rate = if latest.total_tests > 0 {
            latest.passed as f64 / latest.total_tests as f64
        } else {
            0.0
        };
        let pass_rate_change = current_pass_rate - baseline.avg_pass_rate;

        if pass_rate_change < -self.thresholds.pass_rate_drop {
            let severity = if pass_rate_change < -CRITICAL_PASS_RATE_DROP_THRESHOLD {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            let percent_change = if baseline.avg_pass_rate > 0.0 {
                (pass_rate_change / baseline.avg_pass_rate) * 100.0
            } else {
                0.0
            };
            alerts.push(RegressionAlert {
                severity,
                metric: "pass_rate".to_string(),
                current: current_pass_rate,
                baseline: baseline.avg_pass_rate,
                percent_change,
                message: format!(
                    "Pass rate dropped {:.1}% ({:.1}% vs baseline {:.1}%)",
                    (pass_rate_change * 100.0).abs(),
                    current_pass_rate * 100.0,
                    baseline.avg_pass_rate * 100.0
                ),
                timestamp: latest.timestamp,
            });
        }

        alerts
    }

    /// Render the current system health as a multi-line text dashboard:
    /// latest-run status, 10-run baseline, and the alert list.
    #[must_use]
    pub fn generate_dashboard(&self) -> String {
        let baseline = self.calculate_baseline(DEFAULT_BASELINE_RUNS);
        let recent = self.recent_runs(1);
        let alerts = self.check_for_regressions();

        let (Some(baseline), Some(latest)) = (baseline, recent.last()) else {
            return "Insufficient data for dashboard (need at least 3 test runs)".to_string();
        };

        let pass_pct = if latest.total_tests > 0 {
            latest.passed as f64 / latest.total_tests as f64 * 100.0
        } else {
            0.0
        };

        let mut report = format!(
            "Test Metrics Dashboard\n\
             ======================\n\
             \n\
             Latest Run: {}\n\
             Test Suite: {}\n\
             \n\
             Current Status:\n\
             \x20 Tests: {}/{} passed ({pass_pct:.1}%)\n\
             \x20 Duration: {:.1}s\n",
            latest.timestamp.to_rfc3339(),
            latest.test_suite,
            latest.passed,
            latest.total_tests,
            latest.duration / 1000.0,
        );

        if let Some(similarity) = latest.avg_similarity {
            report.push_str(&format!("  Similarity: {similarity:.2}\n"));
        }
        if let Some(latency) = latest.avg_latency {
            report.push_str(&format!("  Latency: {latency:.0}ms\n"));
        }

        report.push_str(&format!(
            "\nBaseline (Last 10 Runs):\n\
             \x20 Avg Pass Rate: {:.1}%\n\
             \x20 Avg Similarity: {:.2}\n\
             \x20 Avg Latency: {:.0}ms\n\
             \x20 Trend: {}\n\
             \nAlerts:\n",
            baseline.avg_pass_rate * 100.0,
            baseline.avg_similarity,
            baseline.avg_latency,
            baseline.trend.as_str(),
        ));

        if alerts.is_empty() {
            report.push_str("  No regressions detected\n");
        } else {
            for alert in &alerts {
                let tag = match alert.severity {
                    AlertSeverity::Critical => "CRITICAL",
                    AlertSeverity::Warning => "WARNING",
                };
                report.push_str(&format!("  [{tag}] {}\n", alert.message));
            }
        }

        report.trim_end().to_string()
    }

    /// Export the latest run in the Prometheus text exposition format, one
    /// gauge per metric labeled with the run's suite:
    /// `llm_tests_total`, `llm_tests_passed`, `llm_similarity_score`,
    /// `llm_latency_ms`.
    ///
    /// Returns an empty string when there is no history.
    ///
    /// # Errors
    ///
    /// Fails only when metric registration or encoding fails, which
    /// indicates a programming error rather than bad data.
    pub fn export_prometheus_metrics(&self) -> Result<String> {
        let recent = self.recent_runs(1);
        let Some(latest) = recent.last() else {
            return Ok(String::new());
        };

        let registry = Registry::new();
        let suite = latest.test_suite.as_str();

        let tests_total = IntGaugeVec::new(
            Opts::new("llm_tests_total", "Total number of tests run"),
            &["suite"],
        )?;
        registry.register(Box::new(tests_total.clone()))?;
        tests_total
            .with_label_values(&[suite])
            .set(latest.total_tests as i64);

        let tests_passed = IntGaugeVec::new(
            Opts::new("llm_tests_passed", "Number of tests passed"),
            &["suite"],
        )?;
        registry.register(Box::new(tests_passed.clone()))?;
        tests_passed
            .with_label_values(&[suite])
            .set(latest.passed as i64);

        if let Some(similarity) = latest.avg_similarity {
            let similarity_score = GaugeVec::new(
                Opts::new("llm_similarity_score", "Average similarity score"),
                &["suite"],
            )?;
            registry.register(Box::new(similarity_score.clone()))?;
            similarity_score.with_label_values(&[suite]).set(similarity);
        }

        if let Some(latency) = latest.avg_latency {
            let latency_ms = GaugeVec::new(
                Opts::new("llm_latency_ms", "Average latency in milliseconds"),
                &["suite"],
            )?;
            registry.register(Box::new(latency_ms.clone()))?;
            latency_ms.with_label_values(&[suite]).set(latency);
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Encoded metrics are not valid UTF-8")
    }

    /// Reset the history log to empty.
    ///
    /// # Errors
    ///
    /// Fails when the history file cannot be written.
    pub fn clear_history(&self) -> Result<()> {
        self.save_history(&[])
    }

    /// Load history from disk. Unreadable, corrupt, or non-array content is
    /// logged and treated as empty history - the next write heals the file.
    fn load_history(&self) -> Vec<TestRunResult> {
        let file = match File::open(&self.history_file) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = ?self.history_file, error = %e, "Failed to open test history");
                return Vec::new();
            }
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(history) => history,
            Err(e) => {
                warn!(
                    path = ?self.history_file,
                    error = %e,
                    "Test history file contains invalid data, treating as empty"
                );
                Vec::new()
            }
        }
    }

    fn save_history(&self, history: &[TestRunResult]) -> Result<()> {
        let file = File::create(&self.history_file).with_context(|| {
            format!("Failed to write history file: {}", self.history_file.display())
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), history)
            .context("Failed to serialize test history")?;
        Ok(())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Trend over the window: split into first/second halves by insertion order
/// and compare mean similarity. Requires [`MIN_RUNS_FOR_TREND`] rows and
/// similarity data in both halves; otherwise the trend is reported stable.
fn calculate_trend(runs: &[TestRunResult]) -> Trend {
    if runs.len() < MIN_RUNS_FOR_TREND {
        return Trend::Stable;
    }

    let mid = runs.len() / 2;
    let first: Vec<f64> = runs[..mid].iter().filter_map(|r| r.avg_similarity).collect();
    let second: Vec<f64> = runs[mid..].iter().filter_map(|r| r.avg_similarity).collect();

    let first_avg = mean(&first);
    let second_avg = mean(&second);

    if first_avg == 0.0 || second_avg == 0.0 {
        return Trend::Stable;
    }

    let change = second_avg - first_avg;

    if change > TREND_CHANGE_THRESHOLD {
        Trend::Improving
    } else if change < -TREND_CHANGE_THRESHOLD {
        Trend::Degrading
    } else {
        Trend::Stable
    }
}
