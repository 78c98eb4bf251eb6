//! # evalguard
//!
//! Evaluation and regression monitoring for LLM outputs.
//!
//! Generators are non-deterministic, so quality cannot be checked by exact
//! string matching. This crate evaluates generated text probabilistically
//! and watches the results over time:
//!
//! - **[`similarity`]** - lexical similarity and precision metrics
//!   (cosine, Jaccard, overlap, composite, n-gram precision, simplified
//!   BLEU, required-term coverage, length validation)
//! - **[`security`]** - rule-table-driven scanning of inputs and outputs
//!   for prompt injection, jailbreaks, PII leakage, and oversized payloads,
//!   with a capped 0-100 risk score
//! - **[`performance`]** - per-request latency/token/cost tracking with
//!   percentile reports, throughput, and SLO checks
//! - **[`evaluator`]** - pass/fail verdicts for summaries against golden
//!   test cases, plus consistency measurement across repeated generations
//! - **[`golden_dataset`]** - loading and filtering of curated reference
//!   cases with quality thresholds
//! - **[`aggregator`]** - bounded run history, rolling baselines, trend
//!   analysis, and regression alerts with severity tiers
//!
//! Scoring flows one way: raw text and latency samples feed the stateless
//! scoring modules, the evaluator folds per-case scores into verdicts, and
//! the aggregator compares run-level summaries across time.
//!
//! Failed evaluations, detected violations, breached SLOs, and regression
//! alerts are all *results*, returned as structured data. Errors are
//! reserved for broken contracts: malformed thresholds, unknown request
//! ids, reports over empty or in-flight data.
//!
//! # Example
//!
//! ```
//! use evalguard::evaluator::SummaryEvaluator;
//! use evalguard::golden_dataset::{CaseThresholds, GoldenTestCase};
//!
//! # fn main() -> anyhow::Result<()> {
//! let case = GoldenTestCase {
//!     id: "call_001".to_string(),
//!     category: "password_reset".to_string(),
//!     difficulty: "easy".to_string(),
//!     transcript: "Customer: I'm locked out...".to_string(),
//!     golden_summary: "Customer was locked out and the password was reset".to_string(),
//!     metadata: serde_json::Value::Null,
//!     thresholds: CaseThresholds {
//!         min_similarity: 0.8,
//!         min_words: 5,
//!         max_words: 50,
//!         required_terms: vec!["password".to_string()],
//!     },
//! };
//!
//! let evaluator = SummaryEvaluator::new();
//! let result = evaluator.evaluate("Customer was locked out and the password was reset", &case)?;
//! assert!(result.passed);
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod evaluator;
pub mod golden_dataset;
pub mod performance;
pub mod security;
pub mod similarity;

pub use aggregator::{
    AggregatedMetrics, AlertSeverity, AlertThresholds, MetricsAggregator, RegressionAlert,
    TestRunResult, Trend,
};
pub use evaluator::{ConsistencyReport, EvaluationResult, SummaryEvaluator};
pub use golden_dataset::{CaseThresholds, GoldenDatasetLoader, GoldenTestCase};
pub use performance::{
    PerformanceCollector, PerformanceMetric, PerformanceReport, PerformanceSLO, RequestHandle,
    SLOResult, TokenUsage,
};
pub use security::{
    SecurityDetectionResult, SecurityDetector, SecurityViolation, Severity, SurfaceLocation,
    ViolationType,
};
pub use similarity::{
    bleu_score, composite_similarity, contains_required_terms, cosine_similarity,
    jaccard_similarity, ngram_precision, overlap_coefficient, validate_length, LengthCheck,
    TermCoverage,
};
