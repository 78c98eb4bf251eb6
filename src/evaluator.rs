//! Summary evaluation against golden test cases.
//!
//! The evaluator is pure orchestration over the similarity metrics: it runs
//! composite similarity, BLEU, length validation, and required-term coverage
//! against one [`GoldenTestCase`] and folds the outcomes into a single
//! pass/fail verdict with itemized failure reasons. A failed evaluation is a
//! result, not an error.
//!
//! Because generators are non-deterministic, [`SummaryEvaluator::evaluate_consistency`]
//! additionally measures variance across repeated generations from the same
//! input.

use crate::golden_dataset::GoldenTestCase;
use crate::similarity::{
    bleu_score, composite_similarity, contains_required_terms, validate_length, LengthCheck,
    TermCoverage,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Structured verdict from evaluating one summary against one golden case.
///
/// `passed` is true exactly when `failures` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Overall pass/fail
    pub passed: bool,

    /// Composite similarity against the reference (the primary gate)
    pub similarity: f64,

    /// Simplified BLEU score; informational, no threshold
    pub bleu: f64,

    /// Word-count validation outcome
    pub length_check: LengthCheck,

    /// Required-term coverage outcome
    pub required_terms: TermCoverage,

    /// One message per failed sub-check
    pub failures: Vec<String>,
}

/// Consistency statistics over repeated generations from the same input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Mean pairwise composite similarity (higher = more consistent)
    pub mean_similarity: f64,

    /// Population standard deviation of the pairwise similarities
    pub std_deviation: f64,

    /// Largest absolute deviation from the mean (worst-case inconsistency)
    pub max_variance: f64,
}

/// Evaluates generated summaries against golden test cases.
#[derive(Debug, Default)]
pub struct SummaryEvaluator;

impl SummaryEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a summary against a golden case.
    ///
    /// Pass criteria (all must hold):
    /// - composite similarity >= `thresholds.min_similarity`
    /// - word count within `[min_words, max_words]`
    /// - every required term present
    ///
    /// BLEU is computed for reference but carries no threshold.
    ///
    /// # Errors
    ///
    /// Returns an error only for malformed case thresholds
    /// (`min_words > max_words`); a summary that fails the checks is a
    /// normal [`EvaluationResult`] with `passed == false`.
    pub fn evaluate(&self, summary: &str, case: &GoldenTestCase) -> Result<EvaluationResult> {
        let mut failures = Vec::new();

        // Composite similarity is the primary quality indicator
        let similarity = composite_similarity(summary, &case.golden_summary);
        if similarity < case.thresholds.min_similarity {
            failures.push(format!(
                "Similarity {similarity:.2} below threshold {:.2}",
                case.thresholds.min_similarity
            ));
        }

        let bleu = bleu_score(&case.golden_summary, summary);

        let length_check =
            validate_length(summary, case.thresholds.min_words, case.thresholds.max_words)?;
        if !length_check.passed {
            failures.push(format!(
                "Length {} words outside range [{}, {}]",
                length_check.word_count, case.thresholds.min_words, case.thresholds.max_words
            ));
        }

        let required_terms = contains_required_terms(summary, &case.thresholds.required_terms);
        if !required_terms.passed {
            failures.push(format!(
                "Missing required terms: {}",
                required_terms.missing.join(", ")
            ));
        }

        Ok(EvaluationResult {
            passed: failures.is_empty(),
            similarity,
            bleu,
            length_check,
            required_terms,
            failures,
        })
    }

    /// Measure output stability across repeated generations.
    ///
    /// Computes composite similarity over every unordered pair of summaries
    /// and reports the mean, the population standard deviation (the pairs
    /// are a complete census of the provided samples, not a sample from a
    /// larger population), and the maximum absolute deviation from the mean.
    ///
    /// Fewer than two summaries short-circuits to a trivially consistent
    /// result.
    #[must_use]
    pub fn evaluate_consistency(&self, summaries: &[String]) -> ConsistencyReport {
        if summaries.len() < 2 {
            return ConsistencyReport {
                mean_similarity: 1.0,
                std_deviation: 0.0,
                max_variance: 0.0,
            };
        }

        // n summaries -> n*(n-1)/2 comparisons
        let mut similarities = Vec::new();
        for i in 0..summaries.len() {
            for j in (i + 1)..summaries.len() {
                similarities.push(composite_similarity(&summaries[i], &summaries[j]));
            }
        }

        let mean = similarities.iter().sum::<f64>() / similarities.len() as f64;
        let variance = similarities
            .iter()
            .map(|s| (s - mean) * (s - mean))
            .sum::<f64>()
            / similarities.len() as f64;
        let max_variance = similarities
            .iter()
            .map(|s| (s - mean).abs())
            .fold(0.0_f64, f64::max);

        ConsistencyReport {
            mean_similarity: mean,
            std_deviation: variance.sqrt(),
            max_variance,
        }
    }

    /// Render a detailed evaluation report as a fixed-format text block:
    /// case header, pass/fail banner, metric lines, failure list, and the
    /// reference and generated texts side by side.
    ///
    /// # Errors
    ///
    /// Same conditions as [`evaluate`](Self::evaluate).
    pub fn generate_report(&self, summary: &str, case: &GoldenTestCase) -> Result<String> {
        let result = self.evaluate(summary, case)?;

        let mut report = format!("Evaluation Report for {}\n", case.id);
        report.push_str(&"=".repeat(50));
        report.push_str("\n\n");

        report.push_str(&format!("Test Case: {} ({})\n", case.category, case.difficulty));
        report.push_str(&format!(
            "Status: {}\n\n",
            if result.passed { "PASSED" } else { "FAILED" }
        ));

        report.push_str("Metrics:\n");
        report.push_str(&format!(
            "  Similarity: {:.3} (threshold: {})\n",
            result.similarity, case.thresholds.min_similarity
        ));
        report.push_str(&format!("  BLEU Score: {:.3}\n", result.bleu));
        report.push_str(&format!(
            "  Word Count: {} (range: [{}, {}])\n",
            result.length_check.word_count, case.thresholds.min_words, case.thresholds.max_words
        ));
        report.push_str(&format!(
            "  Required Terms Coverage: {:.0}%\n",
            result.required_terms.coverage * 100.0
        ));

        if !result.failures.is_empty() {
            report.push_str("\nFailures:\n");
            for (i, failure) in result.failures.iter().enumerate() {
                report.push_str(&format!("  {}. {failure}\n", i + 1));
            }
        }

        report.push_str("\nReference Summary:\n");
        report.push_str(&format!("\"{}\"\n\n", case.golden_summary));
        report.push_str("Generated Summary:\n");
        report.push_str(&format!("\"{summary}\"\n"));

        Ok(report)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::golden_dataset::CaseThresholds;

    fn sample_case() -> GoldenTestCase {
        GoldenTestCase {
            id: "call_001".to_string(),
            category: "password_reset".to_string(),
            difficulty: "easy".to_string(),
            transcript: "Agent: Hello. Customer: I cannot log in. Agent: I reset your password."
                .to_string(),
            golden_summary:
                "Customer was locked out of their account and the agent reset the password to resolve the issue"
                    .to_string(),
            metadata: serde_json::Value::Null,
            thresholds: CaseThresholds {
                min_similarity: 0.8,
                min_words: 5,
                max_words: 50,
                required_terms: vec!["password".to_string(), "reset".to_string()],
            },
        }
    }

    #[test]
    fn test_evaluate_perfect_match() {
        let evaluator = SummaryEvaluator::new();
        let case = sample_case();
        let summary = case.golden_summary.clone();

        let result = evaluator.evaluate(&summary, &case).unwrap();
        assert!(result.passed);
        assert!(result.failures.is_empty());
        assert!(result.similarity > 0.99);
        assert!(result.bleu > 0.99);
        assert!(result.length_check.passed);
        assert!(result.required_terms.passed);
    }

    #[test]
    fn test_evaluate_low_similarity() {
        let evaluator = SummaryEvaluator::new();
        let case = sample_case();

        let result = evaluator
            .evaluate("The password reset weather was sunny and warm today overall", &case)
            .unwrap();
        assert!(!result.passed);
        assert!(result.failures.iter().any(|f| f.contains("Similarity")));
    }

    #[test]
    fn test_evaluate_missing_required_terms() {
        let evaluator = SummaryEvaluator::new();
        let case = sample_case();

        let result = evaluator
            .evaluate(
                "Customer was locked out of their account and the agent restored access to resolve the issue",
                &case,
            )
            .unwrap();
        assert!(!result.passed);
        let failure = result
            .failures
            .iter()
            .find(|f| f.contains("Missing required terms"))
            .expect("missing-terms failure");
        assert!(failure.contains("password"));
        assert!(failure.contains("reset"));
        assert!(!result.required_terms.passed);
    }

    #[test]
    fn test_evaluate_too_short() {
        let evaluator = SummaryEvaluator::new();
        let case = sample_case();

        let result = evaluator.evaluate("Password reset", &case).unwrap();
        assert!(!result.passed);
        assert!(result.failures.iter().any(|f| f.contains("outside range")));
        assert_eq!(result.length_check.word_count, 2);
    }

    #[test]
    fn test_evaluate_too_long() {
        let evaluator = SummaryEvaluator::new();
        let mut case = sample_case();
        case.thresholds.max_words = 8;

        let result = evaluator
            .evaluate(
                "Customer was locked out of the account and the agent reset the password",
                &case,
            )
            .unwrap();
        assert!(result.failures.iter().any(|f| f.contains("outside range")));
    }

    #[test]
    fn test_evaluate_multiple_failures() {
        let evaluator = SummaryEvaluator::new();
        let case = sample_case();

        // Too short, off-topic, missing terms: three independent failures
        let result = evaluator.evaluate("Sunny", &case).unwrap();
        assert!(!result.passed);
        assert_eq!(result.failures.len(), 3);
    }

    #[test]
    fn test_passed_iff_no_failures() {
        let evaluator = SummaryEvaluator::new();
        let case = sample_case();

        for summary in [
            case.golden_summary.as_str(),
            "Sunny",
            "Customer was locked out and the password was reset",
        ] {
            let result = evaluator.evaluate(summary, &case).unwrap();
            assert_eq!(result.passed, result.failures.is_empty());
        }
    }

    #[test]
    fn test_malformed_thresholds_propagate() {
        let evaluator = SummaryEvaluator::new();
        let mut case = sample_case();
        case.thresholds.min_words = 100;
        case.thresholds.max_words = 10;

        assert!(evaluator.evaluate("anything", &case).is_err());
    }

    #[test]
    fn test_consistency_identical_summaries() {
        let evaluator = SummaryEvaluator::new();
        let summaries = vec![
            "Customer reset password successfully".to_string(),
            "Customer reset password successfully".to_string(),
            "Customer reset password successfully".to_string(),
        ];

        let report = evaluator.evaluate_consistency(&summaries);
        assert!((report.mean_similarity - 1.0).abs() < 1e-9);
        assert!(report.std_deviation < 1e-9);
        assert!(report.max_variance < 1e-9);
    }

    #[test]
    fn test_consistency_divergent_summaries() {
        let evaluator = SummaryEvaluator::new();
        let summaries = vec![
            "Customer reset password successfully".to_string(),
            "The quarterly revenue projections exceeded expectations".to_string(),
        ];

        let report = evaluator.evaluate_consistency(&summaries);
        assert!(report.mean_similarity < 0.2);
    }

    #[test]
    fn test_consistency_fewer_than_two() {
        let evaluator = SummaryEvaluator::new();

        for summaries in [vec![], vec!["only one".to_string()]] {
            let report = evaluator.evaluate_consistency(&summaries);
            assert_eq!(report.mean_similarity, 1.0);
            assert_eq!(report.std_deviation, 0.0);
            assert_eq!(report.max_variance, 0.0);
        }
    }

    #[test]
    fn test_generate_report_contents() {
        let evaluator = SummaryEvaluator::new();
        let case = sample_case();
        let summary = case.golden_summary.clone();

        let report = evaluator.generate_report(&summary, &case).unwrap();
        assert!(report.starts_with("Evaluation Report for call_001"));
        assert!(report.contains("Test Case: password_reset (easy)"));
        assert!(report.contains("Status: PASSED"));
        assert!(report.contains("Similarity:"));
        assert!(report.contains("BLEU Score:"));
        assert!(report.contains("Reference Summary:"));
        assert!(report.contains("Generated Summary:"));
        assert!(!report.contains("Failures:"));
    }

    #[test]
    fn test_generate_report_failed_lists_failures() {
        let evaluator = SummaryEvaluator::new();
        let case = sample_case();

        let report = evaluator.generate_report("Sunny", &case).unwrap();
        assert!(report.contains("Status: FAILED"));
        assert!(report.contains("Failures:"));
        assert!(report.contains("  1. "));
    }
}
