//! Golden dataset - curated reference cases for evaluation.
//!
//! A golden dataset is a set of human-validated test cases: an input
//! transcript, a human-written reference summary, and quality thresholds.
//! It is used for regression testing, benchmark evaluation, and baseline
//! establishment.
//!
//! On disk a dataset is a directory with an `index.json` catalog plus one
//! JSON file per case. [`GoldenDatasetLoader`] reads index-backed datasets;
//! [`GoldenDatasetLoader::discover`] scans a directory for case files when
//! no index exists.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Quality thresholds attached to a golden case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseThresholds {
    /// Minimum composite similarity for a pass (typically 0.80+)
    pub min_similarity: f64,

    /// Minimum summary word count (inclusive)
    pub min_words: usize,

    /// Maximum summary word count (inclusive)
    pub max_words: usize,

    /// Terms that must appear in the summary
    #[serde(default)]
    pub required_terms: Vec<String>,
}

/// A single golden test case. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenTestCase {
    /// Unique identifier (e.g. "call_001")
    pub id: String,

    /// Scenario category (e.g. "password_reset")
    pub category: String,

    /// Complexity level ("easy", "medium", "hard")
    pub difficulty: String,

    /// Full input transcript fed to the generator
    pub transcript: String,

    /// Human-written reference summary
    pub golden_summary: String,

    /// Additional context (sentiment, resolution, key points)
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Quality criteria for this case
    pub thresholds: CaseThresholds,
}

/// One entry in the dataset index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,

    /// Case filename, relative to the dataset directory
    pub file: String,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub difficulty: Option<String>,
}

/// The `index.json` catalog of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetIndex {
    pub dataset_version: String,
    pub last_updated: String,
    pub total_cases: usize,
    pub categories: HashMap<String, usize>,
    pub difficulty_distribution: HashMap<String, usize>,
    pub test_cases: Vec<IndexEntry>,
}

/// Loads and filters golden test cases from a dataset directory.
pub struct GoldenDatasetLoader {
    dataset_path: PathBuf,
}

impl GoldenDatasetLoader {
    /// Create a loader rooted at the given dataset directory.
    pub fn new(dataset_path: impl AsRef<Path>) -> Self {
        Self {
            dataset_path: dataset_path.as_ref().to_path_buf(),
        }
    }

    /// Load the `index.json` catalog.
    ///
    /// # Errors
    ///
    /// Fails when the index is missing or not valid JSON.
    pub fn load_index(&self) -> Result<DatasetIndex> {
        let index_path = self.dataset_path.join("index.json");
        let content = std::fs::read_to_string(&index_path)
            .with_context(|| format!("Failed to read dataset index: {}", index_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse dataset index: {}", index_path.display()))
    }

    /// Load a single case by id, via the index.
    ///
    /// # Errors
    ///
    /// Fails when the id is not in the index or the case file is missing or
    /// malformed.
    pub fn load_case(&self, case_id: &str) -> Result<GoldenTestCase> {
        let index = self.load_index()?;
        let entry = index
            .test_cases
            .iter()
            .find(|tc| tc.id == case_id)
            .with_context(|| format!("Test case {case_id} not found in index"))?;

        self.load_case_file(&self.dataset_path.join(&entry.file))
    }

    /// Load every case listed in the index.
    pub fn load_all_cases(&self) -> Result<Vec<GoldenTestCase>> {
        let index = self.load_index()?;
        index
            .test_cases
            .iter()
            .map(|entry| self.load_case_file(&self.dataset_path.join(&entry.file)))
            .collect()
    }

    /// Load every case in a category (e.g. "password_reset").
    pub fn load_by_category(&self, category: &str) -> Result<Vec<GoldenTestCase>> {
        Ok(self
            .load_all_cases()?
            .into_iter()
            .filter(|c| c.category == category)
            .collect())
    }

    /// Load every case at a difficulty level ("easy", "medium", "hard").
    pub fn load_by_difficulty(&self, difficulty: &str) -> Result<Vec<GoldenTestCase>> {
        Ok(self
            .load_all_cases()?
            .into_iter()
            .filter(|c| c.difficulty == difficulty)
            .collect())
    }

    /// Discover cases by scanning a directory for `*.json` case files,
    /// for datasets without an index. Recurses into subdirectories and
    /// returns cases sorted by id.
    ///
    /// # Errors
    ///
    /// Fails when the directory does not exist, a case file is malformed,
    /// or no case files are found.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Vec<GoldenTestCase>> {
        let dir = dir.as_ref();

        if !dir.is_dir() {
            anyhow::bail!("Golden dataset directory does not exist: {}", dir.display());
        }

        let mut cases = Vec::new();

        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            let path = entry.path();

            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            // An index catalog is not a case file
            if path.file_name().and_then(|s| s.to_str()) == Some("index.json") {
                continue;
            }

            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            let case: GoldenTestCase = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse test case: {}", path.display()))?;
            cases.push(case);
        }

        if cases.is_empty() {
            anyhow::bail!("No test case files found in directory: {}", dir.display());
        }

        cases.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(cases)
    }

    fn load_case_file(&self, path: &Path) -> Result<GoldenTestCase> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read test case file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse test case: {}", path.display()))
    }
}
