//! Data structures for the AST similarity pipeline.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::ast::AstNode;
use crate::matrix::{DistanceMatrix, SimilarityMatrix};

/// One unordered pair of trees to compare, `index_i < index_j`.
#[derive(Debug, Clone)]
pub struct ComparisonTask {
    pub index_i: usize,
    pub index_j: usize,
    pub tree_i: Arc<AstNode>,
    pub tree_j: Arc<AstNode>,
}

/// Distance and similarity for one pair of trees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub edit_distance: usize,
    pub max_distance: usize,
    pub similarity: f64,
}

/// Score for one task, addressed by matrix indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub index_i: usize,
    pub index_j: usize,
    pub edit_distance: usize,
    pub similarity: f64,
}

/// Flat result record addressed by submission identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRecord {
    pub file1: String,
    pub file2: String,
    #[serde(rename = "editDistance")]
    pub edit_distance: usize,
    pub similarity: f64,
}

/// Why a task produced no score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The comparison itself panicked.
    Panicked,
    /// The worker running (or due to run) the task exited without reporting.
    WorkerLost,
    /// The batch was cancelled before the task was picked up.
    Cancelled,
}

/// A task that did not produce a score. Its matrix cells keep the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub index_i: usize,
    pub index_j: usize,
    pub kind: FailureKind,
    pub message: String,
}

/// Failure record addressed by submission identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub file1: String,
    pub file2: String,
    pub kind: FailureKind,
    pub message: String,
}

/// A file that could not be turned into a tree and was left out of the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// Comparison parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonParams {
    pub workers: Option<usize>,  // Worker override, capped at the task count
    pub progress_every: usize,   // Progress refresh interval in completed tasks
    pub file_suffix: String,     // Input files must end with this suffix
    pub ignore_variable_names: bool, // Name-blind equivalence checks
}

impl Default for ComparisonParams {
    fn default() -> Self {
        Self {
            workers: None,
            progress_every: 10,
            file_suffix: ".ast.json".to_string(),
            ignore_variable_names: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub tree_count: usize,
    pub task_count: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped_files: usize,
    pub worker_count: usize,
    pub elapsed_ms: u64,
    pub mean_similarity: f64,
    pub max_similarity: Option<PairRecord>,
}

impl BatchSummary {
    /// True when every scheduled task produced a score.
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.completed == self.task_count
    }
}

/// Everything one batch run produces.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Sorted submission identifiers; position = matrix row/column.
    pub identifiers: Vec<String>,
    /// Successful comparisons in completion order.
    pub results: Vec<ComparisonResult>,
    pub failures: Vec<TaskFailure>,
    pub skipped: Vec<SkippedFile>,
    pub similarity: SimilarityMatrix,
    pub distance: DistanceMatrix,
    pub summary: BatchSummary,
}

impl BatchResult {
    /// Results ordered by `(index_i, index_j)`.
    pub fn sorted_results(&self) -> Vec<ComparisonResult> {
        let mut sorted = self.results.clone();
        sorted.sort_by_key(|r| (r.index_i, r.index_j));
        sorted
    }

    /// Flat `{file1, file2, editDistance, similarity}` list in completion order.
    pub fn records(&self) -> Vec<PairRecord> {
        self.results.iter().map(|r| self.record(r)).collect()
    }

    pub fn record(&self, result: &ComparisonResult) -> PairRecord {
        PairRecord {
            file1: self.identifiers[result.index_i].clone(),
            file2: self.identifiers[result.index_j].clone(),
            edit_distance: result.edit_distance,
            similarity: result.similarity,
        }
    }

    pub fn failure_records(&self) -> Vec<FailureRecord> {
        self.failures
            .iter()
            .map(|f| FailureRecord {
                file1: self.identifiers[f.index_i].clone(),
                file2: self.identifiers[f.index_j].clone(),
                kind: f.kind,
                message: f.message.clone(),
            })
            .collect()
    }
}

/// Serializable report of one batch run
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchReport {
    pub version: String,
    pub generated_at: String,
    pub parameters: ComparisonParams,
    pub summary: BatchSummary,
    pub identifiers: Vec<String>,
    pub results: Vec<PairRecord>,
    pub failures: Vec<FailureRecord>,
    pub skipped: Vec<SkippedFile>,
}

/// Stored run metadata
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub run_id: String,
    pub run_hash: String,
    pub name: Option<String>,
    pub timestamp: i64,
    pub tree_count: usize,
    pub pair_count: usize,
}
