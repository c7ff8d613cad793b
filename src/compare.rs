//! Comparison orchestration.
//!
//! This module ties the pipeline together: loading a directory, scoring
//! every pair of trees on the worker pool, and summarizing the batch.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

use crate::ast::AstNode;
use crate::loader::{load_asts_from_dir, LoadError};
use crate::models::*;
use crate::normalize::{max_distance, normalized_similarity};
use crate::scheduler::{run_pairwise, ScheduleOutcome};
use crate::ted::tree_edit_distance;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("need at least two AST files for comparison (found {found})")]
    InsufficientInput { found: usize },
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Score two optional trees: edit distance, its upper bound, and similarity.
pub fn compare_trees(a: Option<&AstNode>, b: Option<&AstNode>) -> PairScore {
    let edit_distance = tree_edit_distance(a, b);
    let max_distance = max_distance(a, b);
    PairScore {
        edit_distance,
        max_distance,
        similarity: normalized_similarity(edit_distance, max_distance),
    }
}

/// Score two present trees.
pub fn compare_pair(a: &AstNode, b: &AstNode) -> PairScore {
    compare_trees(Some(a), Some(b))
}

/// Compare every pair of trees in an already loaded batch.
pub fn compare_batch(
    trees: BTreeMap<String, AstNode>,
    params: &ComparisonParams,
    show_progress: bool,
) -> Result<BatchResult, CompareError> {
    compare_batch_with_cancel(trees, params, show_progress, &AtomicBool::new(false))
}

/// Like [`compare_batch`], but stops scheduling new tasks once `cancel` is set.
pub fn compare_batch_with_cancel(
    trees: BTreeMap<String, AstNode>,
    params: &ComparisonParams,
    show_progress: bool,
    cancel: &AtomicBool,
) -> Result<BatchResult, CompareError> {
    let start = Instant::now();

    let (identifiers, trees): (Vec<String>, Vec<Arc<AstNode>>) = trees
        .into_iter()
        .map(|(name, tree)| (name, Arc::new(tree)))
        .unzip();

    let n = trees.len();
    let progress = if show_progress && n >= 2 {
        progress_bar((n * (n - 1) / 2) as u64)
    } else {
        ProgressBar::hidden()
    };

    let outcome = run_pairwise(&trees, params.into(), cancel, &progress, compare_pair)?;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let result = assemble(identifiers, outcome, elapsed_ms);
    info!(
        trees = result.summary.tree_count,
        completed = result.summary.completed,
        failed = result.summary.failed,
        elapsed_ms,
        mean_similarity = result.summary.mean_similarity,
        "batch complete"
    );
    Ok(result)
}

/// Load every AST file in `dir` and compare all pairs.
pub fn compare_directory(
    dir: &Path,
    params: &ComparisonParams,
    show_progress: bool,
) -> Result<BatchResult, CompareError> {
    compare_directory_with_cancel(dir, params, show_progress, &AtomicBool::new(false))
}

pub fn compare_directory_with_cancel(
    dir: &Path,
    params: &ComparisonParams,
    show_progress: bool,
    cancel: &AtomicBool,
) -> Result<BatchResult, CompareError> {
    let loaded = load_asts_from_dir(dir, &params.file_suffix)?;
    info!(
        dir = %dir.display(),
        loaded = loaded.len(),
        skipped = loaded.skipped.len(),
        "loaded AST files"
    );
    if loaded.len() < 2 {
        return Err(CompareError::InsufficientInput {
            found: loaded.len(),
        });
    }

    let mut result = compare_batch_with_cancel(loaded.trees, params, show_progress, cancel)?;
    result.summary.skipped_files = loaded.skipped.len();
    result.skipped = loaded.skipped;
    Ok(result)
}

/// Build the serializable report for a finished batch.
pub fn build_report(result: &BatchResult, params: &ComparisonParams) -> BatchReport {
    BatchReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at: chrono_lite_timestamp(),
        parameters: params.clone(),
        summary: result.summary.clone(),
        identifiers: result.identifiers.clone(),
        results: result.records(),
        failures: result.failure_records(),
        skipped: result.skipped.clone(),
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

fn assemble(identifiers: Vec<String>, outcome: ScheduleOutcome, elapsed_ms: u64) -> BatchResult {
    let tree_count = identifiers.len();
    let completed = outcome.results.len();
    let failed = outcome.failures.len();
    let mean_similarity = if completed == 0 {
        0.0
    } else {
        outcome.results.iter().map(|r| r.similarity).sum::<f64>() / completed as f64
    };

    let mut result = BatchResult {
        identifiers,
        results: outcome.results,
        failures: outcome.failures,
        skipped: Vec::new(),
        similarity: outcome.similarity,
        distance: outcome.distance,
        summary: BatchSummary {
            tree_count,
            task_count: outcome.task_count,
            completed,
            failed,
            skipped_files: 0,
            worker_count: outcome.worker_count,
            elapsed_ms,
            mean_similarity,
            max_similarity: None,
        },
    };

    // First pair in index order wins ties
    let best = result
        .sorted_results()
        .into_iter()
        .fold(None::<ComparisonResult>, |best, r| match best {
            Some(b) if b.similarity >= r.similarity => Some(b),
            _ => Some(r),
        });
    result.summary.max_similarity = best.map(|r| result.record(&r));
    result
}

/// Simple timestamp function without external chrono dependency
fn chrono_lite_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_utc(secs)
}

fn format_utc(secs: u64) -> String {
    let mut days = secs / 86400;
    let secs_today = secs % 86400;

    let mut year = 1970;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let february = if is_leap_year(year) { 29 } else { 28 };
    let month_days = [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 1;
    for len in month_days {
        if days < len {
            break;
        }
        days -= len;
        month += 1;
    }

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        days + 1,
        secs_today / 3600,
        (secs_today % 3600) / 60,
        secs_today % 60
    )
}

fn is_leap_year(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(idents: &[&str]) -> AstNode {
        AstNode::branch(
            "module",
            idents
                .iter()
                .map(|name| AstNode::new("identifier", *name))
                .collect(),
        )
    }

    fn batch(entries: &[(&str, AstNode)]) -> BTreeMap<String, AstNode> {
        entries
            .iter()
            .map(|(name, tree)| (name.to_string(), tree.clone()))
            .collect()
    }

    #[test]
    fn test_compare_identical() {
        let a = module(&["x", "y"]);
        let score = compare_pair(&a, &a.clone());
        assert_eq!(score.edit_distance, 0);
        assert_eq!(score.similarity, 1.0);
    }

    #[test]
    fn test_compare_single_relabel() {
        let score = compare_pair(&AstNode::new("identifier", "x"), &AstNode::new("identifier", "y"));
        assert_eq!(score.edit_distance, 1);
        assert_eq!(score.max_distance, 2);
        assert_eq!(score.similarity, 0.5);
    }

    #[test]
    fn test_compare_absent() {
        let a = module(&["x"]);
        let score = compare_trees(Some(&a), None);
        assert_eq!(score.edit_distance, 2);
        assert_eq!(score.similarity, 0.0);
        assert_eq!(compare_trees(None, None).similarity, 1.0);
    }

    #[test]
    fn test_compare_batch() {
        let trees = batch(&[
            ("c.ast.json", module(&["x", "y"])),
            ("a.ast.json", module(&["x"])),
            ("b.ast.json", module(&["x"])),
        ]);
        let params = ComparisonParams {
            workers: Some(2),
            ..Default::default()
        };
        let result = compare_batch(trees, &params, false).unwrap();

        assert_eq!(result.identifiers, vec!["a.ast.json", "b.ast.json", "c.ast.json"]);
        assert_eq!(result.summary.tree_count, 3);
        assert_eq!(result.summary.task_count, 3);
        assert_eq!(result.summary.completed, 3);
        assert!(result.summary.is_complete());

        assert_eq!(result.similarity.get(0, 1), 1.0);
        assert_eq!(result.distance.get(0, 2), 1);

        let best = result.summary.max_similarity.unwrap();
        assert_eq!((best.file1.as_str(), best.file2.as_str()), ("a.ast.json", "b.ast.json"));
    }

    #[test]
    fn test_mean_similarity() {
        let trees = batch(&[("a", module(&["x"])), ("b", module(&["x"]))]);
        let result = compare_batch(trees, &ComparisonParams::default(), false).unwrap();
        assert_eq!(result.summary.mean_similarity, 1.0);
    }

    #[test]
    fn test_insufficient_input() {
        let trees = batch(&[("only", module(&["x"]))]);
        let err = compare_batch(trees, &ComparisonParams::default(), false).unwrap_err();
        assert!(matches!(err, CompareError::InsufficientInput { found: 1 }));

        let err = compare_batch(BTreeMap::new(), &ComparisonParams::default(), false).unwrap_err();
        assert!(matches!(err, CompareError::InsufficientInput { found: 0 }));
    }

    #[test]
    fn test_build_report() {
        let trees = batch(&[("a", module(&["x"])), ("b", module(&["y"]))]);
        let params = ComparisonParams::default();
        let result = compare_batch(trees, &params, false).unwrap();
        let report = build_report(&result, &params);

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].file1, "a");
        assert_eq!(report.results[0].file2, "b");
        assert_eq!(report.results[0].edit_distance, 1);
        assert!(report.failures.is_empty());
        assert!(report.generated_at.ends_with('Z'));
    }

    #[test]
    fn test_format_utc() {
        assert_eq!(format_utc(0), "1970-01-01T00:00:00Z");
        // 2024-02-29 12:34:56 UTC
        assert_eq!(format_utc(1_709_210_096), "2024-02-29T12:34:56Z");
    }

    #[test]
    fn test_is_leap_year() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
    }
}
