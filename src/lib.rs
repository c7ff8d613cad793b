//! AST Similarity Library
//!
//! Structural comparison of parsed source submissions. Every pair of trees
//! is scored with the Zhang–Shasha tree edit distance under unit costs,
//! normalized to a similarity in `[0, 1]`, and collected into symmetric
//! matrices. Pairs are scored in parallel on a fixed worker pool.
//!
//! # Example
//!
//! ```no_run
//! use ast_similarity::prelude::*;
//! use std::path::Path;
//!
//! let params = ComparisonParams::default();
//! let result = compare_directory(Path::new("submissions"), &params, false).unwrap();
//!
//! for record in result.records() {
//!     println!("{} vs {}: {:.3}", record.file1, record.file2, record.similarity);
//! }
//! ```
//!
//! # Comparing Two Trees
//!
//! ```
//! use ast_similarity::prelude::*;
//!
//! let a = AstNode::new("identifier", "x");
//! let b = AstNode::new("identifier", "y");
//!
//! let score = compare_pair(&a, &b);
//! assert_eq!(score.edit_distance, 1);
//! assert_eq!(score.similarity, 0.5);
//!
//! assert!(!are_equivalent(Some(&a), Some(&b), false));
//! assert!(are_equivalent(Some(&a), Some(&b), true));
//! ```

pub mod ast;
pub mod compare;
pub mod cost;
pub mod db;
pub mod equivalence;
pub mod loader;
pub mod matrix;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod output;
pub mod scheduler;
pub mod ted;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::ast::{count_nodes, AstNode, Position};
    pub use crate::compare::{
        build_report, compare_batch, compare_batch_with_cancel, compare_directory,
        compare_directory_with_cancel, compare_pair, compare_trees, CompareError,
    };
    pub use crate::cost::{is_leaf_comparable, node_cost};
    pub use crate::db::{list_runs, load_run_matrix, load_run_results, save_run, DbError};
    pub use crate::equivalence::{are_equivalent, are_equivalent_with, EquivalenceOptions};
    pub use crate::loader::{load_ast_file, load_asts_from_dir, parse_ast, LoadError, LoadedBatch};
    pub use crate::matrix::{DistanceMatrix, SimilarityMatrix, SymmetricMatrix};
    pub use crate::metrics::{compute_batch_metrics, compute_metrics, TreeMetrics};
    pub use crate::models::{
        BatchReport, BatchResult, BatchSummary, ComparisonParams, ComparisonResult,
        ComparisonTask, FailureKind, FailureRecord, PairRecord, PairScore, RunInfo, SkippedFile,
        TaskFailure,
    };
    pub use crate::normalize::{max_distance, normalized_similarity};
    pub use crate::output::{
        format_result, print_failures, print_results, print_runs, print_summary, write_csv,
        write_csv_file, write_json, write_json_file, write_matrix_csv, write_matrix_csv_file,
        OutputError,
    };
    pub use crate::scheduler::{run_pairwise, NoProgress, ProgressSink, SchedulerConfig};
    pub use crate::ted::{tree_edit_distance, zhang_shasha, PostOrderIndex};
}

// Re-export commonly used types at the crate root
pub use ast::AstNode;
pub use models::{BatchResult, ComparisonParams, ComparisonResult, PairScore};
