//! AST Similarity Pipeline
//!
//! Pairwise structural comparison of parsed source submissions using
//! tree edit distance.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod ast;
mod compare;
mod cost;
mod db;
mod equivalence;
mod loader;
mod matrix;
mod metrics;
mod models;
mod normalize;
mod output;
mod scheduler;
mod ted;

use ast::AstNode;
use compare::CompareError;
use equivalence::EquivalenceOptions;
use models::ComparisonParams;
use output::{
    print_failures, print_results, print_runs, print_summary, write_csv_file, write_json_file,
    write_matrix_csv, write_matrix_csv_file,
};

#[derive(Parser)]
#[command(name = "ast-similarity")]
#[command(about = "Pairwise structural similarity of parsed source files")]
#[command(version)]
struct Cli {
    /// Suppress logging and progress output
    #[arg(long, global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for comparison results
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Full JSON report with summary, results and failures
    Json,
    /// Flat CSV of pair results
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare every pair of AST files in a directory
    ///
    /// Tunables default to ComparisonParams::default(); override any of them explicitly.
    Compare {
        /// Directory holding the *.ast.json files
        #[arg(long)]
        dir: PathBuf,

        /// Output file path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Also write the N x N similarity matrix as CSV
        #[arg(long)]
        matrix: Option<PathBuf>,

        /// Worker threads [default: available parallelism]
        #[arg(long)]
        workers: Option<usize>,

        /// Progress refresh interval in completed tasks [default: 10]
        #[arg(long)]
        progress_every: Option<usize>,

        /// Input file suffix [default: .ast.json]
        #[arg(long)]
        suffix: Option<String>,

        /// Store the run in this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,

        /// Name for the stored run
        #[arg(long, requires = "db")]
        run_name: Option<String>,

        /// Print the N most similar pairs
        #[arg(long)]
        show_results: Option<usize>,
    },

    /// Check two AST files for equivalence
    Equiv {
        /// First AST file
        a: PathBuf,

        /// Second AST file
        b: PathBuf,

        /// Treat all identifiers as equal
        #[arg(long)]
        ignore_names: bool,
    },

    /// Show structural metrics for every AST file in a directory
    Stats {
        /// Directory holding the *.ast.json files
        #[arg(long)]
        dir: PathBuf,

        /// Input file suffix [default: .ast.json]
        #[arg(long)]
        suffix: Option<String>,
    },

    /// Show structural metrics for one AST file
    Info {
        /// AST file
        file: PathBuf,
    },

    /// List stored runs
    Runs {
        /// Path to the runs database
        #[arg(long)]
        db: PathBuf,
    },

    /// Export the similarity matrix of a stored run as CSV
    Matrix {
        /// Path to the runs database
        #[arg(long)]
        db: PathBuf,

        /// Run ID
        #[arg(long)]
        run: String,

        /// Output file (stdout if omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Benchmark tree edit distance performance
    Benchmark {
        /// Number of distance computations per scenario
        #[arg(long, default_value = "100")]
        iterations: usize,

        /// Nodes per tree
        #[arg(long, default_value = "200")]
        size: usize,
    },
}

fn init_logging(quiet: bool, debug: bool) {
    let level = if quiet {
        LevelFilter::OFF
    } else if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    // RUST_LOG wins over the flags when set
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.debug);
    let quiet = cli.quiet;

    match cli.command {
        Commands::Compare {
            dir,
            output,
            format,
            matrix,
            workers,
            progress_every,
            suffix,
            db,
            run_name,
            show_results,
        } => {
            let defaults = ComparisonParams::default();
            let params = ComparisonParams {
                workers: workers.or(defaults.workers),
                progress_every: progress_every.unwrap_or(defaults.progress_every),
                file_suffix: suffix.unwrap_or(defaults.file_suffix),
                ignore_variable_names: defaults.ignore_variable_names,
            };

            let cancel = Arc::new(AtomicBool::new(false));
            for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
                signal_hook::flag::register(signal, Arc::clone(&cancel))?;
            }

            let result =
                match compare::compare_directory_with_cancel(&dir, &params, !quiet, &cancel) {
                    Ok(result) => result,
                    Err(CompareError::InsufficientInput { found }) => {
                        debug!(found, "not enough input trees");
                        eprintln!("Need at least two AST files for comparison.");
                        std::process::exit(1);
                    }
                    Err(e) => return Err(e.into()),
                };

            if cancel.load(Ordering::SeqCst) {
                warn!("comparison interrupted; results are partial");
            }

            if let Some(path) = &output {
                match format {
                    OutputFormat::Json => {
                        let report = compare::build_report(&result, &params);
                        write_json_file(&report, path)?;
                    }
                    OutputFormat::Csv => write_csv_file(&result.records(), path)?,
                }
                if !quiet {
                    eprintln!("Output: {}", path.display());
                }
            }

            if let Some(path) = &matrix {
                write_matrix_csv_file(&result.identifiers, &result.similarity, path)?;
                if !quiet {
                    eprintln!("Matrix output: {}", path.display());
                }
            }

            if let Some(db_path) = &db {
                let run_id = db::save_run(db_path, run_name.as_deref(), &params, &result)?;
                if !quiet {
                    eprintln!("Stored run: {}", run_id);
                }
            }

            if !quiet {
                print_summary(&result);
                print_failures(&result);
            }

            if let Some(limit) = show_results {
                println!("\n=== Most Similar Pairs ===");
                print_results(&result.records(), Some(limit));
            }
        }

        Commands::Equiv { a, b, ignore_names } => {
            let defaults = ComparisonParams::default();
            let params = ComparisonParams {
                ignore_variable_names: ignore_names || defaults.ignore_variable_names,
                ..defaults
            };
            let opts = EquivalenceOptions::from(&params);

            let tree_a = loader::load_ast_file(&a)?;
            let tree_b = loader::load_ast_file(&b)?;

            let equivalent = equivalence::are_equivalent_with(Some(&tree_a), Some(&tree_b), opts);
            let score = compare::compare_pair(&tree_a, &tree_b);

            println!("=== Equivalence ===");
            println!("A: {}", a.display());
            println!("B: {}", b.display());
            println!("Ignore names: {}", opts.ignore_variable_names);
            println!("Equivalent: {}", if equivalent { "yes" } else { "no" });
            println!("Tree edit distance: {}", score.edit_distance);
            println!("Similarity: {:.4}", score.similarity);
        }

        Commands::Stats { dir, suffix } => {
            let suffix = suffix.unwrap_or(ComparisonParams::default().file_suffix);
            let batch = loader::load_asts_from_dir(&dir, &suffix)?;
            let all = metrics::compute_batch_metrics(&batch.trees);

            println!("=== Tree Statistics ===");
            println!(
                "{:<32} {:>7} {:>6} {:>6} {:>6} {:>6} {:>10}",
                "File", "Nodes", "Depth", "Funcs", "Loops", "CC", "Recursion"
            );
            for (name, m) in &all {
                println!(
                    "{:<32} {:>7} {:>6} {:>6} {:>6} {:>6} {:>10}",
                    name,
                    m.node_count,
                    m.depth,
                    m.function_definitions,
                    m.loop_constructs,
                    m.estimated_cyclomatic_complexity,
                    if m.recursion_detected { "yes" } else { "no" }
                );
            }
            if !batch.skipped.is_empty() {
                println!("\nSkipped {} file(s)", batch.skipped.len());
            }
        }

        Commands::Info { file } => {
            let tree = loader::load_ast_file(&file)?;
            let m = metrics::compute_metrics(&tree);

            println!("=== {} ===", file.display());
            println!("Root type: {}", tree.node_type);
            println!("Nodes: {}", m.node_count);
            println!("Depth: {}", m.depth);
            println!("Function definitions: {}", m.function_definitions);
            println!("Class definitions: {}", m.class_definitions);
            println!("Function calls: {}", m.function_calls);
            println!("Loops: {}", m.loop_constructs);
            println!("Conditionals: {}", m.conditional_statements);
            println!("Assignments: {}", m.variable_assignments);
            println!("Estimated cyclomatic complexity: {}", m.estimated_cyclomatic_complexity);
            println!("Exception handlers: {}", m.exception_handling_blocks);
            println!("Comprehensions: {}", m.comprehensions);
            println!("Binary operations: {}", m.binary_operations);
            println!("Mean identifier length: {:.2}", m.mean_identifier_length);
            println!("Recursion: {}", if m.recursion_detected { "yes" } else { "no" });
        }

        Commands::Runs { db } => {
            let runs = db::list_runs(&db)?;
            print_runs(&runs);
        }

        Commands::Matrix { db, run, output } => {
            let (identifiers, matrix) = db::load_run_matrix(&db, &run)?;
            match output {
                Some(path) => write_matrix_csv_file(&identifiers, &matrix, &path)?,
                None => write_matrix_csv(&identifiers, &matrix, &mut std::io::stdout().lock())?,
            }
        }

        Commands::Benchmark { iterations, size } => {
            run_benchmark(iterations, size);
        }
    }

    Ok(())
}

/// Build a deterministic tree of `size` nodes, three children per inner node.
fn synthetic_tree(size: usize, label: impl Fn(usize) -> String) -> AstNode {
    let mut nodes: Vec<AstNode> = (0..size.max(1))
        .map(|i| AstNode::new("identifier", label(i)))
        .collect();

    // Parents always precede their children, so fold from the back
    for i in (0..nodes.len()).rev() {
        let node = &mut nodes[i];
        if !node.children.is_empty() {
            node.children.reverse();
            node.node_type = "block".to_string();
            node.text.clear();
        }
        if i > 0 {
            let child = std::mem::replace(&mut nodes[i], AstNode::new("identifier", ""));
            nodes[(i - 1) / 3].children.push(child);
        }
    }
    nodes.swap_remove(0)
}

/// Run tree edit distance benchmark to measure performance.
fn run_benchmark(iterations: usize, size: usize) {
    use std::time::Instant;

    println!("=== Tree Edit Distance Benchmark ===");
    println!("Iterations: {}", iterations);
    println!("Tree size: {}", size);

    let base = synthetic_tree(size, |i| format!("v{}", i));
    let partial = synthetic_tree(size, |i| {
        if i % 10 < 7 {
            format!("v{}", i)
        } else {
            format!("w{}", i)
        }
    });
    let disjoint = synthetic_tree(size, |i| format!("w{}", i));

    let scenarios = [
        ("Identical trees", &base),
        ("70% matching labels", &partial),
        ("No matching labels", &disjoint),
    ];

    for (title, other) in scenarios {
        println!("\n{}:", title);
        let start = Instant::now();
        let mut distance = 0;
        for _ in 0..iterations.max(1) {
            distance = ted::tree_edit_distance(Some(&base), Some(other));
        }
        let elapsed = start.elapsed();
        let per_run = elapsed.as_secs_f64() / iterations.max(1) as f64;
        println!("  Distance: {}", distance);
        println!("  Total time: {:.3}s", elapsed.as_secs_f64());
        println!("  Per comparison: {:.3}ms", per_run * 1000.0);
        println!("  Comparisons/sec: {:.0}", 1.0 / per_run);
    }
}
