//! Fixed-size worker pool for all-pairs tree comparison.
//!
//! Every unordered pair `i < j` becomes one task. A dedicated rayon pool runs
//! one pull loop per worker thread: each loop takes the next task
//! index from a shared atomic counter, runs the comparison, and sends the
//! outcome over a channel to the calling thread, which is the only writer of
//! the result matrices. A panic inside a comparison is caught at the worker
//! boundary and reported as a failed task; the rest of the batch carries on.

use indicatif::ProgressBar;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

use crate::ast::AstNode;
use crate::compare::CompareError;
use crate::matrix::{DistanceMatrix, SimilarityMatrix};
use crate::models::{
    ComparisonParams, ComparisonResult, ComparisonTask, FailureKind, PairScore, TaskFailure,
};

/// Receives batch progress on the aggregating thread.
pub trait ProgressSink {
    fn on_progress(&self, completed: usize, total: usize);

    fn on_finish(&self, _completed: usize, _failed: usize) {}
}

/// Progress sink that discards everything.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

impl ProgressSink for ProgressBar {
    fn on_progress(&self, completed: usize, total: usize) {
        self.set_position(completed as u64);
        self.set_message(format!("Completed {} / {} tasks", completed, total));
    }

    fn on_finish(&self, completed: usize, failed: usize) {
        self.finish_with_message(format!("{} compared, {} failed", completed, failed));
    }
}

/// Pool sizing and progress cadence.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub workers: Option<usize>,
    pub progress_every: usize,
}

impl From<&ComparisonParams> for SchedulerConfig {
    fn from(params: &ComparisonParams) -> Self {
        Self {
            workers: params.workers,
            progress_every: params.progress_every,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        (&ComparisonParams::default()).into()
    }
}

/// What the scheduler hands back once every task has reported.
#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    pub task_count: usize,
    pub worker_count: usize,
    /// Successful comparisons in completion order.
    pub results: Vec<ComparisonResult>,
    pub failures: Vec<TaskFailure>,
    pub similarity: SimilarityMatrix,
    pub distance: DistanceMatrix,
}

enum WorkerMessage {
    Done { task: usize, score: PairScore },
    Panicked { task: usize, message: String },
}

/// Enumerate every `i < j` pair eagerly, in row-major order.
pub fn build_tasks(trees: &[Arc<AstNode>]) -> Vec<ComparisonTask> {
    let n = trees.len();
    let mut tasks = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            tasks.push(ComparisonTask {
                index_i: i,
                index_j: j,
                tree_i: Arc::clone(&trees[i]),
                tree_j: Arc::clone(&trees[j]),
            });
        }
    }
    tasks
}

/// `min(available_parallelism, task_count)`, never zero.
pub fn worker_count(requested: Option<usize>, task_count: usize) -> usize {
    let available = requested.unwrap_or_else(|| {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    available.min(task_count).max(1)
}

/// Compare every pair of `trees` with `compare` on a fixed worker pool.
///
/// Returns only after every task has reported a score or a failure. Setting
/// `cancel` stops workers from picking up new tasks; whatever was never
/// started is reported as [`FailureKind::Cancelled`].
pub fn run_pairwise<F>(
    trees: &[Arc<AstNode>],
    config: SchedulerConfig,
    cancel: &AtomicBool,
    progress: &dyn ProgressSink,
    compare: F,
) -> Result<ScheduleOutcome, CompareError>
where
    F: Fn(&AstNode, &AstNode) -> PairScore + Sync,
{
    if trees.len() < 2 {
        return Err(CompareError::InsufficientInput { found: trees.len() });
    }

    let tasks = build_tasks(trees);
    let workers = worker_count(config.workers, tasks.len());
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|k| format!("ast-worker-{}", k))
        .build()?;

    info!(
        trees = trees.len(),
        tasks = tasks.len(),
        workers,
        "starting pairwise comparison"
    );

    Ok(run_on_pool(
        &pool,
        workers,
        trees.len(),
        &tasks,
        config.progress_every,
        cancel,
        progress,
        &compare,
    ))
}

/// Spawn `loops` pull loops onto `pool` and aggregate on the calling thread.
#[allow(clippy::too_many_arguments)]
fn run_on_pool<F>(
    pool: &ThreadPool,
    loops: usize,
    tree_count: usize,
    tasks: &[ComparisonTask],
    progress_every: usize,
    cancel: &AtomicBool,
    progress: &dyn ProgressSink,
    compare: &F,
) -> ScheduleOutcome
where
    F: Fn(&AstNode, &AstNode) -> PairScore + Sync,
{
    let task_count = tasks.len();
    let progress_every = progress_every.max(1);

    let mut similarity = SimilarityMatrix::similarity(tree_count);
    let mut distance = DistanceMatrix::distance(tree_count);
    let mut results = Vec::with_capacity(task_count);
    let mut failures = Vec::new();
    let mut reported = vec![false; task_count];
    let next_task = AtomicUsize::new(0);

    // The scope body stays on this thread, so pool threads only run pull loops
    pool.in_place_scope(|scope| {
        let (tx, rx) = mpsc::channel::<WorkerMessage>();

        for worker_id in 0..loops {
            let tx = tx.clone();
            let next_task = &next_task;
            scope.spawn(move |_| {
                let run = catch_unwind(AssertUnwindSafe(|| {
                    run_worker(worker_id, tasks, next_task, cancel, compare, tx)
                }));
                if run.is_err() {
                    error!(worker = worker_id, "worker loop died");
                }
            });
        }
        // Only workers hold senders now, so the loop below ends when the last one exits
        drop(tx);

        let mut completed = 0usize;
        for message in rx {
            match message {
                WorkerMessage::Done { task, score } => {
                    let t = &tasks[task];
                    similarity.set(t.index_i, t.index_j, score.similarity);
                    distance.set(t.index_i, t.index_j, score.edit_distance);
                    results.push(ComparisonResult {
                        index_i: t.index_i,
                        index_j: t.index_j,
                        edit_distance: score.edit_distance,
                        similarity: score.similarity,
                    });
                    reported[task] = true;
                }
                WorkerMessage::Panicked { task, message } => {
                    let t = &tasks[task];
                    error!(
                        index_i = t.index_i,
                        index_j = t.index_j,
                        error = %message,
                        "comparison task failed"
                    );
                    failures.push(TaskFailure {
                        index_i: t.index_i,
                        index_j: t.index_j,
                        kind: FailureKind::Panicked,
                        message,
                    });
                    reported[task] = true;
                }
            }

            completed += 1;
            if completed % progress_every == 0 || completed == task_count {
                debug!(completed, total = task_count, "progress");
                progress.on_progress(completed, task_count);
            }
        }
    });

    let claimed = next_task.load(Ordering::SeqCst).min(task_count);
    let cancelled = cancel.load(Ordering::SeqCst);
    failures.extend(unreported_failures(tasks, &reported, claimed, cancelled));

    if !failures.is_empty() {
        warn!(
            failed = failures.len(),
            completed = results.len(),
            total = task_count,
            "batch finished with partial results"
        );
    }
    progress.on_finish(results.len(), failures.len());

    ScheduleOutcome {
        task_count,
        worker_count: loops,
        results,
        failures,
        similarity,
        distance,
    }
}

/// Failures for every task that never reported: either never started after
/// a cancel, or lost with its worker.
fn unreported_failures(
    tasks: &[ComparisonTask],
    reported: &[bool],
    claimed: usize,
    cancelled: bool,
) -> Vec<TaskFailure> {
    tasks
        .iter()
        .enumerate()
        .filter(|(idx, _)| !reported[*idx])
        .map(|(idx, task)| {
            let (kind, message) = if cancelled && idx >= claimed {
                (FailureKind::Cancelled, "batch cancelled before the task started")
            } else {
                (FailureKind::WorkerLost, "worker exited before reporting a result")
            };
            TaskFailure {
                index_i: task.index_i,
                index_j: task.index_j,
                kind,
                message: message.to_string(),
            }
        })
        .collect()
}

fn run_worker<F>(
    worker_id: usize,
    tasks: &[ComparisonTask],
    next_task: &AtomicUsize,
    cancel: &AtomicBool,
    compare: &F,
    tx: Sender<WorkerMessage>,
) where
    F: Fn(&AstNode, &AstNode) -> PairScore + Sync,
{
    debug!(worker = worker_id, "worker started");
    let mut handled = 0usize;

    while !cancel.load(Ordering::SeqCst) {
        let idx = next_task.fetch_add(1, Ordering::SeqCst);
        let Some(task) = tasks.get(idx) else { break };

        let message = match catch_unwind(AssertUnwindSafe(|| compare(&*task.tree_i, &*task.tree_j))) {
            Ok(score) => WorkerMessage::Done { task: idx, score },
            Err(payload) => WorkerMessage::Panicked {
                task: idx,
                message: panic_message(payload.as_ref()),
            },
        };

        if tx.send(message).is_err() {
            warn!(worker = worker_id, "result channel closed");
            break;
        }
        handled += 1;
    }

    debug!(worker = worker_id, handled, "worker released");
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "comparison panicked without a message".to_string()
    }
}
