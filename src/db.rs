//! SQLite persistence for comparison runs.
//!
//! A run is one finished batch: its metadata goes into `runs`, the sorted
//! identifier list into `run_files`, and every successful pair into
//! `similarities`. The comparison engine itself never touches the database.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};

use crate::matrix::SimilarityMatrix;
use crate::models::{BatchResult, ComparisonParams, PairRecord, RunInfo};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Run not found: {0}")]
    RunNotFound(String),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    run_id      TEXT PRIMARY KEY,
    run_hash    TEXT NOT NULL,
    name        TEXT,
    timestamp   INTEGER NOT NULL,
    tree_count  INTEGER NOT NULL,
    parameters  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS run_files (
    run_id      TEXT NOT NULL REFERENCES runs(run_id),
    position    INTEGER NOT NULL,
    file        TEXT NOT NULL,
    PRIMARY KEY (run_id, position)
);
CREATE TABLE IF NOT EXISTS similarities (
    run_id        TEXT NOT NULL REFERENCES runs(run_id),
    file_a        TEXT NOT NULL,
    file_b        TEXT NOT NULL,
    similarity    REAL NOT NULL,
    edit_distance INTEGER NOT NULL,
    PRIMARY KEY (run_id, file_a, file_b)
);
";

/// Open (creating if needed) a database and make sure the tables exist.
pub fn open_db(db_path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// Content hash of a batch: identifiers plus every result row in index order.
pub fn run_hash(result: &BatchResult) -> String {
    let mut hasher = blake3::Hasher::new();
    for id in &result.identifiers {
        hasher.update(id.as_bytes());
        hasher.update(&[0]);
    }
    for r in result.sorted_results() {
        hasher.update(&(r.index_i as u64).to_le_bytes());
        hasher.update(&(r.index_j as u64).to_le_bytes());
        hasher.update(&(r.edit_distance as u64).to_le_bytes());
        hasher.update(&r.similarity.to_bits().to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Store a finished batch. Returns the new run id.
pub fn save_run(
    db_path: &Path,
    name: Option<&str>,
    comparison: &ComparisonParams,
    result: &BatchResult,
) -> Result<String, DbError> {
    let mut conn = open_db(db_path)?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let hash = run_hash(result);
    let run_id = format!("{}-{}", timestamp.as_millis(), &hash[..12]);
    let parameters = serde_json::to_string(comparison)?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO runs (run_id, run_hash, name, timestamp, tree_count, parameters)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            run_id,
            hash,
            name,
            timestamp.as_secs() as i64,
            result.identifiers.len() as i64,
            parameters
        ],
    )?;
    {
        let mut insert_file =
            tx.prepare("INSERT INTO run_files (run_id, position, file) VALUES (?1, ?2, ?3)")?;
        for (position, file) in result.identifiers.iter().enumerate() {
            insert_file.execute(params![run_id, position as i64, file])?;
        }

        let mut insert_pair = tx.prepare(
            "INSERT INTO similarities (run_id, file_a, file_b, similarity, edit_distance)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for record in result.records() {
            insert_pair.execute(params![
                run_id,
                record.file1,
                record.file2,
                record.similarity,
                record.edit_distance as i64
            ])?;
        }
    }
    tx.commit()?;

    info!(run_id = %run_id, pairs = result.results.len(), "saved run");
    Ok(run_id)
}

/// All stored runs, newest first.
pub fn list_runs(db_path: &Path) -> Result<Vec<RunInfo>, DbError> {
    let conn = open_db(db_path)?;
    let mut stmt = conn.prepare(
        "SELECT r.run_id, r.run_hash, r.name, r.timestamp, r.tree_count,
                (SELECT COUNT(*) FROM similarities s WHERE s.run_id = r.run_id)
         FROM runs r
         ORDER BY r.timestamp DESC, r.run_id DESC",
    )?;

    let runs = stmt
        .query_map([], |row| {
            let tree_count: i64 = row.get(4)?;
            let pair_count: i64 = row.get(5)?;
            Ok(RunInfo {
                run_id: row.get(0)?,
                run_hash: row.get(1)?,
                name: row.get(2)?,
                timestamp: row.get(3)?,
                tree_count: tree_count as usize,
                pair_count: pair_count as usize,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(runs)
}

fn ensure_run(conn: &Connection, run_id: &str) -> Result<(), DbError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT run_id FROM runs WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(DbError::RunNotFound(run_id.to_string())),
    }
}

/// Stored pair results of one run, ordered by file names.
pub fn load_run_results(db_path: &Path, run_id: &str) -> Result<Vec<PairRecord>, DbError> {
    let conn = open_db(db_path)?;
    ensure_run(&conn, run_id)?;

    let mut stmt = conn.prepare(
        "SELECT file_a, file_b, edit_distance, similarity
         FROM similarities WHERE run_id = ?1
         ORDER BY file_a, file_b",
    )?;
    let records = stmt
        .query_map(params![run_id], |row| {
            let edit_distance: i64 = row.get(2)?;
            Ok(PairRecord {
                file1: row.get(0)?,
                file2: row.get(1)?,
                edit_distance: edit_distance as usize,
                similarity: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    debug!(run_id, pairs = records.len(), "loaded run results");
    Ok(records)
}

/// Rebuild the similarity matrix of a stored run.
///
/// Pairs that were not stored (failed tasks) keep the 0.0 sentinel.
pub fn load_run_matrix(
    db_path: &Path,
    run_id: &str,
) -> Result<(Vec<String>, SimilarityMatrix), DbError> {
    let conn = open_db(db_path)?;
    ensure_run(&conn, run_id)?;

    let mut stmt =
        conn.prepare("SELECT file FROM run_files WHERE run_id = ?1 ORDER BY position")?;
    let identifiers = stmt
        .query_map(params![run_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    let mut matrix = SimilarityMatrix::similarity(identifiers.len());
    for record in load_run_results(db_path, run_id)? {
        let i = identifiers.binary_search(&record.file1);
        let j = identifiers.binary_search(&record.file2);
        if let (Ok(i), Ok(j)) = (i, j) {
            matrix.set(i, j, record.similarity);
        }
    }

    Ok((identifiers, matrix))
}
