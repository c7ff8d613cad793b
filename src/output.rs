//! Output formatting for comparison results (JSON, CSV, similarity matrix).

use crate::matrix::SimilarityMatrix;
use crate::models::{BatchReport, BatchResult, PairRecord, RunInfo};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write a batch report as JSON.
pub fn write_json<W: Write>(report: &BatchReport, writer: &mut W) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(report)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Write a batch report as JSON to a file.
pub fn write_json_file(report: &BatchReport, path: &Path) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    write_json(report, &mut file)
}

/// Write pair records as CSV.
pub fn write_csv<W: Write>(records: &[PairRecord], writer: &mut W) -> Result<(), OutputError> {
    writeln!(writer, "file1,file2,edit_distance,similarity")?;

    for record in records {
        writeln!(
            writer,
            "{},{},{},{}",
            csv_field(&record.file1),
            csv_field(&record.file2),
            record.edit_distance,
            record.similarity
        )?;
    }

    Ok(())
}

/// Write pair records as CSV to a file.
pub fn write_csv_file(records: &[PairRecord], path: &Path) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    write_csv(records, &mut file)
}

/// Write the N x N similarity matrix as CSV, identifiers as header row and
/// first column.
pub fn write_matrix_csv<W: Write>(
    identifiers: &[String],
    matrix: &SimilarityMatrix,
    writer: &mut W,
) -> Result<(), OutputError> {
    let header: Vec<String> = identifiers.iter().map(|id| csv_field(id)).collect();
    writeln!(writer, ",{}", header.join(","))?;

    for (i, id) in identifiers.iter().enumerate() {
        let row: Vec<String> = matrix.row(i).iter().map(|v| format!("{:.4}", v)).collect();
        writeln!(writer, "{},{}", csv_field(id), row.join(","))?;
    }

    Ok(())
}

pub fn write_matrix_csv_file(
    identifiers: &[String],
    matrix: &SimilarityMatrix,
    path: &Path,
) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    write_matrix_csv(identifiers, matrix, &mut file)
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write a summary report to stdout.
pub fn print_summary(result: &BatchResult) {
    let summary = &result.summary;
    println!("\n=== Comparison Summary ===");
    println!("Trees: {}", summary.tree_count);
    if summary.skipped_files > 0 {
        println!("Skipped files: {}", summary.skipped_files);
    }
    println!("Workers: {}", summary.worker_count);
    println!();
    println!("Results:");
    println!("  Tasks: {}", summary.task_count);
    println!("  Completed: {}", summary.completed);
    println!("  Failed: {}", summary.failed);
    println!("  Mean similarity: {:.1}%", summary.mean_similarity * 100.0);
    if let Some(best) = &summary.max_similarity {
        println!(
            "  Most similar: {} ↔ {} ({:.1}%)",
            best.file1,
            best.file2,
            best.similarity * 100.0
        );
    }
    println!("  Elapsed: {} ms", summary.elapsed_ms);
}

/// Format one pair result as a single line.
pub fn format_result(record: &PairRecord) -> String {
    format!(
        "{} ↔ {}: similarity={:.4} distance={}",
        record.file1, record.file2, record.similarity, record.edit_distance
    )
}

/// Print the most similar pairs first.
pub fn print_results(records: &[PairRecord], limit: Option<usize>) {
    let mut sorted: Vec<&PairRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.file1.cmp(&b.file1))
            .then_with(|| a.file2.cmp(&b.file2))
    });

    let to_print = match limit {
        Some(n) => &sorted[..n.min(sorted.len())],
        None => &sorted[..],
    };

    for record in to_print {
        println!("{}", format_result(record));
    }

    if let Some(n) = limit {
        if sorted.len() > n {
            println!("... and {} more pairs", sorted.len() - n);
        }
    }
}

/// Print failed tasks and skipped files, if any.
pub fn print_failures(result: &BatchResult) {
    if !result.failures.is_empty() {
        println!("\nFailed comparisons:");
        for failure in result.failure_records() {
            println!(
                "  {} ↔ {} [{:?}]: {}",
                failure.file1, failure.file2, failure.kind, failure.message
            );
        }
    }

    if !result.skipped.is_empty() {
        println!("\nSkipped files:");
        for skipped in &result.skipped {
            println!("  {}: {}", skipped.file, skipped.reason);
        }
    }
}

/// Print stored runs as a table.
pub fn print_runs(runs: &[RunInfo]) {
    if runs.is_empty() {
        println!("No stored runs.");
        return;
    }
    println!("{:<28} {:>6} {:>8}  {:<12} Name", "Run", "Trees", "Pairs", "Hash");
    for run in runs {
        println!(
            "{:<28} {:>6} {:>8}  {:<12} {}",
            run.run_id,
            run.tree_count,
            run.pair_count,
            &run.run_hash[..run.run_hash.len().min(12)],
            run.name.as_deref().unwrap_or("-")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_record() -> PairRecord {
        PairRecord {
            file1: "alice.ast.json".to_string(),
            file2: "bob.ast.json".to_string(),
            edit_distance: 3,
            similarity: 0.85,
        }
    }

    #[test]
    fn test_format_result() {
        let formatted = format_result(&create_test_record());
        assert!(formatted.contains("alice.ast.json"));
        assert!(formatted.contains("bob.ast.json"));
        assert!(formatted.contains("similarity=0.8500"));
        assert!(formatted.contains("distance=3"));
    }

    #[test]
    fn test_write_csv() {
        let records = vec![create_test_record()];
        let mut output = Vec::new();

        write_csv(&records, &mut output).unwrap();

        let csv = String::from_utf8(output).unwrap();
        assert!(csv.starts_with("file1,file2,edit_distance,similarity")); // Header
        assert!(csv.contains("alice.ast.json,bob.ast.json,3,0.85")); // Data
    }

    #[test]
    fn test_write_csv_empty() {
        let mut output = Vec::new();

        write_csv(&[], &mut output).unwrap();

        let csv = String::from_utf8(output).unwrap();
        // Should only have header
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain.ast.json"), "plain.ast.json");
        assert_eq!(csv_field("a,b.ast.json"), "\"a,b.ast.json\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_write_matrix_csv() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let mut matrix = SimilarityMatrix::similarity(2);
        matrix.set(0, 1, 0.5);

        let mut output = Vec::new();
        write_matrix_csv(&ids, &matrix, &mut output).unwrap();

        let csv = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec![",a,b", "a,1.0000,0.5000", "b,0.5000,1.0000"]);
    }

    #[test]
    fn test_editdistance_json_name() {
        let json = serde_json::to_string(&create_test_record()).unwrap();
        assert!(json.contains("\"editDistance\":3"));
        assert!(json.contains("\"file1\":\"alice.ast.json\""));
    }
}
