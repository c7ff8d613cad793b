//! Loading `*.ast.json` submissions from disk.
//!
//! A directory is scanned for files with the configured suffix. Each file's
//! name is its submission identifier. Files that cannot be read or parsed are
//! skipped with a warning instead of failing the whole batch.

use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::ast::AstNode;
use crate::models::SkippedFile;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid tree in {}: {}", .path.display(), .reason)]
    Invalid { path: PathBuf, reason: String },
}

/// Trees keyed by identifier, plus the files that were left out.
#[derive(Debug, Default)]
pub struct LoadedBatch {
    /// Ordered by identifier; this order fixes matrix rows and columns.
    pub trees: BTreeMap<String, AstNode>,
    pub skipped: Vec<SkippedFile>,
}

impl LoadedBatch {
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

/// Parse one tree from a JSON string.
///
/// Nesting depth is unbounded: long operator chains nest one object per
/// operand, so the stack is grown on demand instead of capping recursion.
pub fn parse_ast(json: &str) -> Result<AstNode, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    let tree = AstNode::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(tree)
}

/// Read, parse and validate one AST file.
pub fn load_ast_file(path: &Path) -> Result<AstNode, LoadError> {
    let content = fs::read_to_string(path)?;
    let tree = parse_ast(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tree.validate().map_err(|reason| LoadError::Invalid {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(tree)
}

/// Matching files in a directory, plus the ones that cannot serve as
/// identifiers.
#[derive(Debug, Default)]
pub struct AstFileList {
    /// `(identifier, path)`, sorted by identifier.
    pub files: Vec<(String, PathBuf)>,
    pub skipped: Vec<SkippedFile>,
}

/// List files in `dir` whose name ends with `suffix`, sorted by name.
///
/// A matching name that is not valid UTF-8 has no usable identifier; it is
/// reported in [`AstFileList::skipped`] under its lossy name.
pub fn list_ast_files(dir: &Path, suffix: &str) -> Result<AstFileList, LoadError> {
    let mut listing = AstFileList::default();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(raw_name) = path.file_name() else {
            continue;
        };
        match raw_name.to_str() {
            Some(name) if name.ends_with(suffix) => {
                listing.files.push((name.to_string(), path));
            }
            Some(_) => {}
            None => {
                let lossy = raw_name.to_string_lossy().into_owned();
                if lossy.ends_with(suffix) {
                    warn!(file = %lossy, "skipping AST file with non UTF-8 name");
                    listing.skipped.push(SkippedFile {
                        file: lossy,
                        reason: "file name is not valid UTF-8".to_string(),
                    });
                }
            }
        }
    }
    listing.files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(listing)
}

/// Load every matching file in `dir`.
///
/// Only an unreadable directory is an error. Individual bad files end up in
/// [`LoadedBatch::skipped`].
pub fn load_asts_from_dir(dir: &Path, suffix: &str) -> Result<LoadedBatch, LoadError> {
    let AstFileList { files, skipped } = list_ast_files(dir, suffix)?;
    debug!(dir = %dir.display(), files = files.len(), "found AST files");

    let parsed: Vec<(String, Result<AstNode, LoadError>)> = files
        .into_par_iter()
        .map(|(name, path)| {
            let tree = load_ast_file(&path);
            (name, tree)
        })
        .collect();

    let mut batch = LoadedBatch {
        trees: BTreeMap::new(),
        skipped,
    };
    for (name, tree) in parsed {
        match tree {
            Ok(tree) => {
                batch.trees.insert(name, tree);
            }
            Err(e) => {
                warn!(file = %name, error = %e, "skipping AST file");
                batch.skipped.push(SkippedFile {
                    file: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(batch)
}
