//! Distance to similarity normalization.

use crate::ast::{count_nodes, AstNode};

/// Upper bound on the edit distance between two trees: delete every node of
/// one, then insert every node of the other.
pub fn max_distance(a: Option<&AstNode>, b: Option<&AstNode>) -> usize {
    count_nodes(a) + count_nodes(b)
}

/// Map an edit distance onto `[0, 1]`, where 1 means identical.
pub fn normalized_similarity(distance: usize, max_distance: usize) -> f64 {
    if max_distance == 0 {
        return if distance == 0 { 1.0 } else { 0.0 };
    }
    let similarity = 1.0 - distance as f64 / max_distance as f64;
    similarity.clamp(0.0, 1.0)
}
