//! Per-node edit costs for the tree edit distance engine.
//!
//! Costs are exact: commutative reordering and identifier
//! renaming are NOT free here. Those relaxations live in
//! [`crate::equivalence`] and are not consulted by the distance.

use crate::ast::AstNode;

pub const INSERT_COST: usize = 1;
pub const DELETE_COST: usize = 1;
pub const SUBSTITUTE_COST: usize = 1;
pub const MATCH_COST: usize = 0;

/// Node types whose source text is part of their identity.
pub const LEAF_COMPARABLE_TYPES: [&str; 5] = ["identifier", "string", "integer", "float", "comment"];

#[inline]
pub fn is_leaf_comparable(node_type: &str) -> bool {
    LEAF_COMPARABLE_TYPES.contains(&node_type)
}

/// Cost of a single-node edit operation.
///
/// `(None, Some)` is an insertion, `(Some, None)` a deletion and
/// `(Some, Some)` a substitution. Children are never costed here.
#[inline]
pub fn node_cost(a: Option<&AstNode>, b: Option<&AstNode>) -> usize {
    match (a, b) {
        (None, None) => 0,
        (None, Some(_)) => INSERT_COST,
        (Some(_), None) => DELETE_COST,
        (Some(a), Some(b)) => substitution_cost(a, b),
    }
}

#[inline(always)]
fn substitution_cost(a: &AstNode, b: &AstNode) -> usize {
    if a.node_type != b.node_type {
        return SUBSTITUTE_COST;
    }
    if is_leaf_comparable(&a.node_type) && a.text != b.text {
        return SUBSTITUTE_COST;
    }
    MATCH_COST
}
