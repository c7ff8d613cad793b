//! Boolean structural equivalence between syntax trees.
//!
//! Unlike the edit distance, this check forgives two cosmetic differences:
//! operands of `+` and `*` may appear in either order, and identifier names
//! can optionally be ignored altogether. It answers "are these two snippets
//! the same program modulo cosmetics?" and never feeds the distance score.

use crate::ast::AstNode;
use crate::models::ComparisonParams;

/// Remaining stack below which a comparison step moves to a fresh segment.
const STACK_RED_ZONE: usize = 64 * 1024;
/// Size of each extra stack segment.
const STACK_SEGMENT: usize = 1024 * 1024;

/// Operators whose operands may be swapped without changing meaning.
pub const COMMUTATIVE_OPERATORS: [&str; 2] = ["+", "*"];

/// Options for [`are_equivalent_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EquivalenceOptions {
    /// Treat every pair of identifiers as equal.
    pub ignore_variable_names: bool,
}

impl From<&ComparisonParams> for EquivalenceOptions {
    fn from(params: &ComparisonParams) -> Self {
        Self {
            ignore_variable_names: params.ignore_variable_names,
        }
    }
}

/// Check two optional subtrees for equivalence.
///
/// Two absent nodes are equivalent; an absent node never equals a present one.
pub fn are_equivalent(a: Option<&AstNode>, b: Option<&AstNode>, ignore_variable_names: bool) -> bool {
    are_equivalent_with(
        a,
        b,
        EquivalenceOptions {
            ignore_variable_names,
        },
    )
}

pub fn are_equivalent_with(a: Option<&AstNode>, b: Option<&AstNode>, opts: EquivalenceOptions) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => nodes_equivalent(a, b, opts),
        _ => false,
    }
}

/// Every nested comparison goes through here. Operator chains nest one
/// level per operand, so the walk grows its stack instead of overflowing.
fn nodes_equivalent(a: &AstNode, b: &AstNode, opts: EquivalenceOptions) -> bool {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || node_pair_equivalent(a, b, opts))
}

fn node_pair_equivalent(a: &AstNode, b: &AstNode, opts: EquivalenceOptions) -> bool {
    if a.node_type != b.node_type {
        return false;
    }

    match a.node_type.as_str() {
        "identifier" => opts.ignore_variable_names || a.text == b.text,
        "string" | "integer" | "float" | "comment" => a.text == b.text,
        "binary_operator" => binary_operators_equivalent(a, b, opts),
        "function_definition" => functions_equivalent(a, b, opts),
        "return_statement" => {
            let value_a = a.children.iter().find(|c| c.node_type != "return");
            let value_b = b.children.iter().find(|c| c.node_type != "return");
            are_equivalent_with(value_a, value_b, opts)
        }
        _ => children_equivalent(&a.children, &b.children, opts),
    }
}

fn binary_operators_equivalent(a: &AstNode, b: &AstNode, opts: EquivalenceOptions) -> bool {
    match (commutative_operands(a), commutative_operands(b)) {
        (Some((left_a, right_a, op_a)), Some((left_b, right_b, op_b))) if op_a == op_b => {
            (nodes_equivalent(left_a, left_b, opts) && nodes_equivalent(right_a, right_b, opts))
                || (nodes_equivalent(left_a, right_b, opts) && nodes_equivalent(right_a, left_b, opts))
        }
        _ => children_equivalent(&a.children, &b.children, opts),
    }
}

/// Split a commutative binary operation into `(left, right, operator)`.
///
/// Accepts both the `[left, op, right]` layout where the operator is its
/// own token child and the compact `[left, right]` layout where the node
/// text is the bare operator.
fn commutative_operands(node: &AstNode) -> Option<(&AstNode, &AstNode, &str)> {
    let (left, right, op) = match node.children.as_slice() {
        [left, op, right] => (left, right, operator_symbol(op)),
        [left, right] => (left, right, node.text.trim()),
        _ => return None,
    };
    COMMUTATIVE_OPERATORS
        .contains(&op)
        .then_some((left, right, op))
}

fn operator_symbol(token: &AstNode) -> &str {
    let text = token.text.trim();
    if text.is_empty() {
        token.node_type.as_str()
    } else {
        text
    }
}

fn functions_equivalent(a: &AstNode, b: &AstNode, opts: EquivalenceOptions) -> bool {
    if !opts.ignore_variable_names {
        let name_a = a.child_of_type("identifier").map(|n| n.text.as_str());
        let name_b = b.child_of_type("identifier").map(|n| n.text.as_str());
        if name_a != name_b {
            return false;
        }
    }
    are_equivalent_with(a.child_of_type("parameters"), b.child_of_type("parameters"), opts)
        && are_equivalent_with(a.child_of_type("block"), b.child_of_type("block"), opts)
}

fn children_equivalent(a: &[AstNode], b: &[AstNode], opts: EquivalenceOptions) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| nodes_equivalent(x, y, opts))
}
