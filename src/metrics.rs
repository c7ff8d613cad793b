//! Structural metrics for a single syntax tree.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ast::AstNode;

/// Reserved words that tree-sitter may still surface as identifiers.
const PYTHON_KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

const LOOP_TYPES: [&str; 2] = ["for_statement", "while_statement"];
const ASSIGNMENT_TYPES: [&str; 2] = ["assignment", "augmented_assignment"];
const COMPREHENSION_TYPES: [&str; 4] = [
    "list_comprehension",
    "dictionary_comprehension",
    "set_comprehension",
    "generator_expression",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeMetrics {
    pub node_count: usize,
    pub depth: usize,
    pub function_definitions: usize,
    pub class_definitions: usize,
    pub function_calls: usize,
    pub loop_constructs: usize,
    pub conditional_statements: usize,
    pub variable_assignments: usize,
    /// Conditionals + loops + 1.
    pub estimated_cyclomatic_complexity: usize,
    pub exception_handling_blocks: usize,
    pub comprehensions: usize,
    pub binary_operations: usize,
    /// Rounded to two decimals; 0 when the tree has no identifiers.
    pub mean_identifier_length: f64,
    pub recursion_detected: bool,
}

/// Compute every metric for one tree.
pub fn compute_metrics(tree: &AstNode) -> TreeMetrics {
    let loops = tree.count_types(&LOOP_TYPES);
    let conditionals = tree.count_types(&["if_statement"]);

    TreeMetrics {
        node_count: tree.node_count(),
        depth: tree.depth(),
        function_definitions: tree.count_types(&["function_definition"]),
        class_definitions: tree.count_types(&["class_definition"]),
        function_calls: tree.count_types(&["call"]),
        loop_constructs: loops,
        conditional_statements: conditionals,
        variable_assignments: tree.count_types(&ASSIGNMENT_TYPES),
        estimated_cyclomatic_complexity: conditionals + loops + 1,
        exception_handling_blocks: tree.count_types(&["try_statement"]),
        comprehensions: tree.count_types(&COMPREHENSION_TYPES),
        binary_operations: tree.count_types(&["binary_operator"]),
        mean_identifier_length: mean_identifier_length(tree),
        recursion_detected: detect_recursion(tree),
    }
}

/// Compute metrics for a whole batch in parallel.
pub fn compute_batch_metrics(trees: &BTreeMap<String, AstNode>) -> Vec<(String, TreeMetrics)> {
    let entries: Vec<(&String, &AstNode)> = trees.iter().collect();
    entries
        .into_par_iter()
        .map(|(name, tree)| (name.clone(), compute_metrics(tree)))
        .collect()
}

/// Identifier texts in pre-order, keywords excluded.
pub fn collect_identifiers(tree: &AstNode) -> Vec<&str> {
    tree.iter()
        .filter(|n| n.node_type == "identifier" && !PYTHON_KEYWORDS.contains(&n.text.as_str()))
        .map(|n| n.text.as_str())
        .collect()
}

fn mean_identifier_length(tree: &AstNode) -> f64 {
    let identifiers = collect_identifiers(tree);
    if identifiers.is_empty() {
        return 0.0;
    }
    let total: usize = identifiers.iter().map(|id| id.chars().count()).sum();
    let mean = total as f64 / identifiers.len() as f64;
    (mean * 100.0).round() / 100.0
}

/// True if some function calls itself by name from inside its own body.
///
/// The innermost enclosing `function_definition` decides which name counts.
pub fn detect_recursion(tree: &AstNode) -> bool {
    let mut stack: Vec<(&AstNode, Option<&str>)> = vec![(tree, None)];

    while let Some((node, enclosing)) = stack.pop() {
        let name_child = || node.child_of_type("identifier").map(|c| c.text.as_str());
        let current = match node.node_type.as_str() {
            "function_definition" => name_child(),
            "call" => {
                if enclosing.is_some() && name_child() == enclosing {
                    return true;
                }
                enclosing
            }
            _ => enclosing,
        };
        for child in &node.children {
            stack.push((child, current));
        }
    }
    false
}
