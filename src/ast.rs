//! Syntax tree model shared by every stage of the comparison pipeline.
//!
//! Trees are produced by an external parser and arrive as JSON
//! (`{type, text, startPosition?, endPosition?, children}`); the engine only
//! ever reads them. All walks here use an explicit stack so that very deep
//! trees cannot overflow the call stack.

use serde::{Deserialize, Serialize};

/// Row/column location of a node in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub row: u32,
    pub column: u32,
}

/// A single syntax tree node with its owned, source-ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(
        rename = "startPosition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub start_position: Option<Position>,
    #[serde(
        rename = "endPosition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub end_position: Option<Position>,
    // Serialized trees sometimes carry `"children": null` for leaves
    #[serde(default, deserialize_with = "children_or_empty")]
    pub children: Vec<AstNode>,
}

fn children_or_empty<'de, D>(deserializer: D) -> Result<Vec<AstNode>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<AstNode>>::deserialize(deserializer)?.unwrap_or_default())
}

impl AstNode {
    /// Create a node without children.
    pub fn new(node_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            text: text.into(),
            start_position: None,
            end_position: None,
            children: Vec::new(),
        }
    }

    /// Create a purely structural node (empty text) with the given children.
    pub fn branch(node_type: impl Into<String>, children: Vec<AstNode>) -> Self {
        Self {
            children,
            ..Self::new(node_type, "")
        }
    }

    /// Append a child, builder style.
    pub fn with_child(mut self, child: AstNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// First direct child of the given grammar type.
    pub fn child_of_type(&self, node_type: &str) -> Option<&AstNode> {
        self.children.iter().find(|c| c.node_type == node_type)
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Height of the subtree; a single leaf has depth 1.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            for child in &node.children {
                stack.push((child, depth + 1));
            }
        }
        max_depth
    }

    /// Pre-order iterator over this subtree (node first, children left to right).
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Nodes of this subtree in post-order (children left to right, then the node).
    pub fn post_order(&self) -> Vec<&AstNode> {
        let mut out = Vec::new();
        let mut stack: Vec<(&AstNode, usize)> = vec![(self, 0)];
        while let Some(top) = stack.last_mut() {
            let node: &AstNode = top.0;
            if let Some(child) = node.children.get(top.1) {
                top.1 += 1;
                stack.push((child, 0));
            } else {
                out.push(node);
                stack.pop();
            }
        }
        out
    }

    /// Count nodes of this subtree whose type is one of `types`.
    pub fn count_types(&self, types: &[&str]) -> usize {
        self.iter()
            .filter(|n| types.contains(&n.node_type.as_str()))
            .count()
    }

    /// Check structural invariants the comparison engine relies on.
    ///
    /// Every node must carry a non-empty grammar type.
    pub fn validate(&self) -> Result<(), String> {
        for (idx, node) in self.post_order().into_iter().enumerate() {
            if node.node_type.is_empty() {
                return Err(format!("node at post-order position {} has an empty type", idx + 1));
            }
        }
        Ok(())
    }
}

/// Number of nodes in an optional tree; an absent tree has zero nodes.
pub fn count_nodes(tree: Option<&AstNode>) -> usize {
    tree.map_or(0, AstNode::node_count)
}

/// Stack-based pre-order traversal.
pub struct PreOrder<'a> {
    stack: Vec<&'a AstNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
