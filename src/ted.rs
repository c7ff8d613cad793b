//! Zhang–Shasha tree edit distance.
//!
//! This is the hot path of a batch run: every pair of submissions goes
//! through [`tree_edit_distance`] exactly once, so the DP tables are flat
//! `Vec`s and the forest scratch table is allocated once per pair.

use crate::ast::AstNode;
use crate::cost::node_cost;

/// Post-order numbering of a tree together with leftmost-descendant indices.
///
/// Indices are 1-based, matching the DP tables where row/column 0 stands for
/// the empty forest.
pub struct PostOrderIndex<'a> {
    nodes: Vec<&'a AstNode>,
    leftmost: Vec<usize>,
}

impl<'a> PostOrderIndex<'a> {
    /// Number the nodes of `root` in post-order, children left to right.
    ///
    /// A leaf is its own leftmost descendant; an inner node inherits the
    /// leftmost descendant of its first child.
    pub fn build(root: &'a AstNode) -> Self {
        struct Frame<'t> {
            node: &'t AstNode,
            next_child: usize,
            leftmost: Option<usize>,
        }

        let mut nodes = Vec::new();
        let mut leftmost = Vec::new();
        let mut stack = vec![Frame {
            node: root,
            next_child: 0,
            leftmost: None,
        }];

        while let Some(top) = stack.last_mut() {
            let node: &'a AstNode = top.node;
            if let Some(child) = node.children.get(top.next_child) {
                top.next_child += 1;
                stack.push(Frame {
                    node: child,
                    next_child: 0,
                    leftmost: None,
                });
                continue;
            }

            let Some(done) = stack.pop() else { break };
            nodes.push(done.node);
            let index = nodes.len();
            let lmd = done.leftmost.unwrap_or(index);
            leftmost.push(lmd);

            // First finished child fixes the parent's leftmost descendant
            if let Some(parent) = stack.last_mut() {
                parent.leftmost.get_or_insert(lmd);
            }
        }

        Self { nodes, leftmost }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node with post-order index `k` (1-based).
    #[inline(always)]
    pub fn node(&self, k: usize) -> &'a AstNode {
        self.nodes[k - 1]
    }

    /// Post-order index of the leftmost descendant of node `k` (1-based).
    #[inline(always)]
    pub fn leftmost(&self, k: usize) -> usize {
        self.leftmost[k - 1]
    }
}

/// Edit distance between two optional trees.
///
/// An absent tree has zero nodes, so comparing against one costs the node
/// count of the other tree (every node inserted or deleted).
pub fn tree_edit_distance(a: Option<&AstNode>, b: Option<&AstNode>) -> usize {
    match (a, b) {
        (None, None) => 0,
        (Some(t), None) | (None, Some(t)) => t.node_count(),
        (Some(a), Some(b)) => zhang_shasha(a, b),
    }
}

/// Zhang–Shasha over two present trees.
///
/// `tree_dist[i][j]` is filled for every pair of post-order positions. Row 0
/// and column 0 accumulate single-node insertions and deletions. Each cell
/// takes the cheapest of deleting node `i`, inserting node `j`, or matching
/// the two subtrees, where the match term adds the forest distance between
/// their descendants to the cost of relabelling the roots.
pub fn zhang_shasha(a: &AstNode, b: &AstNode) -> usize {
    let t1 = PostOrderIndex::build(a);
    let t2 = PostOrderIndex::build(b);

    let n = t1.len();
    let m = t2.len();
    if n == 0 || m == 0 {
        return n + m;
    }

    // treeDist[i][j] = tree_dist[i * width + j]
    let width = m + 1;
    let mut tree_dist = vec![0usize; (n + 1) * width];
    for i in 1..=n {
        tree_dist[i * width] = tree_dist[(i - 1) * width] + node_cost(Some(t1.node(i)), None);
    }
    for j in 1..=m {
        tree_dist[j] = tree_dist[j - 1] + node_cost(None, Some(t2.node(j)));
    }

    // Scratch for every forest table; the largest one is n x m
    let mut forest = vec![0usize; (n + 1) * (m + 1)];

    for i in 1..=n {
        let node_i = t1.node(i);
        let l1 = t1.leftmost(i);
        let delete_cost = node_cost(Some(node_i), None);

        for j in 1..=m {
            let node_j = t2.node(j);
            let l2 = t2.leftmost(j);

            let delete = tree_dist[(i - 1) * width + j] + delete_cost;
            let insert = tree_dist[i * width + j - 1] + node_cost(None, Some(node_j));

            let between = forest_distance(&t1, &t2, i, j, &tree_dist, width, &mut forest);
            let matched = tree_dist[(l1 - 1) * width + (l2 - 1)]
                + between
                + node_cost(Some(node_i), Some(node_j));

            tree_dist[i * width + j] = delete.min(insert).min(matched);
        }
    }

    tree_dist[n * width + m]
}

/// Forest distance between the descendants of node `i` and node `j`, that is
/// post-order spans `[l(i)..i-1]` and `[l(j)..j-1]`.
///
/// Inner cells combine the forest to the left of each sub-position with the
/// already final `tree_dist` of that sub-position.
fn forest_distance(
    t1: &PostOrderIndex<'_>,
    t2: &PostOrderIndex<'_>,
    i: usize,
    j: usize,
    tree_dist: &[usize],
    width: usize,
    forest: &mut [usize],
) -> usize {
    let l1 = t1.leftmost(i);
    let l2 = t2.leftmost(j);
    let rows = i - l1 + 1;
    let cols = j - l2 + 1;
    let fd = &mut forest[..rows * cols];

    fd[0] = 0;
    for x in 1..rows {
        fd[x * cols] = fd[(x - 1) * cols] + node_cost(Some(t1.node(l1 + x - 1)), None);
    }
    for y in 1..cols {
        fd[y] = fd[y - 1] + node_cost(None, Some(t2.node(l2 + y - 1)));
    }

    for x in 1..rows {
        let px = l1 + x - 1;
        let node_x = t1.node(px);
        // Offset of the sub-position's leftmost descendant inside this table
        let lx = t1.leftmost(px) - l1;
        let delete_cost = node_cost(Some(node_x), None);
        let row = x * cols;
        let prev_row = (x - 1) * cols;

        for y in 1..cols {
            let py = l2 + y - 1;
            let ly = t2.leftmost(py) - l2;

            let delete = fd[prev_row + y] + delete_cost;
            let insert = fd[row + y - 1] + node_cost(None, Some(t2.node(py)));
            let matched = fd[lx * cols + ly] + tree_dist[px * width + py];

            fd[row + y] = delete.min(insert).min(matched);
        }
    }

    fd[rows * cols - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(node_type: &str) -> AstNode {
        AstNode::new(node_type, "")
    }

    fn node(node_type: &str, children: Vec<AstNode>) -> AstNode {
        AstNode::branch(node_type, children)
    }

    fn ident(name: &str) -> AstNode {
        AstNode::new("identifier", name)
    }

    /// Deterministic pseudo-random tree for property checks.
    fn generated_tree(seed: u64, size: usize) -> AstNode {
        const TYPES: [&str; 5] = ["block", "call", "if_statement", "identifier", "integer"];
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as usize
        };

        // Build parent links first, then assemble bottom-up
        let mut parents = vec![usize::MAX];
        for k in 1..size {
            parents.push(next() % k);
        }
        let mut built: Vec<Option<AstNode>> = (0..size)
            .map(|_| {
                let t = TYPES[next() % TYPES.len()];
                Some(AstNode::new(t, format!("v{}", next() % 3)))
            })
            .collect();
        for k in (1..size).rev() {
            let child = built[k].take().unwrap();
            built[parents[k]].as_mut().unwrap().children.insert(0, child);
        }
        built[0].take().unwrap()
    }

    #[test]
    fn test_post_order_index() {
        // f(d(a c(b)) e)
        let tree = node(
            "f",
            vec![node("d", vec![leaf("a"), node("c", vec![leaf("b")])]), leaf("e")],
        );
        let index = PostOrderIndex::build(&tree);
        let order: Vec<&str> = (1..=index.len()).map(|k| index.node(k).node_type.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d", "e", "f"]);
        let leftmost: Vec<usize> = (1..=index.len()).map(|k| index.leftmost(k)).collect();
        assert_eq!(leftmost, vec![1, 2, 2, 1, 5, 1]);
    }

    #[test]
    fn test_absent_trees() {
        let tree = node("module", vec![ident("x"), ident("y")]);
        assert_eq!(tree_edit_distance(None, None), 0);
        assert_eq!(tree_edit_distance(None, Some(&tree)), 3);
        assert_eq!(tree_edit_distance(Some(&tree), None), 3);
    }

    #[test]
    fn test_identical_trees() {
        let tree = generated_tree(7, 60);
        assert_eq!(tree_edit_distance(Some(&tree), Some(&tree.clone())), 0);
    }

    #[test]
    fn test_single_leaf_substitution() {
        let a = ident("x");
        let b = ident("y");
        assert_eq!(tree_edit_distance(Some(&a), Some(&b)), 1);
    }

    #[test]
    fn test_classic_example() {
        // f(d(a c(b)) e) -> f(c(d(a b)) e)
        let a = node(
            "f",
            vec![node("d", vec![leaf("a"), node("c", vec![leaf("b")])]), leaf("e")],
        );
        let b = node(
            "f",
            vec![node("c", vec![node("d", vec![leaf("a"), leaf("b")])]), leaf("e")],
        );
        assert_eq!(tree_edit_distance(Some(&a), Some(&b)), 4);
        assert_eq!(tree_edit_distance(Some(&b), Some(&a)), 4);
    }

    #[test]
    fn test_swapped_siblings() {
        // Reordering is never free: x and y cannot both stay matched
        let a = node("module", vec![ident("x"), ident("y")]);
        let b = node("module", vec![ident("y"), ident("x")]);
        assert_eq!(tree_edit_distance(Some(&a), Some(&b)), 3);
        assert_eq!(tree_edit_distance(Some(&b), Some(&a)), 3);
    }

    #[test]
    fn test_renamed_function() {
        // def add(a, b): return a + b  vs  def plus(a, b): return a + b
        let body = |name: &str| {
            node(
                "function_definition",
                vec![
                    AstNode::new("def", "def"),
                    ident(name),
                    node("parameters", vec![ident("a"), ident("b")]),
                    node(
                        "block",
                        vec![node(
                            "return_statement",
                            vec![
                                AstNode::new("return", "return"),
                                node(
                                    "binary_operator",
                                    vec![ident("a"), AstNode::new("+", "+"), ident("b")],
                                ),
                            ],
                        )],
                    ),
                ],
            )
        };
        let a = node("module", vec![body("add")]);
        let b = node("module", vec![body("plus")]);
        assert_eq!(tree_edit_distance(Some(&a), Some(&b)), 11);
        assert_eq!(tree_edit_distance(Some(&a), Some(&a.clone())), 0);
    }

    #[test]
    fn test_insertion_of_leaf() {
        let a = node("function_definition", vec![ident("f")]);
        let b = node("function_definition", vec![ident("f"), leaf("block")]);
        assert_eq!(tree_edit_distance(Some(&a), Some(&b)), 1);
    }

    #[test]
    fn test_insertion_of_subtree() {
        let a = node("function_definition", vec![ident("f")]);
        let b = node(
            "function_definition",
            vec![ident("f"), node("block", vec![leaf("pass_statement")])],
        );
        assert_eq!(tree_edit_distance(Some(&a), Some(&b)), 2);
    }

    #[test]
    fn test_inner_node_deletion() {
        // a(b(c d)) -> a(c d): delete b, keep its children
        let a = node("module", vec![node("block", vec![ident("c"), ident("d")])]);
        let b = node("module", vec![ident("c"), ident("d")]);
        assert_eq!(tree_edit_distance(Some(&a), Some(&b)), 1);
    }

    #[test]
    fn test_root_relabel() {
        let a = node("block", vec![ident("x")]);
        let b = node("module", vec![ident("x")]);
        assert_eq!(tree_edit_distance(Some(&a), Some(&b)), 1);
    }

    #[test]
    fn test_symmetry_and_bounds() {
        for seed in 0..20 {
            let a = generated_tree(seed, 5 + (seed as usize % 25));
            let b = generated_tree(seed + 100, 3 + (seed as usize % 17));
            let ab = tree_edit_distance(Some(&a), Some(&b));
            let ba = tree_edit_distance(Some(&b), Some(&a));
            assert_eq!(ab, ba, "seed {seed}");

            let (n, m) = (a.node_count(), b.node_count());
            assert!(ab <= n + m, "seed {seed}");
            assert!(ab >= n.abs_diff(m), "seed {seed}");
        }
    }

    #[test]
    fn test_triangle_inequality() {
        let trees: Vec<AstNode> = (0..6).map(|s| generated_tree(s, 8 + s as usize * 3)).collect();
        for a in &trees {
            for b in &trees {
                for c in &trees {
                    let ac = tree_edit_distance(Some(a), Some(c));
                    let ab = tree_edit_distance(Some(a), Some(b));
                    let bc = tree_edit_distance(Some(b), Some(c));
                    assert!(ac <= ab + bc);
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let a = generated_tree(42, 120);
        let b = generated_tree(43, 110);
        let first = tree_edit_distance(Some(&a), Some(&b));
        for _ in 0..5 {
            assert_eq!(tree_edit_distance(Some(&a), Some(&b)), first);
        }
    }
}
