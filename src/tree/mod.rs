//! Tree reconstruction from edge-list tensors.
//!
//! An edge set is an integer tensor shaped `[E, 2]` holding 1-indexed
//! `(parent, child)` pairs, terminated by a `(0, 0)` sentinel pair.
//! Node 1 is the implicit root; node id 0 is reserved for the
//! sentinel. [`Tree::from_edge_set`] parses that encoding into a
//! parent-to-children adjacency structure, and [`Tree::patch`]
//! enumerates the depth-bounded neighborhood of any node as an ordered
//! sequence of [`Occurrence`] records.
//!
//! # Examples
//!
//! ```
//! use arbol::primitives::Matrix;
//! use arbol::tree::Tree;
//!
//! // 1 -> {2, 3}, 2 -> {4}
//! let edges = Matrix::from_vec(4, 2, vec![1, 2, 1, 3, 2, 4, 0, 0]).unwrap();
//! let tree = Tree::from_edge_set(&edges).unwrap();
//!
//! assert_eq!(tree.node_count(), 4);
//! assert_eq!(tree.children(1), &[2, 3]);
//! assert_eq!(tree.children(2), &[4]);
//! assert!(tree.children(3).is_empty());
//! ```

use crate::conv::Occurrence;
use crate::error::{ArbolError, Result};
use crate::primitives::Matrix;

/// Rooted tree as a parent-to-children adjacency structure.
///
/// Children are stored in edge-list order; the adjacency vector is
/// sized `node_count + 1` with index 0 unused (the sentinel slot), so
/// node ids index it directly.
#[derive(Debug, Clone)]
pub struct Tree {
    children: Vec<Vec<usize>>,
    node_count: usize,
}

/// Worklist frame for the iterative patch traversal.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: usize,
    depth: usize,
}

impl Tree {
    /// Parses an edge-set tensor into an adjacency structure.
    ///
    /// Two passes over the edge data, deliberately asymmetric:
    ///
    /// 1. The counting pass scans the ENTIRE tensor; every pair with
    ///    both endpoints nonzero contributes one node, and the root
    ///    contributes one more unconditionally.
    /// 2. The adjacency pass stops at the first pair containing a zero
    ///    (the sentinel) and ignores everything after it.
    ///
    /// Nonzero pairs placed after the sentinel therefore inflate the
    /// node count without creating adjacency; such nodes come out as
    /// isolated. Both passes must keep this exact behavior so that the
    /// forward and backward aggregations agree on the node count.
    ///
    /// # Errors
    ///
    /// - [`ArbolError::DimensionMismatch`] if the second dimension of
    ///   the edge set is not exactly 2.
    /// - [`ArbolError::NodeOutOfRange`] if a consumed edge references
    ///   a node id outside `1..=node_count` (including negative ids).
    pub fn from_edge_set(edge_set: &Matrix<i32>) -> Result<Self> {
        let (edge_rows, edge_cols) = edge_set.shape();
        if edge_cols != 2 {
            return Err(ArbolError::dimension_mismatch(
                "[E, 2]",
                format!("[{edge_rows}, {edge_cols}]"),
            ));
        }

        let edge_data = edge_set.as_slice();

        let mut node_count = 0usize;
        for pair in edge_data.chunks_exact(2) {
            let (u, v) = (pair[0], pair[1]);
            if u != 0 && v != 0 {
                node_count += 1;
            }
        }
        node_count += 1;

        let mut children = vec![Vec::new(); node_count + 1];
        for pair in edge_data.chunks_exact(2) {
            let (u, v) = (pair[0], pair[1]);
            if u == 0 || v == 0 {
                break;
            }
            let parent = Self::checked_id(u, node_count)?;
            let child = Self::checked_id(v, node_count)?;
            children[parent].push(child);
        }

        Ok(Self {
            children,
            node_count,
        })
    }

    fn checked_id(raw: i32, node_count: usize) -> Result<usize> {
        if raw < 1 || raw as usize > node_count {
            return Err(ArbolError::node_out_of_range(i64::from(raw), node_count));
        }
        Ok(raw as usize)
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Children of `node` in edge-list order.
    ///
    /// Returns an empty slice for ids outside `1..=node_count`.
    #[must_use]
    pub fn children(&self, node: usize) -> &[usize] {
        if node == 0 || node > self.node_count {
            return &[];
        }
        &self.children[node]
    }

    /// Collects the depth-bounded neighborhood of `root` as an ordered
    /// patch of [`Occurrence`] records.
    ///
    /// Iterative depth-first traversal over an explicit worklist, so
    /// traversal depth is independent of the call stack. The root is
    /// always emitted first with sibling index 1, sibling count 1 and
    /// depth 1. A child is expanded only if it has not been visited in
    /// this patch and its parent's depth is strictly below
    /// `max_depth`; every record therefore satisfies
    /// `depth <= max_depth`. The visited set also makes the traversal
    /// terminate on inputs that accidentally contain cycles.
    ///
    /// Returns an empty patch for a root outside `1..=node_count`.
    #[must_use]
    pub fn patch(&self, root: usize, max_depth: usize) -> Vec<Occurrence> {
        let mut patch = Vec::new();
        if root == 0 || root > self.node_count {
            return patch;
        }

        let mut visited = vec![false; self.node_count + 1];
        let mut stack = vec![Frame {
            node: root,
            depth: 1,
        }];
        patch.push(Occurrence::new(root, 1, 1, 1));
        visited[root] = true;

        while let Some(&Frame { node, depth }) = stack.last() {
            let siblings = self.children[node].len();
            let mut expanded = false;
            for (i, &child) in self.children[node].iter().enumerate() {
                if !visited[child] && depth < max_depth {
                    visited[child] = true;
                    stack.push(Frame {
                        node: child,
                        depth: depth + 1,
                    });
                    patch.push(Occurrence::new(child, i + 1, siblings, depth + 1));
                    expanded = true;
                }
            }
            if !expanded {
                stack.pop();
            }
        }
        patch
    }

    /// Patches for every root `1..=node_count` in ascending order.
    ///
    /// Empty patches are filtered out. The root record makes every
    /// in-range patch non-empty, so the filter only matters as a
    /// safety net; row `r` of the result corresponds to root `r + 1`.
    #[must_use]
    pub fn patches(&self, max_depth: usize) -> Vec<Vec<Occurrence>> {
        let mut processing_list = Vec::with_capacity(self.node_count);
        for root in 1..=self.node_count {
            let patch = self.patch(root, max_depth);
            if !patch.is_empty() {
                processing_list.push(patch);
            }
        }
        processing_list
    }
}
