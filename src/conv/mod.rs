//! Tree-based convolution: patch extraction and its exact gradient.
//!
//! A regular convolution slides a fixed window over a grid. Tree-based
//! convolution slides a depth-bounded window over a tree instead: for
//! every node, the subtree down to `max_depth` levels forms a patch,
//! and each node in the patch contributes its feature vector through
//! three continuous weights that encode its depth and sibling rank.
//! Flattening every patch into one fixed-width row yields a matrix a
//! grid kernel can consume.
//!
//! ```text
//! edge set ──> Tree ──> patches (one per root, ascending id)
//!                          │
//!              ┌───────────┴────────────┐
//!              ▼                        ▼
//!   forward: features ─> patch   backward: out_grad ─> in_grad
//!   [num_patches, 3F]            [node_count, 3W]
//! ```
//!
//! [`TreeConv`] is the operator: [`forward`](TreeConv::forward)
//! produces the patch matrix, [`backward`](TreeConv::backward) the
//! exact reverse-mode gradient. Both rebuild the tree and its patches
//! from the edge set on every call; [`TreeConv::plan`] exposes the
//! shared [`PatchPlan`] for callers that want to pay for traversal
//! once.
//!
//! # Examples
//!
//! ```
//! use arbol::compute::CpuContext;
//! use arbol::conv::TreeConv;
//! use arbol::primitives::Matrix;
//!
//! // 1 -> {2, 3}, one feature channel per node.
//! let edges = Matrix::from_vec(3, 2, vec![1, 2, 1, 3, 0, 0]).unwrap();
//! let features = Matrix::from_vec(3, 1, vec![1.0, 2.0, 3.0]).unwrap();
//!
//! let conv = TreeConv::new(2).unwrap();
//! let patch = conv.forward(&CpuContext, &edges, &features).unwrap();
//!
//! // One row per node, three columns per feature channel.
//! assert_eq!(patch.shape(), (3, 3));
//! ```

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::compute::ExecutionContext;
use crate::error::{ArbolError, Result};
use crate::primitives::Matrix;
use crate::tree::Tree;

/// One appearance of a node inside one patch.
///
/// Carries exactly the positional information the continuous weights
/// need: the node id, its 1-based position among its parent's children
/// at expansion time, the parent's total child count, and the 1-based
/// depth below the patch root (the root itself has depth 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    node: usize,
    sibling_index: usize,
    sibling_count: usize,
    depth: usize,
}

impl Occurrence {
    pub(crate) fn new(node: usize, sibling_index: usize, sibling_count: usize, depth: usize) -> Self {
        Self {
            node,
            sibling_index,
            sibling_count,
            depth,
        }
    }

    /// Node id of this occurrence.
    #[must_use]
    pub fn node(&self) -> usize {
        self.node
    }

    /// 1-based position among the parent's children.
    #[must_use]
    pub fn sibling_index(&self) -> usize {
        self.sibling_index
    }

    /// Total number of children of the parent.
    #[must_use]
    pub fn sibling_count(&self) -> usize {
        self.sibling_count
    }

    /// 1-based distance from the patch root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Top weight: 1 at the patch root, decaying linearly to
    /// `1 / max_depth` at the deepest admissible level.
    #[must_use]
    pub fn eta_top(&self, max_depth: usize) -> f32 {
        let d = max_depth as f32;
        (d - (self.depth - 1) as f32) / d
    }

    /// Normalized sibling rank in `[0, 1]`: 0 for a leftmost or only
    /// child, 1 for a rightmost child.
    fn slide(&self) -> f32 {
        if self.sibling_count == 1 {
            0.0
        } else {
            (self.sibling_index - 1) as f32 / (self.sibling_count - 1) as f32
        }
    }

    /// Left weight: rightmost siblings lean left. Complementary to
    /// [`eta_right`](Occurrence::eta_right) under the top-weight
    /// scaling, so the three weights always sum to 1.
    #[must_use]
    pub fn eta_left(&self, max_depth: usize) -> f32 {
        (1.0 - self.eta_top(max_depth)) * self.slide()
    }

    /// Right weight: leftmost siblings lean right.
    #[must_use]
    pub fn eta_right(&self, max_depth: usize) -> f32 {
        (1.0 - self.eta_top(max_depth)) * (1.0 - self.slide())
    }
}

/// Tree-based convolution operator.
///
/// Holds the depth bound; the tree itself arrives per call as an edge
/// set, mirroring how the operator sits in a larger pipeline where the
/// tree differs per sample.
///
/// Forward and backward both recompute the traversal from the edge
/// set, so no state is shared between them; two calls with the same
/// inputs produce bit-identical outputs because every accumulation
/// runs in a fixed order (ascending patch root, traversal push order
/// within a patch, channels innermost).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConv {
    max_depth: usize,
}

impl TreeConv {
    /// Creates the operator with the given traversal depth bound.
    ///
    /// # Errors
    ///
    /// Returns [`ArbolError::InvalidHyperparameter`] if `max_depth`
    /// is 0 (the weight formula divides by it).
    pub fn new(max_depth: usize) -> Result<Self> {
        if max_depth == 0 {
            return Err(ArbolError::InvalidHyperparameter {
                param: "max_depth".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        Ok(Self { max_depth })
    }

    /// Traversal depth bound.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Parses the edge set and enumerates every patch once.
    ///
    /// The plan can serve any number of forward and backward passes
    /// over the same tree; results are bit-identical to the
    /// recomputing entry points, which are defined through it.
    ///
    /// # Errors
    ///
    /// Propagates edge-set parsing failures from
    /// [`Tree::from_edge_set`].
    pub fn plan(&self, edge_set: &Matrix<i32>) -> Result<PatchPlan> {
        let tree = Tree::from_edge_set(edge_set)?;
        let patches = tree.patches(self.max_depth);
        Ok(PatchPlan {
            node_count: tree.node_count(),
            patches,
            max_depth: self.max_depth,
        })
    }

    /// Forward pass: features in, patch matrix out.
    ///
    /// Output shape is `[num_patches, 3 * feature_size]`; row `r`
    /// belongs to the patch rooted at node `r + 1`, and feature
    /// channel `c` occupies columns `3c` (left), `3c + 1` (right) and
    /// `3c + 2` (top). The row count is data-dependent and cannot be
    /// inferred from input shapes alone.
    ///
    /// # Errors
    ///
    /// Edge-set parsing failures, or
    /// [`ArbolError::DimensionMismatch`] if `node_features` does not
    /// have one row per tree node.
    pub fn forward<C: ExecutionContext>(
        &self,
        ctx: &C,
        edge_set: &Matrix<i32>,
        node_features: &Matrix<f32>,
    ) -> Result<Matrix<f32>> {
        self.plan(edge_set)?.forward(ctx, node_features)
    }

    /// Backward pass: patch-matrix gradient in, per-node gradient out.
    ///
    /// Recomputes the same traversal as [`forward`](TreeConv::forward)
    /// and scatters each patch's gradient back to every node that
    /// occurred in it, scaled by the weights of that occurrence.
    /// Output shape is `[node_count, 3 * W]` where `W` is the column
    /// count of `out_grad`: column `c` of `out_grad` feeds the node's
    /// columns `3c` (left), `3c + 1` (right) and `3c + 2` (top).
    ///
    /// # Errors
    ///
    /// Edge-set parsing failures, or
    /// [`ArbolError::DimensionMismatch`] if `out_grad` does not have
    /// one row per patch.
    pub fn backward<C: ExecutionContext>(
        &self,
        ctx: &C,
        edge_set: &Matrix<i32>,
        out_grad: &Matrix<f32>,
    ) -> Result<Matrix<f32>> {
        self.plan(edge_set)?.backward(ctx, out_grad)
    }
}

/// Tree traversal materialized once, shared between passes.
///
/// Built by [`TreeConv::plan`]. Holds every patch in ascending
/// root-id order plus the node count; the aggregation passes are pure
/// functions of this data and their numeric input.
#[derive(Debug, Clone)]
pub struct PatchPlan {
    node_count: usize,
    patches: Vec<Vec<Occurrence>>,
    max_depth: usize,
}

impl PatchPlan {
    /// Number of patches (forward output rows).
    #[must_use]
    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    /// Number of tree nodes (backward output rows).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Depth bound the patches were built with.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// The enumerated patches, ascending by root id.
    #[must_use]
    pub fn patches(&self) -> &[Vec<Occurrence>] {
        &self.patches
    }

    /// Forward aggregation over this plan. See [`TreeConv::forward`].
    ///
    /// # Errors
    ///
    /// [`ArbolError::DimensionMismatch`] if `node_features` does not
    /// have one row per tree node.
    pub fn forward<C: ExecutionContext>(
        &self,
        ctx: &C,
        node_features: &Matrix<f32>,
    ) -> Result<Matrix<f32>> {
        let (feature_rows, feature_size) = node_features.shape();
        if feature_rows != self.node_count {
            return Err(ArbolError::dimension_mismatch(
                format!("[{}, feature_size]", self.node_count),
                format!("[{feature_rows}, {feature_size}]"),
            ));
        }

        let patch_elem_size = 3 * feature_size;
        let mut patch = ctx.alloc(self.patches.len(), patch_elem_size);
        ctx.fill(&mut patch, 0.0);
        if patch_elem_size == 0 {
            return Ok(patch);
        }

        let features = node_features.as_slice();
        let max_depth = self.max_depth;

        #[cfg(feature = "parallel")]
        patch
            .as_mut_slice()
            .par_chunks_mut(patch_elem_size)
            .zip(self.patches.par_iter())
            .for_each(|(row, patch_item)| {
                accumulate_patch_row(row, patch_item, features, feature_size, max_depth);
            });
        #[cfg(not(feature = "parallel"))]
        for (row, patch_item) in patch
            .as_mut_slice()
            .chunks_mut(patch_elem_size)
            .zip(self.patches.iter())
        {
            accumulate_patch_row(row, patch_item, features, feature_size, max_depth);
        }

        // Every enumerated patch produced a row; the trim guards the
        // row count if the empty-patch filter ever drops one.
        patch.truncate_rows(self.patches.len());
        Ok(patch)
    }

    /// Backward aggregation over this plan. See [`TreeConv::backward`].
    ///
    /// # Errors
    ///
    /// [`ArbolError::DimensionMismatch`] if `out_grad` does not have
    /// one row per patch.
    pub fn backward<C: ExecutionContext>(
        &self,
        ctx: &C,
        out_grad: &Matrix<f32>,
    ) -> Result<Matrix<f32>> {
        let (grad_rows, out_width) = out_grad.shape();
        if grad_rows != self.patches.len() {
            return Err(ArbolError::dimension_mismatch(
                format!("[{}, W]", self.patches.len()),
                format!("[{grad_rows}, {out_width}]"),
            ));
        }

        let grad_elem_size = 3 * out_width;
        let mut in_grad = ctx.alloc(self.node_count, grad_elem_size);
        ctx.fill(&mut in_grad, 0.0);
        if grad_elem_size == 0 {
            return Ok(in_grad);
        }

        // Inverted occurrence index: node -> every (patch, occurrence)
        // that referenced it, in patch processing order.
        let mut grad_list: Vec<Vec<(usize, Occurrence)>> = vec![Vec::new(); self.node_count];
        for (patch_id, patch_item) in self.patches.iter().enumerate() {
            for &occ in patch_item {
                grad_list[occ.node() - 1].push((patch_id, occ));
            }
        }

        let out_g = out_grad.as_slice();
        let max_depth = self.max_depth;

        #[cfg(feature = "parallel")]
        in_grad
            .as_mut_slice()
            .par_chunks_mut(grad_elem_size)
            .zip(grad_list.par_iter())
            .for_each(|(row, entries)| {
                accumulate_grad_row(row, entries, out_g, out_width, max_depth);
            });
        #[cfg(not(feature = "parallel"))]
        for (row, entries) in in_grad
            .as_mut_slice()
            .chunks_mut(grad_elem_size)
            .zip(grad_list.iter())
        {
            accumulate_grad_row(row, entries, out_g, out_width, max_depth);
        }

        Ok(in_grad)
    }
}

/// Accumulates one patch into its output row, in traversal push order
/// with channels innermost.
fn accumulate_patch_row(
    row: &mut [f32],
    patch_item: &[Occurrence],
    features: &[f32],
    feature_size: usize,
    max_depth: usize,
) {
    for occ in patch_item {
        let eta_l = occ.eta_left(max_depth);
        let eta_r = occ.eta_right(max_depth);
        let eta_t = occ.eta_top(max_depth);
        let base = (occ.node() - 1) * feature_size;
        for c in 0..feature_size {
            let x = features[base + c];
            row[c * 3] += eta_l * x;
            row[c * 3 + 1] += eta_r * x;
            row[c * 3 + 2] += eta_t * x;
        }
    }
}

/// Scatters the referenced patch gradients into one node's row, in
/// inverted-index append order with channels innermost.
fn accumulate_grad_row(
    row: &mut [f32],
    entries: &[(usize, Occurrence)],
    out_g: &[f32],
    out_width: usize,
    max_depth: usize,
) {
    for &(patch_id, occ) in entries {
        let eta_l = occ.eta_left(max_depth);
        let eta_r = occ.eta_right(max_depth);
        let eta_t = occ.eta_top(max_depth);
        let base = patch_id * out_width;
        for c in 0..out_width {
            let g = out_g[base + c];
            row[c * 3] += eta_l * g;
            row[c * 3 + 1] += eta_r * g;
            row[c * 3 + 2] += eta_t * g;
        }
    }
}

#[cfg(test)]
mod tests_weights_contract;
