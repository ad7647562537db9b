//! Core compute primitives (Matrix).
//!
//! Row-major 2-D storage shared by every stage of the tree-convolution
//! pipeline: integer edge sets, node feature matrices, and the patch
//! and gradient outputs.

mod matrix;

pub use matrix::Matrix;
