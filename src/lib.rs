//! Arbol: tree-based convolution primitives in pure Rust.
//!
//! Arbol turns a rooted, variable-arity tree of node feature vectors
//! into a fixed-width patch matrix a regular convolution kernel can
//! consume (the "tree2col" transform), and computes the exact
//! reverse-mode gradient of that transform ("col2tree"). Each node's
//! depth-bounded neighborhood becomes one output row, with every
//! member node blended in through three continuous weights derived
//! from its depth and sibling rank.
//!
//! # Quick Start
//!
//! ```
//! use arbol::prelude::*;
//!
//! // Tree 1 -> {2, 3} as (parent, child) pairs with a (0, 0) sentinel.
//! let edges = Matrix::from_vec(3, 2, vec![1, 2, 1, 3, 0, 0]).unwrap();
//!
//! // One 2-channel feature vector per node.
//! let features = Matrix::from_vec(3, 2, vec![
//!     1.0, 10.0,
//!     2.0, 20.0,
//!     3.0, 30.0,
//! ]).unwrap();
//!
//! let conv = TreeConv::new(2).unwrap();
//! let ctx = CpuContext;
//!
//! // Forward: one row per patch, three columns per channel.
//! let patch = conv.forward(&ctx, &edges, &features).unwrap();
//! assert_eq!(patch.shape(), (3, 6));
//!
//! // Backward: exact gradient, one row per node.
//! let out_grad = Matrix::ones(3, 2);
//! let in_grad = conv.backward(&ctx, &edges, &out_grad).unwrap();
//! assert_eq!(in_grad.shape(), (3, 6));
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Row-major `Matrix` storage
//! - [`compute`]: Execution-context capability (allocation, fill)
//! - [`tree`]: Edge-set parsing and patch enumeration
//! - [`conv`]: The convolution operator and its weight functions
//! - [`error`]: Error type and `Result` alias
//!
//! # Determinism
//!
//! Forward and backward accumulate in a fixed order (ascending patch
//! root, traversal push order, channels innermost), so identical
//! inputs produce bit-identical outputs. The optional `parallel`
//! feature distributes independent output rows across threads without
//! changing any row's internal accumulation order, preserving
//! bit-identical results.

pub mod compute;
pub mod conv;
pub mod error;
pub mod prelude;
pub mod primitives;
pub mod tree;

pub use compute::{CpuContext, ExecutionContext};
pub use conv::{Occurrence, PatchPlan, TreeConv};
pub use error::{ArbolError, Result};
pub use primitives::Matrix;
pub use tree::Tree;
