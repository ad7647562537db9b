//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use arbol::prelude::*;
//! ```

pub use crate::compute::{CpuContext, ExecutionContext};
pub use crate::conv::{Occurrence, PatchPlan, TreeConv};
pub use crate::error::{ArbolError, Result};
pub use crate::primitives::Matrix;
pub use crate::tree::Tree;
