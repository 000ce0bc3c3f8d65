//! Balanced DAG construction and concurrent DAG traversal.

mod builder;
mod error;
mod traversal;

pub use builder::{build_balanced, build_balanced_concurrent};
pub use error::{Error, Result};
pub use traversal::{traverse, Traversal, TraversalConfig, TraversalEvent, TraversalProgress};
