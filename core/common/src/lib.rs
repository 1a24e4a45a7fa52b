//! Common utilities and types shared across mirrorsync crates.
//!
//! This module provides the error type used by every layer and the path
//! types that relate entries of the source tree to entries of the replica
//! tree.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{RelativePath, TreeRoot};
