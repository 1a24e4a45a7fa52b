//! Storage access abstraction for mirrorsync.
//!
//! This module provides the trait-based interface the synchronizer uses to
//! inspect and modify directory trees, together with two implementations:
//! the local filesystem and an in-memory tree for tests.
//!
//! # Design Principles
//! - No decision-making: providers only report and perform operations
//! - Async operations: All I/O operations are async
//! - Streaming support: File contents are read as chunked streams
//! - Unified error semantics: Consistent error types across providers

pub mod local;
pub mod memory;
pub mod provider;

pub use local::LocalStorage;
pub use memory::{MemoryStorage, Operation};
pub use provider::{ByteStream, FileInfo, StorageAccess};
