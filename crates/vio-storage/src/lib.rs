//! Version model and durable version index for vio.
//!
//! This crate provides:
//! - [`Version`]: a tracked revision, a point in time and caller metadata
//! - [`IndexStore`]: the append-only, newline-delimited log of committed versions
//! - [`IndexLock`]: the exclusive advisory lock that serializes index writers
//!
//! Each index line has the form `revision#epochSeconds,{"key":"value"}`.

pub mod error;
pub mod index;
pub mod lock;
pub mod version;

pub use error::{StorageError, StorageResult};
pub use index::IndexStore;
pub use lock::IndexLock;
pub use version::{Metadata, Version};
