//! Core logic for vio.
//!
//! This crate ties the lower layers into a repository:
//! - Configuration (`.vioconfig`, `VIO_*` overrides)
//! - The version-control oracle (`git`)
//! - The backend state machine: init, commit, checkout, log
//! - The [`Repository`] facade used by the command line

pub mod backend;
pub mod config;
pub mod error;
pub mod posix;
pub mod repository;
pub mod vcs;

pub use backend::{instantiate_backend, Backend, Consistency, Status};
pub use config::{BackendKind, Config, SynchronizerKind};
pub use error::{ConfigError, CoreError, CoreResult, ErrorKind};
pub use posix::PosixBackend;
pub use repository::{check_dependencies, parse_metadata, InitOptions, Repository};
pub use vcs::{GitCli, Vcs};
pub use vio_storage::{Metadata, Version};
