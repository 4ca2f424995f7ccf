//! Command handlers for the vio CLI.

pub mod logging;
pub mod repo;

pub use logging::*;
pub use repo::*;
