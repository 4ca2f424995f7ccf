//! Utilities shared by the vio crates: tracing setup, lexical path helpers
//! and step timing.

pub mod log;
pub mod path;
pub mod timing;

pub use timing::TimingGuard;
