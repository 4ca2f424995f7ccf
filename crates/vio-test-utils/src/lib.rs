//! Testing fixtures and assertions for vio.
//!
//! - **Fixtures**: throwaway git repositories with tracked and untracked files
//! - **Assertions**: checks over files and snapshot directories
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use vio_test_utils::{require_tool, TestRepo};
//!
//! #[tokio::test]
//! async fn test_commit() {
//!     require_tool!("git");
//!     let repo = TestRepo::new()
//!         .with_tracked_file("README", "hello")
//!         .with_file("results/out.csv", "1,2,3")
//!         .build();
//!
//!     assert!(repo.is_clean());
//! }
//! ```

pub mod assertions;
pub mod fixtures;

pub use fixtures::{has_tool, BuiltTestRepo, TestRepo};
