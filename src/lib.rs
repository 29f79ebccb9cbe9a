//! The Vibey forum server library
//!
//! Exposes the internal modules for the binary and for end-to-end tests.

pub mod config;
pub mod forum;
pub mod server;
pub mod sqlite_persistence;
pub mod storage;
pub mod user;
pub mod votes;

// Re-export commonly used types for convenience
pub use forum::{ForumManager, SqliteForumStore};
pub use server::{run_server, RequestsLoggingLevel};
pub use user::{SqliteUserStore, UserManager};
pub use votes::VoteAggregator;
