mod forum_manager;
mod forum_store;
pub mod models;
mod sqlite_forum_store;

pub use forum_manager::{ForumError, ForumManager};
pub use forum_store::ForumStore;
pub use models::{
    Category, CategorySeed, Page, Reply, ReplyView, Thread, ThreadFilter, ThreadSort, ThreadView,
    UserActivity,
};
pub use sqlite_forum_store::SqliteForumStore;
