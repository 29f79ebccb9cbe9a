//! Test fixture creation for the forum and user databases

use super::constants::*;
use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;
use vibey_server::forum::{CategorySeed, ForumManager, SqliteForumStore};
use vibey_server::user::{SqliteUserStore, UserManager};

/// Creates a temporary db directory holding:
/// - user.db with the test user and the other user
/// - forum.db with the seeded categories
pub fn create_test_db_dir() -> Result<TempDir> {
    let dir = TempDir::new()?;

    let user_store = Arc::new(SqliteUserStore::new(dir.path().join("user.db"))?);
    let user_manager = UserManager::new(user_store);
    user_manager.sign_up(TEST_EMAIL, TEST_PASS, Some(TEST_USERNAME))?;
    user_manager.sign_up(OTHER_EMAIL, OTHER_PASS, Some(OTHER_USERNAME))?;

    let forum_store = Arc::new(SqliteForumStore::new(dir.path().join("forum.db"))?);
    let forum_manager = ForumManager::new(forum_store);
    forum_manager.seed_categories(&[
        CategorySeed {
            name: CATEGORY_GENERAL_NAME.to_string(),
            slug: CATEGORY_GENERAL.to_string(),
            description: Some("Anything goes".to_string()),
            color: None,
        },
        CategorySeed {
            name: CATEGORY_SHOWCASE_NAME.to_string(),
            slug: CATEGORY_SHOWCASE.to_string(),
            description: None,
            color: Some(CATEGORY_SHOWCASE_COLOR.to_string()),
        },
    ])?;

    std::fs::create_dir_all(dir.path().join("media").join("avatars"))?;
    Ok(dir)
}
