use super::forum_store::ForumStore;
use super::models::{
    Category, CategorySeed, Page, Reply, Thread, ThreadFilter, ThreadSort, UserActivity,
    MAX_TITLE_CHARS,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ForumError {
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Category {0} not found")]
    CategoryNotFound(String),

    #[error("Thread {0} not found")]
    ThreadNotFound(String),

    #[error("Reply {0} not found")]
    ReplyNotFound(String),

    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

impl ForumError {
    fn validation<S: Into<String>>(field: &'static str, message: S) -> Self {
        ForumError::Validation {
            field,
            message: message.into(),
        }
    }
}

type ForumResult<T> = Result<T, ForumError>;

fn required<'a>(field: &'static str, value: &'a str) -> ForumResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ForumError::validation(field, "must not be empty"));
    }
    Ok(trimmed)
}

pub struct ForumManager {
    store: Arc<dyn ForumStore>,
}

impl ForumManager {
    pub fn new(store: Arc<dyn ForumStore>) -> Self {
        ForumManager { store }
    }

    pub fn seed_categories(&self, seeds: &[CategorySeed]) -> ForumResult<()> {
        for seed in seeds {
            required("slug", &seed.slug)?;
            required("name", &seed.name)?;
            let category = self.store.ensure_category(seed)?;
            info!("Category {} ({}) ready", category.slug, category.id);
        }
        Ok(())
    }

    pub fn list_categories(&self) -> ForumResult<Vec<Category>> {
        Ok(self.store.list_categories()?)
    }

    pub fn get_category_by_slug(&self, slug: &str) -> ForumResult<Category> {
        self.store
            .get_category_by_slug(slug)?
            .ok_or_else(|| ForumError::CategoryNotFound(slug.to_string()))
    }

    pub fn get_category(&self, category_id: usize) -> ForumResult<Category> {
        self.store
            .get_category(category_id)?
            .ok_or_else(|| ForumError::CategoryNotFound(category_id.to_string()))
    }

    pub fn create_thread(
        &self,
        author_id: usize,
        category_slug: &str,
        title: &str,
        content: &str,
    ) -> ForumResult<Thread> {
        let title = required("title", title)?;
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(ForumError::validation(
                "title",
                format!("must be at most {} characters", MAX_TITLE_CHARS),
            ));
        }
        let content = required("content", content)?;
        let category = self.get_category_by_slug(category_slug)?;

        let thread = self
            .store
            .insert_thread(author_id, category.id, title, content)?;
        info!(
            "User {} created thread {} in {}",
            author_id, thread.id, category.slug
        );
        Ok(thread)
    }

    pub fn get_thread(&self, thread_id: &str) -> ForumResult<Thread> {
        self.store
            .get_thread(thread_id)?
            .ok_or_else(|| ForumError::ThreadNotFound(thread_id.to_string()))
    }

    pub fn list_threads(
        &self,
        category_slug: Option<&str>,
        author_id: Option<usize>,
        sort: ThreadSort,
        page: Page,
    ) -> ForumResult<Vec<Thread>> {
        let category_id = category_slug
            .map(|slug| self.get_category_by_slug(slug).map(|c| c.id))
            .transpose()?;
        let filter = ThreadFilter {
            category_id,
            author_id,
        };
        Ok(self.store.list_threads(&filter, sort, page)?)
    }

    pub fn search_threads(
        &self,
        query: &str,
        category_slug: Option<&str>,
        sort: ThreadSort,
        page: Page,
    ) -> ForumResult<Vec<Thread>> {
        let query = required("q", query)?;
        let category_id = category_slug
            .map(|slug| self.get_category_by_slug(slug).map(|c| c.id))
            .transpose()?;
        Ok(self.store.search_threads(query, category_id, sort, page)?)
    }

    pub fn create_reply(
        &self,
        author_id: usize,
        thread_id: &str,
        parent_id: Option<&str>,
        content: &str,
    ) -> ForumResult<Reply> {
        let content = required("content", content)?;
        if let Some(parent_id) = parent_id {
            let parent = self
                .store
                .get_reply(parent_id)?
                .ok_or_else(|| ForumError::ReplyNotFound(parent_id.to_string()))?;
            if parent.thread_id != thread_id {
                return Err(ForumError::validation(
                    "parent_id",
                    "parent reply belongs to another thread",
                ));
            }
        }

        self.store
            .insert_reply(author_id, thread_id, parent_id, content)?
            .ok_or_else(|| ForumError::ThreadNotFound(thread_id.to_string()))
    }

    pub fn get_reply(&self, reply_id: &str) -> ForumResult<Reply> {
        self.store
            .get_reply(reply_id)?
            .ok_or_else(|| ForumError::ReplyNotFound(reply_id.to_string()))
    }

    /// Top-level replies of the thread, oldest first.
    pub fn list_replies(&self, thread_id: &str) -> ForumResult<Vec<Reply>> {
        Ok(self.store.list_top_level_replies(thread_id)?)
    }

    pub fn list_child_replies(&self, reply_id: &str) -> ForumResult<Vec<Reply>> {
        self.get_reply(reply_id)?;
        Ok(self.store.list_child_replies(reply_id)?)
    }

    pub fn user_activity(&self, user_id: usize) -> ForumResult<UserActivity> {
        Ok(UserActivity {
            threads: self.store.count_threads_by_author(user_id)?,
            replies: self.store.count_replies_by_author(user_id)?,
            upvotes_received: self.store.sum_upvotes_received(user_id)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::SqliteForumStore;
    use tempfile::TempDir;

    fn create_manager() -> (ForumManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteForumStore::new(temp_dir.path().join("forum.db")).unwrap();
        let manager = ForumManager::new(Arc::new(store));
        manager
            .seed_categories(&[
                CategorySeed {
                    name: "General".to_string(),
                    slug: "general".to_string(),
                    description: None,
                    color: None,
                },
                CategorySeed {
                    name: "Help".to_string(),
                    slug: "help".to_string(),
                    description: Some("Ask away".to_string()),
                    color: Some("#10B981".to_string()),
                },
            ])
            .unwrap();
        (manager, temp_dir)
    }

    fn assert_validation(err: ForumError, expected_field: &str) {
        match err {
            ForumError::Validation { field, .. } => assert_eq!(field, expected_field),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn create_thread_trims_and_validates() {
        let (manager, _dir) = create_manager();

        let thread = manager
            .create_thread(1, "general", "  Hello  ", " body ")
            .unwrap();
        assert_eq!(thread.title, "Hello");
        assert_eq!(thread.content, "body");
        assert_eq!((thread.upvotes, thread.downvotes, thread.reply_count), (0, 0, 0));

        assert_validation(
            manager.create_thread(1, "general", "   ", "body").unwrap_err(),
            "title",
        );
        assert_validation(
            manager.create_thread(1, "general", "title", "").unwrap_err(),
            "content",
        );
        let long_title = "x".repeat(MAX_TITLE_CHARS + 1);
        assert_validation(
            manager
                .create_thread(1, "general", &long_title, "body")
                .unwrap_err(),
            "title",
        );
        assert!(manager
            .create_thread(1, "general", &"é".repeat(MAX_TITLE_CHARS), "body")
            .is_ok());
        assert!(matches!(
            manager.create_thread(1, "nope", "title", "body"),
            Err(ForumError::CategoryNotFound(_))
        ));
    }

    #[test]
    fn reply_parent_must_be_in_same_thread() {
        let (manager, _dir) = create_manager();
        let first = manager.create_thread(1, "general", "one", "x").unwrap();
        let second = manager.create_thread(1, "help", "two", "y").unwrap();
        let parent = manager.create_reply(2, &first.id, None, "hi").unwrap();

        assert_validation(
            manager
                .create_reply(3, &second.id, Some(&parent.id), "wrong thread")
                .unwrap_err(),
            "parent_id",
        );
        assert!(matches!(
            manager.create_reply(3, &first.id, Some("ghost"), "x"),
            Err(ForumError::ReplyNotFound(_))
        ));
        assert!(matches!(
            manager.create_reply(3, "ghost", None, "x"),
            Err(ForumError::ThreadNotFound(_))
        ));

        let child = manager
            .create_reply(3, &first.id, Some(&parent.id), "nested")
            .unwrap();
        assert_eq!(manager.list_child_replies(&parent.id).unwrap(), vec![child]);
        assert_eq!(manager.get_thread(&first.id).unwrap().reply_count, 2);
        assert_eq!(manager.get_thread(&second.id).unwrap().reply_count, 0);
    }

    #[test]
    fn empty_search_query_is_rejected() {
        let (manager, _dir) = create_manager();
        assert_validation(
            manager
                .search_threads("  ", None, ThreadSort::Newest, Page::default())
                .unwrap_err(),
            "q",
        );
    }

    #[test]
    fn list_threads_by_category_slug() {
        let (manager, _dir) = create_manager();
        manager.create_thread(1, "general", "a", "x").unwrap();
        manager.create_thread(1, "help", "b", "y").unwrap();

        let help = manager
            .list_threads(Some("help"), None, ThreadSort::Newest, Page::default())
            .unwrap();
        assert_eq!(help.len(), 1);
        assert_eq!(help[0].title, "b");
        assert!(matches!(
            manager.list_threads(Some("nope"), None, ThreadSort::Newest, Page::default()),
            Err(ForumError::CategoryNotFound(_))
        ));
    }
}
