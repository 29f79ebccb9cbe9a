use super::models::{Category, CategorySeed, Page, Reply, Thread, ThreadFilter, ThreadSort};
use crate::votes::VoteStore;
use anyhow::Result;

pub trait ForumStore: VoteStore + Send + Sync {
    /// Inserts the category or updates name, description and color of the one with the same slug.
    fn ensure_category(&self, seed: &CategorySeed) -> Result<Category>;

    /// Returns all categories ordered by name.
    fn list_categories(&self) -> Result<Vec<Category>>;

    /// Returns Ok(None) if no category has the slug.
    fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// Returns Ok(None) if the category does not exist.
    fn get_category(&self, category_id: usize) -> Result<Option<Category>>;

    /// Stores a new thread. The caller validates the fields.
    fn insert_thread(
        &self,
        author_id: usize,
        category_id: usize,
        title: &str,
        content: &str,
    ) -> Result<Thread>;

    /// Returns Ok(None) if the thread does not exist.
    fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>>;

    fn list_threads(&self, filter: &ThreadFilter, sort: ThreadSort, page: Page)
        -> Result<Vec<Thread>>;

    /// Case-insensitive substring match on title or content.
    fn search_threads(
        &self,
        query: &str,
        category_id: Option<usize>,
        sort: ThreadSort,
        page: Page,
    ) -> Result<Vec<Thread>>;

    /// Stores a reply and bumps the thread's reply count in the same transaction.
    /// Returns Ok(None) if the thread does not exist.
    fn insert_reply(
        &self,
        author_id: usize,
        thread_id: &str,
        parent_id: Option<&str>,
        content: &str,
    ) -> Result<Option<Reply>>;

    /// Returns Ok(None) if the reply does not exist.
    fn get_reply(&self, reply_id: &str) -> Result<Option<Reply>>;

    /// Replies without a parent, oldest first.
    fn list_top_level_replies(&self, thread_id: &str) -> Result<Vec<Reply>>;

    /// Direct children of a reply, oldest first.
    fn list_child_replies(&self, reply_id: &str) -> Result<Vec<Reply>>;

    fn count_threads_by_author(&self, author_id: usize) -> Result<usize>;

    fn count_replies_by_author(&self, author_id: usize) -> Result<usize>;

    /// Sum of upvotes on every thread and reply the user wrote.
    fn sum_upvotes_received(&self, author_id: usize) -> Result<i64>;
}
