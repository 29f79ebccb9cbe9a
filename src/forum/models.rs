use crate::votes::{VoteDirection, VoteTally};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY_COLOR: &str = "#3B82F6";
pub const MAX_TITLE_CHARS: usize = 300;
pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;
pub const MAX_PAGE_OFFSET: usize = i64::MAX as usize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: usize,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: String,
    pub created: i64,
}

/// A category as declared in the config file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Thread {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: usize,
    pub category_id: usize,
    pub upvotes: i64,
    pub downvotes: i64,
    pub reply_count: i64,
    pub created: i64,
    pub updated: i64,
}

impl Thread {
    pub fn tally(&self) -> VoteTally {
        VoteTally::new(self.upvotes, self.downvotes)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub id: String,
    pub content: String,
    pub author_id: usize,
    pub thread_id: String,
    pub parent_id: Option<String>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created: i64,
    pub updated: i64,
}

impl Reply {
    pub fn tally(&self) -> VoteTally {
        VoteTally::new(self.upvotes, self.downvotes)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadSort {
    #[default]
    Newest,
    Top,
}

impl ThreadSort {
    pub(crate) fn order_by(&self) -> &'static str {
        match self {
            ThreadSort::Newest => "t.created DESC, t.rowid DESC",
            ThreadSort::Top => "(t.upvotes - t.downvotes) DESC, t.created DESC, t.rowid DESC",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThreadFilter {
    pub category_id: Option<usize>,
    pub author_id: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    /// Builds a page, clamping the limit to 1..=MAX_PAGE_LIMIT and the offset
    /// to what SQLite can bind.
    pub fn new(offset: Option<usize>, limit: Option<usize>) -> Self {
        Page {
            offset: offset.unwrap_or(0).min(MAX_PAGE_OFFSET),
            limit: limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserActivity {
    pub threads: usize,
    pub replies: usize,
    pub upvotes_received: i64,
}

/// Thread plus the caller's vote on it, as rendered in listings.
#[derive(Clone, Debug, Serialize)]
pub struct ThreadView {
    #[serde(flatten)]
    pub thread: Thread,
    pub score: i64,
    pub user_vote: Option<VoteDirection>,
}

impl ThreadView {
    pub fn new(thread: Thread, user_vote: Option<VoteDirection>) -> Self {
        ThreadView {
            score: thread.tally().score(),
            thread,
            user_vote,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ReplyView {
    #[serde(flatten)]
    pub reply: Reply,
    pub score: i64,
    pub user_vote: Option<VoteDirection>,
}

impl ReplyView {
    pub fn new(reply: Reply, user_vote: Option<VoteDirection>) -> Self {
        ReplyView {
            score: reply.tally().score(),
            reply,
            user_vote,
        }
    }
}
