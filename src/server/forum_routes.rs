use super::error::ApiError;
use super::session::Session;
use super::state::*;
use crate::forum::{Category, Page, Reply, ReplyView, Thread, ThreadSort, ThreadView};
use crate::votes::{VoteDirection, VoteOutcome, VoteTarget};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

#[derive(Deserialize, Debug, Default)]
struct ThreadsQuery {
    pub category: Option<String>,
    /// Username of the author.
    pub author: Option<String>,
    pub sort: Option<ThreadSort>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub category: Option<String>,
    pub sort: Option<ThreadSort>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct CreateThreadBody {
    pub category: String,
    pub title: String,
    pub content: String,
}

#[derive(Deserialize, Debug)]
struct CreateReplyBody {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Deserialize, Debug)]
struct VoteBody {
    pub direction: VoteDirection,
}

#[derive(Serialize, Clone)]
struct AuthorSummary {
    user_id: usize,
    username: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Serialize)]
struct ReplyDetail {
    #[serde(flatten)]
    reply: ReplyView,
    author: AuthorSummary,
}

#[derive(Serialize)]
struct ThreadDetail {
    #[serde(flatten)]
    thread: ThreadView,
    author: AuthorSummary,
    category: Category,
    replies: Vec<ReplyDetail>,
}

/// Resolves author summaries once per user within a request.
struct AuthorCache<'a> {
    user_manager: &'a GuardedUserManager,
    authors: HashMap<usize, AuthorSummary>,
}

impl<'a> AuthorCache<'a> {
    fn new(user_manager: &'a GuardedUserManager) -> Self {
        AuthorCache {
            user_manager,
            authors: HashMap::new(),
        }
    }

    fn get(&mut self, user_id: usize) -> AuthorSummary {
        if let Some(author) = self.authors.get(&user_id) {
            return author.clone();
        }
        let profile = match self.user_manager.find_profile(user_id) {
            Ok(profile) => profile,
            Err(err) => {
                warn!("Could not load profile of user {}: {}", user_id, err);
                None
            }
        };
        let author = AuthorSummary {
            user_id,
            username: profile.as_ref().map(|p| p.username.clone()),
            avatar_url: profile.and_then(|p| p.avatar_url),
        };
        self.authors.insert(user_id, author.clone());
        author
    }
}

fn thread_views(
    aggregator: &GuardedVoteAggregator,
    session: Option<&Session>,
    threads: Vec<Thread>,
) -> Result<Vec<ThreadView>, ApiError> {
    let votes = match session {
        Some(session) => {
            let targets: Vec<VoteTarget> = threads
                .iter()
                .map(|t| VoteTarget::thread(t.id.clone()))
                .collect();
            aggregator.user_votes(session.user_id(), &targets)?
        }
        None => HashMap::new(),
    };
    Ok(threads
        .into_iter()
        .map(|thread| {
            let user_vote = votes.get(&VoteTarget::thread(thread.id.clone())).copied();
            ThreadView::new(thread, user_vote)
        })
        .collect())
}

fn reply_details(
    aggregator: &GuardedVoteAggregator,
    authors: &mut AuthorCache,
    session: Option<&Session>,
    replies: Vec<Reply>,
) -> Result<Vec<ReplyDetail>, ApiError> {
    let votes = match session {
        Some(session) => {
            let targets: Vec<VoteTarget> = replies
                .iter()
                .map(|r| VoteTarget::reply(r.id.clone()))
                .collect();
            aggregator.user_votes(session.user_id(), &targets)?
        }
        None => HashMap::new(),
    };
    Ok(replies
        .into_iter()
        .map(|reply| {
            let user_vote = votes.get(&VoteTarget::reply(reply.id.clone())).copied();
            ReplyDetail {
                author: authors.get(reply.author_id),
                reply: ReplyView::new(reply, user_vote),
            }
        })
        .collect())
}

async fn list_categories(
    State(forum): State<GuardedForumManager>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(forum.list_categories()?))
}

async fn get_category(
    State(forum): State<GuardedForumManager>,
    Path(slug): Path<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(forum.get_category_by_slug(&slug)?))
}

async fn list_threads(
    session: Option<Session>,
    State(state): State<ServerState>,
    Query(query): Query<ThreadsQuery>,
) -> Result<Json<Vec<ThreadView>>, ApiError> {
    let author_id = match &query.author {
        Some(username) => Some(state.user_manager.get_profile_by_username(username)?.user_id),
        None => None,
    };
    let threads = state.forum_manager.list_threads(
        query.category.as_deref(),
        author_id,
        query.sort.unwrap_or_default(),
        Page::new(query.offset, query.limit),
    )?;
    Ok(Json(thread_views(
        &state.vote_aggregator,
        session.as_ref(),
        threads,
    )?))
}

async fn search_threads(
    session: Option<Session>,
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ThreadView>>, ApiError> {
    let threads = state.forum_manager.search_threads(
        &query.q,
        query.category.as_deref(),
        query.sort.unwrap_or_default(),
        Page::new(query.offset, query.limit),
    )?;
    Ok(Json(thread_views(
        &state.vote_aggregator,
        session.as_ref(),
        threads,
    )?))
}

async fn create_thread(
    session: Session,
    State(forum): State<GuardedForumManager>,
    Json(body): Json<CreateThreadBody>,
) -> Result<Response, ApiError> {
    let thread =
        forum.create_thread(session.user_id(), &body.category, &body.title, &body.content)?;
    Ok((StatusCode::CREATED, Json(ThreadView::new(thread, None))).into_response())
}

async fn get_thread(
    session: Option<Session>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadDetail>, ApiError> {
    let thread = state.forum_manager.get_thread(&id)?;
    let category = state.forum_manager.get_category(thread.category_id)?;
    let replies = state.forum_manager.list_replies(&id)?;

    let mut authors = AuthorCache::new(&state.user_manager);
    let author = authors.get(thread.author_id);
    let replies = reply_details(
        &state.vote_aggregator,
        &mut authors,
        session.as_ref(),
        replies,
    )?;
    let user_vote = match &session {
        Some(session) => state
            .vote_aggregator
            .user_vote(session.user_id(), &VoteTarget::thread(id))?,
        None => None,
    };
    let thread = ThreadView::new(thread, user_vote);

    Ok(Json(ThreadDetail {
        thread,
        author,
        category,
        replies,
    }))
}

async fn create_reply(
    session: Session,
    State(forum): State<GuardedForumManager>,
    Path(thread_id): Path<String>,
    Json(body): Json<CreateReplyBody>,
) -> Result<Response, ApiError> {
    let reply = forum.create_reply(
        session.user_id(),
        &thread_id,
        body.parent_id.as_deref().filter(|p| !p.is_empty()),
        &body.content,
    )?;
    Ok((StatusCode::CREATED, Json(ReplyView::new(reply, None))).into_response())
}

async fn list_child_replies(
    session: Option<Session>,
    State(state): State<ServerState>,
    Path(reply_id): Path<String>,
) -> Result<Json<Vec<ReplyDetail>>, ApiError> {
    let replies = state.forum_manager.list_child_replies(&reply_id)?;
    let mut authors = AuthorCache::new(&state.user_manager);
    Ok(Json(reply_details(
        &state.vote_aggregator,
        &mut authors,
        session.as_ref(),
        replies,
    )?))
}

fn cast_vote(
    aggregator: &GuardedVoteAggregator,
    session: Option<Session>,
    target: VoteTarget,
    direction: VoteDirection,
) -> Result<Json<VoteOutcome>, ApiError> {
    let identity = session.map(|s| s.identity);
    Ok(Json(aggregator.cast_vote(
        identity.as_ref(),
        &target,
        direction,
    )?))
}

async fn vote_thread(
    session: Option<Session>,
    State(aggregator): State<GuardedVoteAggregator>,
    Path(id): Path<String>,
    Json(body): Json<VoteBody>,
) -> Result<Json<VoteOutcome>, ApiError> {
    cast_vote(&aggregator, session, VoteTarget::thread(id), body.direction)
}

async fn vote_reply(
    session: Option<Session>,
    State(aggregator): State<GuardedVoteAggregator>,
    Path(id): Path<String>,
    Json(body): Json<VoteBody>,
) -> Result<Json<VoteOutcome>, ApiError> {
    cast_vote(&aggregator, session, VoteTarget::reply(id), body.direction)
}

pub fn make_forum_routes(state: ServerState) -> Router {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{slug}", get(get_category))
        .route("/threads", get(list_threads).post(create_thread))
        .route("/threads/{id}", get(get_thread))
        .route("/threads/{id}/replies", post(create_reply))
        .route("/threads/{id}/vote", post(vote_thread))
        .route("/replies/{id}/children", get(list_child_replies))
        .route("/replies/{id}/vote", post(vote_reply))
        .route("/search", get(search_threads))
        .with_state(state)
}
