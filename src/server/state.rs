use axum::extract::FromRef;

use crate::forum::ForumManager;
use crate::storage::AvatarService;
use crate::user::UserManager;
use crate::votes::VoteAggregator;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedUserManager = Arc<UserManager>;
pub type GuardedForumManager = Arc<ForumManager>;
pub type GuardedVoteAggregator = Arc<VoteAggregator>;
pub type GuardedAvatarService = Arc<AvatarService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub user_manager: GuardedUserManager,
    pub forum_manager: GuardedForumManager,
    pub vote_aggregator: GuardedVoteAggregator,
    pub avatar_service: GuardedAvatarService,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        user_manager: GuardedUserManager,
        forum_manager: GuardedForumManager,
        vote_aggregator: GuardedVoteAggregator,
        avatar_service: GuardedAvatarService,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            user_manager,
            forum_manager,
            vote_aggregator,
            avatar_service,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedForumManager {
    fn from_ref(input: &ServerState) -> Self {
        input.forum_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedVoteAggregator {
    fn from_ref(input: &ServerState) -> Self {
        input.vote_aggregator.clone()
    }
}

impl FromRef<ServerState> for GuardedAvatarService {
    fn from_ref(input: &ServerState) -> Self {
        input.avatar_service.clone()
    }
}
