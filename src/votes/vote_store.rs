use super::models::{VoteDirection, VoteTally, VoteTarget};
use super::transition::VoteTransition;
use anyhow::Result;
use std::collections::HashMap;

/// Result of a vote written by a [`VoteStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppliedVote {
    pub transition: VoteTransition,
    pub tally: VoteTally,
}

pub trait VoteStore: Send + Sync {
    /// Applies a vote request for the user on the target.
    /// The existing vote lookup, the vote row write and the counter update on the
    /// target happen in one write transaction.
    /// Returns Ok(None) if the target does not exist, in which case nothing is written.
    fn apply_vote(
        &self,
        user_id: usize,
        target: &VoteTarget,
        direction: VoteDirection,
    ) -> Result<Option<AppliedVote>>;

    /// Returns the user's current vote on the target, if any.
    fn get_user_vote(&self, user_id: usize, target: &VoteTarget) -> Result<Option<VoteDirection>>;

    /// Returns the user's current votes on the given targets.
    /// Targets without a vote are absent from the map.
    fn get_user_votes(
        &self,
        user_id: usize,
        targets: &[VoteTarget],
    ) -> Result<HashMap<VoteTarget, VoteDirection>>;

    /// Returns the cached counters of the target.
    /// Returns Ok(None) if the target does not exist.
    fn get_tally(&self, target: &VoteTarget) -> Result<Option<VoteTally>>;

    /// Recomputes the target's counters from its vote rows and stores them.
    /// Returns Ok(None) if the target does not exist.
    fn reconcile_tally(&self, target: &VoteTarget) -> Result<Option<VoteTally>>;

    /// Every thread and reply that carries vote counters.
    fn list_vote_targets(&self) -> Result<Vec<VoteTarget>>;

    /// Number of upvotes the user has cast on anything.
    fn count_upvotes_cast(&self, user_id: usize) -> Result<usize>;
}
