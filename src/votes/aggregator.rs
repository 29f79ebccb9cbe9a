use super::models::{VoteDirection, VoteOutcome, VoteTally, VoteTarget};
use super::vote_store::VoteStore;
use crate::server::metrics;
use crate::sqlite_persistence::is_busy_error;
use crate::user::Identity;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Voting requires an authenticated user")]
    Unauthenticated,

    #[error("Vote target {0} does not exist")]
    TargetNotFound(VoteTarget),

    #[error("Vote on {0} lost a race with a concurrent write, retry")]
    Conflict(VoteTarget),

    #[error("Failed to persist vote on {target}: {source}")]
    Persistence {
        target: VoteTarget,
        #[source]
        source: anyhow::Error,
    },
}

impl VoteError {
    pub fn retryable(&self) -> bool {
        matches!(self, VoteError::Conflict(_) | VoteError::Persistence { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            VoteError::Unauthenticated => "unauthenticated",
            VoteError::TargetNotFound(_) => "not_found",
            VoteError::Conflict(_) => "conflict",
            VoteError::Persistence { .. } => "persistence",
        }
    }
}

/// Keeps per-entity vote counters consistent with the per-user vote set.
pub struct VoteAggregator {
    store: Arc<dyn VoteStore>,
}

impl VoteAggregator {
    pub fn new(store: Arc<dyn VoteStore>) -> Self {
        VoteAggregator { store }
    }

    pub fn cast_vote(
        &self,
        identity: Option<&Identity>,
        target: &VoteTarget,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, VoteError> {
        let result = self.cast_vote_inner(identity, target, direction);
        if let Err(err) = &result {
            metrics::record_vote_failure(target.kind.as_str(), err.label());
        }
        result
    }

    fn cast_vote_inner(
        &self,
        identity: Option<&Identity>,
        target: &VoteTarget,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, VoteError> {
        let identity = identity.ok_or(VoteError::Unauthenticated)?;
        let start = Instant::now();

        match self.store.apply_vote(identity.user_id, target, direction) {
            Ok(Some(applied)) => {
                debug!(
                    "User {} vote {:?} on {}: {} -> {:?}",
                    identity.user_id,
                    direction,
                    target,
                    applied.transition.label(),
                    applied.tally
                );
                metrics::record_vote(
                    target.kind.as_str(),
                    applied.transition.label(),
                    start.elapsed(),
                );
                Ok(VoteOutcome::new(
                    applied.tally,
                    applied.transition.resulting_vote(),
                ))
            }
            Ok(None) => Err(VoteError::TargetNotFound(target.clone())),
            Err(err) if is_busy_error(&err) => {
                warn!("Vote on {} hit a busy database: {:#}", target, err);
                Err(VoteError::Conflict(target.clone()))
            }
            Err(err) => {
                error!("Failed to apply vote on {}: {:#}", target, err);
                // The write transaction rolled back; make sure the cached counters
                // still match the vote rows before handing back a retryable error.
                if let Err(reconcile_err) = self.reconcile_tally(target) {
                    error!(
                        "Failed to reconcile counters of {}: {:#}",
                        target, reconcile_err
                    );
                }
                Err(VoteError::Persistence {
                    target: target.clone(),
                    source: err,
                })
            }
        }
    }

    pub fn user_vote(
        &self,
        user_id: usize,
        target: &VoteTarget,
    ) -> anyhow::Result<Option<VoteDirection>> {
        self.store.get_user_vote(user_id, target)
    }

    pub fn user_votes(
        &self,
        user_id: usize,
        targets: &[VoteTarget],
    ) -> anyhow::Result<HashMap<VoteTarget, VoteDirection>> {
        if targets.is_empty() {
            return Ok(HashMap::new());
        }
        self.store.get_user_votes(user_id, targets)
    }

    pub fn tally(&self, target: &VoteTarget) -> anyhow::Result<Option<VoteTally>> {
        self.store.get_tally(target)
    }

    pub fn reconcile_tally(&self, target: &VoteTarget) -> anyhow::Result<Option<VoteTally>> {
        self.store.reconcile_tally(target)
    }

    pub fn upvotes_cast(&self, user_id: usize) -> anyhow::Result<usize> {
        self.store.count_upvotes_cast(user_id)
    }

    /// Recomputes the counters of every thread and reply from the vote rows.
    /// Returns how many targets had drifted.
    pub fn reconcile_all(&self) -> anyhow::Result<usize> {
        let targets = self.store.list_vote_targets()?;
        let mut repaired = 0;
        for target in &targets {
            let before = self.tally(target)?;
            let after = self.reconcile_tally(target)?;
            if after.is_some() && before != after {
                warn!(
                    "Counters of {} drifted: {:?} -> {:?}",
                    target, before, after
                );
                repaired += 1;
            }
        }
        info!(
            "Checked vote counters of {} targets, repaired {}",
            targets.len(),
            repaired
        );
        Ok(repaired)
    }
}
