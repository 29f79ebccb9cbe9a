mod aggregator;
mod models;
mod transition;
mod vote_store;

pub use aggregator::{VoteAggregator, VoteError};
pub use models::{TargetKind, VoteDirection, VoteOutcome, VoteTally, VoteTarget};
pub use transition::VoteTransition;
pub use vote_store::{AppliedVote, VoteStore};
