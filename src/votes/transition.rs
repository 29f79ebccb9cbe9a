//! The single rule deciding what a vote request does to an existing vote.

use super::models::{VoteDirection, VoteTally};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteTransition {
    /// No previous vote, a new one is recorded.
    Created(VoteDirection),
    /// Same direction as the previous vote, which is withdrawn.
    Removed(VoteDirection),
    /// Opposite direction, the vote changes side.
    Flipped { from: VoteDirection, to: VoteDirection },
}

impl VoteTransition {
    pub fn resolve(existing: Option<VoteDirection>, requested: VoteDirection) -> Self {
        match existing {
            None => VoteTransition::Created(requested),
            Some(previous) if previous == requested => VoteTransition::Removed(requested),
            Some(previous) => VoteTransition::Flipped {
                from: previous,
                to: requested,
            },
        }
    }

    /// The user's vote after this transition is applied.
    pub fn resulting_vote(&self) -> Option<VoteDirection> {
        match self {
            VoteTransition::Created(direction) => Some(*direction),
            VoteTransition::Removed(_) => None,
            VoteTransition::Flipped { to, .. } => Some(*to),
        }
    }

    /// Relative change to (upvotes, downvotes).
    pub fn counter_delta(&self) -> (i64, i64) {
        fn unit(direction: VoteDirection) -> (i64, i64) {
            match direction {
                VoteDirection::Up => (1, 0),
                VoteDirection::Down => (0, 1),
            }
        }
        match self {
            VoteTransition::Created(direction) => unit(*direction),
            VoteTransition::Removed(direction) => {
                let (up, down) = unit(*direction);
                (-up, -down)
            }
            VoteTransition::Flipped { from, to } => {
                let (from_up, from_down) = unit(*from);
                let (to_up, to_down) = unit(*to);
                (to_up - from_up, to_down - from_down)
            }
        }
    }

    pub fn apply_to(&self, tally: VoteTally) -> VoteTally {
        let (up, down) = self.counter_delta();
        VoteTally::new(tally.upvotes + up, tally.downvotes + down)
    }

    pub fn label(&self) -> &'static str {
        match self {
            VoteTransition::Created(_) => "created",
            VoteTransition::Removed(_) => "removed",
            VoteTransition::Flipped { .. } => "flipped",
        }
    }
}
