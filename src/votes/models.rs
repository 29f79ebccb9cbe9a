use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn to_int(&self) -> i32 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    pub fn from_int(value: i32) -> Result<Self> {
        match value {
            1 => Ok(VoteDirection::Up),
            -1 => Ok(VoteDirection::Down),
            _ => bail!("Invalid vote direction {}", value),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Thread,
    Reply,
}

impl TargetKind {
    pub fn to_int(&self) -> i32 {
        match self {
            TargetKind::Thread => 1,
            TargetKind::Reply => 2,
        }
    }

    pub fn from_int(value: i32) -> Result<Self> {
        match value {
            1 => Ok(TargetKind::Thread),
            2 => Ok(TargetKind::Reply),
            _ => bail!("Invalid vote target kind {}", value),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Thread => "thread",
            TargetKind::Reply => "reply",
        }
    }
}

/// The entity a vote is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteTarget {
    pub kind: TargetKind,
    pub id: String,
}

impl VoteTarget {
    pub fn thread<S: Into<String>>(id: S) -> Self {
        VoteTarget {
            kind: TargetKind::Thread,
            id: id.into(),
        }
    }

    pub fn reply<S: Into<String>>(id: S) -> Self {
        VoteTarget {
            kind: TargetKind::Reply,
            id: id.into(),
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub upvotes: i64,
    pub downvotes: i64,
}

impl VoteTally {
    pub fn new(upvotes: i64, downvotes: i64) -> Self {
        VoteTally { upvotes, downvotes }
    }

    pub fn score(&self) -> i64 {
        self.upvotes - self.downvotes
    }
}

/// What a caller gets back after casting a vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VoteOutcome {
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
    pub user_vote: Option<VoteDirection>,
}

impl VoteOutcome {
    pub fn new(tally: VoteTally, user_vote: Option<VoteDirection>) -> Self {
        VoteOutcome {
            upvotes: tally.upvotes,
            downvotes: tally.downvotes,
            score: tally.score(),
            user_vote,
        }
    }
}
