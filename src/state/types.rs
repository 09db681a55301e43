//! Reconciled state types.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from the bulk state source.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("State source error: {0}")]
    Transport(String),

    #[error("State query timed out after {0} seconds")]
    Timeout(u64),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Unexpected state response: {0}")]
    Decode(String),
}

pub type StateResult<T> = Result<T, StateError>;

/// One `{key, value}` row of contract state, value as returned by the source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateEntry {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl StateEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// A poll option after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollOption {
    pub id: u64,
    pub text: String,
    pub votes: u64,
    pub voting_power: f64,
}

/// The domain entity the UI renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Poll {
    pub id: u64,
    pub title: String,
    pub options: Vec<PollOption>,
    pub total_votes: u64,
    pub total_voting_power: f64,
    pub creator: String,
    pub created_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Option the session user chose; `None` when they have not voted.
    pub user_choice: Option<u64>,
    pub token_contract: Option<String>,
}

impl Poll {
    pub fn has_voted(&self) -> bool {
        self.user_choice.is_some()
    }

    pub fn option(&self, id: u64) -> Option<&PollOption> {
        self.options.iter().find(|option| option.id == id)
    }
}

/// Parsed records of one scan, routed by key family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawState {
    pub poll_counter: u64,
    pub polls: BTreeMap<u64, Value>,
    pub votes: HashMap<(String, u64), Value>,
}

/// Last reconciled view, replaced wholesale every cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PollSnapshot {
    pub polls: Vec<Poll>,
    pub poll_counter: u64,
    pub user: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl PollSnapshot {
    pub fn empty() -> Self {
        Self {
            polls: Vec::new(),
            poll_counter: 0,
            user: None,
            fetched_at: DateTime::<Utc>::default(),
        }
    }

    pub fn poll(&self, id: u64) -> Option<&Poll> {
        self.polls.iter().find(|poll| poll.id == id)
    }
}
