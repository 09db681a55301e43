//! Routing and projection of scanned state into polls.
//!
//! # Data Flow
//! ```text
//! Vec<StateEntry>
//!     → route_entries (counter / polls:{id} / user_votes:{user}:{id})
//!     → RawState
//!     → project (normalize options, dates, numbers; attach user vote)
//!     → Vec<Poll> ordered by id
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::state::types::{Poll, PollOption, RawState, StateEntry};

const DEFAULT_TITLE: &str = "Untitled Poll";
const DEFAULT_CREATOR: &str = "Unknown";

/// Parse a stored value. Strings holding JSON are parsed; structured values pass through.
pub fn parse_state_value(value: &Value) -> Option<Value> {
    match value {
        Value::String(text) => serde_json::from_str(text).ok(),
        Value::Null => None,
        other => Some(other.clone()),
    }
}

/// Route scanned entries of `contract` into counter, poll and vote maps.
pub fn route_entries(contract: &str, entries: &[StateEntry]) -> RawState {
    let prefix = format!("{}.", contract);
    let mut state = RawState::default();

    for entry in entries {
        let Some(name) = entry.key.strip_prefix(&prefix) else {
            continue;
        };
        let Some(value) = parse_state_value(&entry.value) else {
            tracing::warn!(key = %entry.key, "Skipping unparseable state value");
            continue;
        };

        if name == "poll_counter" {
            state.poll_counter = as_number(&value).map(|n| n.max(0.0) as u64).unwrap_or(0);
        } else if name.starts_with("polls:") {
            match last_segment_id(name) {
                Some(id) => {
                    state.polls.insert(id, value);
                }
                None => tracing::warn!(key = %entry.key, "Poll key without numeric id"),
            }
        } else if name.starts_with("user_votes:") {
            let mut segments = name.rsplit(':');
            let id = segments.next().and_then(|id| id.parse::<u64>().ok());
            let user = segments.next();
            match (user, id) {
                (Some(user), Some(id)) if !user.is_empty() => {
                    state.votes.insert((user.to_string(), id), value);
                }
                _ => tracing::warn!(key = %entry.key, "Vote key without user and poll id"),
            }
        }
    }

    state
}

/// Build the id-ordered poll list as seen by `user` at `now`.
pub fn project(state: &RawState, user: Option<&str>, now: DateTime<Utc>) -> Vec<Poll> {
    state
        .polls
        .iter()
        .filter_map(|(key_id, record)| {
            let record = record.as_object()?;
            let id = record.get("id").and_then(as_number).map(|n| n as u64).unwrap_or(*key_id);
            let user_choice = user.and_then(|user| {
                state
                    .votes
                    .get(&(user.to_string(), id))
                    .and_then(vote_choice)
            });
            Some(project_poll(id, record, user_choice, now))
        })
        .collect()
}

fn project_poll(
    id: u64,
    record: &Map<String, Value>,
    user_choice: Option<u64>,
    now: DateTime<Utc>,
) -> Poll {
    let field = |snake: &str, camel: &str| {
        record
            .get(snake)
            .or_else(|| record.get(camel))
            .filter(|v| !v.is_null())
    };

    let end_at = field("end_date", "endDate").and_then(as_datetime);
    let text = |name: &str| {
        record
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Poll {
        id,
        title: text("title").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        options: normalize_options(record.get("options")),
        total_votes: field("total_votes", "totalVotes")
            .and_then(as_number)
            .map(|n| n.max(0.0) as u64)
            .unwrap_or(0),
        total_voting_power: field("total_voting_power", "totalVotingPower")
            .and_then(as_number)
            .unwrap_or(0.0),
        creator: text("creator").unwrap_or_else(|| DEFAULT_CREATOR.to_string()),
        created_at: field("created_at", "createdAt").and_then(as_datetime),
        is_active: end_at.map(|end| now <= end).unwrap_or(false),
        end_at,
        user_choice,
        token_contract: field("token_contract", "tokenContract")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Options arrive as an array (strings or objects) or as an object keyed by id.
pub fn normalize_options(options: Option<&Value>) -> Vec<PollOption> {
    match options {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let fallback_id = idx as u64 + 1;
                match item {
                    Value::Object(obj) => {
                        let id = obj
                            .get("id")
                            .or_else(|| obj.get("option_id"))
                            .and_then(as_number)
                            .map(|n| n as u64)
                            .unwrap_or(fallback_id);
                        let text = obj
                            .get("text")
                            .or_else(|| obj.get("option"))
                            .map(display_text)
                            .unwrap_or_default();
                        option_with_counts(id, text, obj)
                    }
                    other => PollOption {
                        id: fallback_id,
                        text: display_text(other),
                        votes: 0,
                        voting_power: 0.0,
                    },
                }
            })
            .collect(),
        Some(Value::Object(entries)) => entries
            .iter()
            .enumerate()
            .map(|(idx, (key, value))| {
                let id = key.parse::<u64>().ok().filter(|id| *id > 0).unwrap_or(idx as u64 + 1);
                match value {
                    Value::Object(obj) => {
                        let text = obj.get("text").map(display_text).unwrap_or_default();
                        option_with_counts(id, text, obj)
                    }
                    other => PollOption {
                        id,
                        text: display_text(other),
                        votes: 0,
                        voting_power: 0.0,
                    },
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn option_with_counts(id: u64, text: String, obj: &Map<String, Value>) -> PollOption {
    let votes = obj.get("votes").and_then(as_number).unwrap_or(0.0);
    let voting_power = obj.get("voting_power").and_then(as_number).unwrap_or(votes);
    PollOption {
        id,
        text,
        votes: votes.max(0.0) as u64,
        voting_power,
    }
}

/// Choice recorded in a vote value: `{option_id}` or a bare number. Zero means none.
pub fn vote_choice(vote: &Value) -> Option<u64> {
    let choice = match vote {
        Value::Object(obj) => obj.get("option_id").and_then(as_number),
        other => as_number(other),
    }?;
    (choice >= 1.0).then_some(choice as u64)
}

fn last_segment_id(name: &str) -> Option<u64> {
    name.rsplit(':').next().and_then(|id| id.parse().ok())
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numbers, numeric strings and `{"__fixed__": "…"}` decimals.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(obj) => obj.get("__fixed__").and_then(as_number),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

/// Date strings and `{"__time__": [y, m, d, h, min, s, µs]}` timestamps, read as UTC.
pub fn as_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date_text(s.trim()),
        Value::Object(obj) => {
            let parts: Vec<u32> = obj
                .get("__time__")?
                .as_array()?
                .iter()
                .map(|part| part.as_u64().map(|n| n as u32))
                .collect::<Option<_>>()?;
            let part = |idx: usize, default: u32| parts.get(idx).copied().unwrap_or(default);
            let date = NaiveDate::from_ymd_opt(part(0, 1970) as i32, part(1, 1), part(2, 1))?;
            let time = date.and_hms_micro_opt(part(3, 0), part(4, 0), part(5, 0), part(6, 0))?;
            Some(Utc.from_utc_datetime(&time))
        }
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
