//! Poll list queries for the presentation layer.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::types::Poll;

/// Orderings offered by the poll list.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    EndingSoon,
    MostTimeLeft,
    Ended,
    Active,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "ending-soon" => Ok(SortOrder::EndingSoon),
            "most-time-left" => Ok(SortOrder::MostTimeLeft),
            "ended" => Ok(SortOrder::Ended),
            "active" => Ok(SortOrder::Active),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Sort `polls` in place. Ties fall back to newest first.
///
/// A poll without an end date is neither ended nor active.
pub fn sort_polls(polls: &mut [Poll], order: SortOrder, now: DateTime<Utc>) {
    let newest = |a: &Poll, b: &Poll| b.id.cmp(&a.id);
    let ended = |poll: &Poll| poll.end_at.map(|end| now > end).unwrap_or(false);
    let active = |poll: &Poll| poll.end_at.map(|end| now <= end).unwrap_or(false);

    match order {
        SortOrder::Newest => polls.sort_by(newest),
        SortOrder::Oldest => polls.sort_by(|a, b| a.id.cmp(&b.id)),
        SortOrder::EndingSoon => {
            polls.sort_by(|a, b| by_end(a, b, false).then_with(|| newest(a, b)))
        }
        SortOrder::MostTimeLeft => {
            polls.sort_by(|a, b| by_end(a, b, true).then_with(|| newest(a, b)))
        }
        SortOrder::Ended => {
            polls.sort_by(|a, b| ended(b).cmp(&ended(a)).then_with(|| newest(a, b)))
        }
        SortOrder::Active => {
            polls.sort_by(|a, b| active(b).cmp(&active(a)).then_with(|| newest(a, b)))
        }
    }
}

/// Compare end dates; polls without one go last in either direction.
fn by_end(a: &Poll, b: &Poll, descending: bool) -> Ordering {
    match (a.end_at, b.end_at) {
        (Some(x), Some(y)) if descending => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Case-insensitive match on title, token contract or creator.
///
/// A blank term matches all.
pub fn search<'a>(polls: &'a [Poll], term: &str) -> Vec<&'a Poll> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return polls.iter().collect();
    }

    polls
        .iter()
        .filter(|poll| {
            poll.title.to_lowercase().contains(&term)
                || poll.creator.to_lowercase().contains(&term)
                || poll
                    .token_contract
                    .as_deref()
                    .map(|token| token.to_lowercase().contains(&term))
                    .unwrap_or(false)
        })
        .collect()
}

/// Polls the session user has voted on.
pub fn voted_only(polls: &[Poll]) -> Vec<&Poll> {
    polls.iter().filter(|poll| poll.has_voted()).collect()
}

/// Share of `total` as a rounded percentage; 0 when there is no total.
pub fn vote_percentage(votes: f64, total: f64) -> u32 {
    if total > 0.0 {
        ((votes / total) * 100.0).round().clamp(0.0, u32::MAX as f64) as u32
    } else {
        0
    }
}
