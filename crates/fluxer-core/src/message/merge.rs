//! The merge engine: reconciles the held message list with an incoming batch.
//!
//! Ordering is by creation time, then by snowflake id. Timestamps are compared at
//! millisecond resolution, so records stamped within the same millisecond fall through
//! to their ids.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::snowflake::Snowflake;
use super::types::Message;

/// Precomputed ordering key for one message
#[derive(Clone, Debug, PartialEq, Eq)]
struct SortKey {
    millis: Option<i64>,
    snowflake: Option<Snowflake>,
}

impl SortKey {
    fn of(message: &Message) -> Self {
        Self {
            millis: message.timestamp().map(|t| t.timestamp_millis()),
            snowflake: message.snowflake(),
        }
    }
}

/// Present values first (ascending), absent values last
fn cmp_present_first<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_present_first(&self.millis, &other.millis)
            .then_with(|| cmp_present_first(&self.snowflake, &other.snowflake))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The canonical message ordering.
///
/// Parseable timestamps sort before unparseable ones; equal or missing timestamps fall
/// back to ascending snowflake order, with non-numeric ids after numeric ones. Two
/// messages with neither compare equal.
pub fn compare_messages(a: &Message, b: &Message) -> Ordering {
    SortKey::of(a).cmp(&SortKey::of(b))
}

/// Merge `incoming` into `current`.
///
/// Every id from either side appears exactly once; where both sides carry an id the
/// `incoming` record wins. The result is sorted with [`compare_messages`]; the sort is
/// stable, so messages comparing equal keep the order in which their ids were first seen.
pub fn merge_messages(current: &[Message], incoming: &[Message]) -> Vec<Message> {
    let mut slots: HashMap<&str, usize> = HashMap::with_capacity(current.len() + incoming.len());
    let mut union: Vec<&Message> = Vec::with_capacity(current.len() + incoming.len());

    for message in current.iter().chain(incoming) {
        match slots.get(message.id.as_str()) {
            Some(&slot) => union[slot] = message,
            None => {
                slots.insert(message.id.as_str(), union.len());
                union.push(message);
            }
        }
    }

    let mut keyed: Vec<(SortKey, &Message)> = union
        .into_iter()
        .map(|message| (SortKey::of(message), message))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));

    keyed.into_iter().map(|(_, message)| message.clone()).collect()
}
