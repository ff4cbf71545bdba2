//! Sorter - restores chronological order
//!
//! Used as the correctness oracle for the disorder simulator (sorting its
//! output must give back source order) and as the ordered-passthrough mode.
//! Sorting is stable and keyed on the timestamp only, so events sharing a
//! timestamp keep their input order.

use std::ops::Deref;

use tracing::debug;

use crate::channel::EventReceiver;
use crate::common::{Event, Payload};

/// Events in non-decreasing timestamp order
#[derive(Debug, Clone, PartialEq)]
pub struct SortedResult<P> {
    events: Vec<Event<P>>,
}

impl<P: Payload> SortedResult<P> {
    pub fn into_vec(self) -> Vec<Event<P>> {
        self.events
    }
}

impl<P> Deref for SortedResult<P> {
    type Target = [Event<P>];

    fn deref(&self) -> &Self::Target {
        &self.events
    }
}

impl<P> IntoIterator for SortedResult<P> {
    type Item = Event<P>;
    type IntoIter = std::vec::IntoIter<Event<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// True if every adjacent pair satisfies `ts(i) <= ts(i + 1)`
pub fn is_chronological<P: Payload>(events: &[Event<P>]) -> bool {
    events
        .windows(2)
        .all(|w| w[0].timestamp_ms() <= w[1].timestamp_ms())
}

/// Stable timestamp sort
pub struct Sorter;

impl Sorter {
    /// Sort `events` by timestamp; empty input gives an empty result
    pub fn sort<P: Payload>(events: impl IntoIterator<Item = Event<P>>) -> SortedResult<P> {
        let mut events: Vec<Event<P>> = events.into_iter().collect();
        events.sort_by_key(Event::timestamp_ms);
        debug!(events = events.len(), "Sorted events");
        SortedResult { events }
    }

    /// Read a channel to end of stream and sort what it delivered
    pub async fn drain<P: Payload>(mut rx: EventReceiver<P>) -> SortedResult<P> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        Self::sort(events)
    }
}
