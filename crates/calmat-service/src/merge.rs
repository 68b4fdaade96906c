//! Combines direct events with expanded series into the final list.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::calendar::CalendarEvent;
use crate::component::ID_TIMESTAMP_FORMAT;
use crate::expand::SeriesExpansion;

#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Busy, non-cancelled events ordered by start, with unique ids.
    pub events: Vec<CalendarEvent>,
    /// Direct events replaced by an expanded series.
    pub superseded: usize,
    /// Entries collapsed onto an earlier `(uid, start)`.
    pub duplicates: usize,
    /// Free or cancelled entries dropped.
    pub filtered: usize,
}

/// ## Summary
/// Merges direct events and expanded series.
///
/// Every direct event sharing a UID with an expanded series is dropped in
/// favour of the series. Duplicates are keyed by `(uid, start)`, never by
/// subject. Free and cancelled entries are removed last.
#[must_use]
#[tracing::instrument(skip_all, fields(direct = direct.len(), series = expansions.len()))]
pub fn merge(direct: Vec<CalendarEvent>, expansions: Vec<SeriesExpansion>) -> MergeOutcome {
    let expanded: HashSet<String> = expansions.iter().map(|s| s.uid.clone()).collect();
    let mut outcome = MergeOutcome::default();

    let direct_total = direct.len();
    let combined = direct
        .into_iter()
        .filter(|event| !expanded.contains(&event.uid))
        .collect::<Vec<_>>();
    outcome.superseded = direct_total - combined.len();

    let mut seen: HashSet<(String, DateTime<Utc>)> = HashSet::new();
    let mut events = Vec::new();
    for event in combined
        .into_iter()
        .chain(expansions.into_iter().flat_map(|s| s.instances))
    {
        if !seen.insert((event.uid.clone(), event.start)) {
            outcome.duplicates += 1;
            continue;
        }
        if !event.is_busy || event.is_cancelled {
            outcome.filtered += 1;
            continue;
        }
        events.push(event);
    }

    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    assign_unique_ids(&mut events);

    tracing::debug!(
        events = events.len(),
        superseded = outcome.superseded,
        duplicates = outcome.duplicates,
        filtered = outcome.filtered,
        "Merged events"
    );
    outcome.events = events;
    outcome
}

/// Suffixes colliding ids with the start timestamp, then a counter.
fn assign_unique_ids(events: &mut [CalendarEvent]) {
    let mut taken: HashSet<String> = HashSet::with_capacity(events.len());
    let mut counters: HashMap<String, usize> = HashMap::new();

    for event in events.iter_mut() {
        if taken.insert(event.id.clone()) {
            continue;
        }
        let stamped = format!("{}_{}", event.id, event.start.format(ID_TIMESTAMP_FORMAT));
        let unique = if taken.contains(&stamped) {
            let counter = counters.entry(stamped.clone()).or_insert(1);
            loop {
                *counter += 1;
                let candidate = format!("{stamped}_{counter}");
                if !taken.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            stamped
        };
        taken.insert(unique.clone());
        event.id = unique;
    }
}
