//! Bounded store of raw components kept for recurrence expansion.
//!
//! Two FIFO lanes with independent capacities: one for RRULE-bearing
//! masters, one for everything else (overrides and single events).
//! Insertion and eviction are amortised O(1).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use calmat_rfc::rfc::ical::core::DateOrDateTime;
use tokio::sync::RwLock;

use crate::calendar::RawComponent;

/// Cache shared between ingestion (single writer) and expansion workers (readers).
pub type SharedCache = Arc<RwLock<ComponentCache>>;

/// What happened to a component handed to [`ComponentCache::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    Stored,
    /// Replaced an entry with the same identity.
    Replaced,
    /// A master with the same UID is already stored.
    Shadowed,
    /// The lane has no capacity.
    Dropped,
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    component: Arc<RawComponent>,
}

#[derive(Debug, Default)]
struct Lane {
    capacity: Option<usize>,
    /// Insertion order. May hold stale sequence numbers for entries that
    /// were replaced or purged; those are skipped on eviction.
    order: VecDeque<(u64, String)>,
    entries: HashMap<String, Vec<Entry>>,
    len: usize,
}

impl Lane {
    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    fn has_room(&self) -> bool {
        self.capacity.is_none_or(|cap| cap > 0)
    }

    fn push(&mut self, seq: u64, component: Arc<RawComponent>) -> usize {
        let uid = component.uid.clone();
        self.entries
            .entry(uid.clone())
            .or_default()
            .push(Entry { seq, component });
        self.order.push_back((seq, uid));
        self.len += 1;

        let mut evicted = 0;
        while self.capacity.is_some_and(|cap| self.len > cap) {
            if !self.evict_oldest() {
                break;
            }
            evicted += 1;
        }
        self.compact();
        evicted
    }

    fn evict_oldest(&mut self) -> bool {
        while let Some((seq, uid)) = self.order.pop_front() {
            if self.remove_where(&uid, |entry| entry.seq == seq) > 0 {
                tracing::trace!(uid = %uid, "Evicted oldest cache entry");
                return true;
            }
        }
        false
    }

    /// Removes the entries of `uid` matching `pred`, returning how many went.
    fn remove_where(&mut self, uid: &str, pred: impl Fn(&Entry) -> bool) -> usize {
        let Some(list) = self.entries.get_mut(uid) else {
            return 0;
        };
        let before = list.len();
        list.retain(|entry| !pred(entry));
        let removed = before - list.len();
        if list.is_empty() {
            self.entries.remove(uid);
        }
        self.len -= removed;
        removed
    }

    fn compact(&mut self) {
        if self.order.len() <= self.len * 2 + 16 {
            return;
        }
        let entries = &self.entries;
        self.order.retain(|(seq, uid)| {
            entries
                .get(uid)
                .is_some_and(|list| list.iter().any(|entry| entry.seq == *seq))
        });
    }

    fn get(&self, uid: &str) -> &[Entry] {
        self.entries.get(uid).map_or(&[], Vec::as_slice)
    }
}

/// Two-lane FIFO cache keyed by UID.
///
/// A master always wins over a plain (non-override) component with the same
/// UID: such fragments are refused once the master is stored, and purged
/// when the master arrives later. Overrides are kept alongside their master.
#[derive(Debug)]
pub struct ComponentCache {
    masters: Lane,
    non_masters: Lane,
    evicted: usize,
    seq: u64,
}

impl ComponentCache {
    /// Creates a cache holding at most `total` components, `master_share_percent`
    /// of which are reserved for masters.
    #[must_use]
    pub fn new(total: usize, master_share_percent: u8) -> Self {
        let share = usize::from(master_share_percent.min(100));
        let masters = total.saturating_mul(share) / 100;
        let non_masters = total - masters;
        tracing::debug!(total, masters, non_masters, "Sizing component cache");
        Self {
            masters: Lane::with_capacity(Some(masters)),
            non_masters: Lane::with_capacity(Some(non_masters)),
            evicted: 0,
            seq: 0,
        }
    }

    /// A cache without capacity limits.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            masters: Lane::with_capacity(None),
            non_masters: Lane::with_capacity(None),
            evicted: 0,
            seq: 0,
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedCache {
        Arc::new(RwLock::new(self))
    }

    pub fn insert(&mut self, component: Arc<RawComponent>) -> Inserted {
        self.seq += 1;
        let seq = self.seq;
        let uid = component.uid.clone();

        if component.is_master() {
            if !self.masters.has_room() {
                return Inserted::Dropped;
            }
            let replaced = self.masters.remove_where(&uid, |_| true) > 0;
            let purged = self
                .non_masters
                .remove_where(&uid, |entry| !entry.component.is_override());
            if purged > 0 {
                tracing::trace!(uid = %uid, purged, "Master replaced plain fragments");
            }
            self.evicted += self.masters.push(seq, component);
            return if replaced {
                Inserted::Replaced
            } else {
                Inserted::Stored
            };
        }

        if !component.is_override() && !self.masters.get(&uid).is_empty() {
            return Inserted::Shadowed;
        }
        if !self.non_masters.has_room() {
            return Inserted::Dropped;
        }

        let recurrence_id = component.recurrence_id.clone();
        let replaced = self
            .non_masters
            .remove_where(&uid, |entry| entry.component.recurrence_id == recurrence_id)
            > 0;
        self.evicted += self.non_masters.push(seq, component);
        if replaced {
            Inserted::Replaced
        } else {
            Inserted::Stored
        }
    }

    /// Preferred component for a UID: the master if stored, else the
    /// earliest plain component.
    #[must_use]
    pub fn lookup(&self, uid: &str) -> Option<Arc<RawComponent>> {
        if let Some(master) = self.masters.get(uid).first() {
            return Some(Arc::clone(&master.component));
        }
        self.non_masters
            .get(uid)
            .iter()
            .find(|entry| !entry.component.is_override())
            .or_else(|| self.non_masters.get(uid).first())
            .map(|entry| Arc::clone(&entry.component))
    }

    /// Stored masters, oldest first.
    #[must_use]
    pub fn masters(&self) -> Vec<Arc<RawComponent>> {
        let mut masters: Vec<&Entry> = self.masters.entries.values().flatten().collect();
        masters.sort_by_key(|entry| entry.seq);
        masters
            .into_iter()
            .map(|entry| Arc::clone(&entry.component))
            .collect()
    }

    /// Overrides stored for `uid`, with their RECURRENCE-ID.
    #[must_use]
    pub fn overrides_for(&self, uid: &str) -> Vec<(DateOrDateTime, Arc<RawComponent>)> {
        self.non_masters
            .get(uid)
            .iter()
            .filter_map(|entry| {
                entry
                    .component
                    .recurrence_id
                    .clone()
                    .map(|rid| (rid, Arc::clone(&entry.component)))
            })
            .collect()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.masters.len + self.non_masters.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn master_len(&self) -> usize {
        self.masters.len
    }

    #[must_use]
    pub const fn non_master_len(&self) -> usize {
        self.non_masters.len
    }

    /// Entries evicted for capacity since creation.
    #[must_use]
    pub const fn evicted(&self) -> usize {
        self.evicted
    }
}
