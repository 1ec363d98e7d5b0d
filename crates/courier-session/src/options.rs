//! The DC options table — id to network address, read-mostly.
//!
//! Invariants:
//! - at most one option per id at any time
//! - an insert that changes an existing id's ip or port is reported in the
//!   restart set *before* the entry is overwritten, so the caller can bounce
//!   the affected connections after the table settles
//! - iteration order is ascending id, which makes the enumeration successor
//!   ([`next_after`](DcOptionsTable::next_after)) deterministic and stable
//!
//! Reads vastly outnumber writes (every dispatch consults the main DC's
//! address; writes happen once per config load), hence the `RwLock`.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::RwLock;

use courier_core::{DcId, DcOption};

pub struct DcOptionsTable {
    inner: RwLock<BTreeMap<DcId, DcOption>>,
}

impl DcOptionsTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Seed from the stored option list read at startup.
    ///
    /// Duplicate ids keep the first occurrence, same as [`apply`](Self::apply).
    pub fn from_options(options: impl IntoIterator<Item = DcOption>) -> Self {
        let table = Self::new();
        let stored: Vec<DcOption> = options.into_iter().collect();
        table.apply(&stored);
        table
    }

    /// Merge a received option list, returning the ids whose address
    /// changed and therefore need a connection restart.
    ///
    /// The first occurrence of an id within `options` wins; later duplicates
    /// in the same call are ignored. Entries are always overwritten, even
    /// without an address change, so hostname-only updates still land.
    pub fn apply(&self, options: &[DcOption]) -> BTreeSet<DcId> {
        let mut already = BTreeSet::new();
        let mut restart = BTreeSet::new();
        let mut table = self.inner.write().expect("options table lock poisoned");
        for option in options {
            if !already.insert(option.id) {
                continue;
            }
            if let Some(existing) = table.get(&option.id) {
                if existing.ip != option.ip || existing.port != option.port {
                    restart.insert(option.id);
                }
            }
            table.insert(option.id, option.clone());
        }
        restart
    }

    pub fn get(&self, dc: DcId) -> Option<DcOption> {
        self.inner
            .read()
            .expect("options table lock poisoned")
            .get(&dc)
            .cloned()
    }

    /// Copy of the whole table in ascending id order.
    pub fn snapshot(&self) -> Vec<DcOption> {
        self.inner
            .read()
            .expect("options table lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// The enumeration successor of `dc`: the next known id in ascending
    /// order, wrapping to the smallest. `None` iff the table is empty.
    ///
    /// `dc` itself does not have to be in the table; with a single known DC
    /// the successor is that DC again.
    pub fn next_after(&self, dc: DcId) -> Option<DcId> {
        let table = self.inner.read().expect("options table lock poisoned");
        table
            .range((Bound::Excluded(dc), Bound::Unbounded))
            .next()
            .or_else(|| table.iter().next())
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("options table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DcOptionsTable {
    fn default() -> Self {
        Self::new()
    }
}
