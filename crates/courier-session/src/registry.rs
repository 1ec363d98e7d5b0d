//! DC registry — one record per data center plus the write-through key index.
//!
//! Two layers of state:
//! - the record table (`DashMap`), one [`DcRecord`] per DC, locked per entry
//! - the write-through key index, a `BTreeMap` behind its own `Mutex`,
//!   holding every non-empty key so that bulk operations (persist-all,
//!   logout-all) never walk the record table under its locks
//!
//! Ordering rule for every key change: record mutation first, index second
//! (nested inside the record's entry lock, so racing set/destroy calls on
//! one DC cannot leave the two out of step), key-changed hook last — and
//! the hook only after both locks are released, so a hook that turns around
//! and queries the registry cannot re-enter a held lock. Lock order is
//! always record entry, then index, never the reverse. Concurrent
//! set/destroy on one DC resolves last-writer-wins.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use courier_core::{AuthKey, DcId, DC_NONE, DEFAULT_MAIN_DC};

use crate::dispatch::Dispatch;
use crate::persist::Persist;

/// Invoked after a DC's key is set or destroyed, outside all registry
/// locks. The `bool` is whether the DC now holds a key.
pub type KeyChangedHook = Box<dyn Fn(DcId, bool) + Send + Sync>;

/// One data center's session-relevant state.
///
/// Lookups hand out clones; the key itself is shared via `Arc`.
#[derive(Debug, Clone)]
pub struct DcRecord {
    pub id: DcId,
    pub key: Option<Arc<AuthKey>>,
    /// Whether the transport has completed connection init against this DC
    /// with the current key. Reset whenever the key changes.
    pub connection_inited: bool,
}

pub struct DcRegistry {
    records: DashMap<DcId, DcRecord>,
    keys_for_write: Mutex<BTreeMap<DcId, Arc<AuthKey>>>,
    user_id: AtomicI32,
    main_dc: AtomicI32,
    main_dc_changed: AtomicBool,
    config_loaded_once: AtomicBool,
    on_key_changed: KeyChangedHook,
}

impl DcRegistry {
    /// Build a registry with an explicit key-changed hook.
    pub fn new(on_key_changed: KeyChangedHook) -> Self {
        Self {
            records: DashMap::new(),
            keys_for_write: Mutex::new(BTreeMap::new()),
            user_id: AtomicI32::new(0),
            main_dc: AtomicI32::new(DEFAULT_MAIN_DC),
            main_dc_changed: AtomicBool::new(false),
            config_loaded_once: AtomicBool::new(false),
            on_key_changed,
        }
    }

    /// Build a registry whose key-changed hook schedules a key write
    /// through `persist`. Removals skip the write; the next change with a
    /// key present covers them.
    pub fn with_persist(persist: Arc<dyn Persist>) -> Self {
        Self::new(Box::new(move |dc, has_key| {
            if has_key {
                tracing::debug!(dc, "auth key changed, scheduling key write");
                persist.write_keys();
            }
        }))
    }

    // ── Process-wide scalars ──────────────────────────────────────────────

    /// The authenticated user id, 0 when unauthenticated.
    pub fn current_user(&self) -> i32 {
        self.user_id.load(Ordering::Relaxed)
    }

    pub fn set_current_user(&self, user: i32) {
        if self.user_id.load(Ordering::Relaxed) == user {
            return;
        }
        self.user_id.store(user, Ordering::Relaxed);
    }

    pub fn main_dc(&self) -> DcId {
        self.main_dc.load(Ordering::Relaxed)
    }

    /// Select the default DC.
    ///
    /// No-op for the null id, and for `first_only` calls once a main DC has
    /// already been explicitly selected. Any accepted call marks the
    /// selection as explicit, even when the value is unchanged.
    pub fn set_main_dc(&self, dc: DcId, first_only: bool) {
        if dc == DC_NONE {
            return;
        }
        if first_only && self.main_dc_changed.load(Ordering::Relaxed) {
            return;
        }
        self.main_dc_changed.store(true, Ordering::Relaxed);
        if self.main_dc.load(Ordering::Relaxed) != dc {
            self.main_dc.store(dc, Ordering::Relaxed);
            tracing::info!(dc, "main dc selected");
        }
    }

    /// True until the first successful bootstrap config fetch.
    pub fn needs_config(&self) -> bool {
        !self.config_loaded_once.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_config_loaded(&self) {
        self.config_loaded_once.store(true, Ordering::Relaxed);
    }

    // ── Records and keys ──────────────────────────────────────────────────

    /// Fetch the record for `dc`, creating it with `key` if absent.
    ///
    /// An existing record wins; `key` is ignored in that case. Creation
    /// mirrors the key into the index (or clears a stale entry) but does
    /// not fire the key-changed hook — this is the load-from-disk path,
    /// nothing changed.
    pub fn get_or_create_record(&self, dc: DcId, key: Option<Arc<AuthKey>>) -> DcRecord {
        use dashmap::mapref::entry::Entry;

        let mut created = false;
        let record = match self.records.entry(dc) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                created = true;
                let record = slot.insert(DcRecord {
                    id: dc,
                    key: key.clone(),
                    connection_inited: false,
                });
                self.write_through(dc, key.as_ref());
                record.clone()
            }
        };
        if created {
            tracing::debug!(
                dc,
                key_id = record.key.as_ref().map(|k| k.key_id()).unwrap_or(0),
                "dc record created"
            );
        }
        record
    }

    /// Replace `dc`'s key, creating the record if needed.
    ///
    /// Resets `connection_inited` (a new key invalidates negotiated
    /// connection state), mirrors the change into the index, then fires the
    /// key-changed hook with all locks released.
    pub fn set_key(&self, dc: DcId, key: Option<Arc<AuthKey>>) {
        tracing::debug!(
            dc,
            key_id = key.as_ref().map(|k| k.key_id()).unwrap_or(0),
            "installing auth key"
        );
        {
            let mut record = self.records.entry(dc).or_insert_with(|| DcRecord {
                id: dc,
                key: None,
                connection_inited: false,
            });
            record.key = key.clone();
            record.connection_inited = false;
            self.write_through(dc, key.as_ref());
        }
        (self.on_key_changed)(dc, key.is_some());
    }

    /// Drop `dc`'s key. Equivalent to installing an empty key; a no-op for
    /// a DC that has no record at all.
    pub fn destroy_key(&self, dc: DcId) {
        if !self.records.contains_key(&dc) {
            return;
        }
        self.set_key(dc, None);
    }

    pub fn record(&self, dc: DcId) -> Option<DcRecord> {
        self.records.get(&dc).map(|record| record.clone())
    }

    pub fn key(&self, dc: DcId) -> Option<Arc<AuthKey>> {
        self.records.get(&dc).and_then(|record| record.key.clone())
    }

    /// Flip the connection-init flag after the transport has (re)negotiated
    /// against the current key. No-op for unknown DCs.
    pub fn set_connection_inited(&self, dc: DcId, inited: bool) {
        if let Some(mut record) = self.records.get_mut(&dc) {
            record.connection_inited = inited;
        }
    }

    /// Snapshot of every non-empty key, in ascending DC order.
    ///
    /// Copied under the index lock and returned after release — callers
    /// never observe a partially built view.
    pub fn all_keys(&self) -> Vec<(DcId, Arc<AuthKey>)> {
        let index = self.keys_for_write.lock().expect("key index lock poisoned");
        index.iter().map(|(dc, key)| (*dc, key.clone())).collect()
    }

    /// Log out every keyed DC except the transport's current main DC.
    ///
    /// The id set is snapshotted under the index lock and the logout
    /// requests issued after release; a key change that races this call is
    /// picked up by the next pass.
    pub fn logout_other_dcs(&self, dispatch: &dyn Dispatch) {
        let keyed: Vec<DcId> = {
            let index = self.keys_for_write.lock().expect("key index lock poisoned");
            index.keys().copied().collect()
        };
        let main = dispatch.main_dc();
        for dc in keyed {
            if dc != main {
                tracing::info!(dc, "logging out secondary dc");
                dispatch.logout(dc);
            }
        }
    }

    fn write_through(&self, dc: DcId, key: Option<&Arc<AuthKey>>) {
        let mut index = self.keys_for_write.lock().expect("key index lock poisoned");
        match key {
            Some(key) => {
                index.insert(dc, key.clone());
            }
            None => {
                index.remove(&dc);
            }
        }
    }
}
