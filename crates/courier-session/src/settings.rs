//! Client settings received with the bootstrap config.
//!
//! Constructed once per session and shared by reference; the loader updates
//! it on every successful config fetch and asks the persistence collaborator
//! to write it out. [`SettingsSnapshot`] is the plain-data form that
//! collaborator serializes.

use std::sync::atomic::{AtomicI32, Ordering};

use serde::{Deserialize, Serialize};

/// Group-size limit assumed before any config has been loaded.
pub const DEFAULT_MAX_GROUP_SIZE: i32 = 200;

/// Process-wide limits, updated on config load.
#[derive(Debug)]
pub struct ClientSettings {
    max_group_size: AtomicI32,
}

impl ClientSettings {
    pub fn new() -> Self {
        Self {
            max_group_size: AtomicI32::new(DEFAULT_MAX_GROUP_SIZE),
        }
    }

    /// Restore from the snapshot read at startup.
    pub fn from_snapshot(snapshot: &SettingsSnapshot) -> Self {
        Self {
            max_group_size: AtomicI32::new(snapshot.max_group_size),
        }
    }

    pub fn max_group_size(&self) -> i32 {
        self.max_group_size.load(Ordering::Relaxed)
    }

    pub fn set_max_group_size(&self, limit: i32) {
        self.max_group_size.store(limit, Ordering::Relaxed);
    }

    /// Plain-data copy for the persistence collaborator.
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            max_group_size: self.max_group_size(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable form of [`ClientSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    pub max_group_size: i32,
}
