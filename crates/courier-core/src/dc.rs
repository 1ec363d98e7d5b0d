//! DC identity and addressing — the directory's leaf types.
//!
//! A data center is one of the service's redundant endpoints, identified by
//! a small positive integer that is stable for the life of the process.
//! `BootstrapConfig` is the payload the config loader fetches; this crate
//! defines its shape, the transport owns how it crosses the wire.

use serde::{Deserialize, Serialize};

/// Identifies one data center.
pub type DcId = i32;

/// The null DC id, meaning "no DC".
pub const DC_NONE: DcId = 0;

/// Main DC assumed before any config has ever been loaded.
pub const DEFAULT_MAIN_DC: DcId = 2;

/// Network address of one DC.
///
/// Two options with the same id but a different ip or port represent an
/// address change for an already-known DC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcOption {
    pub id: DcId,
    pub hostname: String,
    pub ip: String,
    pub port: u16,
}

impl DcOption {
    pub fn new(id: DcId, hostname: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            hostname: hostname.into(),
            ip: ip.into(),
            port,
        }
    }
}

/// Runtime configuration received from the service at bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Current DC address list. Replaces the stored options table.
    pub dc_options: Vec<DcOption>,
    /// Maximum members in a group chat.
    pub chat_size_max: i32,
    /// Server time the config was generated at, unix seconds.
    pub date: i32,
    /// Whether the answering DC is a test instance.
    pub test_mode: bool,
    /// The DC that answered the fetch.
    pub this_dc: DcId,
}
