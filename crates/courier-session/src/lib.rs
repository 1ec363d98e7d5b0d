//! courier-session — the DC directory and bootstrap-configuration core.
//!
//! Owns which data centers exist, the per-DC authorization key material,
//! and the failover protocol that fetches the client's runtime config when
//! it is stale or absent. The wire transport and the persistence layer are
//! collaborators behind the [`Dispatch`] and [`Persist`] traits.

pub mod dispatch;
pub mod loader;
pub mod options;
pub mod persist;
pub mod registry;
pub mod service;
pub mod settings;

pub use dispatch::{Completion, CompletionSink, Dispatch, FetchError, RequestId};
pub use loader::{ConfigLoader, LoadError, LoadOutcome};
pub use options::DcOptionsTable;
pub use persist::Persist;
pub use registry::{DcRecord, DcRegistry, KeyChangedHook};
pub use service::{ConfigService, ENUM_DC_TIMEOUT};
pub use settings::{ClientSettings, SettingsSnapshot, DEFAULT_MAX_GROUP_SIZE};
