//! courier-core — shared types for the Courier client.
//! All other Courier crates depend on this one.

pub mod auth;
pub mod dc;

pub use auth::{AuthKey, AUTH_KEY_LEN};
pub use dc::{BootstrapConfig, DcId, DcOption, DC_NONE, DEFAULT_MAIN_DC};
