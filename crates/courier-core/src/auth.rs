//! Authorization keys — the per-DC shared secret that encrypts a session.
//!
//! A key is immutable once created: replacing a DC's key means installing
//! a new `AuthKey`, never mutating one in place. The secret is wiped from
//! memory on drop. Logging, equality, and debug output all go through the
//! derived key id, so key bytes never appear outside this struct.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of an authorization key secret in bytes.
pub const AUTH_KEY_LEN: usize = 256;

/// One DC's session authorization key.
///
/// The key id is the first 8 bytes (little-endian) of the BLAKE3 digest of
/// the secret. Two keys compare equal iff their key ids match.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AuthKey {
    /// The secret — zeroized on drop, never exposed in Debug output.
    secret: [u8; AUTH_KEY_LEN],
    #[zeroize(skip)]
    key_id: u64,
}

impl AuthKey {
    /// Wrap a raw secret, deriving the key id.
    pub fn new(secret: [u8; AUTH_KEY_LEN]) -> Self {
        let digest = blake3::hash(&secret);
        let mut id = [0u8; 8];
        id.copy_from_slice(&digest.as_bytes()[..8]);
        Self {
            secret,
            key_id: u64::from_le_bytes(id),
        }
    }

    /// The derived key id. Safe to log.
    pub fn key_id(&self) -> u64 {
        self.key_id
    }

    /// The raw secret, for the transport's encryption layer.
    /// Callers must not copy this into logs or error messages.
    pub fn secret(&self) -> &[u8; AUTH_KEY_LEN] {
        &self.secret
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_id == other.key_id
    }
}

impl Eq for AuthKey {}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}
