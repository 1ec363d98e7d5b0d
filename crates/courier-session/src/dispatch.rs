//! Request-dispatch seam — what the transport layer supplies.
//!
//! Intentionally minimal. Every call is non-blocking: issuing a fetch
//! returns a handle immediately, and the result arrives later as a
//! [`Completion`] on the sink the loader hands out
//! ([`ConfigService::completion_sink`](crate::ConfigService::completion_sink)).

use courier_core::{BootstrapConfig, DcId};
use tokio::sync::mpsc;

/// Handle for an in-flight request.
pub type RequestId = u64;

/// Transport-level failure of a single config fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rpc error {code}: {message}")]
pub struct FetchError {
    pub code: i32,
    pub message: String,
}

/// Outcome of one config fetch, tagged with the request it answers.
#[derive(Debug)]
pub struct Completion {
    pub request: RequestId,
    pub result: Result<BootstrapConfig, FetchError>,
}

/// Where the transport delivers completions.
///
/// A cancelled request must not produce a completion after the cancel call
/// returns; a completion already in the channel at that point is fine — the
/// loader tolerates stale deliveries.
pub type CompletionSink = mpsc::UnboundedSender<Completion>;

/// Operations the transport layer provides to this core.
pub trait Dispatch: Send + Sync {
    /// Issue a config fetch against `target`.
    fn fetch_config(&self, target: DcId) -> RequestId;

    /// Cancel an in-flight request. Cancelling a finished one is a no-op.
    fn cancel(&self, request: RequestId);

    /// Tear down the temporary config session negotiated with `target`.
    fn kill_session(&self, target: DcId);

    /// Restart the live connection to `target` because its address changed.
    fn restart(&self, target: DcId);

    /// Issue a fire-and-forget logout against `target`.
    fn logout(&self, target: DcId);

    /// The main DC as the transport currently sees it.
    fn main_dc(&self) -> DcId;
}
