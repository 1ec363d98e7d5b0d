//! Bootstrap config loader — the DC-enumeration failover state machine.
//!
//! `load()` fetches the config from the main DC and arms a failover timer.
//! Each timer tick gives up on the previous attempt and tries the next DC
//! from the options table, wrapping around, until *some* request answers.
//! The original main-DC request stays outstanding the whole time and races
//! the enumeration requests; the first completion to arrive while loading
//! wins and runs the shared completion sequence.
//!
//! All state here is owned by a single logical thread (the
//! [`ConfigService`](crate::ConfigService) task feeds in timer ticks and
//! completions), which is why the machine itself needs no locking. The
//! registry and options table it touches carry their own synchronization.

use std::sync::Arc;

use courier_core::{BootstrapConfig, DcId, DC_NONE};

use crate::dispatch::{Completion, Dispatch, FetchError, RequestId};
use crate::options::DcOptionsTable;
use crate::persist::Persist;
use crate::registry::DcRegistry;
use crate::settings::ClientSettings;

/// Terminal failure of one load cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The options table was empty when enumeration needed to advance.
    #[error("no known data center to enumerate")]
    NoKnownDc,
    /// The cycle was cancelled while in flight.
    #[error("config load cancelled")]
    Cancelled,
}

/// How one `load()` cycle ended. Delivered exactly once per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed(LoadError),
}

pub struct ConfigLoader {
    dispatch: Arc<dyn Dispatch>,
    registry: Arc<DcRegistry>,
    options: Arc<DcOptionsTable>,
    settings: Arc<ClientSettings>,
    persist: Arc<dyn Persist>,
    loading: bool,
    /// DC the current enumeration round targets, `DC_NONE` when no round
    /// has started yet (or after cleanup).
    enum_current: DcId,
    /// Outstanding enumeration request. The request issued by `load()`
    /// itself is deliberately untracked; the transport owns its lifecycle.
    enum_request: Option<RequestId>,
}

impl ConfigLoader {
    pub fn new(
        dispatch: Arc<dyn Dispatch>,
        registry: Arc<DcRegistry>,
        options: Arc<DcOptionsTable>,
        settings: Arc<ClientSettings>,
        persist: Arc<dyn Persist>,
    ) -> Self {
        Self {
            dispatch,
            registry,
            options,
            settings,
            persist,
            loading: false,
            enum_current: DC_NONE,
            enum_request: None,
        }
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    /// Start a load cycle against the main DC.
    ///
    /// Returns whether a new cycle started (the caller arms the failover
    /// timer); false while one is already in flight.
    pub fn load(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        self.enum_current = DC_NONE;
        self.enum_request = None;
        let main = self.dispatch.main_dc();
        tracing::debug!(dc = main, "requesting bootstrap config");
        self.dispatch.fetch_config(main);
        true
    }

    /// Failover timer tick: give up on the previous attempt and move to the
    /// next DC.
    ///
    /// `None` means the cycle continues (re-arm the timer); `Some` carries
    /// the terminal outcome of a cycle that cannot proceed. No-op when idle.
    pub fn enum_dc(&mut self) -> Option<LoadOutcome> {
        if !self.loading {
            return None;
        }
        if let Some(request) = self.enum_request.take() {
            self.dispatch.cancel(request);
        }
        if self.enum_current == DC_NONE {
            // First tick: the timed-out attempt was the main-DC request.
            self.enum_current = self.dispatch.main_dc();
        } else {
            // Later ticks: the previous round negotiated a config session
            // with its DC; tear it down so unanswered DCs don't pile up
            // live sessions.
            self.dispatch.kill_session(self.enum_current);
        }
        let Some(next) = self.options.next_after(self.enum_current) else {
            tracing::warn!("no known dc options to enumerate, giving up");
            self.enum_current = DC_NONE;
            self.loading = false;
            return Some(LoadOutcome::Failed(LoadError::NoKnownDc));
        };
        self.enum_current = next;
        tracing::debug!(dc = next, "config fetch timed out, trying next dc");
        self.enum_request = Some(self.dispatch.fetch_config(next));
        None
    }

    /// Route one transport completion.
    pub fn on_completion(&mut self, completion: Completion) -> Option<LoadOutcome> {
        match completion.result {
            Ok(config) => self.on_loaded(config),
            Err(error) => self.on_failed(completion.request, &error),
        }
    }

    /// Success continuation. Ignored when no cycle is in flight, so a late
    /// completion from an already-finished cycle cannot run twice.
    fn on_loaded(&mut self, config: BootstrapConfig) -> Option<LoadOutcome> {
        if !self.loading {
            return None;
        }
        self.loading = false;
        tracing::debug!(
            chat_size_max = config.chat_size_max,
            date = config.date,
            test_mode = config.test_mode,
            this_dc = config.this_dc,
            dc_options = config.dc_options.len(),
            "got bootstrap config"
        );
        let restart = self.options.apply(&config.dc_options);
        for dc in &restart {
            self.dispatch.restart(*dc);
        }
        self.settings.set_max_group_size(config.chat_size_max);
        self.registry.mark_config_loaded();
        self.persist.write_settings();
        self.done();
        Some(LoadOutcome::Loaded)
    }

    /// Failure continuation for a single fetch. Transient: the cycle stays
    /// alive and the failover timer drives the next enumeration step.
    fn on_failed(&mut self, request: RequestId, error: &FetchError) -> Option<LoadOutcome> {
        if !self.loading {
            return None;
        }
        tracing::warn!(%error, "config fetch failed, continuing enumeration");
        if self.enum_request == Some(request) {
            self.enum_request = None;
        }
        None
    }

    /// Cancel the cycle in flight, if any. Safe to call when idle.
    pub fn cancel(&mut self) -> Option<LoadOutcome> {
        let was_loading = self.loading;
        self.loading = false;
        self.done();
        if was_loading {
            tracing::debug!("config load cancelled");
            Some(LoadOutcome::Failed(LoadError::Cancelled))
        } else {
            None
        }
    }

    /// Completion cleanup: cancel the tracked enumeration request and kill
    /// its config session, clearing both fields. Idempotent. Runs only on
    /// the loader's own thread, so it can never race a newer enumeration
    /// round into cancelling the wrong request.
    fn done(&mut self) {
        if let Some(request) = self.enum_request.take() {
            self.dispatch.cancel(request);
        }
        if self.enum_current != DC_NONE {
            self.dispatch.kill_session(self.enum_current);
            self.enum_current = DC_NONE;
        }
    }
}
