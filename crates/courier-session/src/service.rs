//! Async driver for the config loader.
//!
//! Owns a [`ConfigLoader`] on one spawned task: control commands, transport
//! completions, and the failover timer all funnel into a single `select!`
//! loop, which is what lets the state machine itself stay lock-free. The
//! timer is a plain deadline — armed by `load()`, re-armed by every tick,
//! cleared whenever a cycle ends — so no termination path can leave a stray
//! timer running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::dispatch::{Completion, CompletionSink, Dispatch};
use crate::loader::{ConfigLoader, LoadOutcome};
use crate::options::DcOptionsTable;
use crate::persist::Persist;
use crate::registry::DcRegistry;
use crate::settings::ClientSettings;

/// How long each config fetch gets before the loader moves on to the
/// next DC.
pub const ENUM_DC_TIMEOUT: Duration = Duration::from_secs(8);

enum Command {
    Load,
    Cancel,
}

/// Handle to the loader task.
///
/// Dropping the handle shuts the task down; an in-flight cycle is cancelled
/// on the way out so no request or config session outlives the service.
pub struct ConfigService {
    commands: mpsc::UnboundedSender<Command>,
    completions: CompletionSink,
}

impl ConfigService {
    /// Spawn the loader task with the stock failover period.
    ///
    /// Returns the control handle and the stream of per-cycle outcomes
    /// (exactly one [`LoadOutcome`] per `load()` cycle).
    pub fn spawn(
        dispatch: Arc<dyn Dispatch>,
        registry: Arc<DcRegistry>,
        options: Arc<DcOptionsTable>,
        settings: Arc<ClientSettings>,
        persist: Arc<dyn Persist>,
    ) -> (Self, mpsc::UnboundedReceiver<LoadOutcome>) {
        Self::spawn_with_timeout(dispatch, registry, options, settings, persist, ENUM_DC_TIMEOUT)
    }

    /// Like [`spawn`](Self::spawn) with an explicit failover period.
    pub fn spawn_with_timeout(
        dispatch: Arc<dyn Dispatch>,
        registry: Arc<DcRegistry>,
        options: Arc<DcOptionsTable>,
        settings: Arc<ClientSettings>,
        persist: Arc<dyn Persist>,
        enum_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<LoadOutcome>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let loader = ConfigLoader::new(dispatch, registry, options, settings, persist);
        tokio::spawn(run(
            loader,
            enum_timeout,
            command_rx,
            completion_rx,
            outcome_tx,
        ));
        (
            Self {
                commands: command_tx,
                completions: completion_tx,
            },
            outcome_rx,
        )
    }

    /// Start a load cycle. No-op while one is in flight.
    pub fn load(&self) {
        let _ = self.commands.send(Command::Load);
    }

    /// Cancel the cycle in flight, if any.
    pub fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel);
    }

    /// The sink the transport delivers fetch completions to.
    pub fn completion_sink(&self) -> CompletionSink {
        self.completions.clone()
    }
}

async fn run(
    mut loader: ConfigLoader,
    enum_timeout: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut completions: mpsc::UnboundedReceiver<Completion>,
    outcomes: mpsc::UnboundedSender<LoadOutcome>,
) {
    // None = timer stopped.
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Load) => {
                    if loader.load() {
                        deadline = Some(Instant::now() + enum_timeout);
                    }
                }
                Some(Command::Cancel) => {
                    deadline = None;
                    if let Some(outcome) = loader.cancel() {
                        let _ = outcomes.send(outcome);
                    }
                }
                None => {
                    // Handle dropped: cancel whatever is in flight and stop.
                    loader.cancel();
                    break;
                }
            },
            Some(completion) = completions.recv() => {
                if let Some(outcome) = loader.on_completion(completion) {
                    deadline = None;
                    let _ = outcomes.send(outcome);
                }
            }
            _ = async { sleep_until(deadline.unwrap()).await }, if deadline.is_some() => {
                match loader.enum_dc() {
                    Some(outcome) => {
                        deadline = None;
                        let _ = outcomes.send(outcome);
                    }
                    None => {
                        deadline = loader
                            .loading()
                            .then(|| Instant::now() + enum_timeout);
                    }
                }
            }
        }
    }
}
