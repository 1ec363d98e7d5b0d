//! Shared harness — a scripted transport and a recording persistence layer.

use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use courier_core::{BootstrapConfig, DcId, DcOption};
use courier_session::{
    ClientSettings, ConfigService, Dispatch, DcOptionsTable, DcRegistry, LoadOutcome, Persist,
    RequestId,
};

/// Everything the loader did to the transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch(DcId, RequestId),
    Cancel(RequestId),
    KillSession(DcId),
    Restart(DcId),
    Logout(DcId),
}

/// A transport that records calls and hands out sequential request ids.
#[derive(Default)]
pub struct ScriptedDispatch {
    main_dc: AtomicI32,
    next_request: AtomicU64,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedDispatch {
    pub fn with_main(dc: DcId) -> Arc<Self> {
        let dispatch = Self::default();
        dispatch.main_dc.store(dc, Ordering::SeqCst);
        Arc::new(dispatch)
    }

    pub fn set_main(&self, dc: DcId) {
        self.main_dc.store(dc, Ordering::SeqCst);
    }

    /// Drain and return everything recorded so far.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.calls.lock().unwrap())
    }

    /// Fetch targets recorded so far, without draining.
    pub fn fetch_targets(&self) -> Vec<DcId> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                Call::Fetch(dc, _) => Some(*dc),
                _ => None,
            })
            .collect()
    }
}

impl Dispatch for ScriptedDispatch {
    fn fetch_config(&self, target: DcId) -> RequestId {
        let request = self.next_request.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().unwrap().push(Call::Fetch(target, request));
        request
    }

    fn cancel(&self, request: RequestId) {
        self.calls.lock().unwrap().push(Call::Cancel(request));
    }

    fn kill_session(&self, target: DcId) {
        self.calls.lock().unwrap().push(Call::KillSession(target));
    }

    fn restart(&self, target: DcId) {
        self.calls.lock().unwrap().push(Call::Restart(target));
    }

    fn logout(&self, target: DcId) {
        self.calls.lock().unwrap().push(Call::Logout(target));
    }

    fn main_dc(&self) -> DcId {
        self.main_dc.load(Ordering::SeqCst)
    }
}

/// Persistence collaborator that counts write triggers and keeps the last
/// settings snapshot as JSON, the way a real store would serialize it.
#[derive(Default)]
pub struct RecordingPersist {
    pub key_writes: AtomicUsize,
    pub settings_writes: AtomicUsize,
    settings: Mutex<Option<Arc<ClientSettings>>>,
    pub stored_settings: Mutex<Option<String>>,
}

impl RecordingPersist {
    /// Wire the settings object whose snapshot gets "written".
    pub fn attach_settings(&self, settings: Arc<ClientSettings>) {
        *self.settings.lock().unwrap() = Some(settings);
    }
}

impl Persist for RecordingPersist {
    fn write_keys(&self) {
        self.key_writes.fetch_add(1, Ordering::SeqCst);
    }

    fn write_settings(&self) {
        self.settings_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(settings) = self.settings.lock().unwrap().as_ref() {
            let json = serde_json::to_string(&settings.snapshot())
                .expect("settings snapshot serializes");
            *self.stored_settings.lock().unwrap() = Some(json);
        }
    }
}

/// A fully wired loader stack over the scripted transport.
pub struct Stack {
    pub dispatch: Arc<ScriptedDispatch>,
    pub registry: Arc<DcRegistry>,
    pub options: Arc<DcOptionsTable>,
    pub settings: Arc<ClientSettings>,
    pub persist: Arc<RecordingPersist>,
    pub service: ConfigService,
    pub outcomes: mpsc::UnboundedReceiver<LoadOutcome>,
}

pub const TEST_ENUM_TIMEOUT: Duration = Duration::from_secs(8);

/// Build a stack with the given main DC and known options.
pub fn stack(main: DcId, dcs: &[DcId]) -> Stack {
    let dispatch = ScriptedDispatch::with_main(main);
    let persist = Arc::new(RecordingPersist::default());
    let registry = Arc::new(DcRegistry::with_persist(persist.clone()));
    let options = Arc::new(DcOptionsTable::from_options(
        dcs.iter().map(|dc| dc_option(*dc, 443)),
    ));
    let settings = Arc::new(ClientSettings::new());
    persist.attach_settings(settings.clone());
    let (service, outcomes) = ConfigService::spawn_with_timeout(
        dispatch.clone(),
        registry.clone(),
        options.clone(),
        settings.clone(),
        persist.clone(),
        TEST_ENUM_TIMEOUT,
    );
    Stack {
        dispatch,
        registry,
        options,
        settings,
        persist,
        service,
        outcomes,
    }
}

pub fn dc_option(dc: DcId, port: u16) -> DcOption {
    DcOption::new(dc, format!("dc{dc}.courier.test"), format!("10.0.0.{dc}"), port)
}

pub fn config_with(options: Vec<DcOption>, chat_size_max: i32) -> BootstrapConfig {
    let this_dc = options.first().map(|option| option.id).unwrap_or(0);
    BootstrapConfig {
        dc_options: options,
        chat_size_max,
        date: 1_700_000_000,
        test_mode: false,
        this_dc,
    }
}

/// Let the service task drain its channels without advancing time.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
