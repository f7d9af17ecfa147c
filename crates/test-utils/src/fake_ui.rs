use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use stagehand::config::{CanvasInfo, ConfigFile, DialogInfo};
use stagehand::ui::backend::{LoadFuture, TransitionFuture};
use stagehand::ui::{
    Dialog, DialogArgs, DialogCloser, DialogLoader, DialogManager, DialogRuntime,
    TransitionPlayer, TransitionRequest, UiSurface,
};

/// Shared observation points for every fake dialog a loader creates.
#[derive(Clone, Default)]
pub struct DialogProbe {
    events: Arc<Mutex<Vec<String>>>,
    drops: Arc<AtomicUsize>,
    loads: Arc<Mutex<HashMap<String, usize>>>,
    closers: Arc<Mutex<HashMap<String, DialogCloser>>>,
}

impl DialogProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle events such as `"Settings:setup"` in order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Number of fake dialogs destroyed so far.
    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    pub fn loads_of(&self, key: &str) -> usize {
        self.loads.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    /// Ask a dialog to close itself through the closer it received in
    /// `setup`. Returns `false` if it was never set up.
    pub fn close(&self, key: &str, args: Option<DialogArgs>) -> bool {
        let closer = self.closers.lock().unwrap().get(key).cloned();
        match closer {
            Some(closer) => {
                closer.close(args);
                true
            }
            None => false,
        }
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

/// Dialog that records every hook call.
pub struct FakeDialog {
    key: String,
    probe: DialogProbe,
}

impl FakeDialog {
    pub fn new(key: &str, probe: &DialogProbe) -> Self {
        Self {
            key: key.to_string(),
            probe: probe.clone(),
        }
    }

    fn record(&self, hook: &str) {
        self.probe.record(format!("{}:{}", self.key, hook));
    }
}

impl Dialog for FakeDialog {
    fn setup(&mut self, _args: Option<&DialogArgs>, closer: DialogCloser) {
        self.record("setup");
        self.probe
            .closers
            .lock()
            .unwrap()
            .insert(self.key.clone(), closer);
    }

    fn set_active(&mut self, active: bool) {
        self.record(if active { "active" } else { "inactive" });
    }

    fn attach_to_layer(&mut self, layer: Option<&str>) {
        self.record(&format!("layer({})", layer.unwrap_or("-")));
    }

    fn begin_transition_in(&mut self) {
        self.record("in");
    }

    fn transition_in_completed(&mut self) {
        self.record("in_done");
    }

    fn begin_transition_out(&mut self) {
        self.record("out");
    }

    fn transition_out_completed(&mut self) {
        self.record("out_done");
    }
}

impl Drop for FakeDialog {
    fn drop(&mut self) {
        self.probe.drops.fetch_add(1, Ordering::SeqCst);
        self.record("drop");
    }
}

/// Loader producing [`FakeDialog`]s; keys marked failing yield an error.
pub struct FakeLoader {
    probe: DialogProbe,
    failing: HashSet<String>,
}

impl FakeLoader {
    pub fn new(probe: &DialogProbe) -> Self {
        Self {
            probe: probe.clone(),
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }
}

impl DialogLoader for FakeLoader {
    fn load(&mut self, info: &DialogInfo) -> LoadFuture {
        *self
            .probe
            .loads
            .lock()
            .unwrap()
            .entry(info.key.clone())
            .or_default() += 1;

        let key = info.key.clone();
        let asset = info.asset_key.clone();
        let fail = self.failing.contains(&key);
        let probe = self.probe.clone();

        Box::pin(async move {
            tokio::task::yield_now().await;
            if fail {
                anyhow::bail!("no asset at '{asset}'");
            }
            Ok(Box::new(FakeDialog::new(&key, &probe)) as Box<dyn Dialog>)
        })
    }
}

/// Test-side control over a [`ControlledPlayer`].
#[derive(Clone)]
pub struct TransitionControl {
    started: Arc<Mutex<Vec<TransitionRequest>>>,
    permits: Arc<Semaphore>,
}

impl TransitionControl {
    /// Let `n` more transitions finish.
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    pub fn started(&self) -> Vec<TransitionRequest> {
        self.started.lock().unwrap().clone()
    }
}

/// Transition player whose transitions only finish when the test releases
/// them.
pub struct ControlledPlayer {
    control: TransitionControl,
}

impl ControlledPlayer {
    pub fn new() -> (Self, TransitionControl) {
        let control = TransitionControl {
            started: Arc::default(),
            permits: Arc::new(Semaphore::new(0)),
        };
        (
            Self {
                control: control.clone(),
            },
            control,
        )
    }
}

impl TransitionPlayer for ControlledPlayer {
    fn play(&mut self, request: &TransitionRequest) -> TransitionFuture {
        self.control.started.lock().unwrap().push(request.clone());
        let permits = Arc::clone(&self.control.permits);
        Box::pin(async move {
            if let Ok(permit) = permits.acquire_owned().await {
                permit.forget();
            }
        })
    }
}

/// Surface that records layer creation and input-block toggles.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    layers: Arc<Mutex<Vec<String>>>,
    blocked: Arc<Mutex<Vec<bool>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> Vec<String> {
        self.layers.lock().unwrap().clone()
    }

    /// Every `set_input_blocked` call, in order.
    pub fn blocked_history(&self) -> Vec<bool> {
        self.blocked.lock().unwrap().clone()
    }
}

impl UiSurface for RecordingSurface {
    fn create_layer(&mut self, canvas: &CanvasInfo) {
        self.layers.lock().unwrap().push(canvas.name.clone());
    }

    fn set_input_blocked(&mut self, blocked: bool) {
        self.blocked.lock().unwrap().push(blocked);
    }
}

/// Build a runtime from the fakes and spawn its loop.
pub fn spawn_runtime<P: TransitionPlayer + 'static>(
    cfg: &ConfigFile,
    loader: FakeLoader,
    player: P,
    surface: RecordingSurface,
) -> (DialogManager, JoinHandle<stagehand::errors::Result<()>>) {
    let (runtime, manager) = DialogRuntime::new(cfg, loader, player, surface);
    let handle = tokio::spawn(runtime.run());
    (manager, handle)
}
