// src/ui/stack.rs

//! Pure dialog state machine.
//!
//! [`DialogStack`] never performs IO. Each operation mutates the stack and
//! returns a [`UiStep`] listing what the shell must do (create layers, load
//! instances, play transitions, toggle the input overlay, publish
//! notifications). Completions of that work come back in as
//! [`DialogStack::spawn_finished`] and [`DialogStack::transition_finished`].

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info, warn};

use crate::config::{CanvasInfo, DialogInfo};
use crate::errors::{Result, StagehandError};
use crate::types::TransitionDirection;
use crate::ui::commands::{DialogNotification, TransitionRequest, UiCommand, UiStep};
use crate::ui::dialog::{
    CloseHook, Dialog, DialogArgs, DialogCloser, DialogInstance, DialogKey, DialogState,
    DialogView, InstanceId,
};
use crate::ui::lock::InputLock;
use crate::ui::pool::DialogPool;
use crate::ui::request::{HideCallback, RequestStatus, ShowCallback, ShowHandle, ShowRequest};

/// What to do with a spawned instance nobody is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpawnTarget {
    Pool,
    /// Its scope unloaded while the load was in flight.
    Discard,
}

/// What a not-yet-attached show request is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waiting {
    Spawn,
    /// The instance is mid-hide; reuse it once it reaches the pool.
    Hide,
}

struct PendingShow {
    handle: ShowHandle,
    request: ShowRequest,
    holds_lock: bool,
    waiting: Waiting,
    deferred_hide: Option<Option<DialogArgs>>,
}

/// The show transition currently running for a stack entry.
struct ActiveShow {
    handle: ShowHandle,
    on_show: Option<ShowCallback>,
    holds_lock: bool,
}

struct StackEntry {
    instance: DialogInstance,
    state: DialogState,
    hide_animation: Option<String>,
    show: Option<ActiveShow>,
    /// Handles resolved `Hidden` when this presentation ends.
    watchers: Vec<ShowHandle>,
    on_hide: Vec<HideCallback>,
    /// `hide` arrived while showing; run it once the show completes.
    deferred_hide: Option<Option<DialogArgs>>,
    hide_args: Option<DialogArgs>,
    hide_holds_lock: bool,
}

impl StackEntry {
    fn new(instance: DialogInstance) -> Self {
        Self {
            instance,
            state: DialogState::Pooled,
            hide_animation: None,
            show: None,
            watchers: Vec::new(),
            on_hide: Vec::new(),
            deferred_hide: None,
            hide_args: None,
            hide_holds_lock: false,
        }
    }
}

/// The dialog stack core: active stack, pool, in-flight requests and the
/// input lock.
///
/// Invariants:
/// - a key has at most one live instance, either on the stack or pooled
/// - at most one show request per key is in flight; duplicates share its
///   [`ShowHandle`]
/// - the input overlay is blocked iff the lock count is positive
#[derive(Default)]
pub struct DialogStack {
    /// Layers in ascending order.
    canvases: Vec<CanvasInfo>,
    dialogs: HashMap<DialogKey, DialogInfo>,
    initialized: bool,
    /// Keep-in-memory preloads issued by `initialize` and not yet finished.
    awaiting_preload: HashSet<DialogKey>,
    spawning: HashMap<DialogKey, SpawnTarget>,
    /// Bottom to top.
    stack: Vec<StackEntry>,
    pool: DialogPool,
    pending: HashMap<DialogKey, PendingShow>,
    lock: InputLock,
    next_instance: u64,
    next_request: u64,
    close_hook: Option<CloseHook>,
}

impl DialogStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook handed to dialogs (through [`DialogCloser`]) so they can request
    /// their own hide.
    pub fn set_close_hook(&mut self, hook: CloseHook) {
        self.close_hook = Some(hook);
    }

    /// Create layers and preload keep-in-memory dialogs.
    ///
    /// Only the first call has an effect.
    pub fn initialize(&mut self, canvases: &[CanvasInfo], dialogs: &[DialogInfo]) -> UiStep {
        let mut step = UiStep::new();
        if self.initialized {
            debug!("dialog stack already initialized; ignoring");
            return step;
        }

        self.canvases = canvases.to_vec();
        self.canvases.sort_by_key(|c| c.order);
        for canvas in &self.canvases {
            step.push(UiCommand::CreateLayer(canvas.clone()));
        }

        self.dialogs = dialogs
            .iter()
            .map(|info| (info.key.clone(), info.clone()))
            .collect();

        for info in dialogs.iter().filter(|info| info.keep_in_memory) {
            debug!(dialog = %info.key, "preloading keep-in-memory dialog");
            self.awaiting_preload.insert(info.key.clone());
            self.spawning.insert(info.key.clone(), SpawnTarget::Pool);
            step.push(UiCommand::Spawn(info.clone()));
        }

        self.initialized = true;
        info!(
            layers = self.canvases.len(),
            dialogs = self.dialogs.len(),
            preloads = self.awaiting_preload.len(),
            "dialog stack initialized"
        );
        step
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Initialized and every keep-in-memory preload has finished.
    pub fn is_ready(&self) -> bool {
        self.initialized && self.awaiting_preload.is_empty()
    }

    /// Request that a dialog be shown.
    ///
    /// A show already in flight for the key is joined instead of starting a
    /// second one. A visible dialog is refreshed: moved to the top, set up
    /// again with the new arguments and its show transition replayed.
    pub fn show(&mut self, request: ShowRequest) -> Result<(ShowHandle, UiStep)> {
        if !self.initialized {
            return Err(StagehandError::NotInitialized);
        }

        let key = request.key.clone();
        if let Some(handle) = self.in_flight_handle(&key) {
            debug!(dialog = %key, request = handle.id(), "show already in flight; sharing handle");
            return Ok((handle, UiStep::new()));
        }

        let Some(info) = self.dialogs.get(&key).cloned() else {
            error!(dialog = %key, "show requested for a dialog with no configuration");
            return Err(StagehandError::DialogNotConfigured(key));
        };

        self.next_request += 1;
        let handle = ShowHandle::new(self.next_request, key.clone());
        let mut step = UiStep::new();

        if info.lock_interaction {
            self.acquire_lock(&mut step);
        }

        let mut pending = PendingShow {
            handle: handle.clone(),
            request,
            holds_lock: info.lock_interaction,
            waiting: Waiting::Spawn,
            deferred_hide: None,
        };

        if let Some(idx) = self.stack_index(&key) {
            if self.stack[idx].state == DialogState::Visible {
                debug!(dialog = %key, "refreshing visible dialog");
                let entry = self.stack.remove(idx);
                self.present(entry, pending, &mut step);
            } else {
                // Showing entries were answered by `in_flight_handle`.
                debug!(dialog = %key, "dialog is hiding; show waits for the hide");
                pending.waiting = Waiting::Hide;
                self.pending.insert(key, pending);
            }
        } else if let Some(instance) = self.pool.take(&key) {
            self.present(StackEntry::new(instance), pending, &mut step);
        } else {
            if self.spawning.insert(key.clone(), SpawnTarget::Pool).is_none() {
                step.push(UiCommand::Spawn(info));
            } else {
                debug!(dialog = %key, "joining spawn already in flight");
            }
            self.pending.insert(key, pending);
        }

        Ok((handle, step))
    }

    /// Hide the active instance of `key`.
    ///
    /// A hide that arrives while the dialog is still being shown runs once
    /// the show completes; a second hide while hiding is ignored.
    pub fn hide(&mut self, key: &str, args: Option<DialogArgs>) -> Result<UiStep> {
        if !self.initialized {
            return Err(StagehandError::NotInitialized);
        }

        let mut step = UiStep::new();

        if let Some(pending) = self.pending.get_mut(key) {
            debug!(dialog = %key, "hide deferred until pending show completes");
            pending.deferred_hide = Some(args);
            return Ok(step);
        }

        let Some(idx) = self.stack_index(key) else {
            warn!(dialog = %key, "hide requested for a dialog that is not active");
            return Err(StagehandError::DialogNotFound(key.to_string()));
        };

        match self.stack[idx].state {
            DialogState::Showing => {
                debug!(dialog = %key, "hide deferred until show transition completes");
                self.stack[idx].deferred_hide = Some(args);
            }
            DialogState::Hiding => {
                debug!(dialog = %key, "dialog already hiding; ignoring");
            }
            DialogState::Visible | DialogState::Pooled => {
                self.begin_hide(idx, args, &mut step);
            }
        }

        Ok(step)
    }

    /// Look up a live instance.
    ///
    /// Dialogs with a show in flight are reported as absent. Pooled
    /// instances are only returned when `include_inactive` is set.
    pub fn find(&self, key: &str, include_inactive: bool) -> Option<DialogView> {
        if self.pending.contains_key(key) {
            return None;
        }

        if let Some(entry) = self.stack.iter().find(|e| e.instance.key == key) {
            if entry.state == DialogState::Showing {
                return None;
            }
            return Some(DialogView::of(&entry.instance, entry.state));
        }

        if include_inactive {
            return self
                .pool
                .get(key)
                .map(|instance| DialogView::of(instance, DialogState::Pooled));
        }

        None
    }

    /// Preload into the pool every dialog configured for `scene` that has no
    /// live instance yet.
    pub fn scope_loaded(&mut self, scene: &str) -> Result<UiStep> {
        if !self.initialized {
            return Err(StagehandError::NotInitialized);
        }

        let mut preloads: Vec<DialogInfo> = self
            .dialogs
            .values()
            .filter(|info| info.preloads_in(scene))
            .cloned()
            .collect();
        preloads.sort_by(|a, b| a.key.cmp(&b.key));

        let mut step = UiStep::new();
        for info in preloads {
            if let Some(target) = self.spawning.get_mut(&info.key) {
                if *target == SpawnTarget::Discard {
                    debug!(dialog = %info.key, scene, "reclaiming preload still loading from previous scene");
                    *target = SpawnTarget::Pool;
                }
                continue;
            }
            if self.is_live(&info.key) {
                continue;
            }
            debug!(dialog = %info.key, scene, "preloading dialog for scene");
            self.spawning.insert(info.key.clone(), SpawnTarget::Pool);
            step.push(UiCommand::Spawn(info));
        }

        info!(scene, preloads = step.commands.len(), "scene loaded");
        Ok(step)
    }

    /// Tear down the stack on scene exit.
    ///
    /// Every in-flight request is cancelled. Keep-in-memory instances return
    /// to the pool; all others are destroyed, including pooled ones and any
    /// still loading.
    pub fn scope_unloaded(&mut self, scene: &str) -> Result<UiStep> {
        if !self.initialized {
            return Err(StagehandError::NotInitialized);
        }

        let mut step = UiStep::new();

        let pending: Vec<PendingShow> = self.pending.drain().map(|(_, p)| p).collect();
        for p in pending {
            debug!(dialog = %p.handle.key(), "cancelling pending show on scene exit");
            self.fail_pending(p, RequestStatus::Cancelled, &mut step);
        }

        let mut destroyed = 0usize;
        let entries: Vec<StackEntry> = self.stack.drain(..).collect();
        for mut entry in entries {
            if let Some(show) = entry.show.take() {
                if show.holds_lock {
                    self.release_lock(&mut step);
                }
                show.handle.set_status(RequestStatus::Cancelled);
            }
            for handle in entry.watchers.drain(..) {
                if handle.status() == RequestStatus::Shown {
                    handle.set_status(RequestStatus::Hidden);
                }
            }
            if entry.state == DialogState::Hiding {
                // Finish the requested hide without its transition.
                if entry.hide_holds_lock {
                    self.release_lock(&mut step);
                }
                entry.instance.dialog.transition_out_completed();
                let args = entry.hide_args.take();
                for callback in entry.on_hide.drain(..) {
                    callback(args.clone());
                }
                step.push(UiCommand::Publish(DialogNotification::Hidden {
                    key: entry.instance.key.clone(),
                    args,
                }));
            }

            entry.instance.dialog.set_active(false);
            if self.keeps_in_memory(&entry.instance.key) {
                debug!(dialog = %entry.instance.key, "returning kept dialog to pool");
                if let Some(rejected) = self.pool.insert(entry.instance) {
                    warn!(dialog = %rejected.key, "pool already holds an instance; dropping duplicate");
                }
            } else {
                debug!(dialog = %entry.instance.key, instance = %entry.instance.id, "destroying dialog");
                destroyed += 1;
            }
        }

        let dialogs = &self.dialogs;
        let kept = |key: &str| dialogs.get(key).is_some_and(|info| info.keep_in_memory);

        destroyed += self
            .pool
            .evict_where(|instance| !kept(instance.key.as_str()))
            .len();

        for (key, target) in self.spawning.iter_mut() {
            if !kept(key.as_str()) {
                *target = SpawnTarget::Discard;
            }
        }

        info!(scene, destroyed, "scene unloaded");
        Ok(step)
    }

    /// A load issued through [`UiCommand::Spawn`] finished.
    pub fn spawn_finished(
        &mut self,
        key: &str,
        result: std::result::Result<Box<dyn Dialog>, String>,
    ) -> UiStep {
        let mut step = UiStep::new();
        let target = self.spawning.remove(key);
        self.awaiting_preload.remove(key);

        let waiting = self
            .pending
            .get(key)
            .is_some_and(|p| p.waiting == Waiting::Spawn);

        let dialog = match result {
            Ok(dialog) => dialog,
            Err(reason) => {
                error!(dialog = %key, reason = %reason, "failed to spawn dialog");
                if waiting {
                    if let Some(p) = self.pending.remove(key) {
                        self.fail_pending(p, RequestStatus::Failed(reason), &mut step);
                    }
                }
                return step;
            }
        };

        self.next_instance += 1;
        let mut instance = DialogInstance {
            id: InstanceId(self.next_instance),
            key: key.to_string(),
            dialog,
            layer: None,
        };
        debug!(dialog = %key, instance = %instance.id, "dialog spawned");

        if waiting {
            if let Some(p) = self.pending.remove(key) {
                self.present(StackEntry::new(instance), p, &mut step);
                return step;
            }
        }

        match target {
            Some(SpawnTarget::Pool) => {
                instance.dialog.set_active(false);
                if let Some(rejected) = self.pool.insert(instance) {
                    warn!(dialog = %rejected.key, "pool already holds an instance; dropping duplicate");
                }
            }
            Some(SpawnTarget::Discard) | None => {
                debug!(dialog = %key, "discarding spawned dialog nobody is waiting for");
            }
        }

        step
    }

    /// A transition issued through [`UiCommand::PlayTransition`] finished.
    pub fn transition_finished(
        &mut self,
        key: &str,
        instance: InstanceId,
        direction: TransitionDirection,
    ) -> UiStep {
        let mut step = UiStep::new();

        let Some(idx) = self
            .stack
            .iter()
            .position(|e| e.instance.key == key && e.instance.id == instance)
        else {
            debug!(dialog = %key, %instance, "transition finished for an instance no longer on the stack");
            return step;
        };

        match (direction, self.stack[idx].state) {
            (TransitionDirection::Show, DialogState::Showing) => self.finish_show(idx, &mut step),
            (TransitionDirection::Hide, DialogState::Hiding) => self.finish_hide(idx, &mut step),
            (direction, state) => {
                warn!(dialog = %key, %direction, ?state, "unexpected transition completion; ignoring");
            }
        }

        step
    }

    /// Active keys, bottom to top.
    pub fn stack_keys(&self) -> Vec<DialogKey> {
        self.stack.iter().map(|e| e.instance.key.clone()).collect()
    }

    pub fn top(&self) -> Option<&str> {
        self.stack.last().map(|e| e.instance.key.as_str())
    }

    pub fn pooled_keys(&self) -> Vec<DialogKey> {
        self.pool.keys()
    }

    pub fn lock_count(&self) -> usize {
        self.lock.count()
    }

    pub fn is_input_blocked(&self) -> bool {
        self.lock.is_engaged()
    }

    fn in_flight_handle(&self, key: &str) -> Option<ShowHandle> {
        if let Some(p) = self.pending.get(key) {
            return Some(p.handle.clone());
        }
        self.stack
            .iter()
            .find(|e| e.instance.key == key && e.state == DialogState::Showing)
            .and_then(|e| e.show.as_ref().map(|s| s.handle.clone()))
    }

    fn stack_index(&self, key: &str) -> Option<usize> {
        self.stack.iter().position(|e| e.instance.key == key)
    }

    fn is_live(&self, key: &str) -> bool {
        self.stack_index(key).is_some()
            || self.pool.contains(key)
            || self.spawning.contains_key(key)
            || self.pending.contains_key(key)
    }

    fn keeps_in_memory(&self, key: &str) -> bool {
        self.dialogs.get(key).is_some_and(|info| info.keep_in_memory)
    }

    /// Request canvas if it exists, else the configured one if it exists,
    /// else the lowest layer.
    fn resolve_layer(&self, requested: Option<&str>, configured: Option<&str>) -> Option<String> {
        let exists = |name: &str| self.canvases.iter().any(|c| c.name == name);

        if let Some(name) = requested {
            if exists(name) {
                return Some(name.to_string());
            }
            warn!(canvas = %name, "requested canvas does not exist; falling back");
        }
        if let Some(name) = configured {
            if exists(name) {
                return Some(name.to_string());
            }
        }
        self.canvases.first().map(|c| c.name.clone())
    }

    fn closer_for(&self, key: &str) -> DialogCloser {
        DialogCloser::new(key.to_string(), self.close_hook.clone())
    }

    /// Push `entry` on top and start its show transition.
    fn present(&mut self, mut entry: StackEntry, pending: PendingShow, step: &mut UiStep) {
        let PendingShow {
            handle,
            request,
            holds_lock,
            deferred_hide,
            ..
        } = pending;
        let ShowRequest {
            key,
            args,
            canvas,
            show_animation,
            hide_animation,
            on_show,
            on_hide,
        } = request;

        let info = self.dialogs.get(&key);
        let layer = self.resolve_layer(canvas.as_deref(), info.and_then(|i| i.canvas.as_deref()));
        let show_animation = show_animation.or_else(|| info.and_then(|i| i.show_animation.clone()));
        entry.hide_animation = hide_animation.or_else(|| info.and_then(|i| i.hide_animation.clone()));
        let closer = self.closer_for(&key);

        entry.instance.layer = layer.clone();
        let dialog = &mut entry.instance.dialog;
        dialog.attach_to_layer(layer.as_deref());
        dialog.set_active(true);
        dialog.setup(args.as_ref(), closer);
        dialog.begin_transition_in();

        entry.state = DialogState::Showing;
        entry.show = Some(ActiveShow {
            handle: handle.clone(),
            on_show,
            holds_lock,
        });
        entry.watchers.push(handle);
        if let Some(callback) = on_hide {
            entry.on_hide.push(callback);
        }
        if deferred_hide.is_some() {
            entry.deferred_hide = deferred_hide;
        }

        info!(
            dialog = %key,
            instance = %entry.instance.id,
            layer = ?entry.instance.layer,
            "showing dialog"
        );
        step.push(UiCommand::PlayTransition(TransitionRequest {
            key,
            instance: entry.instance.id,
            direction: TransitionDirection::Show,
            animation: show_animation,
        }));
        self.stack.push(entry);
    }

    fn finish_show(&mut self, idx: usize, step: &mut UiStep) {
        let entry = &mut self.stack[idx];
        entry.instance.dialog.transition_in_completed();
        entry.state = DialogState::Visible;
        let show = entry.show.take();
        let deferred = entry.deferred_hide.take();
        let key = entry.instance.key.clone();

        if let Some(show) = show {
            if show.holds_lock {
                self.release_lock(step);
            }
            show.handle.set_status(RequestStatus::Shown);
            if let Some(callback) = show.on_show {
                callback();
            }
        }

        info!(dialog = %key, "dialog shown");
        step.push(UiCommand::Publish(DialogNotification::Shown { key }));

        if let Some(args) = deferred {
            self.begin_hide(idx, args, step);
        }
    }

    fn begin_hide(&mut self, idx: usize, args: Option<DialogArgs>, step: &mut UiStep) {
        let key = self.stack[idx].instance.key.clone();
        let holds_lock = self
            .dialogs
            .get(&key)
            .is_some_and(|info| info.lock_interaction);
        if holds_lock {
            self.acquire_lock(step);
        }

        let entry = &mut self.stack[idx];
        entry.state = DialogState::Hiding;
        entry.hide_args = args;
        entry.hide_holds_lock = holds_lock;
        entry.instance.dialog.begin_transition_out();

        debug!(dialog = %key, instance = %entry.instance.id, "hiding dialog");
        step.push(UiCommand::PlayTransition(TransitionRequest {
            key,
            instance: entry.instance.id,
            direction: TransitionDirection::Hide,
            animation: entry.hide_animation.clone(),
        }));
    }

    fn finish_hide(&mut self, idx: usize, step: &mut UiStep) {
        let mut entry = self.stack.remove(idx);
        entry.instance.dialog.transition_out_completed();
        entry.instance.dialog.set_active(false);
        if entry.hide_holds_lock {
            self.release_lock(step);
        }

        let key = entry.instance.key.clone();
        let args = entry.hide_args.take();
        for handle in entry.watchers.drain(..) {
            handle.set_status(RequestStatus::Hidden);
        }
        for callback in entry.on_hide.drain(..) {
            callback(args.clone());
        }

        if let Some(rejected) = self.pool.insert(entry.instance) {
            warn!(dialog = %rejected.key, "pool already holds an instance; dropping duplicate");
        }

        info!(dialog = %key, "dialog hidden");
        step.push(UiCommand::Publish(DialogNotification::Hidden {
            key: key.clone(),
            args,
        }));

        let reuse = self
            .pending
            .get(&key)
            .is_some_and(|p| p.waiting == Waiting::Hide);
        if !reuse {
            return;
        }
        let Some(mut pending) = self.pending.remove(&key) else {
            return;
        };

        match self.pool.take(&key) {
            Some(instance) => self.present(StackEntry::new(instance), pending, step),
            None => {
                // Only reachable if the pooled instance was rejected above.
                if let Some(info) = self.dialogs.get(&key).cloned() {
                    self.spawning.insert(key.clone(), SpawnTarget::Pool);
                    step.push(UiCommand::Spawn(info));
                }
                pending.waiting = Waiting::Spawn;
                self.pending.insert(key, pending);
            }
        }
    }

    fn fail_pending(&mut self, pending: PendingShow, status: RequestStatus, step: &mut UiStep) {
        if pending.holds_lock {
            self.release_lock(step);
        }
        pending.handle.set_status(status);
    }

    fn acquire_lock(&mut self, step: &mut UiStep) {
        if self.lock.acquire() {
            debug!("input lock engaged");
            step.push(UiCommand::SetInputBlocked(true));
        }
    }

    fn release_lock(&mut self, step: &mut UiStep) {
        if self.lock.release() {
            debug!("input lock released");
            step.push(UiCommand::SetInputBlocked(false));
        }
    }
}

impl std::fmt::Debug for DialogStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogStack")
            .field("initialized", &self.initialized)
            .field("stack", &self.stack_keys())
            .field("pooled", &self.pooled_keys())
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .field("lock_count", &self.lock.count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Probe {
        key: &'static str,
        log: Log,
        drops: Arc<AtomicUsize>,
        closer: Arc<Mutex<Option<DialogCloser>>>,
    }

    impl Probe {
        fn record(&self, event: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.key, event));
        }
    }

    impl Dialog for Probe {
        fn setup(&mut self, args: Option<&DialogArgs>, closer: DialogCloser) {
            let arg = args
                .and_then(|a| a.downcast_ref::<u32>())
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string());
            self.record(&format!("setup({arg})"));
            *self.closer.lock().unwrap() = Some(closer);
        }

        fn set_active(&mut self, active: bool) {
            self.record(if active { "active" } else { "inactive" });
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

    impl Drop for Probe {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        stack: DialogStack,
        log: Log,
        drops: Arc<AtomicUsize>,
        closer: Arc<Mutex<Option<DialogCloser>>>,
    }

    impl Harness {
        fn new(dialogs: &[DialogInfo]) -> (Self, UiStep) {
            let mut stack = DialogStack::new();
            let canvases = vec![canvas("Popup", 10), canvas("Main", 0)];
            let step = stack.initialize(&canvases, dialogs);
            let harness = Self {
                stack,
                log: Arc::default(),
                drops: Arc::default(),
                closer: Arc::default(),
            };
            (harness, step)
        }

        fn probe(&self, key: &'static str) -> Box<dyn Dialog> {
            Box::new(Probe {
                key,
                log: self.log.clone(),
                drops: self.drops.clone(),
                closer: self.closer.clone(),
            })
        }

        fn spawn_ok(&mut self, key: &'static str) -> UiStep {
            let dialog = self.probe(key);
            self.stack.spawn_finished(key, Ok(dialog))
        }

        /// Show and run every collaborator to completion.
        fn show_now(&mut self, request: ShowRequest) -> ShowHandle {
            let key: &'static str = leak(request.key());
            let (handle, step) = self.stack.show(request).unwrap();
            let step = if spawns(&step).is_empty() {
                step
            } else {
                self.spawn_ok(key)
            };
            let show = transitions(&step);
            let t = show.last().expect("show transition");
            self.stack.transition_finished(key, t.instance, TransitionDirection::Show);
            handle
        }

        fn hide_now(&mut self, key: &str) -> UiStep {
            let step = self.stack.hide(key, None).unwrap();
            let t = transitions(&step).pop().expect("hide transition");
            self.stack.transition_finished(key, t.instance, TransitionDirection::Hide)
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    fn leak(s: &str) -> &'static str {
        Box::leak(s.to_string().into_boxed_str())
    }

    fn canvas(name: &str, order: i32) -> CanvasInfo {
        CanvasInfo {
            name: name.to_string(),
            order,
        }
    }

    fn dialog(key: &str) -> DialogInfo {
        DialogInfo {
            key: key.to_string(),
            asset_key: format!("ui/{key}"),
            canvas: None,
            keep_in_memory: false,
            preload_scenes: Vec::new(),
            lock_interaction: true,
            show_animation: None,
            hide_animation: None,
        }
    }

    fn spawns(step: &UiStep) -> Vec<String> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                UiCommand::Spawn(info) => Some(info.key.clone()),
                _ => None,
            })
            .collect()
    }

    fn transitions(step: &UiStep) -> Vec<TransitionRequest> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                UiCommand::PlayTransition(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    fn blocked(step: &UiStep) -> Vec<bool> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                UiCommand::SetInputBlocked(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn show_before_initialize_is_rejected() {
        let mut stack = DialogStack::new();
        assert!(matches!(
            stack.show(ShowRequest::new("Settings")),
            Err(StagehandError::NotInitialized)
        ));
    }

    #[test]
    fn initialize_creates_sorted_layers_and_preloads_kept_dialogs() {
        let mut kept = dialog("Inventory");
        kept.keep_in_memory = true;
        let (mut h, step) = Harness::new(&[dialog("Settings"), kept]);

        let layers: Vec<_> = step
            .commands
            .iter()
            .filter_map(|c| match c {
                UiCommand::CreateLayer(c) => Some(c.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(layers, vec!["Main".to_string(), "Popup".to_string()]);
        assert_eq!(spawns(&step), vec!["Inventory".to_string()]);
        assert!(!h.stack.is_ready());

        h.spawn_ok("Inventory");
        assert!(h.stack.is_ready());
        assert_eq!(h.stack.pooled_keys(), vec!["Inventory".to_string()]);

        let again = h.stack.initialize(&[], &[]);
        assert!(again.is_empty());
    }

    #[test]
    fn unconfigured_dialog_is_rejected() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        assert!(matches!(
            h.stack.show(ShowRequest::new("Missing")),
            Err(StagehandError::DialogNotConfigured(_))
        ));
        assert_eq!(h.stack.lock_count(), 0);
    }

    #[test]
    fn concurrent_shows_share_one_handle_and_one_spawn() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);

        let (first, step) = h.stack.show(ShowRequest::new("Settings")).unwrap();
        assert_eq!(spawns(&step), vec!["Settings".to_string()]);
        assert_eq!(blocked(&step), vec![true]);

        let (second, step) = h.stack.show(ShowRequest::new("Settings")).unwrap();
        assert_eq!(first, second);
        assert!(step.is_empty());
        assert!(h.stack.find("Settings", true).is_none());

        let step = h.spawn_ok("Settings");
        let show = transitions(&step);
        assert_eq!(show.len(), 1);

        // Still in flight while the transition runs.
        let (third, _) = h.stack.show(ShowRequest::new("Settings")).unwrap();
        assert_eq!(first, third);

        let step = h
            .stack
            .transition_finished("Settings", show[0].instance, TransitionDirection::Show);
        assert_eq!(blocked(&step), vec![false]);
        assert_eq!(first.status(), RequestStatus::Shown);
        assert_eq!(
            h.stack.find("Settings", false).map(|v| v.state),
            Some(DialogState::Visible)
        );
        assert_eq!(
            h.log(),
            vec!["Settings:active", "Settings:setup(-)", "Settings:in", "Settings:in_done"]
        );
    }

    #[test]
    fn hidden_dialog_is_only_found_when_inactive_included() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        let handle = h.show_now(ShowRequest::new("Settings"));
        let id = h.stack.find("Settings", false).unwrap().instance;

        h.hide_now("Settings");

        assert_eq!(handle.status(), RequestStatus::Hidden);
        assert!(h.stack.find("Settings", false).is_none());
        let pooled = h.stack.find("Settings", true).unwrap();
        assert_eq!(pooled.state, DialogState::Pooled);
        assert_eq!(pooled.instance, id);
        assert!(h.stack.stack_keys().is_empty());
    }

    #[test]
    fn reshow_reuses_pooled_instance_with_new_args() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        h.show_now(ShowRequest::new("Settings").args(1u32));
        let id = h.stack.find("Settings", false).unwrap().instance;
        h.hide_now("Settings");

        let (_, step) = h.stack.show(ShowRequest::new("Settings").args(2u32)).unwrap();
        assert!(spawns(&step).is_empty());
        assert_eq!(transitions(&step)[0].instance, id);
        assert!(h.log().contains(&"Settings:setup(2)".to_string()));
    }

    #[test]
    fn hide_of_unknown_dialog_is_not_found() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        assert!(matches!(
            h.stack.hide("Settings", None),
            Err(StagehandError::DialogNotFound(_))
        ));
        assert_eq!(h.stack.lock_count(), 0);
    }

    #[test]
    fn hide_during_show_runs_after_show_completes() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        let (handle, _) = h.stack.show(ShowRequest::new("Settings")).unwrap();

        // Deferred while the spawn is in flight.
        assert!(h.stack.hide("Settings", None).unwrap().is_empty());

        let step = h.spawn_ok("Settings");
        let show = transitions(&step)[0].clone();
        let step = h
            .stack
            .transition_finished("Settings", show.instance, TransitionDirection::Show);

        let hide = transitions(&step);
        assert_eq!(hide.len(), 1);
        assert_eq!(hide[0].direction, TransitionDirection::Hide);
        assert_eq!(handle.status(), RequestStatus::Shown);

        h.stack
            .transition_finished("Settings", hide[0].instance, TransitionDirection::Hide);
        assert_eq!(handle.status(), RequestStatus::Hidden);
        assert_eq!(h.stack.lock_count(), 0);
    }

    #[test]
    fn second_hide_while_hiding_is_ignored() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        h.show_now(ShowRequest::new("Settings"));

        let step = h.stack.hide("Settings", None).unwrap();
        assert_eq!(transitions(&step).len(), 1);
        assert!(h.stack.hide("Settings", None).unwrap().is_empty());
        assert_eq!(h.stack.lock_count(), 1);
    }

    #[test]
    fn show_while_hiding_waits_and_reuses_instance() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        h.show_now(ShowRequest::new("Settings"));
        let id = h.stack.find("Settings", false).unwrap().instance;

        let hide = transitions(&h.stack.hide("Settings", None).unwrap())[0].clone();
        let (handle, step) = h.stack.show(ShowRequest::new("Settings")).unwrap();
        assert!(spawns(&step).is_empty());
        assert!(transitions(&step).is_empty());

        let step = h
            .stack
            .transition_finished("Settings", hide.instance, TransitionDirection::Hide);
        let show = transitions(&step);
        assert_eq!(show.len(), 1);
        assert_eq!(show[0].instance, id);
        assert_eq!(show[0].direction, TransitionDirection::Show);
        assert_eq!(handle.status(), RequestStatus::Pending);
    }

    #[test]
    fn showing_visible_dialog_refreshes_it_on_top() {
        let (mut h, _) = Harness::new(&[dialog("A"), dialog("B")]);
        let first = h.show_now(ShowRequest::new("A"));
        h.show_now(ShowRequest::new("B"));
        assert_eq!(h.stack.top(), Some("B"));

        let (second, step) = h.stack.show(ShowRequest::new("A").args(7u32)).unwrap();
        assert_ne!(first, second);
        assert_eq!(h.stack.stack_keys(), vec!["B".to_string(), "A".to_string()]);
        assert_eq!(transitions(&step)[0].direction, TransitionDirection::Show);
        assert!(h.log().contains(&"A:setup(7)".to_string()));
    }

    #[test]
    fn spawn_failure_fails_request_and_releases_lock() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        let (handle, _) = h.stack.show(ShowRequest::new("Settings")).unwrap();
        assert!(h.stack.is_input_blocked());

        let step = h
            .stack
            .spawn_finished("Settings", Err("asset missing".to_string()));
        assert_eq!(blocked(&step), vec![false]);
        assert_eq!(
            handle.status(),
            RequestStatus::Failed("asset missing".to_string())
        );
        assert!(h.stack.find("Settings", true).is_none());
    }

    #[test]
    fn lock_is_held_while_any_transition_runs() {
        let mut quiet = dialog("Toast");
        quiet.lock_interaction = false;
        let (mut h, _) = Harness::new(&[dialog("A"), dialog("B"), quiet]);

        let (_, step_a) = h.stack.show(ShowRequest::new("A")).unwrap();
        let (_, step_b) = h.stack.show(ShowRequest::new("B")).unwrap();
        let (_, step_t) = h.stack.show(ShowRequest::new("Toast")).unwrap();
        assert_eq!(blocked(&step_a), vec![true]);
        assert!(blocked(&step_b).is_empty());
        assert!(blocked(&step_t).is_empty());
        assert_eq!(h.stack.lock_count(), 2);

        let a = transitions(&h.spawn_ok("A"))[0].clone();
        let b = transitions(&h.spawn_ok("B"))[0].clone();

        let step = h.stack.transition_finished("A", a.instance, TransitionDirection::Show);
        assert!(blocked(&step).is_empty());
        assert!(h.stack.is_input_blocked());

        let step = h.stack.transition_finished("B", b.instance, TransitionDirection::Show);
        assert_eq!(blocked(&step), vec![false]);
        assert!(!h.stack.is_input_blocked());
    }

    #[test]
    fn layer_resolution_prefers_request_then_config_then_lowest() {
        let mut configured = dialog("Configured");
        configured.canvas = Some("Popup".to_string());
        let (mut h, _) = Harness::new(&[dialog("Plain"), configured, dialog("Override")]);

        h.show_now(ShowRequest::new("Plain"));
        h.show_now(ShowRequest::new("Configured"));
        h.show_now(ShowRequest::new("Override").canvas("Popup"));

        let layer = |key: &str| h.stack.find(key, false).and_then(|v| v.layer);
        assert_eq!(layer("Plain"), Some("Main".to_string()));
        assert_eq!(layer("Configured"), Some("Popup".to_string()));
        assert_eq!(layer("Override"), Some("Popup".to_string()));
    }

    #[test]
    fn request_animation_overrides_configured_one() {
        let mut info = dialog("Settings");
        info.show_animation = Some("fade".to_string());
        info.hide_animation = Some("fade".to_string());
        let (mut h, _) = Harness::new(&[info]);

        h.stack
            .show(ShowRequest::new("Settings").show_animation("slide"))
            .unwrap();
        let show = transitions(&h.spawn_ok("Settings"))[0].clone();
        assert_eq!(show.animation.as_deref(), Some("slide"));

        h.stack
            .transition_finished("Settings", show.instance, TransitionDirection::Show);
        let hide = transitions(&h.stack.hide("Settings", None).unwrap())[0].clone();
        assert_eq!(hide.animation.as_deref(), Some("fade"));
    }

    #[test]
    fn scope_exit_destroys_transient_and_pools_kept_dialogs() {
        let mut kept = dialog("D2");
        kept.keep_in_memory = true;
        let (mut h, _) = Harness::new(&[dialog("D1"), kept]);
        h.spawn_ok("D2");

        h.show_now(ShowRequest::new("D1"));
        h.show_now(ShowRequest::new("D2"));
        h.hide_now("D2");

        h.stack.scope_unloaded("Level").unwrap();

        assert!(h.stack.find("D1", true).is_none());
        assert_eq!(
            h.stack.find("D2", true).map(|v| v.state),
            Some(DialogState::Pooled)
        );
        assert_eq!(h.drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scope_exit_cancels_pending_show_and_discards_its_spawn() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        let (handle, _) = h.stack.show(ShowRequest::new("Settings")).unwrap();

        let step = h.stack.scope_unloaded("Level").unwrap();
        assert_eq!(blocked(&step), vec![false]);
        assert_eq!(handle.status(), RequestStatus::Cancelled);

        let step = h.spawn_ok("Settings");
        assert!(step.is_empty());
        assert!(h.stack.find("Settings", true).is_none());
        assert_eq!(h.drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scope_load_preloads_only_missing_dialogs() {
        let mut a = dialog("A");
        a.preload_scenes = vec!["Menu".to_string()];
        let mut b = dialog("B");
        b.preload_scenes = vec!["Menu".to_string()];
        let (mut h, _) = Harness::new(&[a, b, dialog("C")]);

        h.show_now(ShowRequest::new("A"));
        let step = h.stack.scope_loaded("Menu").unwrap();
        assert_eq!(spawns(&step), vec!["B".to_string()]);

        h.spawn_ok("B");
        assert_eq!(h.stack.pooled_keys(), vec!["B".to_string()]);
        assert!(h.stack.scope_loaded("Menu").unwrap().is_empty());
    }

    #[test]
    fn scene_reload_reclaims_preload_still_loading() {
        let mut a = dialog("A");
        a.preload_scenes = vec!["Town".to_string()];
        let (mut h, _) = Harness::new(&[a]);

        assert_eq!(spawns(&h.stack.scope_loaded("Town").unwrap()), vec!["A".to_string()]);
        h.stack.scope_unloaded("Town").unwrap();

        // The first load is still in flight, so no second spawn is issued.
        assert!(spawns(&h.stack.scope_loaded("Town").unwrap()).is_empty());

        h.spawn_ok("A");
        assert_eq!(h.stack.pooled_keys(), vec!["A".to_string()]);
        assert_eq!(h.drops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scope_exit_completes_hide_in_progress() {
        let (mut h, _) = Harness::new(&[dialog("S")]);
        let hidden: Arc<Mutex<Vec<Option<u32>>>> = Arc::default();
        let sink = hidden.clone();

        let handle = h.show_now(ShowRequest::new("S").on_hide(move |args| {
            let value = args.and_then(|a| a.downcast_ref::<u32>().copied());
            sink.lock().unwrap().push(value);
        }));
        let step = h.stack.hide("S", Some(Arc::new(9u32) as DialogArgs)).unwrap();
        assert_eq!(blocked(&step), vec![true]);

        let step = h.stack.scope_unloaded("Level").unwrap();

        assert_eq!(*hidden.lock().unwrap(), vec![Some(9)]);
        assert_eq!(handle.status(), RequestStatus::Hidden);
        assert_eq!(blocked(&step), vec![false]);
        let published: Vec<Option<u32>> = step
            .commands
            .iter()
            .filter_map(|c| match c {
                UiCommand::Publish(DialogNotification::Hidden { key, args }) if key == "S" => {
                    Some(args.as_ref().and_then(|a| a.downcast_ref::<u32>().copied()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(published, vec![Some(9)]);
        assert!(h.log().contains(&"S:out_done".to_string()));
        assert_eq!(h.drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closer_is_wired_to_the_close_hook() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        let closed: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = closed.clone();
        h.stack
            .set_close_hook(Arc::new(move |key: DialogKey, _args: Option<DialogArgs>| {
                sink.lock().unwrap().push(key)
            }));

        h.show_now(ShowRequest::new("Settings"));
        let closer = h.closer.lock().unwrap().clone().expect("closer passed to setup");
        closer.close(None);

        assert_eq!(*closed.lock().unwrap(), vec!["Settings".to_string()]);
    }

    #[test]
    fn callbacks_fire_on_show_and_hide() {
        let (mut h, _) = Harness::new(&[dialog("Settings")]);
        let events: Arc<Mutex<Vec<String>>> = Arc::default();
        let (on_show, on_hide) = (events.clone(), events.clone());

        h.show_now(
            ShowRequest::new("Settings")
                .on_show(move || on_show.lock().unwrap().push("shown".into()))
                .on_hide(move |args| {
                    let value = args.and_then(|a| a.downcast_ref::<u32>().copied());
                    on_hide.lock().unwrap().push(format!("hidden({value:?})"));
                }),
        );

        let step = h
            .stack
            .hide("Settings", Some(Arc::new(5u32) as DialogArgs))
            .unwrap();
        let hide = transitions(&step)[0].clone();
        h.stack
            .transition_finished("Settings", hide.instance, TransitionDirection::Hide);

        assert_eq!(
            *events.lock().unwrap(),
            vec!["shown".to_string(), "hidden(Some(5))".to_string()]
        );
    }
}
