// src/ui/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::{CanvasInfo, ConfigFile, DialogInfo};
use crate::errors::{Result, StagehandError};
use crate::types::TransitionDirection;
use crate::ui::backend::{DialogLoader, TransitionPlayer, UiSurface};
use crate::ui::commands::{DialogNotification, UiCommand, UiStep};
use crate::ui::dialog::{CloseHook, Dialog, DialogArgs, DialogKey, DialogView, InstanceId};
use crate::ui::request::{ShowHandle, ShowRequest};
use crate::ui::stack::DialogStack;

const NOTIFICATION_CAPACITY: usize = 64;

/// Events flowing into the dialog runtime from callers and collaborators.
pub enum UiEvent {
    Initialize {
        reply: oneshot::Sender<()>,
    },
    Show {
        request: ShowRequest,
        reply: oneshot::Sender<Result<ShowHandle>>,
    },
    Hide {
        key: DialogKey,
        args: Option<DialogArgs>,
    },
    Find {
        key: DialogKey,
        include_inactive: bool,
        reply: oneshot::Sender<Option<DialogView>>,
    },
    Snapshot {
        reply: oneshot::Sender<StackSnapshot>,
    },
    ScopeLoaded {
        scene: String,
    },
    ScopeUnloaded {
        scene: String,
    },
    SpawnFinished {
        key: DialogKey,
        result: std::result::Result<Box<dyn Dialog>, String>,
    },
    TransitionFinished {
        key: DialogKey,
        instance: InstanceId,
        direction: TransitionDirection,
    },
    Shutdown,
}

impl fmt::Debug for UiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiEvent::Initialize { .. } => f.write_str("Initialize"),
            UiEvent::Show { request, .. } => f.debug_tuple("Show").field(&request.key()).finish(),
            UiEvent::Hide { key, .. } => f.debug_tuple("Hide").field(key).finish(),
            UiEvent::Find {
                key,
                include_inactive,
                ..
            } => f
                .debug_struct("Find")
                .field("key", key)
                .field("include_inactive", include_inactive)
                .finish(),
            UiEvent::Snapshot { .. } => f.write_str("Snapshot"),
            UiEvent::ScopeLoaded { scene } => f.debug_tuple("ScopeLoaded").field(scene).finish(),
            UiEvent::ScopeUnloaded { scene } => {
                f.debug_tuple("ScopeUnloaded").field(scene).finish()
            }
            UiEvent::SpawnFinished { key, result } => f
                .debug_struct("SpawnFinished")
                .field("key", key)
                .field("ok", &result.is_ok())
                .finish(),
            UiEvent::TransitionFinished {
                key,
                instance,
                direction,
            } => f
                .debug_struct("TransitionFinished")
                .field("key", key)
                .field("instance", instance)
                .field("direction", direction)
                .finish(),
            UiEvent::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Point-in-time view of the stack, mostly for tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSnapshot {
    /// Active keys, bottom to top.
    pub stack: Vec<DialogKey>,
    pub pooled: Vec<DialogKey>,
    pub lock_count: usize,
    pub input_blocked: bool,
}

/// Async shell around [`DialogStack`].
///
/// Owns the core and the collaborators, consumes [`UiEvent`]s one at a time
/// and executes the commands each core operation returns. Loads and
/// transitions run on their own tasks and report back as events.
pub struct DialogRuntime<L, P, S> {
    core: DialogStack,
    canvases: Vec<CanvasInfo>,
    dialogs: Vec<DialogInfo>,
    event_rx: mpsc::UnboundedReceiver<UiEvent>,
    /// Weak so the loop ends once every [`DialogManager`] is dropped.
    event_tx: mpsc::WeakUnboundedSender<UiEvent>,
    notifications: broadcast::Sender<DialogNotification>,
    init_waiters: Vec<oneshot::Sender<()>>,
    loader: L,
    player: P,
    surface: S,
}

impl<L, P, S> fmt::Debug for DialogRuntime<L, P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogRuntime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<L, P, S> DialogRuntime<L, P, S>
where
    L: DialogLoader,
    P: TransitionPlayer,
    S: UiSurface,
{
    /// Build the runtime and the handle callers use to talk to it.
    ///
    /// Nothing happens until [`run`](Self::run) is polled.
    pub fn new(cfg: &ConfigFile, loader: L, player: P, surface: S) -> (Self, DialogManager) {
        let (tx, event_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let event_tx = tx.downgrade();
        let mut core = DialogStack::new();
        core.set_close_hook(close_hook(event_tx.clone()));

        let runtime = Self {
            core,
            canvases: cfg.canvas.clone(),
            dialogs: cfg.dialog_infos(),
            event_rx,
            event_tx,
            notifications: notifications.clone(),
            init_waiters: Vec::new(),
            loader,
            player,
            surface,
        };
        let manager = DialogManager { tx, notifications };
        (runtime, manager)
    }

    /// Main event loop.
    ///
    /// Returns on [`DialogManager::shutdown`] or once every manager handle
    /// and in-flight task is gone.
    pub async fn run(mut self) -> Result<()> {
        info!("dialog runtime started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "dialog runtime received event");
            if matches!(event, UiEvent::Shutdown) {
                info!("dialog runtime shutdown requested");
                break;
            }
            self.handle_event(event);
        }

        info!("dialog runtime exiting");
        Ok(())
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Initialize { reply } => {
                let step = self.core.initialize(&self.canvases, &self.dialogs);
                self.execute(step);
                self.init_waiters.push(reply);
                self.resolve_init_waiters();
            }
            UiEvent::Show { request, reply } => {
                let result = self.core.show(request).map(|(handle, step)| {
                    self.execute(step);
                    handle
                });
                let _ = reply.send(result);
            }
            UiEvent::Hide { key, args } => match self.core.hide(&key, args) {
                Ok(step) => self.execute(step),
                Err(err) => warn!(dialog = %key, error = %err, "hide request dropped"),
            },
            UiEvent::Find {
                key,
                include_inactive,
                reply,
            } => {
                let _ = reply.send(self.core.find(&key, include_inactive));
            }
            UiEvent::Snapshot { reply } => {
                let _ = reply.send(StackSnapshot {
                    stack: self.core.stack_keys(),
                    pooled: self.core.pooled_keys(),
                    lock_count: self.core.lock_count(),
                    input_blocked: self.core.is_input_blocked(),
                });
            }
            UiEvent::ScopeLoaded { scene } => match self.core.scope_loaded(&scene) {
                Ok(step) => self.execute(step),
                Err(err) => warn!(scene = %scene, error = %err, "scene load ignored"),
            },
            UiEvent::ScopeUnloaded { scene } => match self.core.scope_unloaded(&scene) {
                Ok(step) => self.execute(step),
                Err(err) => warn!(scene = %scene, error = %err, "scene unload ignored"),
            },
            UiEvent::SpawnFinished { key, result } => {
                let step = self.core.spawn_finished(&key, result);
                self.execute(step);
                self.resolve_init_waiters();
            }
            UiEvent::TransitionFinished {
                key,
                instance,
                direction,
            } => {
                let step = self.core.transition_finished(&key, instance, direction);
                self.execute(step);
            }
            UiEvent::Shutdown => {}
        }
    }

    fn resolve_init_waiters(&mut self) {
        if !self.core.is_ready() {
            return;
        }
        for waiter in self.init_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    /// Execute the commands of one core step, in order.
    fn execute(&mut self, step: UiStep) {
        for command in step.commands {
            match command {
                UiCommand::CreateLayer(canvas) => {
                    debug!(canvas = %canvas.name, order = canvas.order, "creating layer");
                    self.surface.create_layer(&canvas);
                }
                UiCommand::SetInputBlocked(blocked) => {
                    self.surface.set_input_blocked(blocked);
                }
                UiCommand::Spawn(info) => self.spawn_load(&info),
                UiCommand::PlayTransition(request) => {
                    let Some(tx) = self.event_tx.upgrade() else {
                        warn!(dialog = %request.key, "runtime closing; transition not played");
                        continue;
                    };
                    let transition = self.player.play(&request);
                    tokio::spawn(async move {
                        transition.await;
                        let _ = tx.send(UiEvent::TransitionFinished {
                            key: request.key,
                            instance: request.instance,
                            direction: request.direction,
                        });
                    });
                }
                UiCommand::Publish(notification) => {
                    debug!(dialog = %notification.key(), "publishing dialog notification");
                    let _ = self.notifications.send(notification);
                }
            }
        }
    }

    fn spawn_load(&mut self, info: &DialogInfo) {
        let Some(tx) = self.event_tx.upgrade() else {
            warn!(dialog = %info.key, "runtime closing; dialog not loaded");
            return;
        };

        debug!(dialog = %info.key, asset = %info.asset_key, "loading dialog");
        let load = self.loader.load(info);
        let key = info.key.clone();
        tokio::spawn(async move {
            let result = load.await.map_err(|err| format!("{err:#}"));
            let _ = tx.send(UiEvent::SpawnFinished { key, result });
        });
    }
}

fn close_hook(tx: mpsc::WeakUnboundedSender<UiEvent>) -> CloseHook {
    Arc::new(move |key: DialogKey, args: Option<DialogArgs>| match tx.upgrade() {
        Some(tx) => {
            let _ = tx.send(UiEvent::Hide { key, args });
        }
        None => debug!(dialog = %key, "close requested after runtime shut down"),
    })
}

/// Cloneable handle to a running [`DialogRuntime`].
#[derive(Debug, Clone)]
pub struct DialogManager {
    tx: mpsc::UnboundedSender<UiEvent>,
    notifications: broadcast::Sender<DialogNotification>,
}

impl DialogManager {
    /// Create layers and preload keep-in-memory dialogs. Resolves once every
    /// preload has finished (successfully or not).
    pub async fn initialize(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(UiEvent::Initialize { reply })?;
        rx.await.map_err(|_| StagehandError::ChannelClosed)
    }

    /// Request a dialog. Concurrent requests for one key share a handle.
    pub async fn show(&self, request: ShowRequest) -> Result<ShowHandle> {
        let (reply, rx) = oneshot::channel();
        self.send(UiEvent::Show { request, reply })?;
        rx.await.map_err(|_| StagehandError::ChannelClosed)?
    }

    /// Hide the active instance of `key`. A missing dialog is logged by the
    /// runtime and otherwise ignored.
    pub fn hide(&self, key: impl Into<DialogKey>, args: Option<DialogArgs>) -> Result<()> {
        self.send(UiEvent::Hide {
            key: key.into(),
            args,
        })
    }

    pub async fn find(
        &self,
        key: impl Into<DialogKey>,
        include_inactive: bool,
    ) -> Result<Option<DialogView>> {
        let (reply, rx) = oneshot::channel();
        self.send(UiEvent::Find {
            key: key.into(),
            include_inactive,
            reply,
        })?;
        rx.await.map_err(|_| StagehandError::ChannelClosed)
    }

    pub async fn snapshot(&self) -> Result<StackSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(UiEvent::Snapshot { reply })?;
        rx.await.map_err(|_| StagehandError::ChannelClosed)
    }

    pub fn scope_loaded(&self, scene: impl Into<String>) -> Result<()> {
        self.send(UiEvent::ScopeLoaded {
            scene: scene.into(),
        })
    }

    pub fn scope_unloaded(&self, scene: impl Into<String>) -> Result<()> {
        self.send(UiEvent::ScopeUnloaded {
            scene: scene.into(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DialogNotification> {
        self.notifications.subscribe()
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(UiEvent::Shutdown)
    }

    fn send(&self, event: UiEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| StagehandError::ChannelClosed)
    }
}
