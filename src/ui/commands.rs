// src/ui/commands.rs

use std::fmt;

use crate::config::{CanvasInfo, DialogInfo};
use crate::types::TransitionDirection;
use crate::ui::dialog::{DialogArgs, DialogKey, InstanceId};

/// A transition the player should run for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub key: DialogKey,
    pub instance: InstanceId,
    pub direction: TransitionDirection,
    /// Animation name; `None` means the player's default.
    pub animation: Option<String>,
}

/// Side effects the dialog core asks its shell to perform.
#[derive(Debug)]
pub enum UiCommand {
    CreateLayer(CanvasInfo),
    /// Load a new instance; the result comes back as `spawn_finished`.
    Spawn(DialogInfo),
    /// Run a transition; completion comes back as `transition_finished`.
    PlayTransition(TransitionRequest),
    SetInputBlocked(bool),
    Publish(DialogNotification),
}

/// Broadcast to `DialogManager` subscribers.
#[derive(Clone)]
pub enum DialogNotification {
    Shown { key: DialogKey },
    Hidden {
        key: DialogKey,
        args: Option<DialogArgs>,
    },
}

impl DialogNotification {
    pub fn key(&self) -> &str {
        match self {
            DialogNotification::Shown { key } | DialogNotification::Hidden { key, .. } => key,
        }
    }
}

impl fmt::Debug for DialogNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialogNotification::Shown { key } => f.debug_struct("Shown").field("key", key).finish(),
            DialogNotification::Hidden { key, args } => f
                .debug_struct("Hidden")
                .field("key", key)
                .field("has_args", &args.is_some())
                .finish(),
        }
    }
}

/// Commands produced by one core operation, in execution order.
#[derive(Debug, Default)]
pub struct UiStep {
    pub commands: Vec<UiCommand>,
}

impl UiStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: UiCommand) {
        self.commands.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
