// src/ui/dialog.rs

//! The [`Dialog`] contract and the instance records the stack keeps.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// Dialog type name; one live instance per key.
pub type DialogKey = String;

/// Opaque argument payload passed to `setup` and to hide callbacks.
pub type DialogArgs = Arc<dyn Any + Send + Sync>;

/// Hook the runtime installs so dialogs can ask to be closed.
pub type CloseHook = Arc<dyn Fn(DialogKey, Option<DialogArgs>) + Send + Sync>;

/// Process-unique id of a spawned dialog instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A presentable dialog. Every hook has a no-op default.
pub trait Dialog: Send {
    /// Called each time the dialog is presented, before the show transition.
    fn setup(&mut self, _args: Option<&DialogArgs>, _closer: DialogCloser) {}

    fn set_active(&mut self, _active: bool) {}

    /// Move the dialog onto a layer. `None` when no layer exists.
    fn attach_to_layer(&mut self, _layer: Option<&str>) {}

    fn begin_transition_in(&mut self) {}

    fn transition_in_completed(&mut self) {}

    fn begin_transition_out(&mut self) {}

    fn transition_out_completed(&mut self) {}
}

/// Lets a dialog request its own hide.
///
/// The request is queued on the runtime like any external `hide`, so it is
/// safe to call from inside a dialog hook.
#[derive(Clone)]
pub struct DialogCloser {
    key: DialogKey,
    hook: Option<CloseHook>,
}

impl DialogCloser {
    pub fn new(key: DialogKey, hook: Option<CloseHook>) -> Self {
        Self { key, hook }
    }

    /// A closer that is not wired to any runtime.
    pub fn detached(key: DialogKey) -> Self {
        Self::new(key, None)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn close(&self, args: Option<DialogArgs>) {
        match &self.hook {
            Some(hook) => hook(self.key.clone(), args),
            None => debug!(dialog = %self.key, "close requested on detached dialog; ignoring"),
        }
    }
}

impl fmt::Debug for DialogCloser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogCloser")
            .field("key", &self.key)
            .field("attached", &self.hook.is_some())
            .finish()
    }
}

/// A spawned dialog plus the bookkeeping the stack needs.
pub struct DialogInstance {
    pub id: InstanceId,
    pub key: DialogKey,
    pub dialog: Box<dyn Dialog>,
    /// Layer the dialog was last attached to.
    pub layer: Option<String>,
}

impl fmt::Debug for DialogInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogInstance")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("layer", &self.layer)
            .finish_non_exhaustive()
    }
}

/// Where a live instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// Inactive, held in the pool for reuse.
    Pooled,
    /// On the stack, show transition running.
    Showing,
    /// On the stack and fully shown.
    Visible,
    /// On the stack, hide transition running.
    Hiding,
}

/// Read-only snapshot returned by `find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogView {
    pub key: DialogKey,
    pub instance: InstanceId,
    pub state: DialogState,
    pub layer: Option<String>,
}

impl DialogView {
    pub(crate) fn of(instance: &DialogInstance, state: DialogState) -> Self {
        Self {
            key: instance.key.clone(),
            instance: instance.id,
            state,
            layer: instance.layer.clone(),
        }
    }
}
