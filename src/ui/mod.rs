// src/ui/mod.rs

//! Dialog stack management.
//!
//! The pure state machine lives in [`stack`]; [`runtime`] wraps it in an
//! async event loop that talks to the collaborators declared in
//! [`backend`]. Callers use the cloneable [`DialogManager`] handle.

pub mod backend;
pub mod commands;
pub mod dialog;
pub mod lock;
pub mod pool;
pub mod request;
pub mod runtime;
pub mod stack;

pub use backend::{DialogLoader, ImmediateTransitions, TransitionPlayer, UiSurface};
pub use commands::{DialogNotification, TransitionRequest, UiCommand, UiStep};
pub use dialog::{Dialog, DialogArgs, DialogCloser, DialogKey, DialogState, DialogView, InstanceId};
pub use request::{RequestStatus, ShowHandle, ShowRequest};
pub use runtime::{DialogManager, DialogRuntime, StackSnapshot};
pub use stack::DialogStack;
