// src/ui/backend.rs

//! Collaborator traits the dialog runtime talks to.
//!
//! The runtime never loads assets, animates or draws by itself. Production
//! code plugs in engine-specific implementations; tests plug in fakes that
//! record calls and complete on demand.

use std::future::Future;
use std::pin::Pin;

use crate::config::{CanvasInfo, DialogInfo};
use crate::ui::commands::TransitionRequest;
use crate::ui::dialog::Dialog;

pub type LoadFuture = Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn Dialog>>> + Send + 'static>>;
pub type TransitionFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Spawns dialog instances from their configured asset.
pub trait DialogLoader: Send {
    fn load(&mut self, info: &DialogInfo) -> LoadFuture;
}

/// Plays show/hide transitions. The returned future resolves when the
/// transition has finished.
pub trait TransitionPlayer: Send {
    fn play(&mut self, request: &TransitionRequest) -> TransitionFuture;
}

/// Layers and the input-blocking overlay.
pub trait UiSurface: Send {
    fn create_layer(&mut self, canvas: &CanvasInfo);

    fn set_input_blocked(&mut self, blocked: bool);
}

/// Transition player that finishes every transition immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateTransitions;

impl TransitionPlayer for ImmediateTransitions {
    fn play(&mut self, _request: &TransitionRequest) -> TransitionFuture {
        Box::pin(async {})
    }
}
