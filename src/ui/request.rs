// src/ui/request.rs

//! Show requests and the handles callers await on.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::ui::dialog::{DialogArgs, DialogKey};

pub type ShowCallback = Box<dyn FnOnce() + Send>;
pub type HideCallback = Box<dyn FnOnce(Option<DialogArgs>) + Send>;

/// Everything a caller can specify when showing a dialog.
///
/// ```ignore
/// let request = ShowRequest::new("Settings")
///     .args(SettingsTab::Audio)
///     .show_animation("slide_in")
///     .on_hide(|_| println!("settings closed"));
/// ```
pub struct ShowRequest {
    pub(crate) key: DialogKey,
    pub(crate) args: Option<DialogArgs>,
    pub(crate) canvas: Option<String>,
    pub(crate) show_animation: Option<String>,
    pub(crate) hide_animation: Option<String>,
    pub(crate) on_show: Option<ShowCallback>,
    pub(crate) on_hide: Option<HideCallback>,
}

impl ShowRequest {
    pub fn new(key: impl Into<DialogKey>) -> Self {
        Self {
            key: key.into(),
            args: None,
            canvas: None,
            show_animation: None,
            hide_animation: None,
            on_show: None,
            on_hide: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn args<T: Any + Send + Sync>(self, args: T) -> Self {
        self.shared_args(Arc::new(args))
    }

    pub fn shared_args(mut self, args: DialogArgs) -> Self {
        self.args = Some(args);
        self
    }

    /// Attach to this layer instead of the configured one, if it exists.
    pub fn canvas(mut self, canvas: impl Into<String>) -> Self {
        self.canvas = Some(canvas.into());
        self
    }

    pub fn show_animation(mut self, name: impl Into<String>) -> Self {
        self.show_animation = Some(name.into());
        self
    }

    pub fn hide_animation(mut self, name: impl Into<String>) -> Self {
        self.hide_animation = Some(name.into());
        self
    }

    /// Runs on the dialog runtime once the show transition finishes.
    pub fn on_show(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_show = Some(Box::new(callback));
        self
    }

    /// Runs on the dialog runtime once the dialog has been hidden, with the
    /// arguments passed to `hide`.
    pub fn on_hide(mut self, callback: impl FnOnce(Option<DialogArgs>) + Send + 'static) -> Self {
        self.on_hide = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for ShowRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShowRequest")
            .field("key", &self.key)
            .field("has_args", &self.args.is_some())
            .field("canvas", &self.canvas)
            .field("show_animation", &self.show_animation)
            .field("hide_animation", &self.hide_animation)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of one show request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    /// Waiting for a spawn, a pending hide or the show transition.
    Pending,
    Shown,
    /// The dialog was hidden (or torn down) after being shown.
    Hidden,
    /// The instance could not be spawned.
    Failed(String),
    /// Torn down by a scope exit before it was shown.
    Cancelled,
}

impl RequestStatus {
    fn is_settled(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    fn is_final(&self) -> bool {
        !matches!(self, RequestStatus::Pending | RequestStatus::Shown)
    }
}

struct HandleInner {
    id: u64,
    key: DialogKey,
    status: watch::Sender<RequestStatus>,
}

/// Shared handle to an in-flight or completed show request.
///
/// Concurrent `show` calls for the same key receive clones of one handle.
#[derive(Clone)]
pub struct ShowHandle {
    inner: Arc<HandleInner>,
}

impl ShowHandle {
    pub(crate) fn new(id: u64, key: DialogKey) -> Self {
        let (status, _) = watch::channel(RequestStatus::Pending);
        Self {
            inner: Arc::new(HandleInner { id, key, status }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn status(&self) -> RequestStatus {
        self.inner.status.borrow().clone()
    }

    /// Wait until the request leaves `Pending`.
    pub async fn shown(&self) -> RequestStatus {
        self.wait(RequestStatus::is_settled).await
    }

    /// Wait until the dialog is hidden, or the request failed or was
    /// cancelled.
    pub async fn hidden(&self) -> RequestStatus {
        self.wait(RequestStatus::is_final).await
    }

    async fn wait(&self, done: fn(&RequestStatus) -> bool) -> RequestStatus {
        let mut rx = self.inner.status.subscribe();
        let status = match rx.wait_for(|s| done(s)).await {
            Ok(status) => status.clone(),
            // The sender lives in `inner`, which we hold.
            Err(_) => RequestStatus::Cancelled,
        };
        status
    }

    pub(crate) fn set_status(&self, status: RequestStatus) {
        self.inner.status.send_replace(status);
    }
}

impl PartialEq for ShowHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ShowHandle {}

impl fmt::Debug for ShowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShowHandle")
            .field("id", &self.inner.id)
            .field("key", &self.inner.key)
            .field("status", &*self.inner.status.borrow())
            .finish()
    }
}
