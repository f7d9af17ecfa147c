// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [scheduler]
/// tick_interval_ms = 16
///
/// [[canvas]]
/// name = "Main"
/// order = 0
///
/// [dialog.Settings]
/// asset_key = "ui/settings"
/// canvas = "Main"
/// keep_in_memory = true
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// Display layers from `[[canvas]]`.
    #[serde(default)]
    pub canvas: Vec<CanvasInfo>,

    /// Dialog settings from `[dialog.<key>]`, keyed by dialog type name.
    #[serde(default)]
    pub dialog: BTreeMap<String, DialogConfig>,
}

/// A validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`) so
/// holders can rely on canvas references and asset keys being sane.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub canvas: Vec<CanvasInfo>,
    pub dialog: BTreeMap<String, DialogConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        canvas: Vec<CanvasInfo>,
        dialog: BTreeMap<String, DialogConfig>,
    ) -> Self {
        Self {
            scheduler,
            canvas,
            dialog,
        }
    }

    /// Configured dialogs as [`DialogInfo`] records, in key order.
    pub fn dialog_infos(&self) -> Vec<DialogInfo> {
        self.dialog
            .iter()
            .map(|(key, cfg)| DialogInfo::from_config(key.clone(), cfg))
            .collect()
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Interval between job scheduler ticks, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    16
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// `[[canvas]]` entry: one display layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CanvasInfo {
    pub name: String,
    /// Sorting order; higher layers draw above lower ones.
    #[serde(default)]
    pub order: i32,
}

/// `[dialog.<key>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DialogConfig {
    /// Key handed to the asset loader when an instance must be spawned.
    pub asset_key: String,

    /// Target layer. Falls back to the lowest-order canvas when unset.
    #[serde(default)]
    pub canvas: Option<String>,

    /// Keep the instance alive for the whole session: preloaded on
    /// initialize and never destroyed on scope exit.
    #[serde(default)]
    pub keep_in_memory: bool,

    /// Scopes (scenes) in which this dialog is preloaded into the pool.
    #[serde(default)]
    pub preload_scenes: Vec<String>,

    /// Block input on other dialogs while this one transitions.
    #[serde(default = "default_lock_interaction")]
    pub lock_interaction: bool,

    #[serde(default)]
    pub show_animation: Option<String>,

    #[serde(default)]
    pub hide_animation: Option<String>,
}

fn default_lock_interaction() -> bool {
    true
}

/// Runtime view of a dialog's configuration, carrying its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogInfo {
    pub key: String,
    pub asset_key: String,
    pub canvas: Option<String>,
    pub keep_in_memory: bool,
    pub preload_scenes: Vec<String>,
    pub lock_interaction: bool,
    pub show_animation: Option<String>,
    pub hide_animation: Option<String>,
}

impl DialogInfo {
    pub fn from_config(key: String, cfg: &DialogConfig) -> Self {
        Self {
            key,
            asset_key: cfg.asset_key.clone(),
            canvas: cfg.canvas.clone(),
            keep_in_memory: cfg.keep_in_memory,
            preload_scenes: cfg.preload_scenes.clone(),
            lock_interaction: cfg.lock_interaction,
            show_animation: cfg.show_animation.clone(),
            hide_animation: cfg.hide_animation.clone(),
        }
    }

    /// Whether this dialog is preloaded when `scene` loads.
    pub fn preloads_in(&self, scene: &str) -> bool {
        !self.keep_in_memory && self.preload_scenes.iter().any(|s| s == scene)
    }
}
