#![allow(dead_code)]

use std::collections::BTreeMap;
use stagehand::config::{CanvasInfo, ConfigFile, DialogConfig, RawConfigFile, SchedulerSection};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                scheduler: SchedulerSection::default(),
                canvas: Vec::new(),
                dialog: BTreeMap::new(),
            },
        }
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.scheduler.tick_interval_ms = ms;
        self
    }

    pub fn with_canvas(mut self, name: &str, order: i32) -> Self {
        self.config.canvas.push(CanvasInfo {
            name: name.to_string(),
            order,
        });
        self
    }

    pub fn with_dialog(mut self, key: &str, dialog: DialogConfig) -> Self {
        self.config.dialog.insert(key.to_string(), dialog);
        self
    }

    /// The unvalidated config, for exercising validation errors.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `DialogConfig`.
pub struct DialogConfigBuilder {
    dialog: DialogConfig,
}

impl DialogConfigBuilder {
    pub fn new(asset_key: &str) -> Self {
        Self {
            dialog: DialogConfig {
                asset_key: asset_key.to_string(),
                canvas: None,
                keep_in_memory: false,
                preload_scenes: vec![],
                lock_interaction: true,
                show_animation: None,
                hide_animation: None,
            },
        }
    }

    pub fn canvas(mut self, canvas: &str) -> Self {
        self.dialog.canvas = Some(canvas.to_string());
        self
    }

    pub fn keep_in_memory(mut self) -> Self {
        self.dialog.keep_in_memory = true;
        self
    }

    pub fn preload_in(mut self, scene: &str) -> Self {
        self.dialog.preload_scenes.push(scene.to_string());
        self
    }

    pub fn lock_interaction(mut self, lock: bool) -> Self {
        self.dialog.lock_interaction = lock;
        self
    }

    pub fn show_animation(mut self, name: &str) -> Self {
        self.dialog.show_animation = Some(name.to_string());
        self
    }

    pub fn hide_animation(mut self, name: &str) -> Self {
        self.dialog.hide_animation = Some(name.to_string());
        self
    }

    pub fn build(self) -> DialogConfig {
        self.dialog
    }
}
