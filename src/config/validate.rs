// src/config/validate.rs

use std::collections::HashSet;

use tracing::warn;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, StagehandError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StagehandError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.scheduler, raw.canvas, raw.dialog))
    }
}

/// Run every semantic check on a raw config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_scheduler(cfg)?;
    validate_canvases(cfg)?;
    validate_dialogs(cfg)?;
    Ok(())
}

fn validate_scheduler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scheduler.tick_interval_ms == 0 {
        return Err(StagehandError::ConfigError(
            "[scheduler].tick_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_canvases(cfg: &RawConfigFile) -> Result<()> {
    if cfg.canvas.is_empty() && !cfg.dialog.is_empty() {
        return Err(StagehandError::ConfigError(
            "config declares dialogs but no [[canvas]] layer to show them on".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for canvas in &cfg.canvas {
        if canvas.name.trim().is_empty() {
            return Err(StagehandError::ConfigError(
                "[[canvas]] entries need a non-empty name".to_string(),
            ));
        }
        if !seen.insert(canvas.name.as_str()) {
            return Err(StagehandError::ConfigError(format!(
                "canvas '{}' is declared more than once",
                canvas.name
            )));
        }
    }
    Ok(())
}

fn validate_dialogs(cfg: &RawConfigFile) -> Result<()> {
    for (key, dialog) in cfg.dialog.iter() {
        if dialog.asset_key.trim().is_empty() {
            return Err(StagehandError::ConfigError(format!(
                "dialog '{}' has an empty asset_key",
                key
            )));
        }

        if let Some(ref canvas) = dialog.canvas {
            if !cfg.canvas.iter().any(|c| &c.name == canvas) {
                return Err(StagehandError::ConfigError(format!(
                    "dialog '{}' references unknown canvas '{}'",
                    key, canvas
                )));
            }
        }

        if dialog.keep_in_memory && !dialog.preload_scenes.is_empty() {
            warn!(
                dialog = %key,
                "keep_in_memory dialogs are preloaded at initialize; preload_scenes is ignored"
            );
        }
    }
    Ok(())
}
