// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod jobs;
pub mod logging;
pub mod types;
pub mod ui;

use anyhow::Result;
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{ConfigFile, DialogInfo};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, then prints the layers, dialogs and the
/// preload plan for `--scene` (if given).
pub fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(args.config_path())?;
    print_report(&cfg, args.scene.as_deref());
    Ok(())
}

/// Dialogs spawned into the pool when `scene` loads, in key order.
pub fn scene_preloads<'a>(cfg: &'a ConfigFile, scene: &str) -> Vec<&'a str> {
    cfg.dialog
        .iter()
        .filter(|(key, dialog)| DialogInfo::from_config((*key).clone(), dialog).preloads_in(scene))
        .map(|(key, _)| key.as_str())
        .collect()
}

/// Dialogs preloaded by `initialize` and kept for the whole session.
pub fn session_preloads(cfg: &ConfigFile) -> Vec<&str> {
    cfg.dialog
        .iter()
        .filter(|(_, dialog)| dialog.keep_in_memory)
        .map(|(key, _)| key.as_str())
        .collect()
}

fn print_report(cfg: &ConfigFile, scene: Option<&str>) {
    println!("stagehand config");
    println!("  scheduler.tick_interval_ms = {}", cfg.scheduler.tick_interval_ms);
    println!();

    let mut canvases = cfg.canvas.clone();
    canvases.sort_by_key(|c| c.order);
    println!("layers ({}):", canvases.len());
    for canvas in &canvases {
        println!("  - {} (order {})", canvas.name, canvas.order);
    }
    println!();

    let lowest = canvases.first().map(|c| c.name.as_str());
    println!("dialogs ({}):", cfg.dialog.len());
    for (key, dialog) in cfg.dialog.iter() {
        println!("  - {key}");
        println!("      asset: {}", dialog.asset_key);
        match (dialog.canvas.as_deref(), lowest) {
            (Some(canvas), _) => println!("      canvas: {canvas}"),
            (None, Some(fallback)) => println!("      canvas: {fallback} (lowest layer)"),
            (None, None) => {}
        }
        if dialog.keep_in_memory {
            println!("      keep_in_memory: true");
        }
        if !dialog.preload_scenes.is_empty() {
            println!("      preload_scenes: {:?}", dialog.preload_scenes);
        }
        if !dialog.lock_interaction {
            println!("      lock_interaction: false");
        }
        if let Some(ref anim) = dialog.show_animation {
            println!("      show_animation: {anim}");
        }
        if let Some(ref anim) = dialog.hide_animation {
            println!("      hide_animation: {anim}");
        }
    }
    println!();

    println!("preload plan:");
    println!("  initialize: {:?}", session_preloads(cfg));
    if let Some(scene) = scene {
        println!("  scene {scene}: {:?}", scene_preloads(cfg, scene));
    }

    debug!("inspection complete");
}
