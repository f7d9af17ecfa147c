// tests/config_errors.rs

use std::io::Write;
use tempfile::NamedTempFile;
use stagehand::config::{load_and_validate, validate_config};
use stagehand::errors::StagehandError;
use stagehand_test_utils::builders::{ConfigFileBuilder, DialogConfigBuilder};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn expect_config_error(contents: &str, needle: &str) {
    let file = write_config(contents);
    match load_and_validate(file.path()) {
        Err(StagehandError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} lacks {needle:?}");
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn full_config_loads_with_defaults() {
    let file = write_config(
        r#"
[[canvas]]
name = "Popup"
order = 10

[[canvas]]
name = "Main"

[dialog.Settings]
asset_key = "ui/settings"
canvas = "Popup"
keep_in_memory = true
show_animation = "fade"

[dialog.Shop]
asset_key = "ui/shop"
preload_scenes = ["Town"]
lock_interaction = false
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.scheduler.tick_interval_ms, 16);
    assert_eq!(cfg.canvas.len(), 2);
    assert_eq!(cfg.canvas[1].order, 0);

    let infos = cfg.dialog_infos();
    assert_eq!(infos[0].key, "Settings");
    assert!(infos[0].lock_interaction);
    assert_eq!(infos[0].show_animation.as_deref(), Some("fade"));
    assert_eq!(infos[0].hide_animation, None);
    assert!(!infos[1].lock_interaction);
    assert!(infos[1].preloads_in("Town"));
}

#[test]
fn unknown_canvas_reference_is_rejected() {
    expect_config_error(
        r#"
[[canvas]]
name = "Main"

[dialog.Settings]
asset_key = "ui/settings"
canvas = "Overlay"
"#,
        "unknown canvas 'Overlay'",
    );
}

#[test]
fn duplicate_canvas_is_rejected() {
    expect_config_error(
        r#"
[[canvas]]
name = "Main"

[[canvas]]
name = "Main"
order = 3
"#,
        "more than once",
    );
}

#[test]
fn dialogs_without_canvas_are_rejected() {
    expect_config_error(
        r#"
[dialog.Settings]
asset_key = "ui/settings"
"#,
        "no [[canvas]]",
    );
}

#[test]
fn empty_asset_key_is_rejected() {
    expect_config_error(
        r#"
[[canvas]]
name = "Main"

[dialog.Settings]
asset_key = "  "
"#,
        "empty asset_key",
    );
}

#[test]
fn zero_tick_interval_is_rejected() {
    expect_config_error(
        r#"
[scheduler]
tick_interval_ms = 0
"#,
        "tick_interval_ms",
    );
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = write_config("[[canvas]\nname = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(StagehandError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/Stagehand.toml"),
        Err(StagehandError::IoError(_))
    ));
}

#[test]
fn builder_configs_go_through_the_same_validation() {
    let raw = ConfigFileBuilder::new()
        .with_canvas("Main", 0)
        .with_dialog("Settings", DialogConfigBuilder::new("ui/settings").canvas("Nope").build())
        .build_raw();
    assert!(validate_config(&raw).is_err());

    let cfg = ConfigFileBuilder::new()
        .tick_interval_ms(5)
        .with_canvas("Main", 0)
        .with_dialog("Settings", DialogConfigBuilder::new("ui/settings").build())
        .build();
    assert_eq!(cfg.scheduler.tick_interval_ms, 5);
}
