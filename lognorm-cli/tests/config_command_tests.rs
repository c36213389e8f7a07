//! Integration tests for `lognorm config` and the CLI exit codes.
//!
//! Tests config validation and display with real TOML files, and drive the
//! built binary for paths that never reach the native library.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use lognorm_core::config::LognormConfig;
use tempfile::TempDir;

const VALID_CONFIG: &str = r#"
[general]
log_level = "info"
log_format = "json"

[library]
lognorm_path = "liblognorm.so.5"
fastjson_path = "libfastjson.so.4"

[options]
add_original_message = true

[rules]
inline = "rule=:%all:rest%"

[debug]
enabled = false
"#;

fn lognorm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lognorm"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("should spawn lognorm binary")
}

fn write_config(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("should write config");
    path.to_string_lossy().into_owned()
}

#[test]
fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = write_config(&temp_dir, "lognorm.toml", VALID_CONFIG);

    // When: Loading the config
    let config = LognormConfig::load(&config_path).expect("valid config should load");

    // Then: Values come from the file
    assert_eq!(config.general.log_format, "json");
    assert!(config.options.add_original_message);
    assert!(config.rule_source().is_some());
}

#[test]
fn test_config_validate_malformed_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = write_config(&temp_dir, "bad.toml", "[general\nlog_level = \"info\"\n");

    let result = LognormConfig::load(&config_path);
    assert!(result.is_err(), "malformed TOML should fail to load");
}

#[test]
fn test_config_validate_empty_file_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = write_config(&temp_dir, "empty.toml", "");

    let config = LognormConfig::load(&config_path).expect("empty config should load");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.library.lognorm_path, "liblognorm.so.5");
    assert!(config.rule_source().is_none());
}

#[test]
fn test_example_config_parses() {
    let example = Path::new(env!("CARGO_MANIFEST_DIR")).join("../lognorm.toml.example");
    let config = LognormConfig::from_file(&example).expect("example config should validate");
    assert!(config.rule_source().is_some());
}

#[test]
fn test_cli_config_validate_valid() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = write_config(&temp_dir, "lognorm.toml", VALID_CONFIG);

    let output = lognorm(&["--config", &config_path, "config", "validate"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("VALID"));
}

#[test]
fn test_cli_config_validate_invalid_exits_with_2() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = write_config(
        &temp_dir,
        "lognorm.toml",
        "[general]\nlog_level = \"loud\"\n",
    );

    let output = lognorm(&["--config", &config_path, "config", "validate", "--output", "json"]);

    assert_eq!(output.status.code(), Some(2));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("json report on stdout");
    assert_eq!(report["valid"], false);
    assert!(
        report["errors"][0]
            .as_str()
            .expect("error string")
            .contains("general.log_level")
    );
}

#[test]
fn test_cli_config_show_section() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = write_config(&temp_dir, "lognorm.toml", VALID_CONFIG);

    let output = lognorm(&["--config", &config_path, "config", "show", "--section", "options"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[options]"));
    assert!(stdout.contains("add_original_message = true"));
}

#[test]
fn test_cli_missing_explicit_config_exits_with_2() {
    let output = lognorm(&["--config", "/nonexistent/lognorm.toml", "version"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("config file not found"));
}

#[test]
fn test_cli_unloadable_library_exits_with_3() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = write_config(
        &temp_dir,
        "lognorm.toml",
        "[library]\nlognorm_path = \"/nonexistent/liblognorm.so.5\"\n",
    );

    let output = lognorm(&[
        "--config",
        &config_path,
        "normalize",
        "--rulebase",
        "rule=:%all:rest%",
        "offline",
    ]);

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("native library unavailable"));
}
