//! lognorm.toml 통합 설정 테스트
//!
//! - lognorm.toml.example 파싱 테스트
//! - 디스크 파일 로딩 / 누락 파일 에러 테스트
//! - 환경변수 우선순위 테스트

use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use lognorm_core::config::LognormConfig;
use lognorm_core::error::{ConfigError, LognormError};
use lognorm_core::rule::RuleSource;

// =============================================================================
// lognorm.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../lognorm.toml.example");
    let config = LognormConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.library.lognorm_path, "liblognorm.so.5");
    assert_eq!(config.library.fastjson_path, "libfastjson.so.4");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../lognorm.toml.example");
    let config = LognormConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_has_all_options_disabled_and_file_rules() {
    let content = include_str!("../../../lognorm.toml.example");
    let config = LognormConfig::parse(content).expect("should parse");

    assert_eq!(config.options.ordered(), [false; 5]);
    assert_eq!(
        config.rule_source(),
        Some(RuleSource::file("/etc/lognorm/sample.rulebase"))
    );
    assert!(!config.debug.enabled);
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[test]
#[serial]
fn load_reads_file_from_disk() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("lognorm.toml");
    fs::write(
        &path,
        "[options]\nadd_rule = true\n\n[rules]\ninline = \"rule=:%all:rest%\"\n",
    )
    .expect("should write config");

    let config = LognormConfig::load(&path).expect("should load");
    assert!(config.options.add_rule);
    assert_eq!(
        config.rule_source(),
        Some(RuleSource::inline("rule=:%all:rest%"))
    );
}

#[test]
fn missing_file_reports_file_not_found() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("nope.toml");

    let err = LognormConfig::from_file(&path).unwrap_err();
    assert!(matches!(
        err,
        LognormError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[test]
fn from_file_rejects_invalid_values() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[general]\nlog_format = \"xml\"\n").expect("should write config");

    let err = LognormConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("general.log_format"));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial]
fn env_overrides_file_values() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("lognorm.toml");
    fs::write(&path, "[options]\nadd_original_message = false\n").expect("should write config");

    // SAFETY: #[serial]로 환경변수를 건드리는 테스트끼리 직렬화됩니다.
    unsafe {
        std::env::set_var("LOGNORM_OPTIONS_ADD_ORIGINAL_MESSAGE", "true");
        std::env::set_var("LOGNORM_LIBRARY_LOGNORM_PATH", "/opt/lognorm/liblognorm.so.5");
    }

    let config = LognormConfig::load(&path);

    unsafe {
        std::env::remove_var("LOGNORM_OPTIONS_ADD_ORIGINAL_MESSAGE");
        std::env::remove_var("LOGNORM_LIBRARY_LOGNORM_PATH");
    }

    let config = config.expect("should load");
    assert!(config.options.add_original_message);
    assert_eq!(config.library.lognorm_path, "/opt/lognorm/liblognorm.so.5");
}

#[test]
#[serial]
fn env_rule_path_conflicting_with_file_inline_fails_validation() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("lognorm.toml");
    fs::write(&path, "[rules]\ninline = \"rule=:%all:rest%\"\n").expect("should write config");

    // SAFETY: #[serial]로 환경변수를 건드리는 테스트끼리 직렬화됩니다.
    unsafe { std::env::set_var("LOGNORM_RULES_PATH", "/etc/lognorm/sample.rulebase") };
    let result = LognormConfig::load(&path);
    unsafe { std::env::remove_var("LOGNORM_RULES_PATH") };

    let err = result.unwrap_err();
    assert!(err.to_string().contains("only one of"));
}
