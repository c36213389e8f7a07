//! 설정 관리 — lognorm.toml 파싱 및 런타임 설정
//!
//! [`LognormConfig`]는 CLI와 세션 팩토리가 사용하는 최상위 설정 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGNORM_OPTIONS_ADD_RULE=true` 형식)
//! 3. 설정 파일 (`lognorm.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # fn example() -> Result<(), lognorm_core::error::LognormError> {
//! use lognorm_core::config::LognormConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LognormConfig::load("lognorm.toml")?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LognormConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LognormError};
use crate::options::NormalizerOptions;
use crate::rule::RuleSource;

/// lognorm-rs 통합 설정
///
/// `lognorm.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LognormConfig {
    /// 일반 설정 (로깅)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 네이티브 라이브러리 위치
    #[serde(default)]
    pub library: LibraryConfig,
    /// 컨텍스트 옵션
    #[serde(default)]
    pub options: NormalizerOptions,
    /// 룰 소스
    #[serde(default)]
    pub rules: RulesConfig,
    /// 네이티브 디버그 콜백 설정
    #[serde(default)]
    pub debug: DebugConfig,
}

impl LognormConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LognormError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LognormError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LognormError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LognormError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일 없이 기본값 + 환경변수 오버라이드로 설정을 만듭니다.
    pub fn from_env() -> Result<Self, LognormError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LognormError> {
        toml::from_str(toml_str).map_err(|e| {
            LognormError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGNORM_{SECTION}_{FIELD}`
    /// 예: `LOGNORM_LIBRARY_LOGNORM_PATH=/opt/lognorm/lib/liblognorm.so.5`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGNORM_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGNORM_GENERAL_LOG_FORMAT");

        // Library
        override_string(
            &mut self.library.lognorm_path,
            "LOGNORM_LIBRARY_LOGNORM_PATH",
        );
        override_string(
            &mut self.library.fastjson_path,
            "LOGNORM_LIBRARY_FASTJSON_PATH",
        );

        // Options
        override_bool(&mut self.options.allow_regex, "LOGNORM_OPTIONS_ALLOW_REGEX");
        override_bool(
            &mut self.options.add_exec_path,
            "LOGNORM_OPTIONS_ADD_EXEC_PATH",
        );
        override_bool(
            &mut self.options.add_original_message,
            "LOGNORM_OPTIONS_ADD_ORIGINAL_MESSAGE",
        );
        override_bool(&mut self.options.add_rule, "LOGNORM_OPTIONS_ADD_RULE");
        override_bool(
            &mut self.options.add_rule_location,
            "LOGNORM_OPTIONS_ADD_RULE_LOCATION",
        );

        // Rules
        override_opt_string(&mut self.rules.path, "LOGNORM_RULES_PATH");
        override_opt_string(&mut self.rules.inline, "LOGNORM_RULES_INLINE");

        // Debug
        override_bool(&mut self.debug.enabled, "LOGNORM_DEBUG_ENABLED");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LognormError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.library.lognorm_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "library.lognorm_path".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.library.fastjson_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "library.fastjson_path".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        // 룰 소스는 path / inline 중 최대 하나
        if self.rules.path.is_some() && self.rules.inline.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "rules".to_owned(),
                reason: "only one of 'path' or 'inline' may be set".to_owned(),
            }
            .into());
        }

        if let Some(path) = &self.rules.path
            && path.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                field: "rules.path".to_owned(),
                reason: "must not be empty when set".to_owned(),
            }
            .into());
        }

        Ok(())
    }

    /// 설정된 룰 소스를 반환합니다. 설정되지 않았다면 `None`.
    pub fn rule_source(&self) -> Option<RuleSource> {
        self.rules.source()
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 네이티브 라이브러리 설정
///
/// 파일 이름만 주면 시스템 동적 로더의 검색 경로를 따르고,
/// 경로를 주면 해당 파일을 직접 엽니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// liblognorm 공유 라이브러리
    pub lognorm_path: String,
    /// libfastjson 공유 라이브러리 (결과 JSON 직렬화/해제)
    pub fastjson_path: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            lognorm_path: "liblognorm.so.5".to_owned(),
            fastjson_path: "libfastjson.so.4".to_owned(),
        }
    }
}

/// 룰 소스 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// 룰베이스 파일 경로
    pub path: Option<String>,
    /// 인라인 룰베이스 문자열
    pub inline: Option<String>,
}

impl RulesConfig {
    /// 설정을 [`RuleSource`]로 변환합니다. 파일 경로가 우선합니다.
    pub fn source(&self) -> Option<RuleSource> {
        match (&self.path, &self.inline) {
            (Some(path), _) => Some(RuleSource::file(path)),
            (None, Some(inline)) => Some(RuleSource::inline(inline.clone())),
            (None, None) => None,
        }
    }
}

/// 네이티브 디버그 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// 디버그 콜백 설치 + `ln_enableDebug(1)` 여부
    pub enabled: bool,
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_opt_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = if val.is_empty() { None } else { Some(val) };
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = LognormConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.library.lognorm_path, "liblognorm.so.5");
        assert_eq!(config.options, NormalizerOptions::default());
        assert!(config.rule_source().is_none());
        assert!(!config.debug.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        LognormConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = LognormConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.library.fastjson_path, "libfastjson.so.4");
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[options]
add_original_message = true

[rules]
inline = "rule=:%all:rest%"
"#;
        let config = LognormConfig::parse(toml).unwrap();
        assert!(config.options.add_original_message);
        assert!(!config.options.add_rule);
        // general은 기본값 유지
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(
            config.rule_source(),
            Some(RuleSource::inline("rule=:%all:rest%"))
        );
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = LognormConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            LognormError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LognormConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = LognormConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_empty_library_path() {
        let mut config = LognormConfig::default();
        config.library.lognorm_path = "  ".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("library.lognorm_path"));
    }

    #[test]
    fn validate_rejects_both_rule_sources() {
        let mut config = LognormConfig::default();
        config.rules.path = Some("/etc/lognorm/sample.rulebase".to_owned());
        config.rules.inline = Some("rule=:%all:rest%".to_owned());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("only one of"));
    }

    #[test]
    fn file_rule_source_from_path() {
        let rules = RulesConfig {
            path: Some("/etc/lognorm/sample.rulebase".to_owned()),
            inline: None,
        };
        assert_eq!(
            rules.source(),
            Some(RuleSource::file("/etc/lognorm/sample.rulebase"))
        );
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: #[serial]로 환경변수를 건드리는 테스트끼리 직렬화됩니다.
        unsafe { std::env::set_var("TEST_LOGNORM_STR", "overridden") };
        override_string(&mut val, "TEST_LOGNORM_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_LOGNORM_STR") };
    }

    #[test]
    #[serial]
    fn env_override_bool_ignores_garbage() {
        let mut val = true;
        // SAFETY: #[serial]로 환경변수를 건드리는 테스트끼리 직렬화됩니다.
        unsafe { std::env::set_var("TEST_LOGNORM_BOOL", "yes please") };
        override_bool(&mut val, "TEST_LOGNORM_BOOL");
        assert!(val);
        unsafe { std::env::set_var("TEST_LOGNORM_BOOL", "false") };
        override_bool(&mut val, "TEST_LOGNORM_BOOL");
        assert!(!val);
        unsafe { std::env::remove_var("TEST_LOGNORM_BOOL") };
    }

    #[test]
    #[serial]
    fn env_override_empty_rule_path_clears_it() {
        let mut val = Some("/etc/lognorm/a.rulebase".to_owned());
        // SAFETY: #[serial]로 환경변수를 건드리는 테스트끼리 직렬화됩니다.
        unsafe { std::env::set_var("TEST_LOGNORM_OPT", "") };
        override_opt_string(&mut val, "TEST_LOGNORM_OPT");
        assert!(val.is_none());
        unsafe { std::env::remove_var("TEST_LOGNORM_OPT") };
    }
}
