//! 에러 타입 — 설정 에러와 워크스페이스 최상위 에러 정의
//!
//! 네이티브 경계에서 발생하는 세부 에러는 `lognorm-normalizer`의
//! `NormalizerError`가 담당하며, `From` 변환을 통해 [`LognormError`]로
//! 전파됩니다.

/// lognorm-rs 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LognormError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 정규화 엔진(네이티브 경계) 에러
    #[error("normalizer error: {0}")]
    Normalizer(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: LognormError = ConfigError::FileNotFound {
            path: "lognorm.toml".to_owned(),
        }
        .into();
        assert!(matches!(err, LognormError::Config(_)));
        assert!(err.to_string().contains("lognorm.toml"));
    }

    #[test]
    fn invalid_value_display_names_field() {
        let err = ConfigError::InvalidValue {
            field: "general.log_level".to_owned(),
            reason: "must be one of: trace, debug".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("general.log_level"));
        assert!(msg.contains("must be one of"));
    }

    #[test]
    fn io_error_converts_to_top_level() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: LognormError = io.into();
        assert!(matches!(err, LognormError::Io(_)));
    }
}
