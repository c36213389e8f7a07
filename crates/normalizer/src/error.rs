//! 정규화 레이어 에러 타입
//!
//! [`NormalizerError`]는 네이티브 경계에서 발생하는 모든 실패를 표현합니다.
//! 반환 코드, 콜백 에러 개수, 내장 진단 코드 중 하나를 반드시 담아
//! 로그를 다시 읽지 않고도 네이티브 쪽 원인을 재현할 수 있게 합니다.
//!
//! `From<NormalizerError> for LognormError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use lognorm_core::error::LognormError;

/// 네이티브 경계 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum NormalizerError {
    /// 공유 라이브러리 로드 또는 심볼 조회 실패
    #[error("failed to load native library {library}: {reason}")]
    LibraryLoad {
        /// 라이브러리 이름 또는 경로
        library: String,
        /// 실패 사유
        reason: String,
    },

    /// 네이티브 init이 null 컨텍스트를 반환
    #[error("ln_initCtx() failed to create a context")]
    ContextInitializationFailure,

    /// 에러/디버그 콜백 등록 실패
    #[error("{call}() returned {code} instead of 0")]
    CallbackRegistrationFailure {
        /// 실패한 네이티브 호출 이름
        call: &'static str,
        /// 네이티브 반환 코드
        code: i32,
    },

    /// 룰 로더가 0이 아닌 코드를 반환
    #[error("{call}() returned {code} instead of 0")]
    RuleLoadFailure {
        /// 로더 호출 이름 (`ln_loadSamples` / `ln_loadSamplesFromString`)
        call: &'static str,
        /// 네이티브 반환 코드
        code: i32,
        /// 로드하려던 룰 소스 설명
        rules: String,
    },

    /// 룰 로드 중 에러 콜백이 호출됨 (반환 코드와 무관)
    #[error("<{count}> errors have occurred")]
    RuleLoadCallbackErrors {
        /// 콜백 호출 횟수
        count: usize,
        /// 캡처된 메시지 (가장 최근 32개, 오래된 것부터)
        messages: Vec<String>,
    },

    /// 정규화가 null 결과를 반환
    #[error("{}", normalization_failure_message(.code))]
    NormalizationFailure {
        /// 네이티브가 노출한 진단 코드 (예: -1000)
        code: Option<i32>,
        /// 네이티브가 생성한 에러 정보 JSON
        payload: Option<String>,
    },

    /// 닫힌 세션에 대한 호출
    #[error("normalization session has already been closed")]
    UseAfterClose,

    /// 해제된 결과에 대한 호출
    #[error("normalization result has already been released")]
    UseAfterRelease,

    /// 네이티브가 결과 문자열을 돌려주지 않음
    #[error("native result could not be rendered as JSON text")]
    UnreadableResult,

    /// 경계를 넘길 수 없는 입력 (NUL 바이트 포함)
    #[error("{what} contains a NUL byte at offset {offset}")]
    InvalidInput {
        /// 입력 종류 (message, rulebase, rulebase path)
        what: &'static str,
        /// NUL 바이트 위치
        offset: usize,
    },

    /// 결과 JSON 파싱 실패
    #[error("invalid JSON payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl NormalizerError {
    /// 에러에 담긴 네이티브 코드를 반환합니다.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Self::CallbackRegistrationFailure { code, .. } | Self::RuleLoadFailure { code, .. } => {
                Some(*code)
            }
            Self::NormalizationFailure { code, .. } => *code,
            _ => None,
        }
    }

    /// 컨텍스트 생성 단계에서만 발생하는 에러인지 여부
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            Self::LibraryLoad { .. }
                | Self::ContextInitializationFailure
                | Self::CallbackRegistrationFailure { .. }
                | Self::RuleLoadFailure { .. }
                | Self::RuleLoadCallbackErrors { .. }
        )
    }

    /// 룰베이스 자체가 거부된 경우인지 여부
    pub fn is_rule_rejection(&self) -> bool {
        matches!(
            self,
            Self::RuleLoadFailure { .. } | Self::RuleLoadCallbackErrors { .. }
        )
    }
}

fn normalization_failure_message(code: &Option<i32>) -> String {
    match code {
        Some(code) => {
            format!("ln_normalize() failed to perform extraction with error code: {code}")
        }
        None => "ln_normalize() failed to perform extraction".to_owned(),
    }
}

impl From<NormalizerError> for LognormError {
    fn from(err: NormalizerError) -> Self {
        LognormError::Normalizer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_errors_message_is_count_only() {
        let err = NormalizerError::RuleLoadCallbackErrors {
            count: 2,
            messages: vec!["a".to_owned(), "b".to_owned()],
        };
        assert_eq!(err.to_string(), "<2> errors have occurred");
    }

    #[test]
    fn normalization_failure_includes_code() {
        let err = NormalizerError::NormalizationFailure {
            code: Some(-1000),
            payload: None,
        };
        assert_eq!(
            err.to_string(),
            "ln_normalize() failed to perform extraction with error code: -1000"
        );
        assert_eq!(err.native_code(), Some(-1000));
    }

    #[test]
    fn normalization_failure_without_code() {
        let err = NormalizerError::NormalizationFailure {
            code: None,
            payload: None,
        };
        assert!(!err.to_string().contains("error code"));
        assert_eq!(err.native_code(), None);
    }

    #[test]
    fn rule_load_failure_display() {
        let err = NormalizerError::RuleLoadFailure {
            call: "ln_loadSamples",
            code: 1,
            rules: "rulebase file /nope".to_owned(),
        };
        assert_eq!(err.to_string(), "ln_loadSamples() returned 1 instead of 0");
        assert!(err.is_construction_failure());
        assert!(err.is_rule_rejection());
    }

    #[test]
    fn use_after_errors_are_not_construction_failures() {
        assert!(!NormalizerError::UseAfterClose.is_construction_failure());
        assert!(!NormalizerError::UseAfterRelease.is_construction_failure());
    }

    #[test]
    fn converts_to_lognorm_error() {
        let err: LognormError = NormalizerError::ContextInitializationFailure.into();
        assert!(matches!(err, LognormError::Normalizer(_)));
        assert!(err.to_string().contains("ln_initCtx"));
    }

    #[test]
    fn invalid_input_display() {
        let err = NormalizerError::InvalidInput {
            what: "message",
            offset: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("message"));
        assert!(msg.contains('3'));
    }
}
