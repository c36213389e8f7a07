//! 컨텍스트 옵션 — 네이티브 `setCtxOpts`에 전달되는 다섯 개의 bool
//!
//! 필드 선언 순서가 곧 네이티브 구조체의 필드 순서입니다.
//! `lognorm-normalizer`의 `OptionsStruct`(`#[repr(C)]`)가
//! [`NormalizerOptions::ordered`]를 통해 이 순서 그대로 값을 옮깁니다.
//! 이름 기반 직렬화(serde)는 설정 파일 용도로만 사용하며,
//! 네이티브 경계에서는 절대 사용하지 않습니다.

use serde::{Deserialize, Serialize};

/// 네이티브 옵션 필드 이름 (ABI 순서)
pub const OPTION_FIELD_ORDER: [&str; 5] = [
    "allow_regex",
    "add_exec_path",
    "add_original_message",
    "add_rule",
    "add_rule_location",
];

/// 정규화 컨텍스트 옵션
///
/// 모든 옵션은 기본적으로 비활성화되어 있습니다.
/// 컨텍스트에 한 번 적용된 후에는 변경되지 않습니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerOptions {
    /// 룰에서 정규식 필드 사용 허용 (`LN_CTXOPT_ALLOW_REGEX`)
    pub allow_regex: bool,
    /// 실행 경로를 결과에 추가 (`LN_CTXOPT_ADD_EXEC_PATH`, 네이티브에서는 no-op)
    pub add_exec_path: bool,
    /// 원본 메시지를 `originalmsg` 키로 추가 (`LN_CTXOPT_ADD_ORIGINALMSG`)
    pub add_original_message: bool,
    /// 매칭된 룰을 `metadata.rule.mockup`으로 추가 (`LN_CTXOPT_ADD_RULE`)
    pub add_rule: bool,
    /// 룰 위치를 `metadata.rule.location`으로 추가 (`LN_CTXOPT_ADD_RULE_LOCATION`)
    pub add_rule_location: bool,
}

impl NormalizerOptions {
    /// 모든 옵션이 꺼진 기본 옵션을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 정규식 허용 여부를 설정합니다.
    pub fn allow_regex(mut self, enabled: bool) -> Self {
        self.allow_regex = enabled;
        self
    }

    /// 실행 경로 추가 여부를 설정합니다.
    pub fn add_exec_path(mut self, enabled: bool) -> Self {
        self.add_exec_path = enabled;
        self
    }

    /// 원본 메시지 추가 여부를 설정합니다.
    pub fn add_original_message(mut self, enabled: bool) -> Self {
        self.add_original_message = enabled;
        self
    }

    /// 매칭된 룰 추가 여부를 설정합니다.
    pub fn add_rule(mut self, enabled: bool) -> Self {
        self.add_rule = enabled;
        self
    }

    /// 룰 위치 추가 여부를 설정합니다.
    pub fn add_rule_location(mut self, enabled: bool) -> Self {
        self.add_rule_location = enabled;
        self
    }

    /// ABI 순서대로 정렬된 옵션 값을 반환합니다.
    ///
    /// 순서: regex, exec-path, original-msg, rule, rule-location
    pub fn ordered(&self) -> [bool; 5] {
        [
            self.allow_regex,
            self.add_exec_path,
            self.add_original_message,
            self.add_rule,
            self.add_rule_location,
        ]
    }

    /// ABI 순서의 값 배열에서 옵션을 복원합니다.
    pub fn from_ordered(values: [bool; 5]) -> Self {
        let [allow_regex, add_exec_path, add_original_message, add_rule, add_rule_location] =
            values;
        Self {
            allow_regex,
            add_exec_path,
            add_original_message,
            add_rule,
            add_rule_location,
        }
    }

    /// 활성화된 옵션 이름 목록을 반환합니다 (로그 출력용).
    pub fn enabled_names(&self) -> Vec<&'static str> {
        OPTION_FIELD_ORDER
            .iter()
            .zip(self.ordered())
            .filter(|(_, enabled)| *enabled)
            .map(|(name, _)| *name)
            .collect()
    }
}
