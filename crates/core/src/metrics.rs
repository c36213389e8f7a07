//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! `lognorm-normalizer`는 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다. 익스포터는 포함하지 않으며,
//! 레코더 설치는 임베딩하는 애플리케이션의 몫입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `lognorm_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(lognorm_core::metrics::CONTEXTS_CREATED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 컨텍스트 생성 단계 레이블 키 (init, callback, rules)
pub const LABEL_STAGE: &str = "stage";

/// 콜백 에러 발생 구간 레이블 키 (load, normalize)
pub const LABEL_PHASE: &str = "phase";

// ─── 컨텍스트 메트릭 ───────────────────────────────────────────────

/// 생성에 성공한 컨텍스트 수 (counter)
pub const CONTEXTS_CREATED_TOTAL: &str = "lognorm_contexts_created_total";

/// 생성 도중 실패한 컨텍스트 수 (counter, label: stage)
pub const CONTEXT_BUILD_FAILURES_TOTAL: &str = "lognorm_context_build_failures_total";

/// 해제된 컨텍스트 수 (counter)
pub const CONTEXTS_RELEASED_TOTAL: &str = "lognorm_contexts_released_total";

// ─── 정규화 메트릭 ─────────────────────────────────────────────────

/// normalize 호출 수 (counter, label: result)
pub const NORMALIZE_TOTAL: &str = "lognorm_normalize_total";

/// 에러 콜백 호출 수 (counter, label: phase)
pub const CALLBACK_ERRORS_TOTAL: &str = "lognorm_callback_errors_total";

/// normalize 호출 지연 시간 (histogram, 초)
pub const NORMALIZE_DURATION_SECONDS: &str = "lognorm_normalize_duration_seconds";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        CONTEXTS_CREATED_TOTAL,
        "Total number of fully configured, rule-loaded contexts"
    );
    describe_counter!(
        CONTEXT_BUILD_FAILURES_TOTAL,
        "Context constructions aborted, by failing stage"
    );
    describe_counter!(
        CONTEXTS_RELEASED_TOTAL,
        "Total number of native contexts released"
    );
    describe_counter!(
        NORMALIZE_TOTAL,
        "Normalize calls, by result (success, failure)"
    );
    describe_counter!(
        CALLBACK_ERRORS_TOTAL,
        "Native error callback invocations, by phase (load, normalize)"
    );
    describe_histogram!(
        NORMALIZE_DURATION_SECONDS,
        "Native normalize call latency in seconds"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        CONTEXTS_CREATED_TOTAL,
        CONTEXT_BUILD_FAILURES_TOTAL,
        CONTEXTS_RELEASED_TOTAL,
        NORMALIZE_TOTAL,
        CALLBACK_ERRORS_TOTAL,
        NORMALIZE_DURATION_SECONDS,
    ];

    #[test]
    fn all_metrics_start_with_lognorm_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("lognorm_"),
                "Metric '{}' does not start with 'lognorm_' prefix",
                name
            );
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 설치되지 않은 상태에서도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_RESULT, LABEL_STAGE, LABEL_PHASE] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
