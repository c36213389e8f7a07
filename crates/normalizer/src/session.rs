//! 정규화 세션
//!
//! [`NormalizationSession`]은 완전히 구성되고 룰이 로드된 네이티브 컨텍스트
//! 하나를 수명 내내 소유합니다. [`ContextFactory`](crate::factory::ContextFactory)만
//! 세션을 만들 수 있으므로, 룰 로드에 실패한 컨텍스트가 세션으로 노출되는 일은
//! 없습니다.
//!
//! # 상태 전이
//!
//! ```text
//! Ready ──normalize──▶ Ready
//!   │
//!   └────close───────▶ Closed (terminal)
//! ```
//!
//! `Closed` 이후에는 `close`, `is_closed`, `id`를 제외한 모든 메서드가
//! [`NormalizerError::UseAfterClose`]를 반환합니다. `close`는 멱등입니다.

use std::fmt;
use std::time::Instant;

use lognorm_core::metrics as m;
use lognorm_core::options::NormalizerOptions;
use lognorm_core::rule::RuleSource;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregator::CallbackErrors;
use crate::context::{NativeContext, to_cstring};
use crate::error::NormalizerError;
use crate::result::ResultHandle;

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// 정규화 가능
    Ready,
    /// 네이티브 컨텍스트가 해제됨
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// 네이티브 컨텍스트 하나를 소유하는 정규화 세션
///
/// `Send`이지만 `Sync`가 아니며 `normalize`가 `&mut self`를 받으므로
/// 한 세션에 대한 동시 호출은 컴파일 단계에서 막힙니다.
/// 여러 스레드에서 쓰려면 스레드마다 세션을 만들거나 `Mutex`로 감싸십시오.
#[derive(Debug)]
pub struct NormalizationSession {
    id: Uuid,
    context: NativeContext,
    options: NormalizerOptions,
    rule_source: RuleSource,
    state: SessionState,
}

impl NormalizationSession {
    pub(crate) fn new(
        id: Uuid,
        context: NativeContext,
        options: NormalizerOptions,
        rule_source: RuleSource,
    ) -> Self {
        Self {
            id,
            context,
            options,
            rule_source,
            state: SessionState::Ready,
        }
    }

    /// 세션 ID (로그의 `session_id` 필드와 같음)
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 닫혔는지 여부
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// 현재 상태
    pub fn state(&self) -> Result<SessionState, NormalizerError> {
        self.ensure_open()?;
        Ok(self.state)
    }

    /// 컨텍스트에 적용된 옵션
    pub fn options(&self) -> Result<NormalizerOptions, NormalizerError> {
        self.ensure_open()?;
        Ok(self.options)
    }

    /// 로드된 룰 소스
    pub fn rule_source(&self) -> Result<&RuleSource, NormalizerError> {
        self.ensure_open()?;
        Ok(&self.rule_source)
    }

    /// 직전 `normalize` 호출 동안 발생한 에러 콜백
    pub fn callback_errors(&self) -> Result<CallbackErrors, NormalizerError> {
        self.ensure_open()?;
        Ok(self.context.aggregator().snapshot())
    }

    /// 디버그 싱크가 받은 메시지 수. 디버그 모드가 아니면 `None`.
    pub fn debug_messages(&self) -> Result<Option<usize>, NormalizerError> {
        self.ensure_open()?;
        Ok(self.context.debug_messages())
    }

    /// 메시지 하나를 정규화합니다.
    ///
    /// 네이티브가 null 결과를 반환하면 [`NormalizerError::NormalizationFailure`]를
    /// 반환하며, 세션은 계속 사용할 수 있습니다. null이 아닌 결과는 JSON 내용에
    /// `unparsed-data`가 들어 있더라도 그대로 [`ResultHandle`]로 돌려줍니다.
    pub fn normalize(&mut self, text: &str) -> Result<ResultHandle, NormalizerError> {
        self.ensure_open()?;
        let text = to_cstring("message", text.as_bytes())?;

        let started = Instant::now();
        let raw = self.context.normalize(&text);
        metrics::histogram!(m::NORMALIZE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        let callback_errors = self.context.aggregator().count();
        if callback_errors > 0 {
            metrics::counter!(m::CALLBACK_ERRORS_TOTAL, m::LABEL_PHASE => "normalize")
                .increment(callback_errors as u64);
            tracing::warn!(
                session_id = %self.id,
                count = callback_errors,
                last = self.context.aggregator().last_message().as_deref().unwrap_or(""),
                "native errors reported during normalize"
            );
        }

        if raw.result.is_null() {
            metrics::counter!(m::NORMALIZE_TOTAL, m::LABEL_RESULT => "failure").increment(1);
            let code = (raw.code != 0).then_some(raw.code);
            tracing::error!(
                session_id = %self.id,
                code = ?code,
                payload = raw.payload.as_deref().unwrap_or(""),
                "ln_normalize() failed to perform extraction"
            );
            return Err(NormalizerError::NormalizationFailure {
                code,
                payload: raw.payload,
            });
        }

        metrics::counter!(m::NORMALIZE_TOTAL, m::LABEL_RESULT => "success").increment(1);
        tracing::trace!(session_id = %self.id, "normalization succeeded");
        Ok(ResultHandle::new(self.context.engine().clone(), raw.result))
    }

    /// 정규화 결과를 JSON 문자열로 받고 핸들은 즉시 해제합니다.
    pub fn normalize_to_string(&mut self, text: &str) -> Result<String, NormalizerError> {
        let mut result = self.normalize(text)?;
        let json = result.read();
        result.release();
        json
    }

    /// 정규화 결과를 [`serde_json::Value`]로 파싱해 반환합니다.
    pub fn normalize_value(&mut self, text: &str) -> Result<serde_json::Value, NormalizerError> {
        let json = self.normalize_to_string(text)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// 네이티브 컨텍스트를 해제합니다. 이미 닫혔다면 아무 것도 하지 않습니다.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = SessionState::Closed;
        if self.context.release() {
            tracing::info!(session_id = %self.id, "normalization session closed");
        }
    }

    fn ensure_open(&self) -> Result<(), NormalizerError> {
        if self.is_closed() {
            Err(NormalizerError::UseAfterClose)
        } else {
            Ok(())
        }
    }
}

impl Drop for NormalizationSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ContextFactory;
    use crate::mock::MockEngine;
    use std::sync::Arc;

    fn session(engine: &Arc<MockEngine>, rules: &str) -> NormalizationSession {
        ContextFactory::new(engine.clone(), RuleSource::inline(rules))
            .build()
            .unwrap()
    }

    #[test]
    fn state_and_id_while_ready() {
        let engine = Arc::new(MockEngine::new());
        let s = session(&engine, "rule=:%all:rest%");
        assert_eq!(s.state().unwrap(), SessionState::Ready);
        assert!(!s.is_closed());
        assert!(!s.id().is_nil());
    }

    #[test]
    fn every_method_fails_after_close() {
        let engine = Arc::new(MockEngine::new());
        let mut s = session(&engine, "rule=:%all:rest%");
        s.close();

        assert!(matches!(s.normalize("offline"), Err(NormalizerError::UseAfterClose)));
        assert!(matches!(
            s.normalize_to_string("offline"),
            Err(NormalizerError::UseAfterClose)
        ));
        assert!(matches!(
            s.normalize_value("offline"),
            Err(NormalizerError::UseAfterClose)
        ));
        assert!(matches!(s.state(), Err(NormalizerError::UseAfterClose)));
        assert!(matches!(s.options(), Err(NormalizerError::UseAfterClose)));
        assert!(matches!(s.rule_source(), Err(NormalizerError::UseAfterClose)));
        assert!(matches!(s.callback_errors(), Err(NormalizerError::UseAfterClose)));
        assert!(matches!(s.debug_messages(), Err(NormalizerError::UseAfterClose)));
        assert!(s.is_closed());
    }

    #[test]
    fn double_close_releases_once() {
        let engine = Arc::new(MockEngine::new());
        let mut s = session(&engine, "rule=:%all:rest%");
        s.close();
        s.close();
        drop(s);
        assert_eq!(engine.contexts_released(), 1);
        assert_eq!(engine.invalid_releases(), 0);
    }

    #[test]
    fn drop_closes_ready_session() {
        let engine = Arc::new(MockEngine::new());
        {
            let _s = session(&engine, "rule=:%all:rest%");
            assert_eq!(engine.live_contexts(), 1);
        }
        assert_eq!(engine.live_contexts(), 0);
    }

    #[test]
    fn normalize_rejects_nul_in_message() {
        let engine = Arc::new(MockEngine::new());
        let mut s = session(&engine, "rule=:%all:rest%");
        assert!(matches!(
            s.normalize("off\0line"),
            Err(NormalizerError::InvalidInput {
                what: "message",
                offset: 3
            })
        ));
        // 세션은 계속 사용 가능
        assert_eq!(s.normalize_to_string("offline").unwrap(), r#"{ "all": "offline" }"#);
    }

    #[test]
    fn normalize_to_string_releases_handle() {
        let engine = Arc::new(MockEngine::new());
        let mut s = session(&engine, "rule=:%all:rest%");
        s.normalize_to_string("offline").unwrap();
        assert_eq!(engine.live_results(), 0);
    }

    #[test]
    fn session_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<NormalizationSession>();
        assert_send::<ResultHandle>();
    }
}
