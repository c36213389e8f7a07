//! 네이티브 컨텍스트 가드
//!
//! [`NativeContext`]는 `ln_initCtx`가 반환한 핸들 하나를 소유합니다.
//! init 성공 직후부터 가드가 핸들을 쥐고 있으므로 이후 어떤 경로로 빠져나가도
//! `ln_exitCtx`가 정확히 한 번 호출됩니다. 에러 집계기와 디버그 싱크도
//! 여기서 소유하며, 컨텍스트가 해제된 뒤에야 함께 해제됩니다.

use std::ffi::{CStr, CString, c_int};
use std::sync::Arc;

use lognorm_core::metrics as m;
use lognorm_core::rule::RuleSource;
use uuid::Uuid;

use crate::aggregator::{ErrorAggregator, error_callback};
use crate::binding::{NativeEngine, OptionsStruct, RawCtx, RawNormalization};
use crate::debug::{DebugSink, debug_callback};
use crate::error::NormalizerError;

/// 네이티브 컨텍스트 핸들 소유자
pub(crate) struct NativeContext {
    engine: Arc<dyn NativeEngine>,
    raw: RawCtx,
    live: bool,
    session_id: Uuid,
    // Drop::drop에서 raw를 해제한 뒤에 해제됨
    aggregator: Box<ErrorAggregator>,
    debug_sink: Option<Box<DebugSink>>,
}

// SAFETY: 컨텍스트는 한 소유자만 가지며 `&mut` 또는 단일 스레드 접근으로만
// 사용됩니다. Sync는 구현하지 않으므로 동시 호출은 컴파일 단계에서 막힙니다.
unsafe impl Send for NativeContext {}

impl NativeContext {
    /// 새 네이티브 컨텍스트를 생성합니다.
    pub(crate) fn init(
        engine: Arc<dyn NativeEngine>,
        session_id: Uuid,
    ) -> Result<Self, NormalizerError> {
        let raw = engine.init_ctx();
        if raw.is_null() {
            return Err(NormalizerError::ContextInitializationFailure);
        }
        tracing::debug!(session_id = %session_id, engine = engine.name(), "native context created");

        Ok(Self {
            engine,
            raw,
            live: true,
            session_id,
            aggregator: Box::new(ErrorAggregator::new(session_id)),
            debug_sink: None,
        })
    }

    /// 에러 집계기를 에러 콜백으로 등록합니다.
    pub(crate) fn install_error_callback(&mut self) -> Result<(), NormalizerError> {
        let cookie = self.aggregator.as_cookie();
        // SAFETY: raw는 살아 있고, cookie는 self가 소유한 Box 주소입니다.
        let rc = unsafe { self.engine.set_err_msg_cb(self.raw, error_callback, cookie) };
        check_registration("ln_setErrMsgCB", rc)
    }

    /// 디버그 싱크를 등록하고 네이티브 디버그 모드를 켭니다.
    pub(crate) fn install_debug_sink(&mut self) -> Result<(), NormalizerError> {
        let sink = self
            .debug_sink
            .insert(Box::new(DebugSink::new(self.session_id)));
        let cookie = sink.as_cookie();
        // SAFETY: raw는 살아 있고, cookie는 self가 소유한 Box 주소입니다.
        let rc = unsafe { self.engine.set_debug_cb(self.raw, debug_callback, cookie) };
        check_registration("ln_setDebugCB", rc)?;
        // SAFETY: raw는 살아 있습니다.
        unsafe { self.engine.enable_debug(self.raw, 1) };
        Ok(())
    }

    /// 옵션 구조체를 적용합니다.
    pub(crate) fn apply_options(&self, opts: &OptionsStruct) {
        // SAFETY: raw는 살아 있습니다.
        unsafe { self.engine.set_ctx_opts(self.raw, opts) };
    }

    /// 룰 소스를 해당 로더로 로드하고 네이티브 반환 코드를 돌려줍니다.
    ///
    /// 호출 직전에 집계기를 reset하므로 호출 후 `aggregator().count()`는
    /// 이번 로드에서 발생한 콜백 에러만 셉니다.
    pub(crate) fn load_rules(&self, source: &RuleSource) -> Result<c_int, NormalizerError> {
        let rc = match source {
            RuleSource::Inline(rules) => {
                let rules = to_cstring("rulebase", rules.as_bytes())?;
                self.aggregator.reset();
                // SAFETY: raw는 살아 있습니다.
                unsafe { self.engine.load_samples_from_string(self.raw, &rules) }
            }
            RuleSource::File(path) => {
                let path = to_cstring("rulebase path", path.as_os_str().as_encoded_bytes())?;
                self.aggregator.reset();
                // SAFETY: raw는 살아 있습니다.
                unsafe { self.engine.load_samples(self.raw, &path) }
            }
        };
        Ok(rc)
    }

    /// 집계기를 reset한 뒤 메시지 하나를 정규화합니다.
    pub(crate) fn normalize(&self, text: &CStr) -> RawNormalization {
        self.aggregator.reset();
        // SAFETY: raw는 살아 있습니다.
        unsafe { self.engine.normalize(self.raw, text) }
    }

    pub(crate) fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    pub(crate) fn aggregator(&self) -> &ErrorAggregator {
        &self.aggregator
    }

    pub(crate) fn debug_messages(&self) -> Option<usize> {
        self.debug_sink.as_ref().map(|sink| sink.received())
    }

    #[cfg(test)]
    pub(crate) fn is_live(&self) -> bool {
        self.live
    }

    /// 컨텍스트를 해제합니다. 이미 해제되었다면 아무 것도 하지 않고 `false`.
    pub(crate) fn release(&mut self) -> bool {
        if !self.live {
            return false;
        }
        self.live = false;
        // SAFETY: live 플래그로 단 한 번만 도달합니다.
        let rc = unsafe { self.engine.exit_ctx(self.raw) };
        self.raw = std::ptr::null_mut();
        metrics::counter!(m::CONTEXTS_RELEASED_TOTAL).increment(1);
        if rc != 0 {
            tracing::warn!(session_id = %self.session_id, code = rc, "ln_exitCtx() returned non-zero");
        } else {
            tracing::debug!(session_id = %self.session_id, "native context released");
        }
        true
    }
}

impl Drop for NativeContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for NativeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeContext")
            .field("engine", &self.engine.name())
            .field("live", &self.live)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

fn check_registration(call: &'static str, rc: c_int) -> Result<(), NormalizerError> {
    if rc == 0 {
        Ok(())
    } else {
        Err(NormalizerError::CallbackRegistrationFailure { call, code: rc })
    }
}

/// 경계를 넘길 문자열을 NUL 종료 문자열로 바꿉니다.
pub(crate) fn to_cstring(what: &'static str, bytes: &[u8]) -> Result<CString, NormalizerError> {
    CString::new(bytes).map_err(|e| NormalizerError::InvalidInput {
        what,
        offset: e.nul_position(),
    })
}
