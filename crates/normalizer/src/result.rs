//! 정규화 결과 핸들
//!
//! [`ResultHandle`]은 네이티브 JSON 객체 하나를 소유합니다.
//! [`release`](ResultHandle::release)를 명시적으로 호출하는 것이 원칙이며,
//! 누락되더라도 `Drop`에서 해제됩니다. 해제는 멱등이고 이중 해제는 일어나지 않습니다.

use std::sync::Arc;

use crate::binding::{NativeEngine, RawResult};
use crate::error::NormalizerError;

/// 네이티브 결과 버퍼 소유자
pub struct ResultHandle {
    engine: Arc<dyn NativeEngine>,
    raw: RawResult,
    live: bool,
}

// SAFETY: 결과 객체는 한 소유자만 가지며 다른 스레드로 옮겨도 안전합니다.
// 동시 접근은 Sync 미구현으로 막힙니다.
unsafe impl Send for ResultHandle {}

impl ResultHandle {
    pub(crate) fn new(engine: Arc<dyn NativeEngine>, raw: RawResult) -> Self {
        Self {
            engine,
            raw,
            live: true,
        }
    }

    /// 결과 JSON 문자열을 반환합니다.
    ///
    /// 같은 핸들에 대해 여러 번 호출해도 같은 값을 반환합니다.
    pub fn read(&self) -> Result<String, NormalizerError> {
        if !self.live {
            return Err(NormalizerError::UseAfterRelease);
        }
        // SAFETY: live 동안 raw는 유효합니다.
        unsafe { self.engine.read_result(self.raw) }.ok_or(NormalizerError::UnreadableResult)
    }

    /// 네이티브 결과 버퍼를 해제합니다. 두 번째 호출부터는 아무 것도 하지 않습니다.
    pub fn release(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        // SAFETY: live 플래그로 단 한 번만 도달합니다.
        unsafe { self.engine.destroy_result(self.raw) };
        self.raw = std::ptr::null_mut();
    }

    /// 해제되었는지 여부
    pub fn is_released(&self) -> bool {
        !self.live
    }
}

impl Drop for ResultHandle {
    fn drop(&mut self) {
        if self.live {
            tracing::trace!("result handle dropped without explicit release");
            self.release();
        }
    }
}

impl std::fmt::Debug for ResultHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultHandle")
            .field("engine", &self.engine.name())
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}
