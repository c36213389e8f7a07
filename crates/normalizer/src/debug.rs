//! 디버그 콜백 싱크
//!
//! 네이티브 디버그 메시지를 `tracing` DEBUG 이벤트로 흘려보냅니다.
//! 세션 제어 흐름에는 아무 영향을 주지 않습니다.

use std::ffi::{c_char, c_void};
use std::sync::atomic::{AtomicUsize, Ordering};

use uuid::Uuid;

use crate::binding::message_from_raw;

/// 네이티브 디버그 메시지 수신기
#[derive(Debug)]
pub struct DebugSink {
    session_id: Uuid,
    received: AtomicUsize,
}

impl DebugSink {
    /// 새 싱크를 생성합니다.
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            received: AtomicUsize::new(0),
        }
    }

    /// 디버그 메시지 한 건을 기록합니다.
    pub fn on_debug(&self, message: &str) {
        self.received.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            target: "lognorm::native",
            session_id = %self.session_id,
            message = %message,
            "liblognorm debug"
        );
    }

    /// 지금까지 받은 메시지 수
    pub fn received(&self) -> usize {
        self.received.load(Ordering::Relaxed)
    }

    pub(crate) fn as_cookie(&self) -> *mut c_void {
        std::ptr::from_ref(self).cast_mut().cast()
    }
}

/// `ln_setDebugCB`에 등록하는 트램펄린
///
/// # Safety
/// `cookie`는 살아 있는 [`DebugSink`]를 가리켜야 합니다.
pub(crate) unsafe extern "C" fn debug_callback(cookie: *mut c_void, msg: *const c_char, len: usize) {
    if cookie.is_null() {
        return;
    }
    // SAFETY: cookie는 컨텍스트와 같은 수명의 Box<DebugSink> 주소입니다.
    let sink = unsafe { &*cookie.cast::<DebugSink>() };
    // SAFETY: 네이티브가 msg에서 len 바이트를 보장합니다.
    let message = unsafe { message_from_raw(msg, len) };
    sink.on_debug(&message);
}
