//! 에러 콜백 집계기
//!
//! 네이티브 라이브러리는 반환 코드와 별개로 에러 콜백을 0회 이상 호출합니다.
//! [`ErrorAggregator`]는 이 비동기 신호를 호출 단위로 셀 수 있는 동기 값으로
//! 바꿉니다. 콜백을 트리거할 수 있는 호출 직전에 [`reset`](ErrorAggregator::reset)
//! 하고, 호출이 반환된 뒤 [`count`](ErrorAggregator::count)를 읽습니다.
//!
//! 집계기는 `Box`로 고정된 주소를 콜백 cookie로 네이티브에 넘기므로
//! 컨텍스트보다 먼저 해제되면 안 됩니다.

use std::collections::VecDeque;
use std::ffi::{c_char, c_void};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use uuid::Uuid;

use crate::binding::message_from_raw;

/// 보관하는 최근 메시지 최대 개수
pub const MESSAGE_RING_CAPACITY: usize = 32;

/// 콜백 에러 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallbackErrors {
    /// 마지막 reset 이후 콜백 호출 횟수
    pub count: usize,
    /// 캡처된 메시지 (오래된 것부터)
    pub messages: Vec<String>,
}

impl CallbackErrors {
    /// 에러가 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Default)]
struct AggregatorState {
    count: usize,
    messages: VecDeque<String>,
}

/// 컨텍스트별 에러 콜백 집계기
#[derive(Debug)]
pub struct ErrorAggregator {
    session_id: Uuid,
    state: Mutex<AggregatorState>,
}

impl ErrorAggregator {
    /// 새 집계기를 생성합니다.
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            state: Mutex::new(AggregatorState::default()),
        }
    }

    /// 카운트를 0으로 만들고 캡처된 메시지를 비웁니다.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.count = 0;
        state.messages.clear();
    }

    /// 네이티브 에러 콜백 한 건을 기록합니다.
    pub fn on_error(&self, message: String) {
        tracing::error!(
            target: "lognorm::native",
            session_id = %self.session_id,
            message = %message,
            "liblognorm error"
        );

        let mut state = self.lock();
        state.count += 1;
        if state.messages.len() == MESSAGE_RING_CAPACITY {
            state.messages.pop_front();
        }
        state.messages.push_back(message);
    }

    /// 마지막 reset 이후 콜백 호출 횟수
    pub fn count(&self) -> usize {
        self.lock().count
    }

    /// 가장 최근 메시지
    pub fn last_message(&self) -> Option<String> {
        self.lock().messages.back().cloned()
    }

    /// 캡처된 메시지 (오래된 것부터)
    pub fn messages(&self) -> Vec<String> {
        self.lock().messages.iter().cloned().collect()
    }

    /// 현재 상태의 스냅샷
    pub fn snapshot(&self) -> CallbackErrors {
        let state = self.lock();
        CallbackErrors {
            count: state.count,
            messages: state.messages.iter().cloned().collect(),
        }
    }

    /// 콜백 cookie로 넘길 주소
    pub(crate) fn as_cookie(&self) -> *mut c_void {
        std::ptr::from_ref(self).cast_mut().cast()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AggregatorState> {
        // 콜백 안에서 패닉이 나도 카운트는 계속 유효
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `ln_setErrMsgCB`에 등록하는 트램펄린
///
/// # Safety
/// `cookie`는 살아 있는 [`ErrorAggregator`]를 가리켜야 합니다.
pub(crate) unsafe extern "C" fn error_callback(cookie: *mut c_void, msg: *const c_char, len: usize) {
    if cookie.is_null() {
        return;
    }
    // SAFETY: cookie는 컨텍스트와 같은 수명의 Box<ErrorAggregator> 주소입니다.
    let aggregator = unsafe { &*cookie.cast::<ErrorAggregator>() };
    // SAFETY: 네이티브가 msg에서 len 바이트를 보장합니다.
    let message = unsafe { message_from_raw(msg, len) };
    aggregator.on_error(message);
}
