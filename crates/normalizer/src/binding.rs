//! 네이티브 엔진 바인딩 — liblognorm FFI 표면
//!
//! [`NativeEngine`] trait은 네이티브 엔진의 호출 계약을 로직 없이 그대로 옮긴
//! 얇은 타입 표면입니다. 세션/팩토리 코드는 이 trait만 바라보므로
//! 실제 라이브러리([`DynamicEngine`](crate::dynamic::DynamicEngine))와
//! 테스트 더블(`MockEngine`)을 바꿔 끼울 수 있습니다.
//!
//! # 아키텍처
//!
//! ```text
//! ┌────────────────────────┐
//! │  NormalizationSession  │
//! └───────────┬────────────┘
//!             ▼
//!      ┌──────────────┐
//!      │ NativeEngine │ (trait)
//!      └──────────────┘
//!          │       │
//!          ▼       ▼
//!   ┌─────────┐ ┌────┐
//!   │ Dynamic │ │Mock│
//!   └────┬────┘ └────┘
//!        ▼
//!  liblognorm.so.5 + libfastjson.so.4
//! ```
//!
//! # 핸들 계약
//!
//! - [`RawCtx`]: `init_ctx`가 반환한 핸들. `exit_ctx`로 정확히 한 번 해제
//! - [`RawResult`]: `normalize`가 반환한 JSON 객체. `destroy_result`로 정확히 한 번 해제
//! - 콜백은 트리거한 호출 내부에서 같은 스레드로 0회 이상 동기 호출됨

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_int, c_uint, c_void};

use lognorm_core::options::NormalizerOptions;

/// 불투명 네이티브 컨텍스트 핸들 (`ln_ctx`)
pub type RawCtx = *mut c_void;

/// 불투명 네이티브 결과 핸들 (`struct json_object *`)
pub type RawResult = *mut c_void;

/// 에러/디버그 콜백 시그니처 (`void (*)(void *cookie, const char *msg, size_t len)`)
pub type MessageCallback = unsafe extern "C" fn(cookie: *mut c_void, msg: *const c_char, len: usize);

/// 파서가 메시지를 추출하지 못했을 때 `ln_normalize`가 반환하는 코드 (`LN_WRONGPARSER`)
pub const LN_WRONGPARSER: c_int = -1000;

// liblognorm.h 의 LN_CTXOPT_* 비트
const LN_CTXOPT_ALLOW_REGEX: c_uint = 0x01;
const LN_CTXOPT_ADD_EXEC_PATH: c_uint = 0x02;
const LN_CTXOPT_ADD_ORIGINALMSG: c_uint = 0x04;
const LN_CTXOPT_ADD_RULE: c_uint = 0x08;
const LN_CTXOPT_ADD_RULE_LOCATION: c_uint = 0x10;

/// 네이티브 옵션 구조체
///
/// 필드 순서는 ABI로 고정되어 있습니다:
/// regex, exec-path, original-msg, rule, rule-location.
/// 각 필드는 C `int`(0/1)입니다.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionsStruct {
    pub ctxopt_allow_regex: c_int,
    pub ctxopt_add_exec_path: c_int,
    pub ctxopt_add_originalmsg: c_int,
    pub ctxopt_add_rule: c_int,
    pub ctxopt_add_rule_location: c_int,
}

impl OptionsStruct {
    /// ABI 순서의 bool 배열로 변환합니다.
    pub fn ordered(&self) -> [bool; 5] {
        [
            self.ctxopt_allow_regex != 0,
            self.ctxopt_add_exec_path != 0,
            self.ctxopt_add_originalmsg != 0,
            self.ctxopt_add_rule != 0,
            self.ctxopt_add_rule_location != 0,
        ]
    }

    /// `ln_setCtxOpts`가 받는 `LN_CTXOPT_*` 비트마스크로 변환합니다.
    ///
    /// 필드 순서와 비트 순서가 일치합니다 (필드 i ↔ 비트 1 << i).
    pub fn ctx_opts_bits(&self) -> c_uint {
        const BITS: [c_uint; 5] = [
            LN_CTXOPT_ALLOW_REGEX,
            LN_CTXOPT_ADD_EXEC_PATH,
            LN_CTXOPT_ADD_ORIGINALMSG,
            LN_CTXOPT_ADD_RULE,
            LN_CTXOPT_ADD_RULE_LOCATION,
        ];
        self.ordered()
            .iter()
            .zip(BITS)
            .filter(|(enabled, _)| **enabled)
            .fold(0, |acc, (_, bit)| acc | bit)
    }
}

impl From<&NormalizerOptions> for OptionsStruct {
    fn from(opts: &NormalizerOptions) -> Self {
        let [regex, exec_path, original_msg, rule, rule_location] = opts.ordered();
        Self {
            ctxopt_allow_regex: c_int::from(regex),
            ctxopt_add_exec_path: c_int::from(exec_path),
            ctxopt_add_originalmsg: c_int::from(original_msg),
            ctxopt_add_rule: c_int::from(rule),
            ctxopt_add_rule_location: c_int::from(rule_location),
        }
    }
}

impl From<NormalizerOptions> for OptionsStruct {
    fn from(opts: NormalizerOptions) -> Self {
        Self::from(&opts)
    }
}

/// 네이티브 `normalize` 호출 결과
///
/// `result`가 null이면 실패입니다. 실패 시 `code`에는 네이티브 진단 코드
/// (예: [`LN_WRONGPARSER`])가, `payload`에는 네이티브가 생성한 에러 정보 JSON이
/// 담길 수 있습니다.
#[derive(Debug)]
pub struct RawNormalization {
    /// 네이티브 반환 코드 (0 = 성공)
    pub code: c_int,
    /// 결과 핸들 (실패 시 null)
    pub result: RawResult,
    /// 실패 시 네이티브가 생성한 에러 정보 (`originalmsg` / `unparsed-data`)
    pub payload: Option<String>,
}

impl RawNormalization {
    /// 성공 결과를 생성합니다.
    pub fn success(result: RawResult) -> Self {
        Self {
            code: 0,
            result,
            payload: None,
        }
    }

    /// 실패 결과를 생성합니다. `result`는 null입니다.
    pub fn failure(code: c_int, payload: Option<String>) -> Self {
        Self {
            code,
            result: std::ptr::null_mut(),
            payload,
        }
    }
}

/// 네이티브 정규화 엔진 호출 표면
///
/// 로직 없이 네이티브 계약을 그대로 노출합니다. 상태 검증, 에러 변환,
/// 자원 해제 보장은 상위 레이어(`NativeContext`, `NormalizationSession`,
/// `ResultHandle`)의 책임입니다.
///
/// # Safety
///
/// `unsafe` 메서드의 공통 전제 조건:
/// - `ctx`는 같은 엔진의 `init_ctx`가 반환했고 아직 `exit_ctx`되지 않은 핸들
/// - `result`는 같은 엔진의 `normalize`가 반환했고 아직 `destroy_result`되지 않은 핸들
/// - 콜백 `cookie`는 컨텍스트가 해제될 때까지 유효한 주소
/// - 한 컨텍스트에 대한 호출은 동시에 일어나지 않음
pub trait NativeEngine: Send + Sync + 'static {
    /// 엔진 구현 이름 (로그 출력용)
    fn name(&self) -> &str;

    /// 네이티브 라이브러리 버전 문자열 (`ln_version`)
    fn version(&self) -> String;

    /// 고급 통계 기능 포함 빌드 여부 (`ln_hasAdvancedStats`)
    fn has_advanced_stats(&self) -> bool;

    /// 새 컨텍스트를 생성합니다. 실패 시 null (`ln_initCtx`).
    fn init_ctx(&self) -> RawCtx;

    /// 컨텍스트를 해제합니다 (`ln_exitCtx`).
    ///
    /// # Safety
    /// 트레이트 문서의 전제 조건 참조. 호출 후 `ctx`는 무효입니다.
    unsafe fn exit_ctx(&self, ctx: RawCtx) -> c_int;

    /// 컨텍스트 옵션을 적용합니다 (`ln_setCtxOpts`).
    ///
    /// # Safety
    /// 트레이트 문서의 전제 조건 참조.
    unsafe fn set_ctx_opts(&self, ctx: RawCtx, opts: &OptionsStruct);

    /// 파일에서 룰베이스를 로드합니다 (`ln_loadSamples`). 0 = 성공.
    ///
    /// # Safety
    /// 트레이트 문서의 전제 조건 참조.
    unsafe fn load_samples(&self, ctx: RawCtx, path: &CStr) -> c_int;

    /// 문자열에서 룰베이스를 로드합니다 (`ln_loadSamplesFromString`).
    ///
    /// 0을 반환하더라도 에러 콜백이 호출되었을 수 있습니다.
    ///
    /// # Safety
    /// 트레이트 문서의 전제 조건 참조.
    unsafe fn load_samples_from_string(&self, ctx: RawCtx, rules: &CStr) -> c_int;

    /// 메시지를 정규화합니다 (`ln_normalize`).
    ///
    /// # Safety
    /// 트레이트 문서의 전제 조건 참조.
    unsafe fn normalize(&self, ctx: RawCtx, text: &CStr) -> RawNormalization;

    /// 결과 JSON 문자열을 복사해 반환합니다 (`json_object_to_json_string`).
    ///
    /// # Safety
    /// 트레이트 문서의 전제 조건 참조.
    unsafe fn read_result(&self, result: RawResult) -> Option<String>;

    /// 결과를 해제합니다 (`json_object_put`).
    ///
    /// # Safety
    /// 트레이트 문서의 전제 조건 참조. 호출 후 `result`는 무효입니다.
    unsafe fn destroy_result(&self, result: RawResult);

    /// 네이티브 내부 디버그 모드를 켜거나 끕니다 (`ln_enableDebug`).
    ///
    /// 디버그 콜백 설치와 항상 짝을 이뤄야 의미가 있습니다.
    ///
    /// # Safety
    /// 트레이트 문서의 전제 조건 참조.
    unsafe fn enable_debug(&self, ctx: RawCtx, flag: c_int);

    /// 디버그 메시지 콜백을 설치합니다 (`ln_setDebugCB`). 0 = 성공.
    ///
    /// # Safety
    /// 트레이트 문서의 전제 조건 참조.
    unsafe fn set_debug_cb(&self, ctx: RawCtx, cb: MessageCallback, cookie: *mut c_void)
    -> c_int;

    /// 에러 메시지 콜백을 설치합니다 (`ln_setErrMsgCB`). 0 = 성공.
    ///
    /// # Safety
    /// 트레이트 문서의 전제 조건 참조.
    unsafe fn set_err_msg_cb(
        &self,
        ctx: RawCtx,
        cb: MessageCallback,
        cookie: *mut c_void,
    ) -> c_int;
}

/// 콜백이 넘겨준 `(msg, len)`을 Rust 문자열로 변환합니다.
///
/// 잘못된 UTF-8은 치환 문자로 바꾸고, 끝의 개행은 제거합니다.
///
/// # Safety
/// `msg`가 null이 아니라면 `len` 바이트를 읽을 수 있어야 합니다.
pub(crate) unsafe fn message_from_raw(msg: *const c_char, len: usize) -> String {
    if msg.is_null() || len == 0 {
        return String::new();
    }
    // SAFETY: 호출자가 msg에서 len 바이트가 유효함을 보장합니다.
    let bytes = unsafe { std::slice::from_raw_parts(msg.cast::<u8>(), len) };
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(s) => s.trim_end_matches(['\n', '\r']).to_owned(),
        Cow::Owned(s) => s.trim_end_matches(['\n', '\r']).to_owned(),
    }
}
