//! 실제 liblognorm 바인딩
//!
//! [`DynamicEngine`]은 빌드 시 링크하지 않고 런타임에 `liblognorm`과
//! `libfastjson`을 `dlopen`하여 필요한 심볼을 조회합니다. 라이브러리가 없는
//! 환경에서도 크레이트 전체는 빌드되며, 엔진을 열 때
//! [`NormalizerError::LibraryLoad`]가 반환됩니다.
//!
//! 조회한 함수 포인터는 `Library` 값과 같은 구조체에 보관되므로
//! 엔진이 살아 있는 동안 항상 유효합니다.

use std::ffi::{CStr, c_char, c_int, c_uint, c_void};

use libloading::Library;
use lognorm_core::config::LibraryConfig;

use crate::binding::{MessageCallback, NativeEngine, OptionsStruct, RawCtx, RawNormalization, RawResult};
use crate::error::NormalizerError;

type VersionFn = unsafe extern "C" fn() -> *const c_char;
type InitCtxFn = unsafe extern "C" fn() -> RawCtx;
type ExitCtxFn = unsafe extern "C" fn(RawCtx) -> c_int;
type SetCtxOptsFn = unsafe extern "C" fn(RawCtx, c_uint);
type LoadSamplesFn = unsafe extern "C" fn(RawCtx, *const c_char) -> c_int;
type NormalizeFn = unsafe extern "C" fn(RawCtx, *const c_char, usize, *mut RawResult) -> c_int;
type EnableDebugFn = unsafe extern "C" fn(RawCtx, c_int);
type SetCallbackFn = unsafe extern "C" fn(RawCtx, MessageCallback, *mut c_void) -> c_int;
type HasAdvancedStatsFn = unsafe extern "C" fn() -> c_int;
type ToJsonStringFn = unsafe extern "C" fn(RawResult) -> *const c_char;
type ObjectPutFn = unsafe extern "C" fn(RawResult) -> c_int;

/// 런타임에 로드한 liblognorm 엔진
pub struct DynamicEngine {
    lognorm_path: String,
    ln_version: VersionFn,
    ln_init_ctx: InitCtxFn,
    ln_exit_ctx: ExitCtxFn,
    ln_set_ctx_opts: SetCtxOptsFn,
    ln_load_samples: LoadSamplesFn,
    ln_load_samples_from_string: LoadSamplesFn,
    ln_normalize: NormalizeFn,
    ln_enable_debug: EnableDebugFn,
    ln_set_debug_cb: SetCallbackFn,
    ln_set_err_msg_cb: SetCallbackFn,
    ln_has_advanced_stats: Option<HasAdvancedStatsFn>,
    fjson_to_string: ToJsonStringFn,
    fjson_put: ObjectPutFn,
    // 함수 포인터보다 나중에 해제되어야 함
    _fastjson: Library,
    _lognorm: Library,
}

impl DynamicEngine {
    /// 설정된 경로에서 두 라이브러리를 열고 심볼을 조회합니다.
    pub fn open(config: &LibraryConfig) -> Result<Self, NormalizerError> {
        let lognorm = open_library(&config.lognorm_path)?;
        let fastjson = open_library(&config.fastjson_path)?;

        let lib = &config.lognorm_path;
        let fj = &config.fastjson_path;

        // SAFETY: 각 심볼의 시그니처는 liblognorm.h / libfastjson json_object.h 선언과 일치합니다.
        let engine = unsafe {
            Self {
                lognorm_path: config.lognorm_path.clone(),
                ln_version: symbol(&lognorm, lib, "ln_version")?,
                ln_init_ctx: symbol(&lognorm, lib, "ln_initCtx")?,
                ln_exit_ctx: symbol(&lognorm, lib, "ln_exitCtx")?,
                ln_set_ctx_opts: symbol(&lognorm, lib, "ln_setCtxOpts")?,
                ln_load_samples: symbol(&lognorm, lib, "ln_loadSamples")?,
                ln_load_samples_from_string: symbol(&lognorm, lib, "ln_loadSamplesFromString")?,
                ln_normalize: symbol(&lognorm, lib, "ln_normalize")?,
                ln_enable_debug: symbol(&lognorm, lib, "ln_enableDebug")?,
                ln_set_debug_cb: symbol(&lognorm, lib, "ln_setDebugCB")?,
                ln_set_err_msg_cb: symbol(&lognorm, lib, "ln_setErrMsgCB")?,
                // 오래된 빌드에는 없음
                ln_has_advanced_stats: symbol(&lognorm, lib, "ln_hasAdvancedStats").ok(),
                fjson_to_string: symbol(&fastjson, fj, "fjson_object_to_json_string")?,
                fjson_put: symbol(&fastjson, fj, "fjson_object_put")?,
                _fastjson: fastjson,
                _lognorm: lognorm,
            }
        };

        tracing::info!(
            library = %config.lognorm_path,
            version = %engine.version(),
            "liblognorm loaded"
        );
        Ok(engine)
    }

    /// 기본 라이브러리 이름(`liblognorm.so.5`, `libfastjson.so.4`)으로 엽니다.
    pub fn open_default() -> Result<Self, NormalizerError> {
        Self::open(&LibraryConfig::default())
    }

    /// 로드한 liblognorm 경로
    pub fn library_path(&self) -> &str {
        &self.lognorm_path
    }

    /// 결과 객체를 문자열로 복사합니다.
    ///
    /// # Safety
    /// `result`는 살아 있는 fjson 객체여야 합니다.
    unsafe fn json_text(&self, result: RawResult) -> Option<String> {
        if result.is_null() {
            return None;
        }
        // SAFETY: 호출자가 result의 유효성을 보장합니다.
        let text = unsafe { (self.fjson_to_string)(result) };
        if text.is_null() {
            return None;
        }
        // SAFETY: fjson은 객체 수명 동안 유효한 NUL 종료 문자열을 반환합니다.
        Some(unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned())
    }
}

fn open_library(path: &str) -> Result<Library, NormalizerError> {
    // SAFETY: 공유 라이브러리 초기화 코드가 실행됩니다. liblognorm/libfastjson의
    // 초기화 루틴은 전역 상태를 건드리지 않습니다.
    unsafe { Library::new(path) }.map_err(|e| NormalizerError::LibraryLoad {
        library: path.to_owned(),
        reason: e.to_string(),
    })
}

/// 심볼을 조회해 함수 포인터로 복사합니다.
///
/// # Safety
/// `T`는 심볼의 실제 C 시그니처와 일치하는 함수 포인터 타입이어야 하며,
/// 반환된 포인터는 `library`보다 오래 사용되면 안 됩니다.
unsafe fn symbol<T: Copy>(library: &Library, path: &str, name: &str) -> Result<T, NormalizerError> {
    // SAFETY: 호출자가 T의 시그니처를 보장합니다.
    unsafe { library.get::<T>(name.as_bytes()) }
        .map(|sym| *sym)
        .map_err(|e| NormalizerError::LibraryLoad {
            library: path.to_owned(),
            reason: format!("missing symbol {name}: {e}"),
        })
}

impl NativeEngine for DynamicEngine {
    fn name(&self) -> &str {
        "liblognorm"
    }

    fn version(&self) -> String {
        // SAFETY: ln_version은 정적 문자열을 반환합니다.
        let ptr = unsafe { (self.ln_version)() };
        if ptr.is_null() {
            return "unknown".to_owned();
        }
        // SAFETY: null이 아닌 정적 NUL 종료 문자열
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    fn has_advanced_stats(&self) -> bool {
        match self.ln_has_advanced_stats {
            // SAFETY: 인자 없는 조회 함수
            Some(f) => unsafe { f() != 0 },
            None => false,
        }
    }

    fn init_ctx(&self) -> RawCtx {
        // SAFETY: 인자 없는 생성 함수. 실패 시 null.
        unsafe { (self.ln_init_ctx)() }
    }

    unsafe fn exit_ctx(&self, ctx: RawCtx) -> c_int {
        // SAFETY: 트레이트 계약에 따라 ctx는 살아 있습니다.
        unsafe { (self.ln_exit_ctx)(ctx) }
    }

    unsafe fn set_ctx_opts(&self, ctx: RawCtx, opts: &OptionsStruct) {
        // SAFETY: 트레이트 계약에 따라 ctx는 살아 있습니다.
        unsafe { (self.ln_set_ctx_opts)(ctx, opts.ctx_opts_bits()) }
    }

    unsafe fn load_samples(&self, ctx: RawCtx, path: &CStr) -> c_int {
        // SAFETY: 트레이트 계약에 따라 ctx는 살아 있고 path는 NUL 종료입니다.
        unsafe { (self.ln_load_samples)(ctx, path.as_ptr()) }
    }

    unsafe fn load_samples_from_string(&self, ctx: RawCtx, rules: &CStr) -> c_int {
        // SAFETY: 트레이트 계약에 따라 ctx는 살아 있고 rules는 NUL 종료입니다.
        unsafe { (self.ln_load_samples_from_string)(ctx, rules.as_ptr()) }
    }

    unsafe fn normalize(&self, ctx: RawCtx, text: &CStr) -> RawNormalization {
        let mut result: RawResult = std::ptr::null_mut();
        let bytes = text.to_bytes();
        // SAFETY: 트레이트 계약에 따라 ctx는 살아 있고, text는 len 바이트 유효합니다.
        let rc = unsafe { (self.ln_normalize)(ctx, text.as_ptr(), bytes.len(), &raw mut result) };

        if rc == 0 {
            if result.is_null() {
                return RawNormalization::failure(0, None);
            }
            return RawNormalization::success(result);
        }

        // 실패해도 네이티브는 originalmsg/unparsed-data 객체를 만들어 둠
        // SAFETY: result는 null이거나 방금 생성된 객체입니다.
        let payload = unsafe { self.json_text(result) };
        if !result.is_null() {
            // SAFETY: 방금 생성된 객체를 단 한 번 해제합니다.
            unsafe { (self.fjson_put)(result) };
        }
        tracing::debug!(code = rc, payload = ?payload, "ln_normalize() returned non-zero");
        RawNormalization::failure(rc, payload)
    }

    unsafe fn read_result(&self, result: RawResult) -> Option<String> {
        // SAFETY: 트레이트 계약에 따라 result는 살아 있습니다.
        unsafe { self.json_text(result) }
    }

    unsafe fn destroy_result(&self, result: RawResult) {
        if result.is_null() {
            return;
        }
        // SAFETY: 트레이트 계약에 따라 단 한 번 호출됩니다.
        unsafe { (self.fjson_put)(result) };
    }

    unsafe fn enable_debug(&self, ctx: RawCtx, flag: c_int) {
        // SAFETY: 트레이트 계약에 따라 ctx는 살아 있습니다.
        unsafe { (self.ln_enable_debug)(ctx, flag) }
    }

    unsafe fn set_debug_cb(&self, ctx: RawCtx, cb: MessageCallback, cookie: *mut c_void) -> c_int {
        // SAFETY: 트레이트 계약에 따라 ctx와 cookie는 살아 있습니다.
        unsafe { (self.ln_set_debug_cb)(ctx, cb, cookie) }
    }

    unsafe fn set_err_msg_cb(
        &self,
        ctx: RawCtx,
        cb: MessageCallback,
        cookie: *mut c_void,
    ) -> c_int {
        // SAFETY: 트레이트 계약에 따라 ctx와 cookie는 살아 있습니다.
        unsafe { (self.ln_set_err_msg_cb)(ctx, cb, cookie) }
    }
}

impl std::fmt::Debug for DynamicEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicEngine")
            .field("lognorm_path", &self.lognorm_path)
            .finish_non_exhaustive()
    }
}
