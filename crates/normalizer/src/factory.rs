//! 컨텍스트 팩토리
//!
//! [`ContextFactory`]는 완전히 구성되고 룰이 로드된 세션을 만들거나,
//! 실패 시 이미 얻은 네이티브 자원을 모두 해제한 뒤 에러를 반환합니다.
//!
//! # 생성 순서
//!
//! 1. `ln_initCtx` (null ⇒ [`NormalizerError::ContextInitializationFailure`])
//! 2. 에러 콜백 등록, 요청 시 디버그 콜백 등록 + `ln_enableDebug(1)`
//! 3. 옵션 적용
//! 4. 집계기 reset 후 룰 로드. 반환 코드와 콜백 에러 개수를 **모두** 확인
//!
//! 1단계가 성공한 순간부터 컨텍스트는 드롭 가드가 쥐고 있으므로,
//! 2~4단계의 어느 실패 경로에서도 컨텍스트는 해제됩니다.

use std::ffi::c_int;
use std::sync::Arc;

use lognorm_core::config::LognormConfig;
use lognorm_core::error::{ConfigError, LognormError};
use lognorm_core::metrics as m;
use lognorm_core::options::NormalizerOptions;
use lognorm_core::rule::RuleSource;
use uuid::Uuid;

use crate::binding::{NativeEngine, OptionsStruct};
use crate::context::NativeContext;
use crate::error::NormalizerError;
use crate::session::NormalizationSession;

/// 세션 생성기
///
/// # 사용 예시
///
/// ```ignore
/// let session = ContextFactory::new(engine, RuleSource::inline("rule=:%all:rest%"))
///     .with_options(NormalizerOptions::new().add_original_message(true))
///     .build()?;
/// ```
pub struct ContextFactory {
    engine: Arc<dyn NativeEngine>,
    rule_source: RuleSource,
    options: NormalizerOptions,
    debug: bool,
}

impl ContextFactory {
    /// 기본 옵션(모두 꺼짐), 디버그 꺼짐으로 팩토리를 생성합니다.
    pub fn new(engine: Arc<dyn NativeEngine>, rule_source: RuleSource) -> Self {
        Self {
            engine,
            rule_source,
            options: NormalizerOptions::default(),
            debug: false,
        }
    }

    /// 설정 파일 값으로 팩토리를 생성합니다.
    ///
    /// `[rules]`에 path도 inline도 없으면 설정 에러를 반환합니다.
    pub fn from_config(
        engine: Arc<dyn NativeEngine>,
        config: &LognormConfig,
    ) -> Result<Self, LognormError> {
        let rule_source = config
            .rule_source()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "rules".to_owned(),
                reason: "either rules.path or rules.inline must be set".to_owned(),
            })?;

        Ok(Self::new(engine, rule_source)
            .with_options(config.options)
            .with_debug(config.debug.enabled))
    }

    /// 컨텍스트 옵션을 지정합니다.
    pub fn with_options(mut self, options: NormalizerOptions) -> Self {
        self.options = options;
        self
    }

    /// 디버그 콜백 설치 여부를 지정합니다.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// 지정된 룰 소스
    pub fn rule_source(&self) -> &RuleSource {
        &self.rule_source
    }

    /// 세션을 생성합니다.
    pub fn build(&self) -> Result<NormalizationSession, NormalizerError> {
        let session_id = Uuid::new_v4();
        let context = self
            .configure(session_id)
            .inspect_err(|err| self.record_failure(session_id, err))?;

        metrics::counter!(m::CONTEXTS_CREATED_TOTAL).increment(1);
        tracing::info!(
            session_id = %session_id,
            engine = self.engine.name(),
            rules = %self.rule_source,
            options = ?self.options.enabled_names(),
            debug = self.debug,
            "normalization session created"
        );

        Ok(NormalizationSession::new(
            session_id,
            context,
            self.options,
            self.rule_source.clone(),
        ))
    }

    fn configure(&self, session_id: Uuid) -> Result<NativeContext, NormalizerError> {
        let mut context = NativeContext::init(Arc::clone(&self.engine), session_id)?;

        context.install_error_callback()?;
        if self.debug {
            context.install_debug_sink()?;
        }

        context.apply_options(&OptionsStruct::from(&self.options));

        let rc = context.load_rules(&self.rule_source)?;
        let callback_errors = context.aggregator().count();
        if callback_errors > 0 {
            metrics::counter!(m::CALLBACK_ERRORS_TOTAL, m::LABEL_PHASE => "load")
                .increment(callback_errors as u64);
        }
        self.check_load(rc, &context)?;

        Ok(context)
    }

    /// 로드 결과를 판정합니다.
    ///
    /// 파일 로더는 반환 코드로 실패를 알리므로 코드를 먼저 봅니다.
    /// 문자열 로더는 0을 반환하면서 콜백으로만 실패를 알리므로 콜백 개수를 먼저 봅니다.
    /// 어느 쪽이든 두 신호 중 하나라도 실패면 실패입니다.
    fn check_load(&self, rc: c_int, context: &NativeContext) -> Result<(), NormalizerError> {
        let rc_failure = || NormalizerError::RuleLoadFailure {
            call: loader_call(&self.rule_source),
            code: rc,
            rules: self.rule_source.to_string(),
        };
        let callback_failure = |count| NormalizerError::RuleLoadCallbackErrors {
            count,
            messages: context.aggregator().messages(),
        };

        let count = context.aggregator().count();
        match &self.rule_source {
            RuleSource::File(_) => {
                if rc != 0 {
                    return Err(rc_failure());
                }
                if count > 0 {
                    return Err(callback_failure(count));
                }
            }
            RuleSource::Inline(_) => {
                if count > 0 {
                    return Err(callback_failure(count));
                }
                if rc != 0 {
                    return Err(rc_failure());
                }
            }
        }
        Ok(())
    }

    fn record_failure(&self, session_id: Uuid, err: &NormalizerError) {
        let stage = match err {
            NormalizerError::ContextInitializationFailure => "init",
            NormalizerError::CallbackRegistrationFailure { .. } => "callback",
            _ => "rules",
        };
        metrics::counter!(m::CONTEXT_BUILD_FAILURES_TOTAL, m::LABEL_STAGE => stage).increment(1);
        tracing::warn!(
            session_id = %session_id,
            stage,
            rules = %self.rule_source,
            code = ?err.native_code(),
            error = %err,
            "failed to build normalization context"
        );
    }
}

impl std::fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextFactory")
            .field("engine", &self.engine.name())
            .field("rule_source", &self.rule_source)
            .field("options", &self.options)
            .field("debug", &self.debug)
            .finish()
    }
}

fn loader_call(source: &RuleSource) -> &'static str {
    match source {
        RuleSource::Inline(_) => "ln_loadSamplesFromString",
        RuleSource::File(_) => "ln_loadSamples",
    }
}
