#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`binding`]: `NativeEngine` trait, 옵션 구조체, 원시 핸들 타입
//! - [`dynamic`]: 런타임에 로드한 liblognorm 구현
//! - `mock`: 네이티브 라이브러리 없는 테스트 엔진 (feature `mock`)
//! - [`aggregator`]: 에러 콜백 집계
//! - [`debug`]: 디버그 콜백 싱크
//! - [`factory`]: 세션 생성 (실패 시 자원 해제)
//! - [`session`]: 정규화 세션 상태 머신
//! - [`result`]: 결과 버퍼 핸들
//! - [`error`]: 도메인 에러 타입

pub mod aggregator;
pub mod binding;
pub mod debug;
pub mod dynamic;
pub mod error;
pub mod factory;
pub mod result;
pub mod session;

mod context;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// --- 주요 타입 re-export ---

// 바인딩
pub use binding::{LN_WRONGPARSER, NativeEngine, OptionsStruct};
pub use dynamic::DynamicEngine;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEngine;

// 세션
pub use factory::ContextFactory;
pub use result::ResultHandle;
pub use session::{NormalizationSession, SessionState};

// 콜백
pub use aggregator::{CallbackErrors, ErrorAggregator};
pub use debug::DebugSink;

// 에러
pub use error::NormalizerError;
