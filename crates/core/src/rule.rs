//! 룰 소스 — 인라인 룰 문자열 또는 룰 파일 경로
//!
//! 어느 네이티브 로더(`ln_loadSamplesFromString` / `ln_loadSamples`)를
//! 호출할지가 이 값으로 결정됩니다. 문자열 로더는 항상 v2 파서를 사용하고,
//! 파일 로더는 파일 첫 줄의 `version=2` 헤더 유무로 v1/v2 파서가 갈립니다.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// v2 룰베이스 파일 헤더
pub const RULEBASE_V2_HEADER: &str = "version=2";

/// 룰 소스
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RuleSource {
    /// 인라인 룰 텍스트 (`ln_loadSamplesFromString`)
    Inline(String),
    /// 룰 파일 경로 (`ln_loadSamples`)
    File(PathBuf),
}

impl RuleSource {
    /// 인라인 룰 소스를 생성합니다.
    pub fn inline(rules: impl Into<String>) -> Self {
        Self::Inline(rules.into())
    }

    /// 파일 룰 소스를 생성합니다.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    /// 로더 종류 이름 (`string` / `file`)
    pub fn loader_name(&self) -> &'static str {
        match self {
            Self::Inline(_) => "string",
            Self::File(_) => "file",
        }
    }

    /// 파일 룰 소스라면 경로를 반환합니다.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Inline(_) => None,
        }
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(rules) => write!(f, "inline rulebase ({} bytes)", rules.len()),
            Self::File(path) => write!(f, "rulebase file {}", path.display()),
        }
    }
}
