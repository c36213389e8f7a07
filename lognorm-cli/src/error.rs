//! CLI-specific error types and exit code mapping

use lognorm_core::error::LognormError;
use lognorm_normalizer::NormalizerError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// One or more messages could not be normalized.
    #[error("normalization failed: {0}")]
    Normalize(String),

    /// liblognorm or libfastjson could not be loaded.
    #[error("native library unavailable: {0}")]
    LibraryUnavailable(String),

    /// liblognorm rejected the rule base.
    #[error("rule base rejected: {0}")]
    RuleBase(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdin read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from lognorm-core.
    #[error("{0}")]
    Core(#[from] LognormError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | General / normalization error    |
    /// | 2    | Configuration error              |
    /// | 3    | Native library unavailable       |
    /// | 4    | Rule base rejected               |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(LognormError::Config(_)) => 2,
            Self::LibraryUnavailable(_) => 3,
            Self::RuleBase(_) => 4,
            Self::Io(_) | Self::Core(LognormError::Io(_)) => 10,
            Self::JsonSerialize(_)
            | Self::Command(_)
            | Self::Normalize(_)
            | Self::Core(LognormError::Normalizer(_)) => 1,
        }
    }
}

impl From<NormalizerError> for CliError {
    fn from(e: NormalizerError) -> Self {
        match e {
            NormalizerError::LibraryLoad { .. } => Self::LibraryUnavailable(e.to_string()),
            _ if e.is_rule_rejection() => Self::RuleBase(e.to_string()),
            _ if e.is_construction_failure() => Self::Command(e.to_string()),
            _ => Self::Normalize(e.to_string()),
        }
    }
}
