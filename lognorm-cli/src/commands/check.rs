//! `lognorm check` command handler

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use lognorm_core::config::LognormConfig;
use lognorm_normalizer::{ContextFactory, NativeEngine, NormalizerError};

use crate::cli::CheckArgs;
use crate::commands::session_factory;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `check` command.
///
/// Builds a context for the rule base and closes it again. A rejected rule
/// base is rendered first, then returned as an error (exit code 4).
pub fn execute(
    args: CheckArgs,
    engine: Arc<dyn NativeEngine>,
    config: &LognormConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let factory = session_factory(engine, config, &args.rules, &args.options, false)?;
    let (report, failure) = check_rules(&factory);

    writer.render(&report)?;

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Try to build a session and summarise the outcome.
pub fn check_rules(factory: &ContextFactory) -> (RuleCheckReport, Option<NormalizerError>) {
    let source = factory.rule_source();
    let mut report = RuleCheckReport {
        rules: source.to_string(),
        loader: source.loader_name(),
        valid: false,
        error: None,
        code: None,
        callback_errors: 0,
        messages: Vec::new(),
    };

    match factory.build() {
        Ok(mut session) => {
            info!(rules = %report.rules, "rule base accepted");
            session.close();
            report.valid = true;
            (report, None)
        }
        Err(err) => {
            report.error = Some(err.to_string());
            report.code = err.native_code();
            if let NormalizerError::RuleLoadCallbackErrors { count, messages } = &err {
                report.callback_errors = *count;
                report.messages = messages.clone();
            }
            (report, Some(err))
        }
    }
}

/// Rule base check report.
#[derive(Debug, Serialize)]
pub struct RuleCheckReport {
    /// Rule source description
    pub rules: String,
    /// Loader kind (`string` / `file`)
    pub loader: &'static str,
    /// Whether the native library accepted the rule base
    pub valid: bool,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Loader return code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    /// Error callbacks raised during the load
    pub callback_errors: usize,
    /// Captured callback messages (oldest first)
    pub messages: Vec<String>,
}

impl Render for RuleCheckReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Rule Base Check: {} ({} loader)", self.rules, self.loader)?;

        if self.valid {
            writeln!(w, "  Result: VALID")?;
            return Ok(());
        }

        writeln!(w, "  Result: INVALID")?;
        if let Some(error) = &self.error {
            writeln!(w, "  Error: {error}")?;
        }
        for message in &self.messages {
            writeln!(w, "    - {message}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lognorm_core::RuleSource;
    use lognorm_normalizer::MockEngine;

    fn factory(engine: &Arc<MockEngine>, source: RuleSource) -> ContextFactory {
        ContextFactory::new(engine.clone(), source)
    }

    #[test]
    fn valid_rule_base_is_accepted_and_context_released() {
        let engine = Arc::new(MockEngine::new());
        let (report, failure) = check_rules(&factory(&engine, RuleSource::inline("rule=:%all:rest%")));

        assert!(report.valid);
        assert!(failure.is_none());
        assert_eq!(report.loader, "string");
        assert_eq!(engine.live_contexts(), 0);
    }

    #[test]
    fn invalid_inline_rules_report_callback_count() {
        let engine = Arc::new(MockEngine::new());
        let (report, failure) = check_rules(&factory(
            &engine,
            RuleSource::inline("invalidRulebase\nmoreInvalidRules"),
        ));

        assert!(!report.valid);
        assert_eq!(report.callback_errors, 2);
        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.error.as_deref(), Some("<2> errors have occurred"));

        let err: CliError = failure.expect("failure").into();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(engine.live_contexts(), 0);
    }

    #[test]
    fn missing_rule_file_reports_return_code() {
        let engine = Arc::new(MockEngine::new());
        let (report, failure) = check_rules(&factory(
            &engine,
            RuleSource::file("/nonexistent/none.rulebase"),
        ));

        assert!(!report.valid);
        assert_eq!(report.loader, "file");
        assert_eq!(report.code, Some(1));
        assert_eq!(
            report.error.as_deref(),
            Some("ln_loadSamples() returned 1 instead of 0")
        );
        assert!(failure.is_some());
    }

    #[test]
    fn text_report_lists_callback_messages() {
        let report = RuleCheckReport {
            rules: "inline rulebase (5 bytes)".to_owned(),
            loader: "string",
            valid: false,
            error: Some("<1> errors have occurred".to_owned()),
            code: None,
            callback_errors: 1,
            messages: vec!["invalid record".to_owned()],
        };

        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("INVALID"));
        assert!(output.contains("<1> errors have occurred"));
        assert!(output.contains("- invalid record"));
    }

    #[test]
    fn json_report_omits_absent_fields() {
        let engine = Arc::new(MockEngine::new());
        let (report, _) = check_rules(&factory(&engine, RuleSource::inline("rule=:%all:rest%")));

        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["valid"], true);
        assert!(json.get("error").is_none());
        assert!(json.get("code").is_none());
    }
}
