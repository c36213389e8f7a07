//! `lognorm normalize` command handler

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use lognorm_core::config::LognormConfig;
use lognorm_normalizer::{NativeEngine, NormalizationSession, NormalizerError};

use crate::cli::NormalizeArgs;
use crate::commands::session_factory;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `normalize` command.
///
/// Messages come from the positional arguments, or from stdin (one per line)
/// when none are given. A message that fails to normalize is reported and the
/// remaining messages are still processed; the command fails at the end if
/// any message failed.
pub fn execute(
    args: NormalizeArgs,
    engine: Arc<dyn NativeEngine>,
    config: &LognormConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let factory = session_factory(engine, config, &args.rules, &args.options, args.debug)?;
    let mut session = factory.build()?;

    let mut emit = |outcome: &MessageOutcome| writer.render(outcome);
    let summary = if args.messages.is_empty() {
        let stdin = std::io::stdin();
        normalize_lines(&mut session, stdin.lock().split(b'\n'), &mut emit)?
    } else {
        let messages = args.messages.into_iter().map(|m| Ok(m.into_bytes()));
        normalize_lines(&mut session, messages, &mut emit)?
    };
    session.close();

    info!(
        total = summary.total,
        failed = summary.failed,
        callback_errors = summary.callback_errors,
        "normalization finished"
    );

    if summary.failed > 0 {
        return Err(CliError::Normalize(format!(
            "{} of {} messages could not be normalized",
            summary.failed, summary.total
        )));
    }
    Ok(())
}

/// Normalize every non-empty line, handing each outcome to `emit` as soon as it is ready.
///
/// Lines are raw bytes without the `\n`. A trailing `\r` is stripped so CRLF
/// input behaves like LF input. A line that is not UTF-8 becomes a failed
/// outcome and the run continues.
pub fn normalize_lines<I, F>(
    session: &mut NormalizationSession,
    lines: I,
    emit: &mut F,
) -> Result<NormalizeSummary, CliError>
where
    I: IntoIterator<Item = std::io::Result<Vec<u8>>>,
    F: FnMut(&MessageOutcome) -> Result<(), CliError>,
{
    let mut summary = NormalizeSummary::default();

    for (index, line) in lines.into_iter().enumerate() {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }

        let outcome = match String::from_utf8(line) {
            Ok(message) => normalize_one(session, index + 1, &message)?,
            Err(err) => undecodable(index + 1, err),
        };
        summary.total += 1;
        summary.callback_errors += outcome.callback_errors;
        if outcome.error.is_some() {
            summary.failed += 1;
        }
        emit(&outcome)?;
    }

    Ok(summary)
}

fn normalize_one(
    session: &mut NormalizationSession,
    line: usize,
    message: &str,
) -> Result<MessageOutcome, CliError> {
    let rendered = session.normalize(message).and_then(|mut handle| {
        let text = handle.read();
        handle.release();
        text
    });
    let mut outcome = MessageOutcome::new(line, message.to_owned());
    outcome.callback_errors = session.callback_errors()?.count;

    match rendered {
        Ok(raw) => {
            outcome.result = Some(
                serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::Value::String(raw.clone())),
            );
            outcome.raw = Some(raw);
        }
        Err(err) => {
            warn!(line, code = ?err.native_code(), error = %err, "message not normalized");
            outcome.code = err.native_code();
            if let NormalizerError::NormalizationFailure { payload, .. } = &err {
                outcome.payload = payload.clone();
            }
            outcome.error = Some(err.to_string());
        }
    }

    Ok(outcome)
}

fn undecodable(line: usize, err: std::string::FromUtf8Error) -> MessageOutcome {
    let reason = err.utf8_error();
    warn!(line, error = %reason, "message is not valid UTF-8");

    let message = String::from_utf8_lossy(err.as_bytes()).into_owned();
    let mut outcome = MessageOutcome::new(line, message);
    outcome.error = Some(format!("message is not valid UTF-8: {reason}"));
    outcome
}

/// Totals over one `normalize` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalizeSummary {
    /// Messages handed to the native engine
    pub total: usize,
    /// Messages that produced no result
    pub failed: usize,
    /// Error callback invocations across all messages
    pub callback_errors: usize,
}

/// Result of normalizing a single message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageOutcome {
    /// 1-based input position
    pub line: usize,
    /// Input message
    pub message: String,
    /// Normalized event (success only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Native JSON text, printed verbatim in text mode
    #[serde(skip)]
    pub raw: Option<String>,
    /// Failure description (failure only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Native diagnostic code, e.g. -1000 when no rule matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    /// Native error info JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Error callbacks raised while normalizing this message
    #[serde(skip_serializing_if = "is_zero")]
    pub callback_errors: usize,
}

impl MessageOutcome {
    fn new(line: usize, message: String) -> Self {
        Self {
            line,
            message,
            result: None,
            raw: None,
            error: None,
            code: None,
            payload: None,
            callback_errors: 0,
        }
    }
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Render for MessageOutcome {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        match (&self.raw, &self.error) {
            (Some(raw), _) => writeln!(w, "{raw}")?,
            (None, Some(error)) => {
                writeln!(w, "line {}: {}", self.line, error)?;
                if let Some(payload) = &self.payload {
                    writeln!(w, "  {payload}")?;
                }
            }
            (None, None) => writeln!(w, "line {}: no output", self.line)?,
        }
        Ok(())
    }
}
