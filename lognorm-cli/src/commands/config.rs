//! `lognorm config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use lognorm_core::config::LognormConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Sections accepted by `config show --section`.
const SECTIONS: [&str; 5] = ["general", "library", "options", "rules", "debug"];

/// Execute the `config` command.
pub fn execute(
    args: ConfigArgs,
    config_path: &Path,
    explicit: bool,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer),
        ConfigAction::Show { section } => execute_show(config_path, explicit, section, writer),
    }
}

/// Load the effective configuration.
///
/// An explicitly given file must exist. Without `--config`, a missing
/// `lognorm.toml` falls back to defaults plus environment overrides.
pub fn load_effective(config_path: &Path, explicit: bool) -> Result<LognormConfig, CliError> {
    if explicit || config_path.exists() {
        Ok(LognormConfig::load(config_path)?)
    } else {
        debug!(
            path = %config_path.display(),
            "config file not found, using defaults and environment"
        );
        Ok(LognormConfig::from_env()?)
    }
}

/// Execute the config validate subcommand.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (missing file, invalid values, parse errors).
fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = validate_report(config_path);
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Load and validate `config_path`, collecting the outcome.
pub fn validate_report(config_path: &Path) -> ConfigValidationReport {
    let errors = match LognormConfig::load(config_path) {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    };

    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
    }
}

fn execute_show(
    config_path: &Path,
    explicit: bool,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = load_effective(config_path, explicit)?;
    let report = show_report(&config, config_path, section)?;
    writer.render(&report)?;

    Ok(())
}

/// Serialize the whole configuration, or one section of it.
pub fn show_report(
    config: &LognormConfig,
    config_path: &Path,
    section: Option<String>,
) -> Result<ConfigReport, CliError> {
    let rendered = match section.as_deref() {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("library") => toml::to_string_pretty(&config.library),
        Some("options") => toml::to_string_pretty(&config.options),
        Some("rules") => toml::to_string_pretty(&config.rules),
        Some("debug") => toml::to_string_pretty(&config.debug),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section,
        config_toml: rendered.unwrap_or_else(|e| format!("(serialization error: {})", e)),
    })
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        match &self.section {
            Some(section) => writeln!(w, "Configuration [{}] (source: {})", section, self.source)?,
            None => writeln!(w, "Configuration (source: {})", self.source)?,
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
///
/// Contains validation result and any error messages encountered.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Config Validation: {}", self.source)?;

        if self.valid {
            writeln!(w, "  Result: VALID")?;
        } else {
            writeln!(w, "  Result: INVALID")?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_report_render_text_full_config() {
        let report = ConfigReport {
            source: "test.toml".to_owned(),
            section: None,
            config_toml: "[general]\nlog_level = \"info\"".to_owned(),
        };

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("Configuration"), "should contain header");
        assert!(output.contains("test.toml"), "should contain source filename");
        assert!(output.contains("log_level"), "should contain config content");
    }

    #[test]
    fn test_show_report_options_section() {
        let mut config = LognormConfig::default();
        config.options.add_rule = true;

        let report = show_report(&config, Path::new("lognorm.toml"), Some("options".to_owned()))
            .expect("known section");
        assert_eq!(report.section.as_deref(), Some("options"));
        assert!(report.config_toml.contains("add_rule = true"));
        assert!(report.config_toml.contains("allow_regex = false"));
    }

    #[test]
    fn test_show_report_full_config_has_every_section() {
        let report = show_report(&LognormConfig::default(), Path::new("lognorm.toml"), None)
            .expect("full config");
        for section in ["[general]", "[library]", "[options]", "[debug]"] {
            assert!(
                report.config_toml.contains(section),
                "missing {section} in:\n{}",
                report.config_toml
            );
        }
    }

    #[test]
    fn test_show_report_unknown_section() {
        let err = show_report(&LognormConfig::default(), Path::new("lognorm.toml"), Some("ebpf".to_owned()))
            .err()
            .expect("unknown section should fail");
        assert!(err.to_string().contains("unknown section: ebpf"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_config_report_json_serialization() {
        let report = ConfigReport {
            source: "test.toml".to_owned(),
            section: Some("rules".to_owned()),
            config_toml: "path = \"x\"".to_owned(),
        };

        let json = serde_json::to_string(&report).expect("JSON serialization should succeed");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("should parse JSON");

        assert_eq!(parsed["source"].as_str(), Some("test.toml"));
        assert_eq!(parsed["section"].as_str(), Some("rules"));
        // config_toml is skipped in serialization
        assert!(
            parsed.get("config_toml").is_none(),
            "config_toml should be skipped"
        );
    }

    #[test]
    fn test_config_validation_report_invalid() {
        let report = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            errors: vec!["invalid config value for 'general.log_level'".to_owned()],
        };

        let mut buffer = Vec::new();
        report
            .render_text(&mut buffer)
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("INVALID"));
        assert!(output.contains("general.log_level"));
    }

    #[test]
    fn test_validate_report_missing_file() {
        let report = validate_report(Path::new("/nonexistent/lognorm.toml"));
        assert!(!report.valid);
        assert!(report.errors[0].contains("not found"));
    }

    #[test]
    fn test_load_effective_explicit_missing_file_fails() {
        let err = load_effective(Path::new("/nonexistent/lognorm.toml"), true)
            .expect_err("explicit path must exist");
        assert_eq!(err.exit_code(), 2);
    }
}
