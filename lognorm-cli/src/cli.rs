//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lognorm_core::{NormalizerOptions, RuleSource};

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "lognorm.toml";

/// lognorm -- normalize log lines with liblognorm rule bases.
///
/// Use `lognorm <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "lognorm", version, about, long_about = None)]
pub struct Cli {
    /// Path to the lognorm.toml configuration file (default: ./lognorm.toml if present).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config path to load, and whether the user asked for it explicitly.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Normalize log messages against a rule base.
    Normalize(NormalizeArgs),

    /// Load a rule base and report whether liblognorm accepts it.
    Check(CheckArgs),

    /// Show the native library version.
    Version,

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- shared ----

/// Where the rule base comes from. Overrides `[rules]` in the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct RuleArgs {
    /// Rule base file (loaded with ln_loadSamples).
    #[arg(short, long, conflicts_with = "rulebase")]
    pub rules: Option<PathBuf>,

    /// Inline rule base text (loaded with ln_loadSamplesFromString).
    #[arg(long)]
    pub rulebase: Option<String>,
}

impl RuleArgs {
    /// Rule source given on the command line, if any.
    pub fn source(&self) -> Option<RuleSource> {
        match (&self.rules, &self.rulebase) {
            (Some(path), _) => Some(RuleSource::file(path)),
            (None, Some(text)) => Some(RuleSource::inline(text.clone())),
            (None, None) => None,
        }
    }
}

/// Context option flags. A flag only ever turns an option on.
#[derive(Args, Debug, Default, Clone, Copy)]
pub struct OptionFlags {
    /// Allow regex field types in v1 rule bases.
    #[arg(long)]
    pub allow_regex: bool,

    /// Record the rule execution path.
    #[arg(long)]
    pub add_exec_path: bool,

    /// Add the original message to each result.
    #[arg(long)]
    pub add_original_message: bool,

    /// Add the matching rule mockup to result metadata.
    #[arg(long)]
    pub add_rule: bool,

    /// Add the matching rule file and line to result metadata.
    #[arg(long)]
    pub add_rule_location: bool,
}

impl OptionFlags {
    /// Merge the flags on top of configured options.
    pub fn apply(&self, base: NormalizerOptions) -> NormalizerOptions {
        let [regex, exec_path, original, rule, location] = base.ordered();
        NormalizerOptions::from_ordered([
            regex || self.allow_regex,
            exec_path || self.add_exec_path,
            original || self.add_original_message,
            rule || self.add_rule,
            location || self.add_rule_location,
        ])
    }
}

// ---- normalize ----

/// Normalize messages given as arguments, or stdin lines when none are given.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub rules: RuleArgs,

    #[command(flatten)]
    pub options: OptionFlags,

    /// Route native debug output to the log (at debug level).
    #[arg(long)]
    pub debug: bool,

    /// Messages to normalize.
    pub messages: Vec<String>,
}

// ---- check ----

/// Build a context for the rule base, then close it.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub rules: RuleArgs,

    #[command(flatten)]
    pub options: OptionFlags,
}

// ---- config ----

/// Manage lognorm configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, library, options, rules, debug).
        #[arg(long)]
        section: Option<String>,
    },
}
