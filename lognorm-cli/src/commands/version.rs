//! `lognorm version` command handler

use std::io::Write;

use serde::Serialize;

use lognorm_core::config::LognormConfig;
use lognorm_normalizer::NativeEngine;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `version` command.
pub fn execute(
    engine: &dyn NativeEngine,
    config: &LognormConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    writer.render(&VersionReport::collect(engine, config))
}

/// Native library version report.
#[derive(Debug, Serialize)]
pub struct VersionReport {
    /// CLI version
    pub cli: &'static str,
    /// Engine name
    pub engine: String,
    /// Version reported by ln_version()
    pub version: String,
    /// Whether the library was built with advanced statistics
    pub advanced_stats: bool,
    /// Configured liblognorm location
    pub library: String,
}

impl VersionReport {
    pub fn collect(engine: &dyn NativeEngine, config: &LognormConfig) -> Self {
        Self {
            cli: env!("CARGO_PKG_VERSION"),
            engine: engine.name().to_owned(),
            version: engine.version(),
            advanced_stats: engine.has_advanced_stats(),
            library: config.library.lognorm_path.clone(),
        }
    }
}

impl Render for VersionReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "lognorm {}", self.cli)?;
        writeln!(w, "  {} {} ({})", self.engine, self.version, self.library)?;
        writeln!(
            w,
            "  advanced stats: {}",
            if self.advanced_stats { "yes" } else { "no" }
        )?;
        Ok(())
    }
}
