//! Command handlers -- one module per subcommand

pub mod check;
pub mod config;
pub mod normalize;
pub mod version;

use std::sync::Arc;

use lognorm_core::config::LognormConfig;
use lognorm_normalizer::{ContextFactory, NativeEngine};

use crate::cli::{OptionFlags, RuleArgs};
use crate::error::CliError;

/// Build a session factory from command-line arguments layered over the config.
///
/// `--rules` / `--rulebase` replace `[rules]`; option flags and `--debug`
/// can only switch on what the config leaves off.
pub fn session_factory(
    engine: Arc<dyn NativeEngine>,
    config: &LognormConfig,
    rules: &RuleArgs,
    flags: &OptionFlags,
    debug: bool,
) -> Result<ContextFactory, CliError> {
    let rule_source = rules
        .source()
        .or_else(|| config.rule_source())
        .ok_or_else(|| {
            CliError::Config(
                "no rule base given: pass --rules or --rulebase, or set [rules] in the config"
                    .to_owned(),
            )
        })?;

    Ok(ContextFactory::new(engine, rule_source)
        .with_options(flags.apply(config.options))
        .with_debug(debug || config.debug.enabled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lognorm_core::RuleSource;
    use lognorm_normalizer::MockEngine;

    #[test]
    fn cli_rules_override_config_rules() {
        let mut config = LognormConfig::default();
        config.rules.inline = Some("rule=:%a:word%".to_owned());
        let rules = RuleArgs {
            rules: None,
            rulebase: Some("rule=:%all:rest%".to_owned()),
        };

        let factory = session_factory(
            Arc::new(MockEngine::new()),
            &config,
            &rules,
            &OptionFlags::default(),
            false,
        )
        .expect("factory");
        assert_eq!(
            factory.rule_source(),
            &RuleSource::inline("rule=:%all:rest%")
        );
    }

    #[test]
    fn config_rules_are_the_fallback() {
        let mut config = LognormConfig::default();
        config.rules.path = Some("/etc/lognorm/sample.rulebase".to_owned());

        let factory = session_factory(
            Arc::new(MockEngine::new()),
            &config,
            &RuleArgs::default(),
            &OptionFlags::default(),
            false,
        )
        .expect("factory");
        assert_eq!(
            factory.rule_source(),
            &RuleSource::file("/etc/lognorm/sample.rulebase")
        );
    }

    #[test]
    fn missing_rule_base_is_config_error() {
        let err = session_factory(
            Arc::new(MockEngine::new()),
            &LognormConfig::default(),
            &RuleArgs::default(),
            &OptionFlags::default(),
            false,
        )
        .expect_err("no rule base");
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("--rules"));
    }
}
