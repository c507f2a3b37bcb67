//! Rule file loading from granted.toml.

use std::collections::BTreeMap;
use std::path::Path;

use granted::{ActionNames, Guard, Guarded};
use serde::Deserialize;

use crate::principal::{Resource, kind_guard};

/// Top-level rule file.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Targets keyed by name.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

/// Rules attached to one target.
#[derive(Debug, Default, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub grant: Vec<RuleConfig>,

    #[serde(default)]
    pub deny: Vec<RuleConfig>,
}

/// A single rule entry. Checks in files are literal booleans.
#[derive(Debug, Deserialize)]
pub struct RuleConfig {
    pub actions: Actions,

    /// Only applies to principals carrying this kind.
    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default = "default_value")]
    pub value: bool,
}

/// One action name or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Actions {
    One(String),
    Many(Vec<String>),
}

impl Actions {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Actions::One(name) => vec![name.as_str()],
            Actions::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

fn default_value() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, target) in &self.targets {
            let mut rules = target.grant.iter().chain(&target.deny);
            if rules.any(|rule| rule.actions.names().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "target '{name}' has a rule without actions"
                )));
            }
        }
        Ok(())
    }

    /// Build the named target with all of its rules registered.
    pub fn target(&self, name: &str) -> Result<Guard<Resource>, ConfigError> {
        let config = self
            .targets
            .get(name)
            .ok_or_else(|| ConfigError::UnknownTarget(name.to_string()))?;

        let mut target = Guard::new(Resource {
            name: name.to_string(),
        });
        for rule in &config.grant {
            let actions = ActionNames::from(rule.actions.names());
            match &rule.kind {
                Some(kind) => target.grant_when(actions, kind_guard(kind), rule.value),
                None => target.grant(actions, rule.value),
            };
        }
        for rule in &config.deny {
            let actions = ActionNames::from(rule.actions.names());
            match &rule.kind {
                Some(kind) => target.deny_when(actions, kind_guard(kind), rule.value),
                None => target.deny(actions, rule.value),
            };
        }
        Ok(target)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read rules: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rules: {0}")]
    Parse(String),

    #[error("invalid rules: {0}")]
    Invalid(String),

    #[error("unknown target '{0}'")]
    UnknownTarget(String),
}
