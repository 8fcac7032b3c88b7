//! Analyzer configuration: which constructs each rule recognizes.
//!
//! Every field has a default, so an empty `[deferred]` table (or no file at
//! all) yields the stock behavior.

use crate::analysis::walker::DEFAULT_MAX_DEPTH;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid completion_ops pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("max_depth must be at least 1")]
    ZeroDepth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Recursion limit for a single completion analysis
    pub max_depth: usize,
    pub executor: ExecutorConfig,
    pub deferred: DeferredConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH, executor: ExecutorConfig::default(), deferred: DeferredConfig::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub enabled: bool,
    /// Constructor names matched against the dotted callee text of `new`
    pub constructors: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { enabled: true, constructors: vec!["Promise".to_string()] }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeferredConfig {
    pub enabled: bool,
    /// Method names that create a deferred, as in `$.Deferred()`
    pub factories: Vec<String>,
    /// Objects the factory may be called through
    pub aliases: Vec<String>,
    /// Regex over member names that settle a deferred
    pub completion_ops: String,
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            factories: vec!["Deferred".to_string(), "defer".to_string()],
            aliases: vec!["$".to_string(), "jQuery".to_string(), "Q".to_string(), "$q".to_string()],
            completion_ops: "^(resolve|reject)$".to_string(),
        }
    }
}

impl AnalyzerConfig {
    /// Check the settings that cannot be expressed in the type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        self.deferred.completion_regex().map(|_| ())
    }
}

impl DeferredConfig {
    pub fn completion_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.completion_ops).map_err(|source| ConfigError::InvalidPattern {
            pattern: self.completion_ops.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_rules() {
        let cfg = AnalyzerConfig::default();
        assert_eq!(cfg.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(cfg.executor.constructors, vec!["Promise"]);
        assert!(cfg.deferred.factories.contains(&"Deferred".to_string()));
        assert!(cfg.deferred.aliases.contains(&"$".to_string()));
        let re = cfg.deferred.completion_regex().expect("default pattern compiles");
        assert!(re.is_match("resolve"));
        assert!(re.is_match("reject"));
        assert!(!re.is_match("resolveWith"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: AnalyzerConfig = toml::from_str(
            "[deferred]\naliases = [\"Ember.RSVP\"]\n\n[executor]\nconstructors = [\"Promise\", \"Bluebird\"]\n",
        )
        .expect("valid toml");
        assert_eq!(cfg.deferred.aliases, vec!["Ember.RSVP"]);
        assert_eq!(cfg.deferred.factories, DeferredConfig::default().factories);
        assert_eq!(cfg.executor.constructors.len(), 2);
        assert!(cfg.executor.enabled);
        assert_eq!(cfg.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let mut cfg = AnalyzerConfig::default();
        cfg.deferred.completion_ops = "(resolve".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
        assert!(err.to_string().contains("(resolve"));
    }

    #[test]
    fn zero_depth_is_rejected() {
        let cfg = AnalyzerConfig { max_depth: 0, ..AnalyzerConfig::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroDepth)));
    }
}
