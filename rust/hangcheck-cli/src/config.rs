//! Configuration file parsing for `hangcheck.toml`.
//!
//! Searches the current directory then its ancestors. With no file the
//! stock rules apply.

use crate::CliError;
use hangcheck_analyzer::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "hangcheck.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HangcheckConfig {
    #[serde(default)]
    pub files: FilesSection,
    /// `max_depth`, `[executor]` and `[deferred]` at the top level
    #[serde(flatten)]
    pub analyzer: AnalyzerConfig,
}

/// Which files a directory or glob argument expands to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesSection {
    pub extensions: Vec<String>,
    /// Glob patterns, matched against paths relative to the walked directory
    pub exclude: Vec<String>,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            extensions: ["js", "mjs", "cjs", "jsx"].iter().map(|s| s.to_string()).collect(),
            exclude: vec!["**/node_modules/**".to_string()],
        }
    }
}

impl HangcheckConfig {
    /// Load the nearest `hangcheck.toml` above `start`. `Ok(None)` when there is none.
    pub fn discover(start: &Path) -> Result<Option<(PathBuf, Self)>, CliError> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                let cfg = Self::load_from(&candidate)?;
                return Ok(Some((candidate, cfg)));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// Load `hangcheck.toml` from the current directory or an ancestor, or
    /// the defaults when none exists.
    pub fn load() -> Result<Self, CliError> {
        let cwd = std::env::current_dir().map_err(|source| CliError::Read { path: PathBuf::from("."), source })?;
        match Self::discover(&cwd)? {
            Some((path, cfg)) => {
                debug!(path = %path.display(), "loaded config");
                Ok(cfg)
            }
            None => {
                debug!("no {} found, using defaults", CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, CliError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
        let cfg = Self::parse(&content).map_err(|source| CliError::Toml { path: path.to_path_buf(), source })?;
        cfg.analyzer.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML string directly.
    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Generate a default `hangcheck.toml` template.
    pub fn default_template() -> &'static str {
        r#"# Hangcheck configuration
# Every key is optional; the values below are the defaults.

# Recursion limit for analyzing a single promise or deferred
max_depth = 512

[files]
extensions = ["js", "mjs", "cjs", "jsx"]
exclude = ["**/node_modules/**"]

# new Promise((resolve, reject) => { ... })
[executor]
enabled = true
constructors = ["Promise"]

# var d = $.Deferred(); ... d.resolve()
[deferred]
enabled = true
factories = ["Deferred", "defer"]
aliases = ["$", "jQuery", "Q", "$q"]
completion_ops = "^(resolve|reject)$"
"#
    }

    /// Write the template into `dir`; refuses to overwrite an existing file.
    pub fn init(dir: &Path) -> Result<PathBuf, CliError> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            return Err(CliError::AlreadyExists(path));
        }
        std::fs::write(&path, Self::default_template()).map_err(|source| CliError::Write { path: path.clone(), source })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let path = std::env::temp_dir().join(format!("{}_{}_{}", prefix, std::process::id(), stamp));
        fs::create_dir_all(&path).expect("should create temp dir");
        path
    }

    #[test]
    fn template_parses_to_defaults() {
        let cfg = HangcheckConfig::parse(HangcheckConfig::default_template()).expect("template is valid toml");
        assert_eq!(cfg, HangcheckConfig::default());
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(HangcheckConfig::parse("").expect("empty toml"), HangcheckConfig::default());
    }

    #[test]
    fn top_level_sections_reach_the_analyzer() {
        let cfg = HangcheckConfig::parse("max_depth = 64\n[deferred]\nenabled = false\n[files]\nextensions = [\"ts\"]\n")
            .expect("valid toml");
        assert_eq!(cfg.analyzer.max_depth, 64);
        assert!(!cfg.analyzer.deferred.enabled);
        assert!(cfg.analyzer.executor.enabled);
        assert_eq!(cfg.files.extensions, vec!["ts"]);
        assert_eq!(cfg.files.exclude, FilesSection::default().exclude);
    }

    #[test]
    fn discover_walks_up_to_ancestors() {
        let root = temp_dir("hangcheck_cfg_discover");
        let nested = root.join("a").join("b");
        fs::create_dir_all(&nested).expect("should create nested dirs");
        fs::write(root.join(CONFIG_FILE), "[executor]\nconstructors = [\"Bluebird\"]\n").expect("write config");

        let (path, cfg) = HangcheckConfig::discover(&nested).expect("readable").expect("found");
        assert_eq!(path, root.join(CONFIG_FILE));
        assert_eq!(cfg.analyzer.executor.constructors, vec!["Bluebird"]);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn invalid_regex_is_reported_on_load() {
        let root = temp_dir("hangcheck_cfg_invalid");
        let path = root.join(CONFIG_FILE);
        fs::write(&path, "[deferred]\ncompletion_ops = \"(\"\n").expect("write config");
        let err = HangcheckConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        fs::write(&path, "max_depth = \"deep\"\n").expect("write config");
        let err = HangcheckConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CliError::Toml { .. }));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let root = temp_dir("hangcheck_cfg_init");
        let path = HangcheckConfig::init(&root).expect("first init writes");
        assert!(path.is_file());
        let err = HangcheckConfig::init(&root).unwrap_err();
        assert!(matches!(err, CliError::AlreadyExists(_)));
        assert!(err.to_string().ends_with("already exists, not overwriting"));
        let _ = fs::remove_dir_all(&root);
    }
}
