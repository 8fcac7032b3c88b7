//! Hangcheck CLI library.
//!
//! File discovery, `hangcheck.toml` loading and report rendering shared by
//! the `hangcheck` binary and its tests.

pub mod check;
pub mod colors;
pub mod config;

use hangcheck_analyzer::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml in '{}': {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("{} already exists, not overwriting", .0.display())]
    AlreadyExists(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
