//! Hangcheck analyzer
//!
//! Finds promise executors and deferreds that can finish without ever
//! calling `resolve` or `reject` on some code path.

pub mod analysis;
pub mod diagnostics;

use analysis::ast::Program;
use analysis::lexer::Lexer;
use analysis::parser::Parser;
use thiserror::Error;

pub use analysis::config::{AnalyzerConfig, ConfigError, DeferredConfig, ExecutorConfig};
pub use analysis::rules::{check_program, Rules};
pub use diagnostics::{Diagnostic, RuleId, Severity};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("lex error: {0}")]
    Lex(#[from] analysis::lexer::LexError),
    #[error("parse error: {0}")]
    Parse(#[from] analysis::parser::ParseError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Lex and parse a source file.
pub fn parse(source: &str) -> Result<Program, CheckError> {
    let tokens = Lexer::new(source).tokenize()?;
    let program = Parser::new(tokens).parse_program()?;
    Ok(program)
}

/// Parse `source` and run every rule enabled in `config`.
pub fn check_source(source: &str, config: &AnalyzerConfig) -> Result<Vec<Diagnostic>, CheckError> {
    let rules = Rules::from_config(config)?;
    let program = parse(source)?;
    Ok(check_program(&program, source, &rules))
}
