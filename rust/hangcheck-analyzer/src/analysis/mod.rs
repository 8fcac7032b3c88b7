//! JavaScript front end and completion analysis.

pub mod ast;
pub mod bindings;
pub mod config;
pub mod deferred;
pub mod executor;
pub mod handles;
pub mod lexer;
pub mod parser;
pub mod rules;
pub mod tokens;
pub mod visit;
pub mod walker;
