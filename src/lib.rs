//! Line-oriented command interpreter: splits a line into `;` statements,
//! resolves each statement into `|` stages with their redirections, and runs
//! the stages as child processes wired together through pipes.

pub mod ast;
pub mod builtins;
pub mod config;
pub mod executor;
pub mod logging;
pub mod parser;
pub mod spawn;
pub mod statement;
pub mod tokenizer;
pub mod types;

pub use config::{Config, PipelineMode};
pub use executor::Executor;
pub use types::{Flow, ShellError};

#[cfg(test)]
mod tests;
