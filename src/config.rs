use std::str::FromStr;

use log::LevelFilter;

pub const LOG_ENV: &str = "PIPESH_LOG";
pub const PIPELINE_ENV: &str = "PIPESH_PIPELINE";
pub const MAX_ARGS_ENV: &str = "PIPESH_MAX_ARGS";

/// Largest argv a stage may have, program name included.
pub const DEFAULT_MAX_ARGS: usize = 1000;

/// How the stages of one pipeline are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineMode {
    /// Wait for each stage before starting the next. A producer that
    /// outgrows the pipe buffer blocks the statement.
    #[default]
    Sequential,
    /// Start every stage, then wait for all of them.
    Concurrent,
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(PipelineMode::Sequential),
            "concurrent" => Ok(PipelineMode::Concurrent),
            other => Err(format!("unknown pipeline mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: LevelFilter,
    pub pipeline: PipelineMode,
    pub max_args: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: LevelFilter::Warn,
            pipeline: PipelineMode::Sequential,
            max_args: DEFAULT_MAX_ARGS,
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// Returns the config plus one message per rejected value; the logger is
    /// not running yet when this is called, so the caller reports them.
    pub fn from_env() -> (Self, Vec<String>) {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<String>) {
        let mut config = Config::default();
        let mut problems = Vec::new();

        if let Some(value) = lookup(LOG_ENV) {
            match value.trim().parse() {
                Ok(level) => config.log_level = level,
                Err(_) => problems.push(format!("{LOG_ENV}: unknown log level `{value}`")),
            }
        }
        if let Some(value) = lookup(PIPELINE_ENV) {
            match value.parse() {
                Ok(mode) => config.pipeline = mode,
                Err(e) => problems.push(format!("{PIPELINE_ENV}: {e}")),
            }
        }
        if let Some(value) = lookup(MAX_ARGS_ENV) {
            match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_args = n,
                _ => problems.push(format!("{MAX_ARGS_ENV}: expected a positive integer, got `{value}`")),
            }
        }

        (config, problems)
    }
}
