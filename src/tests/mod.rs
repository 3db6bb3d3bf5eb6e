use std::os::fd::{AsRawFd, RawFd};
use std::sync::Mutex;

use crate::ast::Stage;
use crate::spawn::{Spawner, StdioBindings};
use crate::tokenizer::Token;
use crate::types::{Result, ShellError};

mod parser_tests;

/// Held by every test that touches the working directory or environment.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

pub fn words(stage: &Stage) -> Vec<String> {
    stage.argv.iter().map(Token::to_string_lossy).collect()
}

#[derive(Debug)]
pub struct Spawned {
    pub argv: Vec<String>,
    pub stdin: Option<RawFd>,
    pub stdout: Option<RawFd>,
    pub stderr: Option<RawFd>,
}

/// Records spawn requests instead of forking.
#[derive(Debug, Default)]
pub struct Recorder {
    pub spawns: Vec<Spawned>,
    pub waited: Vec<usize>,
    /// number of spawns made when each wait happened
    pub wait_points: Vec<usize>,
}

impl Spawner for Recorder {
    type Child = usize;

    fn spawn(&mut self, argv: &[Token], stdio: StdioBindings<'_>) -> Result<usize> {
        self.spawns.push(Spawned {
            argv: argv.iter().map(Token::to_string_lossy).collect(),
            stdin: stdio.stdin.map(|fd| fd.as_raw_fd()),
            stdout: stdio.stdout.map(|fd| fd.as_raw_fd()),
            stderr: stdio.stderr.map(|fd| fd.as_raw_fd()),
        });
        Ok(self.spawns.len() - 1)
    }

    fn wait(&mut self, child: usize) -> Result<i32> {
        self.waited.push(child);
        self.wait_points.push(self.spawns.len());
        Ok(0)
    }
}

/// Like `Recorder`, but `refuse` may turn a spawn into an error.
pub struct Refusing {
    pub recorder: Recorder,
    refuse: fn(&str) -> Option<ShellError>,
}

impl Refusing {
    pub fn new(refuse: fn(&str) -> Option<ShellError>) -> Self {
        Refusing {
            recorder: Recorder::default(),
            refuse,
        }
    }
}

impl Spawner for Refusing {
    type Child = usize;

    fn spawn(&mut self, argv: &[Token], stdio: StdioBindings<'_>) -> Result<usize> {
        let program = argv.first().map(Token::to_string_lossy).unwrap_or_default();
        if let Some(err) = (self.refuse)(&program) {
            return Err(err);
        }
        self.recorder.spawn(argv, stdio)
    }

    fn wait(&mut self, child: usize) -> Result<i32> {
        self.recorder.wait(child)
    }
}
