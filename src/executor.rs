use std::os::fd::{AsFd, BorrowedFd, FromRawFd, OwnedFd};

use bytes::Bytes;
use nix::fcntl::OFlag;
use nix::unistd::pipe2;

use crate::ast::Stage;
use crate::builtins;
use crate::config::{Config, PipelineMode};
use crate::parser::{count_pipes, StageScanner};
use crate::spawn::{ForkExec, Spawner, StdioBindings};
use crate::statement::Statements;
use crate::types::{report, Flow, Result, ShellError};

/// One pipe per boundary between adjacent stages: pair `i` carries stage
/// `i`'s stdout to stage `i + 1`'s stdin.
///
/// Ends are closed as soon as the interpreter no longer needs them, and
/// whatever is left is closed on drop.
#[derive(Debug)]
pub struct Pipes {
    pairs: Vec<(Option<OwnedFd>, Option<OwnedFd>)>,
}

impl Pipes {
    pub fn open(count: usize) -> Result<Self> {
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let (read, write) = pipe2(OFlag::O_CLOEXEC).map_err(ShellError::Pipe)?;
            // SAFETY: pipe2 just returned these descriptors and nothing else owns them.
            let pair = unsafe { (OwnedFd::from_raw_fd(read), OwnedFd::from_raw_fd(write)) };
            pairs.push((Some(pair.0), Some(pair.1)));
        }
        Ok(Pipes { pairs })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Read end feeding stage `stage`, if it has an upstream neighbour.
    pub fn input_of(&self, stage: usize) -> Option<BorrowedFd<'_>> {
        let pair = self.pairs.get(stage.checked_sub(1)?)?;
        pair.0.as_ref().map(AsFd::as_fd)
    }

    /// Write end stage `stage` feeds, if it has a downstream neighbour.
    pub fn output_of(&self, stage: usize) -> Option<BorrowedFd<'_>> {
        self.pairs.get(stage)?.1.as_ref().map(AsFd::as_fd)
    }

    /// Close the ends stage `stage` used: the previous read end, now
    /// consumed, and its own write end, so the next stage sees end of input.
    pub fn release(&mut self, stage: usize) {
        if let Some(prev) = stage.checked_sub(1).and_then(|i| self.pairs.get_mut(i)) {
            prev.0.take();
        }
        if let Some(pair) = self.pairs.get_mut(stage) {
            pair.1.take();
        }
        log::debug!("closed pipe ends around stage {stage}");
    }

    /// Number of descriptors still open.
    pub fn open_ends(&self) -> usize {
        self.pairs
            .iter()
            .map(|(r, w)| usize::from(r.is_some()) + usize::from(w.is_some()))
            .sum()
    }
}

/// Runs statements: resolves each stage, dispatches builtins, spawns the
/// rest with their descriptors wired up and waits for them.
pub struct Executor<S: Spawner = ForkExec> {
    config: Config,
    spawner: S,
    last_status: i32,
}

impl Executor<ForkExec> {
    pub fn new(config: Config) -> Self {
        Executor::with_spawner(config, ForkExec)
    }
}

impl<S: Spawner> Executor<S> {
    pub fn with_spawner(config: Config, spawner: S) -> Self {
        Executor {
            config,
            spawner,
            last_status: 0,
        }
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Exit status of the last waited-for program, or 1 after a statement
    /// error.
    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    /// Run every statement of one input line in order.
    ///
    /// Statement errors are reported and the next statement still runs.
    /// Only fatal errors are returned.
    pub fn run_line(&mut self, line: impl Into<Bytes>) -> Result<Flow> {
        for statement in Statements::new(line) {
            match self.run_statement(&statement) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => return Ok(Flow::Quit),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    report(&e);
                    self.last_status = 1;
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Run one statement. An error abandons the stages not yet started;
    /// stages that already ran keep their effects.
    pub fn run_statement(&mut self, statement: &[u8]) -> Result<Flow> {
        log::debug!("statement {:?}", String::from_utf8_lossy(statement));
        let mut pipes = Pipes::open(count_pipes(statement))?;
        let mut running = Vec::new();

        let flow = self.run_stages(statement, &mut pipes, &mut running);

        // Closing the remaining ends first lets any running stage see EOF.
        drop(pipes);
        let mut waited = Ok(());
        for child in running {
            match self.spawner.wait(child) {
                Ok(status) => self.last_status = status,
                Err(e) => waited = Err(e),
            }
        }

        let flow = flow?;
        waited?;
        Ok(flow)
    }

    fn run_stages(&mut self, statement: &[u8], pipes: &mut Pipes, running: &mut Vec<S::Child>) -> Result<Flow> {
        for (index, stage) in StageScanner::new(statement, self.config.max_args).enumerate() {
            let stage = stage?;

            if let Some(flow) = builtins::dispatch(&stage.argv) {
                if flow? == Flow::Quit {
                    return Ok(Flow::Quit);
                }
                self.last_status = 0;
            } else {
                let child = self.spawn_stage(&stage, index, pipes)?;
                match self.config.pipeline {
                    PipelineMode::Sequential => self.last_status = self.spawner.wait(child)?,
                    PipelineMode::Concurrent => running.push(child),
                }
            }

            pipes.release(index);
        }
        Ok(Flow::Continue)
    }

    /// Explicit redirections win over pipe ends; stderr is never piped.
    fn spawn_stage(&mut self, stage: &Stage, index: usize, pipes: &Pipes) -> Result<S::Child> {
        let stdio = StdioBindings {
            stdin: stage.stdin.fd().or_else(|| pipes.input_of(index)),
            stdout: stage.stdout.fd().or_else(|| pipes.output_of(index)),
            stderr: stage.stderr.fd(),
        };
        if stage.is_noop() {
            log::debug!("stage {index} has no program, applying redirections only");
        }
        self.spawner.spawn(&stage.argv, stdio)
    }
}
