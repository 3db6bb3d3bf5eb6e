use crate::ast::{RedirectMode, RedirectionRequest, Stage, Target};
use crate::tokenizer::{bare_positions, is_separator, is_space, read_token, Token};
use crate::types::{Result, ShellError, Stream};

/// Number of bare `|` in a statement, which is the number of pipe pairs
/// the statement needs. Quoted and escaped pipes are not counted.
pub fn count_pipes(statement: &[u8]) -> usize {
    bare_positions(statement, b'|').count()
}

/// Resolves a statement into stages, one at a time, left to right.
///
/// Each call to `next` scans up to the next bare `|` (or the end of the
/// statement) and opens that stage's redirection files. Stages are produced
/// lazily so that a stage can run before a later stage's syntax error is
/// seen. After the first error the scanner yields nothing more.
#[derive(Debug)]
pub struct StageScanner<'a> {
    input: &'a [u8],
    pos: usize,
    max_args: usize,
    finished: bool,
}

impl<'a> StageScanner<'a> {
    pub fn new(input: &'a [u8], max_args: usize) -> Self {
        StageScanner {
            input,
            pos: 0,
            max_args,
            finished: false,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek(0).is_some_and(is_space) {
            self.pos += 1;
        }
    }

    fn scan_stage(&mut self) -> Result<Stage> {
        let mut stage = Stage::default();
        // `2>&1` seen while stdout was still standard
        let mut stderr_follows_stdout = false;

        loop {
            let Some(c) = self.peek(0) else {
                self.finished = true;
                break;
            };
            match c {
                b'|' => {
                    self.pos += 1;
                    break;
                }
                c if is_space(c) => self.pos += 1,
                b'>' => self.redirect_output(&mut stage, &mut stderr_follows_stdout)?,
                b'<' => self.redirect_input(&mut stage)?,
                // stream selector of `1>` / `2>`
                b'1' | b'2' if self.peek(1) == Some(b'>') => self.pos += 1,
                b';' => return Err(ShellError::UnexpectedSeparator(';')),
                _ => {
                    if stage.argv.len() == self.max_args {
                        return Err(ShellError::TooManyArguments {
                            limit: self.max_args,
                        });
                    }
                    let token = read_token(self.input, &mut self.pos)?;
                    stage.argv.push(token);
                }
            }
        }

        if stage.argv.is_empty() {
            stage.argv.push(Token::empty());
        }
        if stderr_follows_stdout {
            stage.stderr = stage.stdout.clone();
        }
        log::debug!(
            "stage {:?} stdin={} stdout={} stderr={} shared_out_err={}",
            stage.argv.iter().map(Token::to_string_lossy).collect::<Vec<_>>(),
            stage.stdin.is_explicit(),
            stage.stdout.is_explicit(),
            stage.stderr.is_explicit(),
            stage.stdout.shares(&stage.stderr),
        );
        Ok(stage)
    }

    /// `2` directly before `>` selects stderr only when the `2` is a word of
    /// its own: at the start of the statement, after whitespace or after `|`.
    fn targets_stderr(&self) -> bool {
        let pos = self.pos;
        pos > 0
            && self.input[pos - 1] == b'2'
            && (pos < 2 || is_space(self.input[pos - 2]) || self.input[pos - 2] == b'|')
    }

    fn redirect_output(&mut self, stage: &mut Stage, stderr_follows_stdout: &mut bool) -> Result<()> {
        let stream = if self.targets_stderr() {
            Stream::Stderr
        } else {
            Stream::Stdout
        };
        let mode = if self.peek(1) == Some(b'>') {
            RedirectMode::Append
        } else {
            RedirectMode::Truncate
        };
        self.pos += if mode == RedirectMode::Append { 2 } else { 1 };

        if stream == Stream::Stderr && self.input[self.pos..].starts_with(b"&1") {
            self.pos += 2;
            if stage.stdout.is_explicit() {
                stage.stderr = stage.stdout.clone();
            } else {
                stage.stderr = Target::Standard;
                *stderr_follows_stdout = true;
            }
            return Ok(());
        }

        let request = self.redirection(stream, mode)?;
        let fd = Target::File(request.open_replacing(stage)?.into());
        match stream {
            Stream::Stderr => {
                stage.stderr = fd;
                *stderr_follows_stdout = false;
            }
            _ => stage.stdout = fd,
        }
        Ok(())
    }

    fn redirect_input(&mut self, stage: &mut Stage) -> Result<()> {
        self.pos += 1;
        let request = self.redirection(Stream::Stdin, RedirectMode::Input)?;
        stage.stdin = Target::File(request.open_replacing(stage)?.into());
        Ok(())
    }

    /// Read the filename that must follow a redirection operator.
    fn redirection(&mut self, stream: Stream, mode: RedirectMode) -> Result<RedirectionRequest> {
        self.skip_spaces();
        match self.peek(0) {
            Some(c) if !is_separator(c) => {}
            _ => return Err(ShellError::MissingFilename(stream)),
        }
        let path = read_token(self.input, &mut self.pos)?;
        Ok(RedirectionRequest { stream, mode, path })
    }
}

impl RedirectionRequest {
    /// Release the stream's previous explicit target, then open the new file.
    ///
    /// A previous target shared with the other output stream stays open for
    /// that stream.
    fn open_replacing(&self, stage: &mut Stage) -> Result<std::os::fd::OwnedFd> {
        let slot = match self.stream {
            Stream::Stdin => &mut stage.stdin,
            Stream::Stdout => &mut stage.stdout,
            Stream::Stderr => &mut stage.stderr,
        };
        *slot = Target::Standard;
        self.open()
    }
}

impl Iterator for StageScanner<'_> {
    type Item = Result<Stage>;

    fn next(&mut self) -> Option<Result<Stage>> {
        if self.finished {
            return None;
        }
        let stage = self.scan_stage();
        if stage.is_err() {
            self.finished = true;
        }
        Some(stage)
    }
}

impl std::iter::FusedIterator for StageScanner<'_> {}

/// Resolve every stage of a statement up front. Files named by redirections
/// are opened as a side effect, exactly as when executing.
pub fn parse_statement(statement: &[u8], max_args: usize) -> Result<Vec<Stage>> {
    StageScanner::new(statement, max_args).collect()
}
