use std::path::PathBuf;

use thiserror::Error;

/// Which standard stream a redirection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

impl Stream {
    pub fn operator(&self) -> &'static str {
        match self {
            Stream::Stdin => "<",
            Stream::Stdout | Stream::Stderr => ">",
        }
    }
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stream::Stdin => write!(f, "STDIN"),
            Stream::Stdout => write!(f, "STDOUT"),
            Stream::Stderr => write!(f, "STDERR"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Missing closing \"")]
    UnterminatedQuote,
    #[error("Nothing after \\")]
    TrailingEscape,
    #[error("out of memory")]
    OutOfMemory,
    #[error("word contains a NUL byte")]
    EmbeddedNul,
    #[error("Filename missing after {}", .0.operator())]
    MissingFilename(Stream),
    #[error("unexpected `{0}`")]
    UnexpectedSeparator(char),
    #[error("culprit = {stream} Redirection {}: {source}", .path.display())]
    Redirect {
        stream: Stream,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("culprit = Too Many Args (limit {limit})")]
    TooManyArguments { limit: usize },
    #[error("culprit = `cd` has atmost one argument.")]
    CdTooManyArguments,
    #[error("no home directory: HOME is unset and the user database has no entry")]
    NoHomeDirectory,
    #[error("cd {}: {source}", .path.display())]
    ChangeDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot determine working directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("pipe: {0}")]
    Pipe(#[source] nix::errno::Errno),
    #[error("fork: {0}")]
    Spawn(#[source] nix::errno::Errno),
    #[error("wait: {0}")]
    Wait(#[source] nix::errno::Errno),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ShellError {
    /// Resource exhaustion at statement setup ends the interpreter; every
    /// other error only abandons the rest of the current statement.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::OutOfMemory | ShellError::Pipe(_))
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;

/// What the read loop should do after a line or statement ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub const ANSI_COLOR_RED: &str = "\x1b[31m";
pub const ANSI_COLOR_GREEN: &str = "\x1b[32m";
pub const ANSI_COLOR_BLUE: &str = "\x1b[34m";
pub const ANSI_COLOR_RESET: &str = "\x1b[0m";

/// Write a diagnostic to stderr, colored so it stands apart from program output.
pub fn report(err: &ShellError) {
    eprintln!("{ANSI_COLOR_RED}ERROR: {err}{ANSI_COLOR_RESET}");
}
