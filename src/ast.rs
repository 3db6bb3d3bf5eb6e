use std::fs::OpenOptions;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::rc::Rc;

use crate::tokenizer::Token;
use crate::types::{Result, ShellError, Stream};

/// Permission bits for newly created output files (rw-r--r--).
pub const OUTPUT_FILE_MODE: u32 = 0o644;

/// Where one of a stage's standard descriptors points.
///
/// `File` is reference counted: `2>&1` clones the stdout handle into stderr
/// so both streams share one open file description, and the descriptor is
/// closed once neither stream refers to it.
#[derive(Debug, Clone, Default)]
pub enum Target {
    #[default]
    Standard,
    File(Rc<OwnedFd>),
}

impl Target {
    pub fn is_explicit(&self) -> bool {
        matches!(self, Target::File(_))
    }

    pub fn fd(&self) -> Option<BorrowedFd<'_>> {
        match self {
            Target::Standard => None,
            Target::File(fd) => Some(fd.as_fd()),
        }
    }

    /// True when both targets are the same opened file.
    pub fn shares(&self, other: &Target) -> bool {
        match (self, other) {
            (Target::File(a), Target::File(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    Truncate, // >
    Append,   // >>
    Input,    // <
}

/// A parsed `>`, `>>`, `2>`, `2>>` or `<` with its filename, consumed as
/// soon as the file is opened.
#[derive(Debug)]
pub struct RedirectionRequest {
    pub stream: Stream,
    pub mode: RedirectMode,
    pub path: Token,
}

impl RedirectionRequest {
    pub fn open(&self) -> Result<OwnedFd> {
        let mut options = OpenOptions::new();
        match self.mode {
            RedirectMode::Input => options.read(true),
            RedirectMode::Truncate => options
                .write(true)
                .create(true)
                .truncate(true)
                .mode(OUTPUT_FILE_MODE),
            RedirectMode::Append => options
                .write(true)
                .create(true)
                .append(true)
                .mode(OUTPUT_FILE_MODE),
        };
        let path = self.path.as_path();
        options
            .open(path)
            .map(OwnedFd::from)
            .map_err(|source| ShellError::Redirect {
                stream: self.stream,
                path: path.to_path_buf(),
                source,
            })
    }
}

/// One pipeline segment: its argv and where its three standard streams go.
///
/// `argv` always holds at least the program name; an empty program name
/// means the stage only applies its redirections.
#[derive(Debug, Default)]
pub struct Stage {
    pub argv: Vec<Token>,
    pub stdin: Target,
    pub stdout: Target,
    pub stderr: Target,
}

impl Stage {
    pub fn program(&self) -> &[u8] {
        self.argv.first().map_or(&[][..], Token::as_bytes)
    }

    pub fn is_noop(&self) -> bool {
        self.program().is_empty()
    }
}
