use std::os::fd::{AsRawFd, BorrowedFd, RawFd};

use nix::errno::Errno;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, dup2, execvp, fork, ForkResult, Pid};

use crate::tokenizer::Token;
use crate::types::{Result, ShellError, ANSI_COLOR_RED, ANSI_COLOR_RESET};

/// Descriptors a spawned program should see as fd 0, 1 and 2.
/// `None` inherits the interpreter's own descriptor.
///
/// Two slots holding the same descriptor are an alias (`2>&1`).
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioBindings<'a> {
    pub stdin: Option<BorrowedFd<'a>>,
    pub stdout: Option<BorrowedFd<'a>>,
    pub stderr: Option<BorrowedFd<'a>>,
}

/// Launches a program with its standard descriptors bound, and waits for it.
///
/// An empty program name must still produce a child that applies its
/// bindings and succeeds without running anything.
pub trait Spawner {
    type Child;

    fn spawn(&mut self, argv: &[Token], stdio: StdioBindings<'_>) -> Result<Self::Child>;

    /// Block until the child ends; returns its exit status
    /// (128 + signal number when it was killed by a signal).
    fn wait(&mut self, child: Self::Child) -> Result<i32>;
}

/// `fork` + `dup2` + `execvp`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForkExec;

impl Spawner for ForkExec {
    type Child = Pid;

    fn spawn(&mut self, argv: &[Token], stdio: StdioBindings<'_>) -> Result<Pid> {
        // SAFETY: the child only rewires descriptors before exec or _exit.
        match unsafe { fork() }.map_err(ShellError::Spawn)? {
            ForkResult::Parent { child } => {
                log::debug!("spawned pid {child} for {:?}", argv.first().map(Token::to_string_lossy));
                Ok(child)
            }
            ForkResult::Child => exec_child(argv, stdio),
        }
    }

    fn wait(&mut self, child: Pid) -> Result<i32> {
        loop {
            match syscall(|| waitpid(child, None)) {
                Ok(WaitStatus::Exited(_, code)) => {
                    log::debug!("pid {child} exited with {code}");
                    return Ok(code);
                }
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    log::debug!("pid {child} killed by {sig}");
                    return Ok(128 + sig as i32);
                }
                Ok(_) => (),
                Err(e) => return Err(ShellError::Wait(e)),
            }
        }
    }
}

/// Retry a system call interrupted by a signal.
fn syscall<F, T>(f: F) -> nix::Result<T>
where
    F: Fn() -> nix::Result<T>,
{
    loop {
        match f() {
            Err(Errno::EINTR) => (),
            result => return result,
        }
    }
}

/// Runs in the forked child; never returns.
fn exec_child(argv: &[Token], stdio: StdioBindings<'_>) -> ! {
    // The interpreter ignores SIGPIPE; programs expect the default.
    // SAFETY: resetting to the default disposition installs no handler.
    let _ = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) };

    if let Err(e) = rewire(&stdio) {
        child_exit_error("", e);
    }

    let Some(program) = argv.first().filter(|p| !p.is_empty()) else {
        // nothing to run, the redirections already happened
        // SAFETY: _exit skips the parent's atexit handlers and buffers.
        unsafe { libc::_exit(libc::EXIT_SUCCESS) }
    };

    match execvp(program.as_c_str(), argv) {
        Ok(never) => match never {},
        Err(e) => child_exit_error(&program.to_string_lossy(), e),
    }
}

/// Substitute each bound descriptor into 0, 1, 2 in order, closing the
/// original unless a later slot still needs it.
fn rewire(stdio: &StdioBindings<'_>) -> nix::Result<()> {
    let slots: [(Option<RawFd>, RawFd); 3] = [
        (stdio.stdin.map(|fd| fd.as_raw_fd()), libc::STDIN_FILENO),
        (stdio.stdout.map(|fd| fd.as_raw_fd()), libc::STDOUT_FILENO),
        (stdio.stderr.map(|fd| fd.as_raw_fd()), libc::STDERR_FILENO),
    ];
    for (i, &(source, target)) in slots.iter().enumerate() {
        let Some(source) = source else { continue };
        syscall(|| dup2(source, target))?;
        let shared = slots[i + 1..].iter().any(|&(later, _)| later == Some(source));
        if !shared && source > libc::STDERR_FILENO {
            syscall(|| unistd::close(source))?;
        }
    }
    Ok(())
}

fn child_exit_error(program: &str, e: Errno) -> ! {
    let msg = if program.is_empty() {
        format!("{ANSI_COLOR_RED}ERROR : {}\n{ANSI_COLOR_RESET}", e.desc())
    } else {
        format!("{ANSI_COLOR_RED}ERROR : {program}: {}\n{ANSI_COLOR_RESET}", e.desc())
    };
    let _ = unistd::write(libc::STDERR_FILENO, msg.as_bytes());
    // SAFETY: see exec_child
    unsafe { libc::_exit(libc::EXIT_FAILURE) }
}
