use std::env;
use std::io::Write;
use std::path::PathBuf;

use nix::unistd::{getuid, User};

use crate::tokenizer::Token;
use crate::types::{Flow, Result, ShellError, ANSI_COLOR_BLUE, ANSI_COLOR_RESET};

/// Run `argv` inside the interpreter if it names a builtin.
/// Returns `None` for anything that has to be spawned.
pub fn dispatch(argv: &[Token]) -> Option<Result<Flow>> {
    let (program, args) = argv.split_first()?;
    match program.as_bytes() {
        // arguments are ignored, the exit status is always success
        b"exit" => Some(Ok(Flow::Quit)),
        b"cd" => Some(cd(args).map(|()| Flow::Continue)),
        _ => None,
    }
}

/// Change directory and keep `PWD` in sync. With no argument goes to
/// `$HOME`, or the user database entry when `HOME` is unset.
pub fn cd(args: &[Token]) -> Result<()> {
    let path = match args {
        [] => home_dir()?,
        [dir] => dir.as_path().to_path_buf(),
        _ => return Err(ShellError::CdTooManyArguments),
    };

    env::set_current_dir(&path).map_err(|source| ShellError::ChangeDir { path, source })?;

    let cwd = env::current_dir().map_err(ShellError::CurrentDir)?;
    log::debug!("cd -> {}", cwd.display());
    env::set_var("PWD", &cwd);
    Ok(())
}

fn home_dir() -> Result<PathBuf> {
    if let Some(home) = env::var_os("HOME") {
        return Ok(home.into());
    }
    match User::from_uid(getuid()) {
        Ok(Some(user)) => Ok(user.dir),
        _ => Err(ShellError::NoHomeDirectory),
    }
}

pub const FAREWELL: &str = "\nKTHNXBYE\n";

pub fn farewell() -> Result<()> {
    write_farewell(&mut std::io::stdout().lock())
}

pub fn write_farewell(out: &mut impl Write) -> Result<()> {
    write!(out, "{ANSI_COLOR_BLUE}{FAREWELL}{ANSI_COLOR_RESET}")?;
    out.flush()?;
    Ok(())
}

/// Written after every input line, once all of its statements ran.
pub fn end_line() -> Result<()> {
    write_line_break(&mut std::io::stdout().lock())
}

pub fn write_line_break(out: &mut impl Write) -> Result<()> {
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
