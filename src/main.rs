use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use pipesh::types::{report, ANSI_COLOR_GREEN, ANSI_COLOR_RED, ANSI_COLOR_RESET};
use pipesh::{builtins, logging, Config, Executor, Flow};

fn main() -> Result<()> {
    let (config, problems) = Config::from_env();
    logging::init(config.log_level).context("failed to install logger")?;
    for problem in problems {
        log::warn!("{problem}");
    }

    let mut rl = DefaultEditor::new().context("failed to open line editor")?;
    let mut executor = Executor::new(config);
    let prompt = format!("{ANSI_COLOR_GREEN}$ {ANSI_COLOR_RESET}");

    loop {
        match rl.readline(&prompt) {
            Ok(line) => match executor.run_line(line) {
                Ok(Flow::Continue) => builtins::end_line().context("failed to write to stdout")?,
                Ok(Flow::Quit) => break,
                Err(e) => {
                    report(&e);
                    std::process::exit(libc::EXIT_FAILURE);
                }
            },
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => eprintln!("{ANSI_COLOR_RED}ERROR: {e}{ANSI_COLOR_RESET}"),
        }
    }

    builtins::farewell().context("failed to write farewell")?;
    Ok(())
}
