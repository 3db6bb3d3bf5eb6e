use std::fs;

use tempfile::TempDir;

use super::words;
use crate::parser::{parse_statement, StageScanner};
use crate::types::{ShellError, Stream};

const MAX: usize = 1000;

#[test]
fn test_single_stage() -> Result<(), ShellError> {
    let stages = parse_statement(b"ls -l /tmp", MAX)?;
    assert_eq!(stages.len(), 1);
    assert_eq!(words(&stages[0]), vec!["ls", "-l", "/tmp"]);
    assert_eq!(stages[0].program(), b"ls");
    assert_eq!(stages[0].argv.len(), 3);
    assert!(!stages[0].stdin.is_explicit());
    assert!(!stages[0].stdout.is_explicit());
    assert!(!stages[0].stderr.is_explicit());
    Ok(())
}

#[test]
fn test_stages_split_on_bare_pipe() -> Result<(), ShellError> {
    let stages = parse_statement(b"cat f | grep x|wc -l", MAX)?;
    let argvs: Vec<_> = stages.iter().map(words).collect();
    assert_eq!(argvs, vec![vec!["cat", "f"], vec!["grep", "x"], vec!["wc", "-l"]]);
    Ok(())
}

#[test]
fn test_quoted_and_escaped_pipes_are_words() -> Result<(), ShellError> {
    let stages = parse_statement(br#"echo "a|b""#, MAX)?;
    assert_eq!(stages.len(), 1);
    assert_eq!(words(&stages[0]), vec!["echo", "a|b"]);

    let stages = parse_statement(br"echo a\|b", MAX)?;
    assert_eq!(stages.len(), 1);
    assert_eq!(words(&stages[0]), vec!["echo", "a|b"]);
    Ok(())
}

#[test]
fn test_stage_count_matches_pipe_count() -> Result<(), ShellError> {
    assert_eq!(parse_statement(b"", MAX)?.len(), 1);
    assert_eq!(parse_statement(b"|", MAX)?.len(), 2);
    assert_eq!(parse_statement(b"echo hi |", MAX)?.len(), 2);
    assert_eq!(parse_statement(b"a||b", MAX)?.len(), 3);
    Ok(())
}

#[test]
fn test_missing_program_is_empty_name() -> Result<(), ShellError> {
    let stages = parse_statement(b"echo hi | ", MAX)?;
    assert!(!stages[0].is_noop());
    assert!(stages[1].is_noop());
    assert_eq!(stages[1].program(), b"");

    let stages = parse_statement(br#""""#, MAX)?;
    assert!(stages[0].is_noop());
    Ok(())
}

#[test]
fn test_output_redirections() -> Result<(), ShellError> {
    let dir = TempDir::new()?;
    let out = dir.path().join("out");
    let statement = format!("echo hello > {}", out.display());
    let stages = parse_statement(statement.as_bytes(), MAX)?;
    assert_eq!(words(&stages[0]), vec!["echo", "hello"]);
    assert!(stages[0].stdout.is_explicit());
    assert!(!stages[0].stderr.is_explicit());
    // opening creates the file
    assert!(out.exists());
    Ok(())
}

#[test]
fn test_redirection_truncates_on_open() -> Result<(), ShellError> {
    let dir = TempDir::new()?;
    let out = dir.path().join("out");
    fs::write(&out, "old content")?;
    parse_statement(format!("x >{}", out.display()).as_bytes(), MAX)?;
    assert_eq!(fs::read_to_string(&out)?, "");

    fs::write(&out, "keep")?;
    parse_statement(format!("x >>{}", out.display()).as_bytes(), MAX)?;
    assert_eq!(fs::read_to_string(&out)?, "keep");
    Ok(())
}

#[test]
fn test_new_output_file_mode() -> Result<(), ShellError> {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new()?;
    let out = dir.path().join("out");
    parse_statement(format!("x > {}", out.display()).as_bytes(), MAX)?;
    let mode = fs::metadata(&out)?.permissions().mode() & 0o777;
    // the process umask can only remove bits
    assert_eq!(mode & !0o644, 0);
    Ok(())
}

#[test]
fn test_stderr_selector_must_be_its_own_word() -> Result<(), ShellError> {
    let dir = TempDir::new()?;
    let p = dir.path().join("p");
    let p = p.display();

    let stages = parse_statement(format!("cmd 2> {p}").as_bytes(), MAX)?;
    assert_eq!(words(&stages[0]), vec!["cmd"]);
    assert!(stages[0].stderr.is_explicit());
    assert!(!stages[0].stdout.is_explicit());

    let stages = parse_statement(format!("2>{p} cmd").as_bytes(), MAX)?;
    assert_eq!(words(&stages[0]), vec!["cmd"]);
    assert!(stages[0].stderr.is_explicit());

    let stages = parse_statement(format!("a|2> {p}").as_bytes(), MAX)?;
    assert!(stages[1].is_noop());
    assert!(stages[1].stderr.is_explicit());

    let stages = parse_statement(format!("cmd 2x> {p}").as_bytes(), MAX)?;
    assert_eq!(words(&stages[0]), vec!["cmd", "2x"]);
    assert!(stages[0].stdout.is_explicit());
    assert!(!stages[0].stderr.is_explicit());

    let stages = parse_statement(format!("cmd a2> {p}").as_bytes(), MAX)?;
    assert_eq!(words(&stages[0]), vec!["cmd", "a2"]);
    assert!(stages[0].stdout.is_explicit());
    assert!(!stages[0].stderr.is_explicit());

    let stages = parse_statement(format!("cmd 12> {p}").as_bytes(), MAX)?;
    assert_eq!(words(&stages[0]), vec!["cmd", "12"]);
    assert!(stages[0].stdout.is_explicit());

    let stages = parse_statement(format!("cmd 1> {p}").as_bytes(), MAX)?;
    assert_eq!(words(&stages[0]), vec!["cmd"]);
    assert!(stages[0].stdout.is_explicit());
    Ok(())
}

#[test]
fn test_bare_digits_are_arguments() -> Result<(), ShellError> {
    let stages = parse_statement(b"head -n 2 1", MAX)?;
    assert_eq!(words(&stages[0]), vec!["head", "-n", "2", "1"]);
    Ok(())
}

#[test]
fn test_stderr_alias_shares_stdout_file() -> Result<(), ShellError> {
    let dir = TempDir::new()?;
    let out = dir.path().join("out");
    let stages = parse_statement(format!("cmd > {} 2>&1", out.display()).as_bytes(), MAX)?;
    assert!(stages[0].stderr.is_explicit());
    assert!(stages[0].stdout.shares(&stages[0].stderr));
    assert_eq!(words(&stages[0]), vec!["cmd"]);
    Ok(())
}

#[test]
fn test_stderr_alias_before_stdout_redirect() -> Result<(), ShellError> {
    let dir = TempDir::new()?;
    let out = dir.path().join("out");
    let stages = parse_statement(format!("cmd 2>&1 1>{}", out.display()).as_bytes(), MAX)?;
    assert!(stages[0].stdout.shares(&stages[0].stderr));
    Ok(())
}

#[test]
fn test_stderr_alias_without_stdout_redirect_inherits() -> Result<(), ShellError> {
    let stages = parse_statement(b"cmd 2>&1", MAX)?;
    assert_eq!(words(&stages[0]), vec!["cmd"]);
    assert!(!stages[0].stderr.is_explicit());
    Ok(())
}

#[test]
fn test_stderr_alias_keeps_earlier_file() -> Result<(), ShellError> {
    let dir = TempDir::new()?;
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    let statement = format!("cmd > {} 2>&1 > {}", a.display(), b.display());
    let stages = parse_statement(statement.as_bytes(), MAX)?;
    assert!(stages[0].stdout.is_explicit());
    assert!(stages[0].stderr.is_explicit());
    assert!(!stages[0].stdout.shares(&stages[0].stderr));
    Ok(())
}

#[test]
fn test_later_stderr_redirect_replaces_alias() -> Result<(), ShellError> {
    let dir = TempDir::new()?;
    let a = dir.path().join("a");
    let e = dir.path().join("e");
    let statement = format!("cmd 2>&1 2> {} > {}", e.display(), a.display());
    let stages = parse_statement(statement.as_bytes(), MAX)?;
    assert!(stages[0].stderr.is_explicit());
    assert!(!stages[0].stdout.shares(&stages[0].stderr));
    Ok(())
}

#[test]
fn test_stdout_ampersand_is_a_filename() -> Result<(), ShellError> {
    let dir = TempDir::new()?;
    let cwd = std::env::current_dir()?;
    let _guard = super::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_current_dir(dir.path())?;
    let result = parse_statement(b"cmd >&1", MAX);
    std::env::set_current_dir(cwd)?;
    assert!(result?[0].stdout.is_explicit());
    assert!(dir.path().join("&1").exists());
    Ok(())
}

#[test]
fn test_input_redirection() -> Result<(), ShellError> {
    let dir = TempDir::new()?;
    let input = dir.path().join("in");
    fs::write(&input, "data")?;
    let stages = parse_statement(format!("cat < {}", input.display()).as_bytes(), MAX)?;
    assert!(stages[0].stdin.is_explicit());
    assert_eq!(words(&stages[0]), vec!["cat"]);
    Ok(())
}

#[test]
fn test_missing_filename() {
    let err = parse_statement(b"echo hello >", MAX).unwrap_err();
    assert!(matches!(err, ShellError::MissingFilename(Stream::Stdout)));

    let err = parse_statement(b"echo hello 2>   ", MAX).unwrap_err();
    assert!(matches!(err, ShellError::MissingFilename(Stream::Stderr)));

    let err = parse_statement(b"cat <", MAX).unwrap_err();
    assert!(matches!(err, ShellError::MissingFilename(Stream::Stdin)));

    let err = parse_statement(b"echo > | cat", MAX).unwrap_err();
    assert!(matches!(err, ShellError::MissingFilename(Stream::Stdout)));

    let err = parse_statement(b"echo > > f", MAX).unwrap_err();
    assert!(matches!(err, ShellError::MissingFilename(Stream::Stdout)));
}

#[test]
fn test_single_character_filename_at_end() -> Result<(), ShellError> {
    let dir = TempDir::new()?;
    let cwd = std::env::current_dir()?;
    let _guard = super::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_current_dir(dir.path())?;
    let result = parse_statement(b"echo >f", MAX);
    std::env::set_current_dir(cwd)?;
    assert!(result?[0].stdout.is_explicit());
    Ok(())
}

#[test]
fn test_open_failure_is_reported() {
    let err = parse_statement(b"cat < /nonexistent/pipesh/input", MAX).unwrap_err();
    match err {
        ShellError::Redirect { stream, path, .. } => {
            assert_eq!(stream, Stream::Stdin);
            assert_eq!(path, std::path::Path::new("/nonexistent/pipesh/input"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let err = parse_statement(b"echo hi > /dev/null/file", MAX).unwrap_err();
    assert!(matches!(err, ShellError::Redirect { stream: Stream::Stdout, .. }));
}

#[test]
fn test_too_many_arguments() -> Result<(), ShellError> {
    assert_eq!(parse_statement(b"a b c", 3)?[0].argv.len(), 3);

    let err = parse_statement(b"a b c d", 3).unwrap_err();
    assert!(matches!(err, ShellError::TooManyArguments { limit: 3 }));
    Ok(())
}

#[test]
fn test_tokenizer_errors_surface() {
    let err = parse_statement(br#"echo "abc"#, MAX).unwrap_err();
    assert!(matches!(err, ShellError::UnterminatedQuote));

    let err = parse_statement(br"echo abc\", MAX).unwrap_err();
    assert!(matches!(err, ShellError::TrailingEscape));
}

#[test]
fn test_bare_semicolon_is_rejected() {
    let err = parse_statement(b"a ; b", MAX).unwrap_err();
    assert!(matches!(err, ShellError::UnexpectedSeparator(';')));
}

#[test]
fn test_scanner_is_lazy_and_stops_after_error() {
    let mut scanner = StageScanner::new(br#"echo ok | echo "bad | echo never"#, MAX);
    let first = scanner.next().unwrap().unwrap();
    assert_eq!(words(&first), vec!["echo", "ok"]);
    assert!(matches!(scanner.next(), Some(Err(ShellError::UnterminatedQuote))));
    assert!(scanner.next().is_none());
}
