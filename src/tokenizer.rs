use std::ffi::{CStr, CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::types::{Result, ShellError};

/// Same set as C `isspace`.
pub fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

/// Characters that end an unquoted word.
pub fn is_separator(c: u8) -> bool {
    is_space(c) || matches!(c, b'<' | b'>' | b'|' | b';')
}

/// One resolved word: quotes removed, escapes applied, NUL-terminated so it
/// can be handed to `execvp` as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(CString);

impl Token {
    pub fn empty() -> Self {
        Token(CString::default())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_c_str(&self) -> &CStr {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(OsStr::from_bytes(self.as_bytes()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_bytes().is_empty()
    }

    pub fn to_string_lossy(&self) -> String {
        self.0.to_string_lossy().into_owned()
    }
}

impl AsRef<CStr> for Token {
    fn as_ref(&self) -> &CStr {
        &self.0
    }
}

/// Character-by-character quote/escape tracker.
///
/// A `"` toggles quoting, a `\` escapes exactly the next character whether
/// quoted or not. Used for the lightweight scans that run before a statement
/// is tokenized (statement splitting, pipe counting).
#[derive(Debug, Default, Clone, Copy)]
pub struct QuoteState {
    in_quotes: bool,
    escaped: bool,
}

impl QuoteState {
    /// Feed one character; true when it is neither quoted nor escaped and
    /// therefore may act as a structural character.
    pub fn feed(&mut self, c: u8) -> bool {
        if self.escaped {
            self.escaped = false;
            false
        } else if c == b'"' {
            self.in_quotes = !self.in_quotes;
            false
        } else if c == b'\\' {
            self.escaped = true;
            false
        } else {
            !self.in_quotes
        }
    }
}

/// Positions of every bare occurrence of `needle` in `input`.
pub fn bare_positions(input: &[u8], needle: u8) -> impl Iterator<Item = usize> + '_ {
    let mut state = QuoteState::default();
    input
        .iter()
        .enumerate()
        .filter_map(move |(i, &c)| (state.feed(c) && c == needle).then_some(i))
}

/// Extract one word starting at `*pos` and advance `*pos` past it.
///
/// Scanning stops at the first unquoted separator. A zero-length span (such
/// as `""`) yields an empty token. On error `*pos` is left unspecified.
pub fn read_token(input: &[u8], pos: &mut usize) -> Result<Token> {
    // First pass: find where the word ends and how long it resolves to.
    let mut end = *pos;
    let mut text_len = 0;
    let mut in_quotes = false;
    while end < input.len() {
        let c = input[end];
        if !in_quotes && is_separator(c) {
            break;
        }
        match c {
            b'"' => in_quotes = !in_quotes,
            b'\\' => {
                if end + 1 == input.len() {
                    return Err(ShellError::TrailingEscape);
                }
                text_len += 1;
                end += 1;
            }
            _ => text_len += 1,
        }
        end += 1;
    }

    if in_quotes {
        return Err(ShellError::UnterminatedQuote);
    }

    let mut text = Vec::new();
    text.try_reserve_exact(text_len + 1)
        .map_err(|_| ShellError::OutOfMemory)?;

    // Second pass: copy the resolved characters.
    while *pos < end {
        match input[*pos] {
            b'"' => *pos += 1,
            b'\\' => {
                text.push(input[*pos + 1]);
                *pos += 2;
            }
            c => {
                text.push(c);
                *pos += 1;
            }
        }
    }

    log::trace!("token {:?}", String::from_utf8_lossy(&text));
    CString::new(text)
        .map(Token)
        .map_err(|_| ShellError::EmbeddedNul)
}
