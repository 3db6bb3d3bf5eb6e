use bytes::Bytes;

use crate::tokenizer::QuoteState;

/// Lazily splits one input line into statements on bare `;`.
///
/// Zero-length statements (`;;`, a leading or trailing `;`) are skipped.
/// Each statement is a cheap slice of the original line.
#[derive(Debug, Clone)]
pub struct Statements {
    line: Bytes,
    start: usize,
    cursor: usize,
    quotes: QuoteState,
}

impl Statements {
    pub fn new(line: impl Into<Bytes>) -> Self {
        let mut line = line.into();
        // the newline is never part of a command
        if line.last() == Some(&b'\n') {
            line.truncate(line.len() - 1);
        }
        Statements {
            line,
            start: 0,
            cursor: 0,
            quotes: QuoteState::default(),
        }
    }
}

impl Iterator for Statements {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        while self.cursor < self.line.len() {
            let i = self.cursor;
            self.cursor += 1;
            if self.quotes.feed(self.line[i]) && self.line[i] == b';' {
                let start = std::mem::replace(&mut self.start, i + 1);
                if i > start {
                    return Some(self.line.slice(start..i));
                }
            }
        }

        // remainder after the last `;`
        if self.start < self.line.len() {
            let start = std::mem::replace(&mut self.start, self.line.len());
            return Some(self.line.slice(start..));
        }
        None
    }
}

impl std::iter::FusedIterator for Statements {}
