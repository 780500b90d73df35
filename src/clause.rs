//! Splitting of a single clause into its method name and arguments.

use crate::err::Result;
use crate::invalid_content;
use crate::scanner::{Skipped, skip_at};

/// A clause split into `method(args...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub method: String,
    /// Arguments in order with whitespace and comments collapsed to one space.
    /// Empty arguments are dropped.
    pub args: Vec<String>,
}

/// Accumulates one argument, collapsing whitespace/comment runs to a single space
/// and trimming both ends.
#[derive(Default)]
struct ArgBuilder {
    current: String,
    pending_space: bool,
}

impl ArgBuilder {
    fn space(&mut self) {
        self.pending_space = true;
    }

    fn push_str(&mut self, s: &str) {
        if self.pending_space && !self.current.is_empty() {
            self.current.push(' ');
        }
        self.pending_space = false;
        self.current.push_str(s);
    }

    fn finish(&mut self, args: &mut Vec<String>) {
        let arg = std::mem::take(&mut self.current);
        self.pending_space = false;
        if !arg.is_empty() {
            args.push(arg);
        }
    }
}

/// Parse one clause as produced by [`crate::scanner::SourceScanner`].
pub fn parse_clause(text: &str) -> Result<Clause> {
    let bytes = text.as_bytes();
    let mut i = skip_trivia(bytes, 0);

    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    let method = text[name_start..i].to_owned();

    // Only trivia may sit between the method name and its argument list.
    loop {
        match skip_at(bytes, i) {
            Some((Skipped::Quoted, _)) => {
                return Err(invalid_content!(
                    "unexpected literal before `(` in clause `{}`",
                    text
                ));
            }
            Some((_, end)) => {
                i = end;
                continue;
            }
            None => {}
        }
        match bytes.get(i) {
            Some(b'(') => {
                i += 1;
                break;
            }
            Some(b) if b.is_ascii_whitespace() => i += 1,
            Some(&b) => {
                return Err(invalid_content!(
                    "unexpected `{}` before `(` in clause `{}`",
                    b as char,
                    text
                ));
            }
            None => return Err(invalid_content!("clause `{}` has no argument list", text)),
        }
    }

    let mut args = Vec::new();
    let mut arg = ArgBuilder::default();
    let mut depth = 1usize;

    while i < bytes.len() {
        if let Some((kind, end)) = skip_at(bytes, i) {
            match kind {
                Skipped::Quoted => arg.push_str(&text[i..end]),
                Skipped::Comment | Skipped::Directive => arg.space(),
            }
            i = end;
            continue;
        }

        let b = bytes[i];
        match b {
            b'(' => {
                depth += 1;
                arg.push_str("(");
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    arg.finish(&mut args);
                    return Ok(Clause { method, args });
                }
                arg.push_str(")");
            }
            b',' if depth == 1 => arg.finish(&mut args),
            _ if b.is_ascii_whitespace() => arg.space(),
            _ => {
                // Copy a whole UTF-8 sequence at once.
                let len = utf8_len(b);
                let end = (i + len).min(bytes.len());
                arg.push_str(&text[i..end]);
                i = end;
                continue;
            }
        }
        i += 1;
    }

    Err(invalid_content!("clause `{}` is missing its closing `)`", text))
}

fn skip_trivia(bytes: &[u8], mut i: usize) -> usize {
    loop {
        match skip_at(bytes, i) {
            Some((Skipped::Comment, end)) | Some((Skipped::Directive, end)) => i = end,
            _ if i < bytes.len() && bytes[i].is_ascii_whitespace() => i += 1,
            _ => return i,
        }
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}
