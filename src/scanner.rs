//! Extraction of embedded schema clauses from raw C/C++ source text.
//!
//! The scanner is a plain cursor walk over the bytes. At every position the following
//! contexts are skipped, in this order of priority:
//! - block comments `/* ... */` (an unterminated one runs to the end of input)
//! - line comments `// ...`
//! - preprocessor lines `# ...`, which end at the newline or, if a block comment opens inside
//!   the line, where that comment closes
//! - double quoted literals, with `\` escaping the next byte
//!
//! A clause starts where the prefix literal matches outside of those contexts and ends at the
//! `)` closing its first top-level parenthesised group.

use log::trace;

use crate::err::Result;
use crate::invalid_content;

/// What kind of context was skipped by [`skip_at`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Skipped {
    Comment,
    Directive,
    Quoted,
}

/// If a skip context starts at `pos`, returns its kind and the position just after it.
pub(crate) fn skip_at(text: &[u8], pos: usize) -> Option<(Skipped, usize)> {
    match text.get(pos)? {
        b'/' => match text.get(pos + 1) {
            Some(b'*') => Some((Skipped::Comment, skip_block_comment(text, pos))),
            Some(b'/') => Some((Skipped::Comment, end_of_line(text, pos))),
            _ => None,
        },
        b'#' => Some((Skipped::Directive, skip_directive(text, pos))),
        b'"' => Some((Skipped::Quoted, skip_quoted(text, pos))),
        _ => None,
    }
}

fn skip_block_comment(text: &[u8], pos: usize) -> usize {
    let body = pos + 2;
    text.get(body..)
        .and_then(|rest| rest.windows(2).position(|w| w == b"*/"))
        .map(|p| body + p + 2)
        .unwrap_or(text.len())
}

fn end_of_line(text: &[u8], pos: usize) -> usize {
    text[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| pos + p)
        .unwrap_or(text.len())
}

fn skip_directive(text: &[u8], pos: usize) -> usize {
    let mut i = pos + 1;
    while i < text.len() {
        match text[i] {
            b'\n' => return i,
            b'/' if text.get(i + 1) == Some(&b'*') => return skip_block_comment(text, i),
            _ => i += 1,
        }
    }
    text.len()
}

fn skip_quoted(text: &[u8], pos: usize) -> usize {
    let mut i = pos + 1;
    while i < text.len() {
        match text[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    text.len()
}

/// 1-based line number of a byte offset, used for error messages.
pub(crate) fn line_of(text: &[u8], pos: usize) -> usize {
    text[..pos.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Yields successive clauses (the text following the prefix, up to and including the
/// matching `)`) from a source buffer.
pub struct SourceScanner<'a> {
    text: &'a str,
    prefix: &'a str,
    pos: usize,
}

impl<'a> SourceScanner<'a> {
    pub fn new(text: &'a str, prefix: &'a str) -> Self {
        SourceScanner {
            text,
            prefix,
            pos: 0,
        }
    }

    /// Returns the next clause in source order, or `None` at the end of input.
    pub fn next_clause(&mut self) -> Result<Option<&'a str>> {
        let bytes = self.text.as_bytes();
        let prefix = self.prefix.as_bytes();

        while self.pos < bytes.len() {
            if let Some((_, end)) = skip_at(bytes, self.pos) {
                self.pos = end;
                continue;
            }

            if !prefix.is_empty() && bytes[self.pos..].starts_with(prefix) {
                let start = self.pos + prefix.len();
                trace!("clause prefix at offset {}", self.pos);
                let end = self.find_group_end(start)?;
                self.pos = end;
                return Ok(Some(&self.text[start..end]));
            }

            self.pos += 1;
        }

        Ok(None)
    }

    /// Returns the position just after the `)` closing the first top-level group at or after `start`.
    fn find_group_end(&self, start: usize) -> Result<usize> {
        let bytes = self.text.as_bytes();
        let mut depth = 0usize;
        let mut i = start;

        while i < bytes.len() {
            if let Some((_, end)) = skip_at(bytes, i) {
                i = end;
                continue;
            }

            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    if depth == 0 {
                        return Err(invalid_content!(
                            "unexpected `)` before `(` in clause at line {}",
                            line_of(bytes, i)
                        ));
                    }
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i + 1);
                    }
                }
                _ => {}
            }
            i += 1;
        }

        if depth == 0 {
            Err(invalid_content!(
                "clause at line {} has no `(`",
                line_of(bytes, start)
            ))
        } else {
            Err(invalid_content!(
                "clause at line {} is missing its closing `)`",
                line_of(bytes, start)
            ))
        }
    }
}

impl<'a> Iterator for SourceScanner<'a> {
    type Item = Result<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_clause() {
            Ok(Some(clause)) => Some(Ok(clause)),
            Ok(None) => None,
            Err(e) => {
                // Stop after the first error.
                self.pos = self.text.len();
                Some(Err(e))
            }
        }
    }
}
