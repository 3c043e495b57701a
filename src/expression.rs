//! Expression Span Module for the template compiler
//!
//! Finds where an embedded host-language expression ends without parsing the
//! host language. Only bracket balance, quoting, and comments are understood.

use thiserror::Error;

/// Failure to find the end of an embedded expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpanError {
    /// End of input was reached while `open` (at char index `start`) was still unclosed.
    #[error("expression opened with '{open}' at offset {start} is never closed")]
    Unterminated { open: char, start: usize },
    /// A closing bracket did not match the innermost open bracket.
    #[error("'{found}' at offset {at} does not close '{open}'")]
    Mismatched { open: char, found: char, at: usize },
}

impl SpanError {
    /// Char index where scanning stopped.
    pub fn resume_at(&self, len: usize) -> usize {
        match self {
            SpanError::Unterminated { .. } => len,
            SpanError::Mismatched { at, .. } => *at + 1,
        }
    }
}

fn closer_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Skips a quoted literal starting at `i` (which holds the quote char).
/// Returns the index just past the closing quote, or `None` at end of input.
fn skip_quoted(chars: &[char], i: usize) -> Option<usize> {
    let quote = chars[i];
    // Verbatim strings (@"...") double the quote instead of escaping it.
    let verbatim = quote == '"' && i > 0 && chars[i - 1] == '@';
    let mut j = i + 1;
    while j < chars.len() {
        let c = chars[j];
        if verbatim {
            if c == '"' {
                if chars.get(j + 1) == Some(&'"') {
                    j += 2;
                    continue;
                }
                return Some(j + 1);
            }
        } else if c == '\\' {
            j += 2;
            continue;
        } else if c == quote {
            return Some(j + 1);
        }
        j += 1;
    }
    None
}

/// Skips a `//` or `/* */` comment starting at `i`. Returns `None` if `i` does
/// not start a comment.
fn skip_comment(chars: &[char], i: usize) -> Option<usize> {
    if chars.get(i) != Some(&'/') {
        return None;
    }
    match chars.get(i + 1) {
        Some('/') => {
            let mut j = i + 2;
            while j < chars.len() && chars[j] != '\n' {
                j += 1;
            }
            Some(j)
        }
        Some('*') => {
            let mut j = i + 2;
            while j + 1 < chars.len() {
                if chars[j] == '*' && chars[j + 1] == '/' {
                    return Some(j + 2);
                }
                j += 1;
            }
            Some(chars.len())
        }
        _ => None,
    }
}

/// Find the end of a balanced bracket group starting at `start`, which must
/// hold `(`, `[` or `{`. Returns the index after the matching close.
pub fn find_balanced_end(chars: &[char], start: usize) -> Result<usize, SpanError> {
    let open = chars[start];
    let mut stack = vec![open];
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];

        if c == '"' || c == '\'' {
            match skip_quoted(chars, i) {
                Some(end) => {
                    i = end;
                    continue;
                }
                None => return Err(SpanError::Unterminated { open, start }),
            }
        }

        if let Some(end) = skip_comment(chars, i) {
            i = end;
            continue;
        }

        if closer_for(c).is_some() {
            stack.push(c);
        } else if c == ')' || c == ']' || c == '}' {
            let innermost = stack.pop().unwrap_or(open);
            if closer_for(innermost) != Some(c) {
                return Err(SpanError::Mismatched {
                    open: innermost,
                    found: c,
                    at: i,
                });
            }
            if stack.is_empty() {
                return Ok(i + 1);
            }
        }

        i += 1;
    }

    Err(SpanError::Unterminated { open, start })
}

/// Extract the expression that follows an `@` whose next char is at `start`.
///
/// An opening bracket yields the whole balanced group. Otherwise the longest
/// identifier / member-access / call / indexer chain is taken, e.g.
/// `foo.Bar(x, y).Baz`. Returns `start` when no expression begins there.
pub fn extract_expression(chars: &[char], start: usize) -> Result<usize, SpanError> {
    match chars.get(start) {
        Some(&c) if closer_for(c).is_some() => return find_balanced_end(chars, start),
        Some(&c) if is_ident_start(c) => {}
        _ => return Ok(start),
    }

    let mut i = start;
    loop {
        while i < chars.len() && is_ident_char(chars[i]) {
            i += 1;
        }
        match chars.get(i) {
            Some('(') | Some('[') => {
                i = find_balanced_end(chars, i)?;
                // A call or indexer may be followed by further access.
                while matches!(chars.get(i), Some('(') | Some('[')) {
                    i = find_balanced_end(chars, i)?;
                }
                let member = chars.get(i + 1).copied().is_some_and(is_ident_start);
                if chars.get(i) == Some(&'.') && member {
                    i += 1;
                    continue;
                }
                return Ok(i);
            }
            Some('.') if chars.get(i + 1).copied().is_some_and(is_ident_start) => {
                i += 1;
            }
            _ => return Ok(i),
        }
    }
}

/// Scan one host statement in a code context: up to and including a `;` at
/// bracket depth zero, or up to (excluding) an unmatched `}`.
pub fn scan_statement(chars: &[char], start: usize) -> Result<usize, SpanError> {
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            i = skip_quoted(chars, i).ok_or(SpanError::Unterminated { open: c, start: i })?;
            continue;
        }
        if let Some(end) = skip_comment(chars, i) {
            i = end;
            continue;
        }
        match c {
            '(' | '[' | '{' => {
                i = find_balanced_end(chars, i)?;
                continue;
            }
            ';' => return Ok(i + 1),
            '}' => return Ok(i),
            _ => {}
        }
        i += 1;
    }
    Ok(i)
}
