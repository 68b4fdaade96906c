//! Content line lexer for iCalendar (RFC 5545 §3.1).
//!
//! Handles line unfolding and tokenization of content lines.

use std::iter::Peekable;
use std::str::CharIndices;

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{ContentLine, Parameter};

/// Incremental unfolder fed one physical line at a time.
///
/// A logical line is only complete once the next non-continuation line
/// arrives (or input ends), so `push` returns the *previous* logical line.
#[derive(Debug, Default)]
pub struct LineUnfolder {
    pending: Option<(usize, String)>,
    physical: usize,
}

impl LineUnfolder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one physical line (without its terminator; a trailing `\r` is
    /// tolerated). Returns the logical line it completed, with the 1-based
    /// number of its first physical line.
    pub fn push(&mut self, raw_line: &str) -> Option<(usize, String)> {
        self.physical += 1;
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() {
            return None;
        }

        if let Some(continuation) = line.strip_prefix([' ', '\t']) {
            // RFC 5545 §3.1: remove CRLF + single whitespace character
            return self.append(continuation);
        }
        if !line.contains(':') && self.pending.is_some() {
            // Lenient: a colon-less line continues the previous one.
            return self.append(line);
        }

        self.pending.replace((self.physical, line.to_string()))
    }

    /// Flushes the last logical line once the input is exhausted.
    pub fn finish(&mut self) -> Option<(usize, String)> {
        self.pending.take()
    }

    fn append(&mut self, text: &str) -> Option<(usize, String)> {
        match self.pending.as_mut() {
            Some((_, prev)) => prev.push_str(text),
            None => self.pending = Some((self.physical, text.to_string())),
        }
        None
    }
}

/// Splits input into content lines, merging folded continuations.
///
/// Handles both CRLF and bare LF line endings.
#[must_use]
pub fn split_lines(input: &str) -> Vec<(usize, String)> {
    let mut unfolder = LineUnfolder::new();
    let mut lines: Vec<(usize, String)> = input
        .lines()
        .filter_map(|raw| unfolder.push(raw))
        .collect();
    lines.extend(unfolder.finish());
    lines
}

/// Parses a single content line.
///
/// Format: `name *(";" param) ":" value`
///
/// ## Errors
/// Returns an error if the line is malformed or contains invalid characters.
pub fn parse_content_line(line: &str, line_num: usize) -> ParseResult<ContentLine> {
    let mut chars = line.char_indices().peekable();
    let mut name_end = None;

    while let Some(&(i, c)) = chars.peek() {
        if c == ';' || c == ':' {
            name_end = Some(i);
            break;
        }
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' {
            return Err(ParseError::new(
                ParseErrorKind::InvalidPropertyName,
                line_num,
                i + 1,
            ));
        }
        chars.next();
    }

    let name_end = match name_end {
        Some(0) => {
            return Err(ParseError::new(
                ParseErrorKind::MissingPropertyName,
                line_num,
                1,
            ));
        }
        Some(end) => end,
        None => {
            return Err(ParseError::new(
                ParseErrorKind::MissingColon,
                line_num,
                line.len(),
            ));
        }
    };
    let name = line[..name_end].to_ascii_uppercase();

    let mut params = Vec::new();
    let colon_pos = match chars.next() {
        Some((i, ':')) => i,
        _ => loop {
            let (param, colon) = parse_parameter(&mut chars, line, line_num)?;
            params.push(param);
            if let Some(pos) = colon {
                break pos;
            }
        },
    };

    Ok(ContentLine {
        name,
        params,
        raw_value: line[colon_pos + 1..].to_string(),
    })
}

/// Parses a single parameter from the character stream.
///
/// Returns the parameter and, when it was the last one, the byte index of the
/// colon that ends the parameter list.
fn parse_parameter(
    chars: &mut Peekable<CharIndices<'_>>,
    line: &str,
    line_num: usize,
) -> ParseResult<(Parameter, Option<usize>)> {
    let start = chars.peek().map_or(line.len(), |&(i, _)| i);

    let mut name_end = start;
    while let Some(&(i, c)) = chars.peek() {
        if c == '=' {
            name_end = i;
            chars.next();
            break;
        }
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' {
            return Err(ParseError::new(
                ParseErrorKind::InvalidParameter,
                line_num,
                i + 1,
            ));
        }
        chars.next();
    }

    if name_end == start {
        return Err(ParseError::new(
            ParseErrorKind::InvalidParameter,
            line_num,
            start + 1,
        ));
    }

    let param_name = &line[start..name_end];

    let mut values = Vec::new();
    loop {
        values.push(parse_param_value(chars, line, line_num)?);

        match chars.next() {
            Some((_, ',')) => {}
            Some((_, ';')) => return Ok((Parameter::with_values(param_name, values), None)),
            Some((i, ':')) => return Ok((Parameter::with_values(param_name, values), Some(i))),
            Some((i, c)) => {
                return Err(
                    ParseError::new(ParseErrorKind::InvalidParameter, line_num, i + 1)
                        .with_context(format!("unexpected character '{c}'")),
                );
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::MissingColon,
                    line_num,
                    line.len(),
                ));
            }
        }
    }
}

/// Parses a parameter value (possibly quoted, RFC 6868 caret escapes inside quotes).
fn parse_param_value(
    chars: &mut Peekable<CharIndices<'_>>,
    line: &str,
    line_num: usize,
) -> ParseResult<String> {
    let Some(&(start, first)) = chars.peek() else {
        return Err(ParseError::new(
            ParseErrorKind::InvalidParameter,
            line_num,
            line.len(),
        ));
    };

    if first != '"' {
        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            if c == ',' || c == ';' || c == ':' {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }
        return Ok(line[start..end].to_string());
    }

    chars.next();
    let mut value = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '"' => return Ok(value),
            '^' => match chars.peek().map(|&(_, next)| next) {
                Some('^') => {
                    value.push('^');
                    chars.next();
                }
                Some('n') => {
                    value.push('\n');
                    chars.next();
                }
                Some('\'') => {
                    value.push('"');
                    chars.next();
                }
                _ => value.push('^'),
            },
            _ => value.push(c),
        }
    }

    Err(ParseError::new(
        ParseErrorKind::UnclosedQuote,
        line_num,
        start + 1,
    ))
}
