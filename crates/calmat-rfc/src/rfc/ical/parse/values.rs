//! Value type parsers for iCalendar (RFC 5545 §3.3).

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{Date, DateTime, DateTimeForm, Duration, UtcOffset};

/// Parses a fixed-width run of ASCII digits.
fn digits<T: std::str::FromStr>(
    s: &str,
    kind: ParseErrorKind,
    line: usize,
    col: usize,
) -> ParseResult<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::new(kind, line, col));
    }
    s.parse::<T>().map_err(|_e| ParseError::new(kind, line, col))
}

/// Parses a DATE value (RFC 5545 §3.3.4).
///
/// Format: YYYYMMDD (e.g., "19970714")
///
/// ## Errors
/// Returns an error if the string is not a valid 8-digit date.
pub fn parse_date(s: &str, line: usize, col: usize) -> ParseResult<Date> {
    let kind = ParseErrorKind::InvalidDate;
    if s.len() != 8 || !s.is_ascii() {
        return Err(ParseError::new(kind, line, col).with_context(format!("'{s}'")));
    }

    let year = digits::<u16>(&s[0..4], kind, line, col)?;
    let month = digits::<u8>(&s[4..6], kind, line, col)?;
    let day = digits::<u8>(&s[6..8], kind, line, col)?;

    let date = Date { year, month, day };
    if date.to_naive().is_none() {
        return Err(ParseError::new(kind, line, col).with_context(format!("'{s}'")));
    }
    Ok(date)
}

/// Parses a TIME value (RFC 5545 §3.3.12) into `(hour, minute, second, is_utc)`.
fn parse_time(s: &str, line: usize, col: usize) -> ParseResult<(u8, u8, u8, bool)> {
    let kind = ParseErrorKind::InvalidTime;
    let (time_str, is_utc) = match s.strip_suffix(['Z', 'z']) {
        Some(stripped) => (stripped, true),
        None => (s, false),
    };

    if time_str.len() != 6 || !time_str.is_ascii() {
        return Err(ParseError::new(kind, line, col));
    }

    let hour = digits::<u8>(&time_str[0..2], kind, line, col)?;
    let minute = digits::<u8>(&time_str[2..4], kind, line, col)?;
    let second = digits::<u8>(&time_str[4..6], kind, line, col)?;

    // 60 is a leap second
    if hour > 23 || minute > 59 || second > 60 {
        return Err(ParseError::new(kind, line, col));
    }

    Ok((hour, minute, second, is_utc))
}

/// Parses a DATE-TIME value (RFC 5545 §3.3.5).
///
/// Format: YYYYMMDD"T"HHMMSS[Z] (e.g., "19970714T133000Z").
/// TZID comes from the property parameter; a `Z` suffix wins over it.
///
/// ## Errors
/// Returns an error if the string is not a valid datetime format.
pub fn parse_datetime(
    s: &str,
    tzid: Option<&str>,
    line: usize,
    col: usize,
) -> ParseResult<DateTime> {
    let t_pos = s.find(['T', 't']).ok_or_else(|| {
        ParseError::new(ParseErrorKind::InvalidDateTime, line, col)
            .with_context(format!("'{s}'"))
    })?;

    let date = parse_date(&s[..t_pos], line, col)?;
    let (hour, minute, second, is_utc) = parse_time(&s[t_pos + 1..], line, col + t_pos + 1)?;

    let form = match (is_utc, tzid) {
        (true, _) => DateTimeForm::Utc,
        (false, Some(tz)) => DateTimeForm::Zoned {
            tzid: tz.to_string(),
        },
        (false, None) => DateTimeForm::Floating,
    };

    Ok(DateTime {
        year: date.year,
        month: date.month,
        day: date.day,
        hour,
        minute,
        second,
        form,
    })
}

/// Parses a UTC-OFFSET value (RFC 5545 §3.3.14).
///
/// Format: (+|-)HHMM[SS] (e.g., "+0530", "-0800")
///
/// ## Errors
/// Returns an error if the string is not a valid UTC offset format.
pub fn parse_utc_offset(s: &str, line: usize, col: usize) -> ParseResult<UtcOffset> {
    let kind = ParseErrorKind::InvalidUtcOffset;
    if (s.len() != 5 && s.len() != 7) || !s.is_ascii() {
        return Err(ParseError::new(kind, line, col));
    }

    let sign = match s.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(ParseError::new(kind, line, col)),
    };

    let hours = digits::<i32>(&s[1..3], kind, line, col)?;
    let minutes = digits::<i32>(&s[3..5], kind, line, col)?;
    let seconds = if s.len() == 7 {
        digits::<i32>(&s[5..7], kind, line, col)?
    } else {
        0
    };

    if minutes > 59 || seconds > 59 {
        return Err(ParseError::new(kind, line, col));
    }

    Ok(UtcOffset::from_seconds(
        sign * (hours * 3600 + minutes * 60 + seconds),
    ))
}

/// Parses a DURATION value (RFC 5545 §3.3.6).
///
/// Format: [+|-]P[nW] or [+|-]P[nD][T[nH][nM][nS]]
///
/// ## Errors
/// Returns an error if the string is not a valid duration format.
pub fn parse_duration(s: &str, line: usize, col: usize) -> ParseResult<Duration> {
    let err = || {
        ParseError::new(ParseErrorKind::InvalidDuration, line, col).with_context(format!("'{s}'"))
    };
    let mut dur = Duration::zero();

    let unsigned = match s.as_bytes().first() {
        Some(b'-') => {
            dur.negative = true;
            &s[1..]
        }
        Some(b'+') => &s[1..],
        _ => s,
    };
    let body = unsigned
        .strip_prefix(['P', 'p'])
        .ok_or_else(err)?
        .to_ascii_uppercase();
    if body.is_empty() {
        return Err(err());
    }

    let mut in_time = false;
    let mut saw_component = false;
    let mut saw_time_component = false;
    let mut number = String::new();

    for c in body.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        if c == 'T' {
            if in_time || !number.is_empty() {
                return Err(err());
            }
            in_time = true;
            continue;
        }

        let value: u32 = number.parse().map_err(|_e| err())?;
        number.clear();
        saw_component = true;
        saw_time_component |= in_time;
        match (c, in_time) {
            ('W', false) => dur.weeks = value,
            ('D', false) => dur.days = value,
            ('H', true) => dur.hours = value,
            ('M', true) => dur.minutes = value,
            ('S', true) => dur.seconds = value,
            _ => return Err(err()),
        }
    }

    if !number.is_empty() || !saw_component || (in_time && !saw_time_component) {
        return Err(err());
    }
    Ok(dur)
}

/// Parses an INTEGER value (RFC 5545 §3.3.8).
///
/// ## Errors
/// Returns an error if the string is not a valid integer.
pub fn parse_integer(s: &str, line: usize, col: usize) -> ParseResult<i32> {
    s.trim()
        .parse()
        .map_err(|_e| ParseError::new(ParseErrorKind::InvalidInteger, line, col))
}

/// Unescapes text values (RFC 5545 §3.3.11).
///
/// Escape sequences: \\ \, \; \n \N
#[must_use]
pub fn unescape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => result.push('\n'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }

    result
}
