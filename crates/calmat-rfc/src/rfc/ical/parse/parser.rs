//! iCalendar document parser (RFC 5545).
//!
//! Decodes property values and drives the [`ComponentAssembler`] over a
//! document held in memory.

use super::assembler::{Assembled, ComponentAssembler};
use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::lexer::split_lines;
use super::values::{
    parse_date, parse_datetime, parse_duration, parse_integer, parse_utc_offset, unescape_text,
};
use crate::rfc::ical::core::{Component, ContentLine, DateOrDateTime, Property, Value};

/// A fully parsed document: calendar-level properties, top-level components
/// and the components that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub properties: Vec<Property>,
    pub components: Vec<Component>,
    /// Skipped components (or calendar-level lines) with the reason.
    pub failures: Vec<(String, ParseError)>,
}

/// Parses an iCalendar document from a string.
///
/// ## Errors
/// Returns a structural error when the VCALENDAR envelope is missing or
/// unterminated. Malformed components are collected in
/// [`Document::failures`] instead.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse_document(input: &str) -> ParseResult<Document> {
    let lines = split_lines(input);
    let Some(last_line) = lines.last().map(|(num, _)| *num) else {
        return Err(ParseError::new(ParseErrorKind::MissingBegin, 1, 1).with_context("empty input"));
    };

    tracing::trace!(count = lines.len(), "Split lines");

    let mut assembler = ComponentAssembler::new();
    let mut document = Document::default();

    for (line_num, line) in &lines {
        assembler.push_line(*line_num, line)?;
        drain(&mut assembler, &mut document);
    }
    let finished = assembler.finish(last_line);
    drain(&mut assembler, &mut document);
    finished?;

    tracing::debug!(
        components = document.components.len(),
        failures = document.failures.len(),
        "iCalendar document parsed"
    );

    Ok(document)
}

fn drain(assembler: &mut ComponentAssembler, document: &mut Document) {
    while let Some(item) = assembler.next_ready() {
        match item {
            Assembled::CalendarProperty(property) => document.properties.push(property),
            Assembled::Component(component) => document.components.push(component),
            Assembled::ComponentError { name, error, .. } => document.failures.push((name, error)),
            Assembled::LineError(error) => document.failures.push(("VCALENDAR".to_string(), error)),
            Assembled::CalendarBegin { .. } | Assembled::CalendarEnd { .. } => {}
        }
    }
}

/// Decodes a lexed content line into a typed property.
///
/// ## Errors
/// Returns an error if the value does not match the property's value type.
pub fn parse_property(cl: ContentLine, line_num: usize) -> ParseResult<Property> {
    let value_type = determine_value_type(&cl);
    let value = parse_value(&cl.raw_value, value_type, cl.tzid(), line_num)?;

    Ok(Property {
        name: cl.name,
        params: cl.params,
        value,
        raw_value: cl.raw_value,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueType {
    /// DATE or DATE-TIME decided by the value shape.
    DateOrDateTime,
    Date,
    DateTime,
    /// Comma-separated DATE/DATE-TIME/PERIOD list (EXDATE, RDATE).
    DateList,
    Duration,
    Integer,
    /// Kept verbatim: RRULE text and addresses are interpreted downstream.
    Raw,
    Text,
    UtcOffset,
}

fn determine_value_type(cl: &ContentLine) -> ValueType {
    match cl.name.as_str() {
        "EXDATE" | "RDATE" => return ValueType::DateList,
        "RRULE" | "EXRULE" | "ATTENDEE" | "ORGANIZER" | "URL" => return ValueType::Raw,
        _ => {}
    }

    if let Some(value_type) = cl.value_type() {
        match value_type.to_ascii_uppercase().as_str() {
            "DATE" => return ValueType::Date,
            "DATE-TIME" => return ValueType::DateTime,
            "DURATION" => return ValueType::Duration,
            "TEXT" => return ValueType::Text,
            _ => return ValueType::Raw,
        }
    }

    match cl.name.as_str() {
        "DTSTART" | "DTEND" | "DUE" | "RECURRENCE-ID" => ValueType::DateOrDateTime,
        "DURATION" => ValueType::Duration,
        "SEQUENCE" | "PRIORITY" => ValueType::Integer,
        "TZOFFSETFROM" | "TZOFFSETTO" => ValueType::UtcOffset,
        _ => ValueType::Text,
    }
}

/// An 8-character value without a time part is a DATE.
fn looks_like_date(raw: &str) -> bool {
    raw.len() == 8 && !raw.contains(['T', 't'])
}

fn parse_value(
    raw: &str,
    value_type: ValueType,
    tzid: Option<&str>,
    line_num: usize,
) -> ParseResult<Value> {
    let raw_trimmed = raw.trim();
    match value_type {
        ValueType::Text => Ok(Value::Text(unescape_text(raw))),
        ValueType::Raw => Ok(Value::Unknown(raw.to_string())),
        ValueType::Date => Ok(Value::Date(parse_date(raw_trimmed, line_num, 1)?)),
        ValueType::DateTime => Ok(Value::DateTime(parse_datetime(
            raw_trimmed,
            tzid,
            line_num,
            1,
        )?)),
        ValueType::DateOrDateTime => {
            if looks_like_date(raw_trimmed) {
                Ok(Value::Date(parse_date(raw_trimmed, line_num, 1)?))
            } else {
                Ok(Value::DateTime(parse_datetime(
                    raw_trimmed,
                    tzid,
                    line_num,
                    1,
                )?))
            }
        }
        ValueType::DateList => parse_date_list(raw_trimmed, tzid, line_num).map(Value::DateList),
        ValueType::Duration => Ok(Value::Duration(parse_duration(raw_trimmed, line_num, 1)?)),
        ValueType::Integer => Ok(Value::Integer(parse_integer(raw_trimmed, line_num, 1)?)),
        ValueType::UtcOffset => Ok(Value::UtcOffset(parse_utc_offset(
            raw_trimmed,
            line_num,
            1,
        )?)),
    }
}

/// Parses an EXDATE/RDATE list. PERIOD entries contribute their start.
fn parse_date_list(
    raw: &str,
    tzid: Option<&str>,
    line_num: usize,
) -> ParseResult<Vec<DateOrDateTime>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let start = entry.split_once('/').map_or(entry, |(start, _)| start);
            if looks_like_date(start) {
                parse_date(start, line_num, 1).map(DateOrDateTime::Date)
            } else {
                parse_datetime(start, tzid, line_num, 1).map(DateOrDateTime::DateTime)
            }
        })
        .collect()
}
