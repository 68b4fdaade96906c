#![allow(clippy::expect_used, dead_code)]
//! Fixture builders shared by the integration tests.

use calmat_core::config::PipelineConfig;
use calmat_service::{CalendarEvent, CalendarPipeline, ParseOptions, ParseResult};
use chrono::{DateTime, TimeZone, Utc};

pub use calmat_service::{FailureKind, WarningKind};

/// "Now" for every test: 2025-10-01T00:00:00Z.
pub fn reference() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0)
        .single()
        .expect("valid reference instant")
}

pub fn options() -> ParseOptions {
    ParseOptions {
        reference_time: Some(reference()),
        cancel: None,
    }
}

pub fn pipeline() -> CalendarPipeline {
    pipeline_with(|_| {})
}

pub fn pipeline_with(tweak: impl FnOnce(&mut PipelineConfig)) -> CalendarPipeline {
    let mut config = PipelineConfig::default();
    tweak(&mut config);
    CalendarPipeline::new(config).expect("valid pipeline config")
}

pub async fn parse(ics: &str) -> ParseResult {
    pipeline().parse(ics, options()).await
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
        .single()
        .expect("valid instant")
}

/// Wraps VEVENT blocks in a VCALENDAR envelope with CRLF line endings.
pub fn calendar(events: &[String]) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//calmat//tests//EN\r\n{}END:VCALENDAR\r\n",
        events.concat()
    )
}

/// A VEVENT with the given UID, SUMMARY and DTSTART line value plus extra lines.
pub fn vevent(uid: &str, summary: &str, dtstart: &str, extra: &[&str]) -> String {
    let mut block = format!("BEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:{summary}\r\nDTSTART{dtstart}\r\n");
    for line in extra {
        block.push_str(line);
        block.push_str("\r\n");
    }
    block.push_str("END:VEVENT\r\n");
    block
}

pub fn events_of<'a>(result: &'a ParseResult, uid: &str) -> Vec<&'a CalendarEvent> {
    result.events.iter().filter(|e| e.uid == uid).collect()
}

pub fn starts_of(result: &ParseResult, uid: &str) -> Vec<DateTime<Utc>> {
    events_of(result, uid).iter().map(|e| e.start).collect()
}

pub fn has_warning(result: &ParseResult, kind: WarningKind) -> bool {
    result.warnings.iter().any(|w| w.kind == kind)
}

/// `count` daily series with distinct UIDs and the same subject.
pub fn many_series(count: usize, occurrences: usize) -> String {
    let events: Vec<String> = (0..count)
        .map(|i| {
            vevent(
                &format!("series-{i}"),
                "Recurring",
                ":20251101T090000Z",
                &[&format!("RRULE:FREQ=DAILY;COUNT={occurrences}")],
            )
        })
        .collect();
    calendar(&events)
}
