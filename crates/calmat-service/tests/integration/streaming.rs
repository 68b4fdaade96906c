//! Streaming ingestion must agree with single-pass ingestion.

use super::helpers::*;

fn mixed_calendar() -> String {
    calendar(&[
        vevent("solo", "Lunch", ":20251104T120000Z", &["DTEND:20251104T130000Z"]),
        vevent("series", "Standup", ";TZID=Europe/Berlin:20251103T090000", &[
            "RRULE:FREQ=DAILY;COUNT=5",
            "EXDATE;TZID=Europe/Berlin:20251105T090000",
        ]),
        vevent("series", "Standup (late)", ";TZID=Europe/Berlin:20251106T110000", &[
            "RECURRENCE-ID;TZID=Europe/Berlin:20251106T090000",
        ]),
        vevent("free", "Focus", ":20251104T080000Z", &["TRANSP:TRANSPARENT"]),
    ])
}

fn summary(result: &calmat_service::ParseResult) -> Vec<(String, chrono::DateTime<chrono::Utc>)> {
    result
        .events
        .iter()
        .map(|e| (e.id.clone(), e.start))
        .collect()
}

#[test_log::test(tokio::test)]
async fn streaming_matches_single_pass() {
    let ics = mixed_calendar();
    let single = parse(&ics).await;
    let streamed = pipeline_with(|c| c.streaming_threshold_bytes = 0)
        .parse(&ics, options())
        .await;

    assert!(single.success);
    assert!(streamed.success);
    assert_eq!(summary(&single), summary(&streamed));
    assert_eq!(single.counts, streamed.counts);
    assert_eq!(single.events.len(), 5);
}

#[test_log::test(tokio::test)]
async fn late_calendar_timezone_applies_in_both_modes() {
    let ics = calendar(&[vevent("floating", "Breakfast", ":20251101T100000", &[])]).replacen(
        "END:VCALENDAR",
        "X-WR-TIMEZONE:Europe/Berlin\r\nEND:VCALENDAR",
        1,
    );
    let single = parse(&ics).await;
    let streamed = pipeline_with(|c| c.streaming_threshold_bytes = 0)
        .parse(&ics, options())
        .await;

    // 10:00 Berlin (CET) is 09:00Z.
    assert_eq!(starts_of(&single, "floating"), [utc(2025, 11, 1, 9, 0)]);
    assert_eq!(starts_of(&streamed, "floating"), [utc(2025, 11, 1, 9, 0)]);
}

#[test_log::test(tokio::test)]
async fn reader_input_is_streamed() {
    let ics = mixed_calendar();
    let from_reader = pipeline().parse_reader(ics.as_bytes(), options()).await;
    let from_str = parse(&ics).await;

    assert!(from_reader.success, "{:?}", from_reader.error_message);
    assert_eq!(summary(&from_reader), summary(&from_str));
    assert_eq!(from_reader.metadata.product_id.as_deref(), Some("-//calmat//tests//EN"));
}

#[test_log::test(tokio::test)]
async fn streaming_caps_retained_events() {
    let events: Vec<String> = (1..=4)
        .map(|day| {
            vevent(
                &format!("single-{day}"),
                "Meeting",
                &format!(":2025111{day}T090000Z"),
                &[],
            )
        })
        .collect();
    let ics = calendar(&events);

    let result = pipeline_with(|c| {
        c.streaming_threshold_bytes = 0;
        c.max_events_per_parse = 2;
    })
    .parse(&ics, options())
    .await;

    assert!(result.success);
    assert_eq!(result.events.len(), 2);
    assert_eq!(result.warnings_of(WarningKind::EventLimitReached).count(), 1);
    assert_eq!(result.counts.total_components, 4);
}

#[test_log::test(tokio::test)]
async fn reader_without_end_fails() {
    let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:x\r\nDTSTART:20251101T090000Z\r\nEND:VEVENT\r\n";
    let result = pipeline().parse_reader(ics.as_bytes(), options()).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(FailureKind::Structural));
    assert!(result.events.is_empty());
}

#[test_log::test(tokio::test)]
async fn reader_over_byte_ceiling_fails() {
    let ics = many_series(20, 2);
    let result = pipeline_with(|c| c.max_input_bytes = 256)
        .parse_reader(ics.as_bytes(), options())
        .await;
    assert_eq!(result.error_kind, Some(FailureKind::InputTooLarge));
}
