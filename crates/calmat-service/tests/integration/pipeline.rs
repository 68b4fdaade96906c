//! Whole-call behaviour: envelope checks, failure kinds, metadata, filtering.

use calmat_service::ParseOptions;
use tokio_util::sync::CancellationToken;

use super::helpers::*;

#[test_log::test(tokio::test)]
async fn daily_team_sync_expands_three_days() {
    let ics = calendar(&[vevent(
        "sync@example.com",
        "Daily Team Sync",
        ":20251101T090000Z",
        &["DTEND:20251101T091500Z", "RRULE:FREQ=DAILY;COUNT=3"],
    )]);
    let result = parse(&ics).await;

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(
        starts_of(&result, "sync@example.com"),
        [
            utc(2025, 11, 1, 9, 0),
            utc(2025, 11, 2, 9, 0),
            utc(2025, 11, 3, 9, 0)
        ]
    );
    assert!(result.events.iter().all(|e| e.subject == "Daily Team Sync"));
    assert!(result.events.iter().all(|e| e.is_recurring));
    assert_eq!(result.counts.event_count, 3);
    assert_eq!(result.counts.recurring_event_count, 3);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test_log::test(tokio::test)]
async fn weekly_byday_monday_wednesday() {
    let ics = calendar(&[vevent(
        "weekly",
        "Gym",
        ":20251103T080000Z",
        &["RRULE:FREQ=WEEKLY;BYDAY=MO,WE;COUNT=4"],
    )]);
    let result = parse(&ics).await;
    assert_eq!(
        starts_of(&result, "weekly"),
        [
            utc(2025, 11, 3, 8, 0),
            utc(2025, 11, 5, 8, 0),
            utc(2025, 11, 10, 8, 0),
            utc(2025, 11, 12, 8, 0)
        ]
    );
}

#[test_log::test(tokio::test)]
async fn missing_end_is_structural_failure() {
    let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:x\r\nDTSTART:20251101T090000Z\r\nEND:VEVENT\r\n";
    let result = parse(ics).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(FailureKind::Structural));
    assert!(result.events.is_empty());
    assert_eq!(result.counts.total_components, 0);
    assert!(
        result
            .error_message
            .is_some_and(|m| m.contains("END:VCALENDAR"))
    );
}

#[test_log::test(tokio::test)]
async fn missing_begin_and_blank_input_are_rejected() {
    for input in ["", "  \r\n\t", "BEGIN:VEVENT\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n"] {
        let result = parse(input).await;
        assert!(!result.success, "accepted {input:?}");
        assert_eq!(result.error_kind, Some(FailureKind::Structural));
    }
}

#[test_log::test(tokio::test)]
async fn oversized_input_has_its_own_kind() {
    let ics = calendar(&[vevent("big", "Big", ":20251101T090000Z", &[])]);
    let result = pipeline_with(|c| c.max_input_bytes = 64)
        .parse(&ics, options())
        .await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(FailureKind::InputTooLarge));
}

#[test_log::test(tokio::test)]
async fn metadata_and_counts() {
    let mut ics = calendar(&[
        vevent("single", "Lunch", ":20251105T120000Z", &[]),
        vevent("series", "Standup", ":20251103T090000Z", &["RRULE:FREQ=DAILY;COUNT=2"]),
    ]);
    ics = ics.replacen(
        "VERSION:2.0\r\n",
        "VERSION:2.0\r\nX-WR-CALNAME:Team\r\nX-WR-CALDESC:Shared team calendar\r\n",
        1,
    );
    let result = parse(&ics).await;

    assert_eq!(result.metadata.name.as_deref(), Some("Team"));
    assert_eq!(result.metadata.description.as_deref(), Some("Shared team calendar"));
    assert_eq!(result.metadata.version.as_deref(), Some("2.0"));
    assert_eq!(result.metadata.product_id.as_deref(), Some("-//calmat//tests//EN"));
    assert_eq!(result.counts.total_components, 2);
    assert_eq!(result.counts.event_count, 3);
    assert_eq!(result.counts.recurring_event_count, 2);
}

#[test_log::test(tokio::test)]
async fn malformed_component_becomes_warning() {
    let ics = calendar(&[
        vevent("bad", "Broken", ":2025-11-01", &[]),
        vevent("good", "Fine", ":20251101T090000Z", &[]),
    ]);
    let result = parse(&ics).await;
    assert!(result.success);
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].uid, "good");
    assert!(has_warning(&result, WarningKind::ComponentSkipped));
    assert_eq!(result.counts.total_components, 2);
}

#[test_log::test(tokio::test)]
async fn free_and_cancelled_events_are_dropped() {
    let ics = calendar(&[
        vevent("free", "Focus", ":20251101T090000Z", &["TRANSP:TRANSPARENT"]),
        vevent("cancelled", "Off", ":20251101T100000Z", &["STATUS:CANCELLED"]),
        vevent("oof", "Away", ":20251101T110000Z", &[
            "TRANSP:TRANSPARENT",
            "X-MICROSOFT-CDO-BUSYSTATUS:OOF",
        ]),
        vevent("busy", "Meeting", ":20251101T120000Z", &[]),
    ]);
    let result = parse(&ics).await;
    let uids: Vec<&str> = result.events.iter().map(|e| e.uid.as_str()).collect();
    assert_eq!(uids, ["oof", "busy"]);
}

#[test_log::test(tokio::test)]
async fn invalid_rule_keeps_stub_and_warns() {
    let ics = calendar(&[
        vevent("broken-rule", "Weird", ":20251101T090000Z", &["RRULE:FREQ=FORTNIGHTLY"]),
        vevent("ok", "Fine", ":20251101T090000Z", &["RRULE:FREQ=DAILY;COUNT=2"]),
    ]);
    let result = parse(&ics).await;

    assert!(result.success);
    assert!(has_warning(&result, WarningKind::RuleSkipped));
    assert_eq!(events_of(&result, "broken-rule").len(), 1);
    assert_eq!(events_of(&result, "ok").len(), 2);
}

#[test_log::test(tokio::test)]
async fn expansion_can_be_disabled() {
    let ics = calendar(&[vevent(
        "series",
        "Standup",
        ":20251101T090000Z",
        &["RRULE:FREQ=DAILY;COUNT=5"],
    )]);
    let result = pipeline_with(|c| c.expansion_enabled = false)
        .parse(&ics, options())
        .await;
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].id, "series");
}

#[test_log::test(tokio::test)]
async fn source_is_echoed_on_request() {
    let ics = calendar(&[vevent("x", "X", ":20251101T090000Z", &[])]);
    let result = pipeline_with(|c| c.include_source = true)
        .parse(&ics, options())
        .await;
    assert_eq!(result.raw_source.as_deref(), Some(ics.as_str()));
    assert!(parse(&ics).await.raw_source.is_none());
}

#[test_log::test(tokio::test)]
async fn cancelled_call_reports_cancellation() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ics = calendar(&[vevent("x", "X", ":20251101T090000Z", &["RRULE:FREQ=DAILY"])]);
    let result = pipeline()
        .parse(&ics, ParseOptions {
            reference_time: Some(reference()),
            cancel: Some(cancel),
        })
        .await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(FailureKind::Cancelled));
    assert!(result.events.is_empty());
}

#[test_log::test(tokio::test)]
async fn floating_times_use_calendar_timezone() {
    let ics = calendar(&[vevent("local", "Local", ":20250701T100000", &[])]).replacen(
        "VERSION:2.0\r\n",
        "VERSION:2.0\r\nX-WR-TIMEZONE:Europe/Berlin\r\n",
        1,
    );
    let result = parse(&ics).await;
    assert_eq!(result.events[0].start, utc(2025, 7, 1, 8, 0));
    assert_eq!(result.events[0].timezone, "Europe/Berlin");
    assert_eq!(result.metadata.timezone.as_deref(), Some("Europe/Berlin"));
}

#[test_log::test(tokio::test)]
async fn attendees_and_organizer_are_normalised() {
    let ics = calendar(&[vevent("meet", "Review", ":20251101T090000Z", &[
        "ORGANIZER;CN=Boss:mailto:Boss@Example.com",
        "ATTENDEE;CN=Ann;PARTSTAT=DECLINED;ROLE=OPT-PARTICIPANT:mailto:ann@example.com",
        "DESCRIPTION:Bring numbers",
        "LOCATION:Room 2",
    ])]);
    let result = parse(&ics).await;
    let event = &result.events[0];
    assert_eq!(event.organizer.as_ref().map(|o| o.email.as_str()), Some("boss@example.com"));
    assert_eq!(event.attendees.len(), 1);
    assert_eq!(event.attendees[0].name.as_deref(), Some("Ann"));
    assert_eq!(event.body_preview, "Bring numbers");
    assert_eq!(event.location.as_deref(), Some("Room 2"));
}

#[test]
fn invalid_config_is_rejected() {
    let config = calmat_core::config::PipelineConfig {
        worker_concurrency: 0,
        ..Default::default()
    };
    assert!(calmat_service::CalendarPipeline::new(config).is_err());
}

#[test]
fn blocking_adapter_parses() {
    let ics = calendar(&[vevent(
        "blocking",
        "Sync",
        ":20251101T090000Z",
        &["RRULE:FREQ=DAILY;COUNT=2"],
    )]);
    let result = pipeline().parse_blocking(&ics, options());
    assert!(result.success);
    assert_eq!(result.events.len(), 2);
}
