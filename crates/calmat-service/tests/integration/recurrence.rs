//! Exclusions, overrides, identity and timezone behaviour of expanded series.

use std::collections::HashSet;

use calmat_service::EventOrigin;

use super::helpers::*;

#[test_log::test(tokio::test)]
async fn exdate_removes_exact_match_only() {
    let ics = calendar(&[
        vevent("hit", "Sync", ":20251101T090000Z", &[
            "RRULE:FREQ=DAILY;COUNT=3",
            "EXDATE:20251102T090000Z",
        ]),
        vevent("miss", "Sync", ":20251101T090000Z", &[
            "RRULE:FREQ=DAILY;COUNT=3",
            "EXDATE:20251102T093000Z",
        ]),
    ]);
    let result = parse(&ics).await;

    assert_eq!(
        starts_of(&result, "hit"),
        [utc(2025, 11, 1, 9, 0), utc(2025, 11, 3, 9, 0)]
    );
    assert_eq!(starts_of(&result, "miss").len(), 3);
}

#[test_log::test(tokio::test)]
async fn exdate_in_other_zone_is_normalised() {
    // 10:00 Berlin (CET) is 09:00Z.
    let ics = calendar(&[vevent("zoned", "Sync", ":20251101T090000Z", &[
        "RRULE:FREQ=DAILY;COUNT=3",
        "EXDATE;TZID=Europe/Berlin:20251103T100000",
    ])]);
    let result = parse(&ics).await;
    assert_eq!(
        starts_of(&result, "zoned"),
        [utc(2025, 11, 1, 9, 0), utc(2025, 11, 2, 9, 0)]
    );
}

#[test_log::test(tokio::test)]
async fn override_moves_occurrence_and_suppresses_original() {
    let ics = calendar(&[
        vevent("standup", "Standup", ":20251103T090000Z", &[
            "RRULE:FREQ=DAILY;COUNT=3",
        ]),
        vevent("standup", "Standup (moved)", ":20251107T150000Z", &[
            "RECURRENCE-ID:20251104T090000Z",
            "DTEND:20251107T160000Z",
        ]),
    ]);
    let result = parse(&ics).await;

    let events = events_of(&result, "standup");
    let starts: Vec<_> = events.iter().map(|e| e.start).collect();
    assert_eq!(
        starts,
        [
            utc(2025, 11, 3, 9, 0),
            utc(2025, 11, 5, 9, 0),
            utc(2025, 11, 7, 15, 0)
        ]
    );
    assert!(!starts.contains(&utc(2025, 11, 4, 9, 0)));

    let moved = events[2];
    assert_eq!(moved.subject, "Standup (moved)");
    assert_eq!(moved.end, utc(2025, 11, 7, 16, 0));
    assert!(matches!(
        &moved.origin,
        EventOrigin::Override { original_start, .. } if *original_start == utc(2025, 11, 4, 9, 0)
    ));
}

#[test_log::test(tokio::test)]
async fn override_before_master_in_document() {
    let ics = calendar(&[
        vevent("late-master", "Moved", ":20251101T180000Z", &[
            "RECURRENCE-ID:20251101T090000Z",
        ]),
        vevent("late-master", "Series", ":20251101T090000Z", &[
            "RRULE:FREQ=DAILY;COUNT=2",
        ]),
    ]);
    let result = parse(&ics).await;
    assert_eq!(
        starts_of(&result, "late-master"),
        [utc(2025, 11, 1, 18, 0), utc(2025, 11, 2, 9, 0)]
    );
}

#[test_log::test(tokio::test)]
async fn cancelled_override_removes_occurrence() {
    let ics = calendar(&[
        vevent("c", "Series", ":20251101T090000Z", &["RRULE:FREQ=DAILY;COUNT=3"]),
        vevent("c", "Series", ":20251102T090000Z", &[
            "RECURRENCE-ID:20251102T090000Z",
            "STATUS:CANCELLED",
        ]),
    ]);
    let result = parse(&ics).await;
    assert_eq!(
        starts_of(&result, "c"),
        [utc(2025, 11, 1, 9, 0), utc(2025, 11, 3, 9, 0)]
    );
}

#[test_log::test(tokio::test)]
async fn orphan_override_is_kept_as_event() {
    let ics = calendar(&[vevent("orphan", "Lonely", ":20251110T090000Z", &[
        "RECURRENCE-ID:20251109T090000Z",
    ])]);
    let result = parse(&ics).await;
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].id, "orphan_20251109T090000Z");
}

#[test_log::test(tokio::test)]
async fn same_subject_distinct_uids_expand_fully() {
    let ics = calendar(&[
        vevent("team-a", "Weekly Sync", ":20251103T100000Z", &[
            "RRULE:FREQ=WEEKLY;COUNT=3",
        ]),
        vevent("team-b", "Weekly Sync", ":20251103T100000Z", &[
            "RRULE:FREQ=WEEKLY;COUNT=3",
        ]),
    ]);
    let result = parse(&ics).await;
    assert_eq!(events_of(&result, "team-a").len(), 3);
    assert_eq!(events_of(&result, "team-b").len(), 3);

    let ids: HashSet<&str> = result.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), 6);
}

#[test_log::test(tokio::test)]
async fn all_day_birthday_expands() {
    let ics = calendar(&[vevent("bday", "Birthday", ";VALUE=DATE:20251120", &[
        "RRULE:FREQ=YEARLY",
    ])]);
    let result = parse(&ics).await;
    let events = events_of(&result, "bday");

    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e.is_all_day));
    assert_eq!(events[0].start, utc(2025, 11, 20, 0, 0));
    assert_eq!(events[0].end, utc(2025, 11, 20, 1, 0));
}

#[test_log::test(tokio::test)]
async fn interval_and_until() {
    let ics = calendar(&[
        vevent("every-other", "Sprint", ":20251103T080000Z", &[
            "RRULE:FREQ=WEEKLY;INTERVAL=2;COUNT=3",
        ]),
        vevent("until", "Daily", ":20251101T090000Z", &[
            "RRULE:FREQ=DAILY;UNTIL=20251104T085959Z",
        ]),
    ]);
    let result = parse(&ics).await;
    assert_eq!(
        starts_of(&result, "every-other"),
        [
            utc(2025, 11, 3, 8, 0),
            utc(2025, 11, 17, 8, 0),
            utc(2025, 12, 1, 8, 0)
        ]
    );
    assert_eq!(
        starts_of(&result, "until"),
        [
            utc(2025, 11, 1, 9, 0),
            utc(2025, 11, 2, 9, 0),
            utc(2025, 11, 3, 9, 0)
        ]
    );
}

#[test_log::test(tokio::test)]
async fn zoned_series_keeps_wall_clock_across_dst() {
    // New York leaves daylight time on 2025-11-02.
    let ics = calendar(&[vevent("ny", "Call", ";TZID=America/New_York:20251027T090000", &[
        "RRULE:FREQ=WEEKLY;COUNT=2",
    ])]);
    let result = parse(&ics).await;
    assert_eq!(
        starts_of(&result, "ny"),
        [utc(2025, 10, 27, 13, 0), utc(2025, 11, 3, 14, 0)]
    );
    assert!(result.events.iter().all(|e| e.timezone == "America/New_York"));
}

#[test_log::test(tokio::test)]
async fn windows_tzid_is_understood() {
    let ics = calendar(&[vevent("win", "Call", ";TZID=W. Europe Standard Time:20251110T090000", &[])]);
    let result = parse(&ics).await;
    assert_eq!(result.events[0].start, utc(2025, 11, 10, 8, 0));
    assert!(!has_warning(&result, WarningKind::TimezoneFallback));
}

#[test_log::test(tokio::test)]
async fn occurrence_cap_is_reported() {
    let ics = calendar(&[vevent("hourly", "Ping", ":20251101T000000Z", &["RRULE:FREQ=HOURLY"])]);
    let result = pipeline_with(|c| c.max_occurrences_per_rule = 24)
        .parse(&ics, options())
        .await;
    assert_eq!(events_of(&result, "hourly").len(), 24);
    assert!(has_warning(&result, WarningKind::ExpansionTruncated));
}

#[test_log::test(tokio::test)]
async fn window_opens_at_reference_by_default() {
    let ics = calendar(&[vevent("old", "Old", ":20250901T090000Z", &["RRULE:FREQ=WEEKLY;COUNT=10"])]);
    let result = parse(&ics).await;
    let starts = starts_of(&result, "old");
    assert!(starts.iter().all(|s| *s >= reference()));
    assert_eq!(starts.len(), 5);
}

#[test_log::test(tokio::test)]
async fn lookback_reopens_recent_past() {
    let ics = calendar(&[vevent("old", "Old", ":20250901T090000Z", &["RRULE:FREQ=WEEKLY;COUNT=10"])]);
    let result = pipeline_with(|c| c.expansion_lookback_days = 7)
        .parse(&ics, options())
        .await;
    let starts = starts_of(&result, "old");
    assert_eq!(starts.first(), Some(&utc(2025, 9, 29, 9, 0)));
    assert_eq!(starts.len(), 6);
}

#[test_log::test(tokio::test)]
async fn years_old_daily_series_still_shows_current_days() {
    let ics = calendar(&[vevent("forever", "Standup", ":20200101T090000Z", &["RRULE:FREQ=DAILY"])]);
    let result = parse(&ics).await;
    let starts = starts_of(&result, "forever");

    assert_eq!(starts.first(), Some(&utc(2025, 10, 1, 9, 0)));
    assert_eq!(starts.len(), 365);
    assert!(!has_warning(&result, WarningKind::ExpansionTruncated));
}

#[test_log::test(tokio::test)]
async fn date_and_floating_until_are_honoured() {
    let ics = calendar(&[
        vevent("timed", "Daily", ":20251103T090000Z", &["RRULE:FREQ=DAILY;UNTIL=20251105"]),
        vevent("allday", "Holiday", ";VALUE=DATE:20251110", &["RRULE:FREQ=DAILY;UNTIL=20251112"]),
        vevent("ny", "Call", ";TZID=America/New_York:20251103T090000", &[
            "RRULE:FREQ=DAILY;UNTIL=20251105T090000",
        ]),
    ]);
    let result = parse(&ics).await;

    assert!(!has_warning(&result, WarningKind::RuleSkipped), "{:?}", result.warnings);
    assert_eq!(starts_of(&result, "timed").len(), 3);
    assert_eq!(starts_of(&result, "allday").len(), 3);
    assert_eq!(
        starts_of(&result, "ny").last(),
        Some(&utc(2025, 11, 5, 14, 0))
    );
}
