//! VEVENT to [`RawComponent`] to [`CalendarEvent`].

use calmat_core::constants::BODY_PREVIEW_CHARS;
use calmat_rfc::rfc::ical::core::{Component, ComponentKind, DateOrDateTime, Property};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::calendar::{CalendarEvent, EventOrigin, RawComponent};
use crate::error::{ServiceError, ServiceResult};
use crate::normalize::{TimeContext, parse_attendee};

/// Timestamp layout used in derived occurrence ids.
pub const ID_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// ## Summary
/// Reduces a VEVENT to the fields the pipeline needs.
///
/// A missing UID is replaced by a stable one hashed from summary, start and
/// source line so the event still has a series identity.
///
/// ## Errors
/// Returns `InvalidComponent` if the component is not a VEVENT or a date
/// property carries a value that is not a date.
#[tracing::instrument(skip(component), fields(line = component.line))]
pub fn parse_component(component: &Component) -> ServiceResult<RawComponent> {
    if component.kind != ComponentKind::Event {
        return Err(ServiceError::InvalidComponent(format!(
            "expected VEVENT, found {}",
            component.name
        )));
    }

    let summary = text_of(component, "SUMMARY");
    let start = date_of(component, "DTSTART")?;

    let uid = match component.uid().map(str::trim).filter(|uid| !uid.is_empty()) {
        Some(uid) => uid.to_string(),
        None => {
            let generated = synthesize_uid(summary.as_deref(), start.as_ref(), component.line);
            tracing::debug!(uid = %generated, "VEVENT without UID, generated one");
            generated
        }
    };

    let rrule = component
        .get_property("RRULE")
        .map(|prop| strip_rule_prefix(&prop.raw_value).to_string())
        .filter(|rule| !rule.is_empty());

    Ok(RawComponent {
        line: component.line,
        description: text_of(component, "DESCRIPTION"),
        location: text_of(component, "LOCATION"),
        end: date_of(component, "DTEND")?,
        duration: component
            .get_property("DURATION")
            .and_then(Property::as_duration)
            .copied(),
        rrule,
        exdates: date_list(component, "EXDATE"),
        rdates: date_list(component, "RDATE"),
        recurrence_id: date_of(component, "RECURRENCE-ID")?,
        status: flag_of(component, "STATUS"),
        transparency: flag_of(component, "TRANSP"),
        busy_status: flag_of(component, "X-MICROSOFT-CDO-BUSYSTATUS"),
        attendees: component
            .get_properties("ATTENDEE")
            .filter_map(parse_attendee)
            .collect(),
        organizer: component.get_property("ORGANIZER").and_then(parse_attendee),
        uid,
        summary,
        start,
    })
}

/// ## Summary
/// Resolves a raw component into a display-ready event.
///
/// Masters become a stub for their first occurrence; overrides get an id
/// derived from the occurrence they replace.
///
/// ## Errors
/// Returns `InvalidComponent` when DTSTART is missing or a date value is out
/// of range, or a timezone error for non-existent local times.
pub fn materialize(raw: &RawComponent, ctx: &mut TimeContext) -> ServiceResult<CalendarEvent> {
    let (start, end) = ctx.event_span(raw)?;

    let (id, origin) = match &raw.recurrence_id {
        Some(recurrence_id) => {
            let original = ctx.resolve_in(recurrence_id, start.zone)?.instant;
            (
                override_id(&raw.uid, original),
                EventOrigin::Override {
                    source_uid: raw.uid.clone(),
                    original_start: original,
                },
            )
        }
        None => (raw.uid.clone(), EventOrigin::Direct),
    };
    let (is_busy, is_cancelled) = resolve_status(raw);

    Ok(CalendarEvent {
        id,
        uid: raw.uid.clone(),
        subject: raw.summary.clone().unwrap_or_default(),
        body_preview: body_preview(raw.description.as_deref()),
        location: raw.location.clone(),
        start: start.instant,
        end,
        timezone: start.zone.to_string(),
        is_all_day: start.all_day,
        is_recurring: raw.is_master() || raw.is_override(),
        is_busy,
        is_cancelled,
        attendees: raw.attendees.clone(),
        organizer: raw.organizer.clone(),
        origin,
    })
}

/// Maps STATUS, TRANSP and the Outlook show-as flag to `(busy, cancelled)`.
///
/// The show-as flag takes precedence over TRANSP when present.
#[must_use]
pub fn resolve_status(raw: &RawComponent) -> (bool, bool) {
    let cancelled = raw.status.as_deref() == Some("CANCELLED");

    let busy = match raw.busy_status.as_deref() {
        Some("FREE") => false,
        Some("BUSY" | "TENTATIVE" | "OOF" | "WORKINGELSEWHERE") => true,
        _ => raw.transparency.as_deref() != Some("TRANSPARENT"),
    };

    (busy, cancelled)
}

/// Id of an override: base UID plus the replaced occurrence's original start.
#[must_use]
pub fn override_id(uid: &str, original_start: DateTime<Utc>) -> String {
    format!("{uid}_{}", original_start.format(ID_TIMESTAMP_FORMAT))
}

fn body_preview(description: Option<&str>) -> String {
    description
        .map(|text| text.trim().chars().take(BODY_PREVIEW_CHARS).collect())
        .unwrap_or_default()
}

fn strip_rule_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("RRULE:") => trimmed[6..].trim(),
        _ => trimmed,
    }
}

fn synthesize_uid(summary: Option<&str>, start: Option<&DateOrDateTime>, line: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(summary.unwrap_or_default().as_bytes());
    hasher.update(b"|");
    if let Some(start) = start {
        hasher.update(start.to_string().as_bytes());
    }
    hasher.update(b"|");
    hasher.update(line.to_le_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("generated-{}", &digest[..16])
}

fn text_of(component: &Component, name: &str) -> Option<String> {
    component
        .get_property(name)
        .and_then(Property::as_text)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToString::to_string)
}

fn flag_of(component: &Component, name: &str) -> Option<String> {
    text_of(component, name).map(|flag| flag.to_ascii_uppercase())
}

fn date_of(component: &Component, name: &str) -> ServiceResult<Option<DateOrDateTime>> {
    let Some(prop) = component.get_property(name) else {
        return Ok(None);
    };
    prop.as_date_or_datetime().map(Some).ok_or_else(|| {
        ServiceError::InvalidComponent(format!(
            "{name} is not a date value: {}",
            prop.raw_value
        ))
    })
}

fn date_list(component: &Component, name: &str) -> Vec<DateOrDateTime> {
    component
        .get_properties(name)
        .flat_map(|prop| prop.as_date_list().iter().cloned())
        .collect()
}
