//! Materialized calendar entities.

use calmat_rfc::rfc::ical::core::{DateOrDateTime, Duration};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Participation status from the PARTSTAT parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
    Other,
}

/// Participation role from the ROLE parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeRole {
    Chair,
    #[default]
    Required,
    Optional,
    NonParticipant,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attendee {
    /// Address without the `mailto:` scheme, lowercased.
    pub email: String,
    /// Common name (CN parameter).
    pub name: Option<String>,
    pub response: ResponseStatus,
    pub role: AttendeeRole,
}

/// How an event came to be in the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventOrigin {
    /// A VEVENT taken as-is.
    Direct,
    /// An occurrence generated from a recurring master.
    Expanded {
        source_uid: String,
        original_start: DateTime<Utc>,
    },
    /// A RECURRENCE-ID component replacing one occurrence of a series.
    Override {
        source_uid: String,
        original_start: DateTime<Utc>,
    },
}

/// One concrete calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    /// Unique within one `ParseResult`.
    pub id: String,
    /// Series identity. Never derived from the subject.
    pub uid: String,
    pub subject: String,
    pub body_preview: String,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Zone the start was expressed in.
    pub timezone: String,
    pub is_all_day: bool,
    pub is_recurring: bool,
    pub is_busy: bool,
    pub is_cancelled: bool,
    pub attendees: Vec<Attendee>,
    pub organizer: Option<Attendee>,
    pub origin: EventOrigin,
}

/// A VEVENT reduced to the fields the pipeline needs, with date values
/// still in their written form.
///
/// Date resolution happens later because the calendar default zone may
/// only be known after the component was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComponent {
    pub uid: String,
    /// Line of the BEGIN:VEVENT (1-based).
    pub line: usize,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<DateOrDateTime>,
    pub end: Option<DateOrDateTime>,
    pub duration: Option<Duration>,
    /// RRULE text, without the `RRULE:` prefix.
    pub rrule: Option<String>,
    pub exdates: Vec<DateOrDateTime>,
    pub rdates: Vec<DateOrDateTime>,
    pub recurrence_id: Option<DateOrDateTime>,
    pub status: Option<String>,
    pub transparency: Option<String>,
    /// X-MICROSOFT-CDO-BUSYSTATUS (Outlook "show as").
    pub busy_status: Option<String>,
    pub attendees: Vec<Attendee>,
    pub organizer: Option<Attendee>,
}

impl RawComponent {
    /// Whether this is a recurring master (carries a non-empty RRULE).
    #[must_use]
    pub fn is_master(&self) -> bool {
        self.rrule.as_deref().is_some_and(|rule| !rule.trim().is_empty())
    }

    /// Whether this overrides one occurrence of a series.
    #[must_use]
    pub const fn is_override(&self) -> bool {
        self.recurrence_id.is_some()
    }
}
