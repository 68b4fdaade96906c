//! The value returned by every parse call.

use serde::Serialize;

use crate::calendar::CalendarEvent;
use crate::error::{FailureKind, ServiceError};

/// Calendar-level properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CalendarMetadata {
    /// X-WR-CALNAME, or NAME.
    pub name: Option<String>,
    /// X-WR-CALDESC, or DESCRIPTION.
    pub description: Option<String>,
    /// X-WR-TIMEZONE.
    pub timezone: Option<String>,
    pub product_id: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseCounts {
    /// Top-level components seen, including skipped ones.
    pub total_components: usize,
    /// Events in the final list.
    pub event_count: usize,
    /// Final events that belong to a series.
    pub recurring_event_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A component could not be parsed or resolved and contributed nothing.
    ComponentSkipped,
    /// A recurrence rule could not be parsed; the series kept its stub only.
    RuleSkipped,
    /// A series hit the per-rule occurrence cap.
    ExpansionTruncated,
    /// A series ran out of its time budget; occurrences so far were kept.
    ExpansionBudgetExceeded,
    /// Streaming mode stopped retaining events.
    EventLimitReached,
    /// The component cache dropped entries for capacity.
    CacheEviction,
    /// A TZID was unknown and the default zone was used.
    TimezoneFallback,
}

/// A recovered, non-fatal problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub kind: WarningKind,
    /// UID of the affected component, when known.
    pub uid: Option<String>,
    pub message: String,
}

impl ParseWarning {
    #[must_use]
    pub fn new(kind: WarningKind, uid: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            uid: uid.map(ToString::to_string),
            message: message.into(),
        }
    }
}

/// Outcome of one parse call.
///
/// `success == false` means no events are available; `success == true` with
/// warnings means some inputs were degraded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    pub success: bool,
    pub events: Vec<CalendarEvent>,
    pub metadata: CalendarMetadata,
    pub counts: ParseCounts,
    pub warnings: Vec<ParseWarning>,
    pub error_message: Option<String>,
    pub error_kind: Option<FailureKind>,
    /// The input text, when echoing was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_source: Option<String>,
}

impl ParseResult {
    #[must_use]
    pub fn succeeded(
        events: Vec<CalendarEvent>,
        metadata: CalendarMetadata,
        total_components: usize,
        warnings: Vec<ParseWarning>,
    ) -> Self {
        let counts = ParseCounts {
            total_components,
            event_count: events.len(),
            recurring_event_count: events.iter().filter(|e| e.is_recurring).count(),
        };
        Self {
            success: true,
            events,
            metadata,
            counts,
            warnings,
            ..Self::default()
        }
    }

    /// A failed call: no events, only the error.
    #[must_use]
    pub fn failure(error: &ServiceError) -> Self {
        Self {
            success: false,
            error_message: Some(error.to_string()),
            error_kind: Some(error.kind()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: Option<&str>) -> Self {
        self.raw_source = source.map(ToString::to_string);
        self
    }

    /// Warnings of one kind.
    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &ParseWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_carries_kind() {
        let result = ParseResult::failure(&ServiceError::InputTooLarge { size: 9, limit: 3 });
        assert!(!result.success);
        assert!(result.events.is_empty());
        assert_eq!(result.error_kind, Some(FailureKind::InputTooLarge));
        assert!(result.error_message.unwrap().contains("9 bytes"));
    }

    #[test]
    fn serializes_snake_case() {
        let mut result = ParseResult::succeeded(Vec::new(), CalendarMetadata::default(), 2, vec![
            ParseWarning::new(WarningKind::RuleSkipped, Some("u1"), "bad rule"),
        ]);
        result.metadata.name = Some("Team".to_string());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["counts"]["total_components"], 2);
        assert_eq!(json["warnings"][0]["kind"], "rule_skipped");
        assert_eq!(json["metadata"]["name"], "Team");
        assert!(json.get("raw_source").is_none());
        assert_eq!(result.warnings_of(WarningKind::RuleSkipped).count(), 1);
    }
}
