//! Resolution of iCalendar date values to UTC instants.

use std::collections::BTreeSet;

use calmat_rfc::RfcError;
use calmat_rfc::rfc::ical::core::{DateOrDateTime, DateTimeForm};
use calmat_rfc::rfc::ical::expand::{TimeZoneResolver, Zone};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeDelta, Utc};

use crate::calendar::RawComponent;
use crate::error::{ServiceError, ServiceResult};

/// A date value anchored on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTime {
    pub instant: DateTime<Utc>,
    /// The value was a DATE (midnight in `zone`).
    pub all_day: bool,
    /// Zone the value was written in; recurrence runs on this wall clock.
    pub zone: Zone,
}

impl ResolvedTime {
    #[must_use]
    pub fn local_date(&self) -> NaiveDate {
        self.zone.to_local(self.instant).date()
    }
}

/// Per-parse timezone state: the resolver, the calendar default zone and
/// the TZIDs that had to fall back to it.
#[derive(Debug, Clone)]
pub struct TimeContext {
    resolver: TimeZoneResolver,
    default_zone: Zone,
    unknown_tzids: BTreeSet<String>,
}

impl Default for TimeContext {
    fn default() -> Self {
        Self {
            resolver: TimeZoneResolver::new(),
            default_zone: Zone::Utc,
            unknown_tzids: BTreeSet::new(),
        }
    }
}

impl TimeContext {
    /// Creates a context whose floating times fall back to `default_tzid`,
    /// or to UTC when it is absent or unknown.
    #[must_use]
    pub fn new(default_tzid: Option<&str>) -> Self {
        let mut ctx = Self::default();
        if let Some(tzid) = default_tzid {
            ctx.set_default_timezone(tzid);
        }
        ctx
    }

    #[must_use]
    pub const fn default_zone(&self) -> Zone {
        self.default_zone
    }

    /// Switches the default zone. Returns `false` (keeping the previous
    /// zone) when `tzid` is unknown.
    pub fn set_default_timezone(&mut self, tzid: &str) -> bool {
        match self.resolver.resolve(tzid) {
            Ok(zone) => {
                self.default_zone = zone;
                true
            }
            Err(e) => {
                tracing::warn!(tzid, error = %e, "Ignoring unknown default timezone");
                self.unknown_tzids.insert(tzid.to_string());
                false
            }
        }
    }

    pub fn register_fixed(&mut self, tzid: &str, offset: FixedOffset) {
        self.resolver.register_fixed(tzid, offset);
    }

    /// TZIDs that could not be resolved so far, drained.
    pub fn take_unknown_tzids(&mut self) -> Vec<String> {
        std::mem::take(&mut self.unknown_tzids).into_iter().collect()
    }

    /// ## Summary
    /// Resolves a value, anchoring floating times and dates in the default zone.
    ///
    /// ## Errors
    /// Returns `InvalidComponent` for impossible dates and a timezone error
    /// for wall-clock times that do not exist.
    pub fn resolve(&mut self, value: &DateOrDateTime) -> ServiceResult<ResolvedTime> {
        self.resolve_in(value, self.default_zone)
    }

    /// ## Summary
    /// Resolves a value, anchoring floating times, dates and unknown TZIDs in `floating`.
    ///
    /// ## Errors
    /// See [`TimeContext::resolve`].
    pub fn resolve_in(
        &mut self,
        value: &DateOrDateTime,
        floating: Zone,
    ) -> ServiceResult<ResolvedTime> {
        match value {
            DateOrDateTime::Date(date) => {
                let day = date
                    .to_naive()
                    .ok_or_else(|| ServiceError::InvalidComponent(format!("invalid date {date}")))?;
                Ok(ResolvedTime {
                    instant: midnight(floating, day)?,
                    all_day: true,
                    zone: floating,
                })
            }
            DateOrDateTime::DateTime(dt) => {
                let local = dt.to_naive().ok_or_else(|| {
                    ServiceError::InvalidComponent(format!("invalid date-time {dt}"))
                })?;
                let zone = match &dt.form {
                    DateTimeForm::Utc => Zone::Utc,
                    DateTimeForm::Floating => floating,
                    DateTimeForm::Zoned { tzid } => self.zone_for(tzid, floating),
                };
                Ok(ResolvedTime {
                    instant: zone.to_utc(local).map_err(RfcError::from)?,
                    all_day: false,
                    zone,
                })
            }
        }
    }

    fn zone_for(&mut self, tzid: &str, fallback: Zone) -> Zone {
        self.resolver.resolve(tzid).unwrap_or_else(|e| {
            if self.unknown_tzids.insert(tzid.to_string()) {
                tracing::debug!(tzid, error = %e, "Falling back for unknown TZID");
            }
            fallback
        })
    }

    /// ## Summary
    /// Resolves start and end of an event.
    ///
    /// The end comes from DTEND, else start + DURATION, else start + 1 hour
    /// (all-day events included; they keep their all-day flag). An end
    /// before the start is clamped to the start.
    ///
    /// ## Errors
    /// Returns `InvalidComponent` when DTSTART is missing or any value is
    /// out of range.
    pub fn event_span(
        &mut self,
        raw: &RawComponent,
    ) -> ServiceResult<(ResolvedTime, DateTime<Utc>)> {
        let start_value = raw.start.as_ref().ok_or_else(|| {
            ServiceError::InvalidComponent(format!("event {} has no DTSTART", raw.uid))
        })?;
        let start = self.resolve(start_value)?;

        let end = if let Some(end_value) = &raw.end {
            self.resolve_in(end_value, start.zone)?.instant
        } else if let Some(duration) = raw.duration {
            let delta = duration.to_time_delta().ok_or_else(|| {
                ServiceError::InvalidComponent(format!("duration out of range on {}", raw.uid))
            })?;
            offset(start.instant, delta)?
        } else {
            offset(start.instant, TimeDelta::hours(1))?
        };

        Ok((start, end.max(start.instant)))
    }
}

/// Midnight of `day` in `zone`, as UTC.
///
/// ## Errors
/// Returns a timezone error if midnight does not exist and cannot be shifted.
pub fn midnight(zone: Zone, day: NaiveDate) -> ServiceResult<DateTime<Utc>> {
    Ok(zone
        .to_utc(day.and_time(chrono::NaiveTime::MIN))
        .map_err(RfcError::from)?)
}

/// Midnight `days` calendar days after `day` in `zone`.
///
/// ## Errors
/// Returns `InvalidComponent` when the date overflows.
pub fn next_midnight(zone: Zone, day: NaiveDate, days: u64) -> ServiceResult<DateTime<Utc>> {
    let target = day
        .checked_add_days(Days::new(days))
        .ok_or_else(|| ServiceError::InvalidComponent(format!("date overflow after {day}")))?;
    midnight(zone, target)
}

fn offset(instant: DateTime<Utc>, delta: TimeDelta) -> ServiceResult<DateTime<Utc>> {
    instant
        .checked_add_signed(delta)
        .ok_or_else(|| ServiceError::InvalidComponent(format!("time overflow after {instant}")))
}
