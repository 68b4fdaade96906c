//! Timezone resolution and UTC conversion for iCalendar date-times.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Error during timezone conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// Unknown or invalid timezone identifier.
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Wall-clock time that does not exist even after shifting past the DST gap.
    #[error("Non-existent time (DST gap): {0}")]
    NonExistentTime(String),

    /// Date or time fields out of range.
    #[error("Invalid datetime: {0}")]
    InvalidDateTime(String),
}

/// A resolved zone a wall-clock time can be anchored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Utc,
    /// IANA zone with DST rules.
    Named(Tz),
    /// Offset learned from a VTIMEZONE whose TZID is not an IANA name.
    Fixed(FixedOffset),
}

impl Zone {
    /// ## Summary
    /// Anchors a wall-clock time in this zone.
    ///
    /// Folds resolve to the earlier instant. Times inside a DST gap are
    /// shifted forward by one hour.
    ///
    /// ## Errors
    /// Returns `ConversionError::NonExistentTime` if the shifted time still
    /// does not exist.
    pub fn to_utc(self, local: NaiveDateTime) -> Result<DateTime<Utc>, ConversionError> {
        let anchored = match self {
            Self::Utc => Some(Utc.from_utc_datetime(&local)),
            Self::Named(tz) => earliest(&tz, local).or_else(|| {
                tracing::trace!(%local, zone = tz.name(), "Shifting time out of DST gap");
                earliest(&tz, local + TimeDelta::hours(1))
            }),
            Self::Fixed(offset) => earliest(&offset, local),
        };
        anchored.ok_or_else(|| ConversionError::NonExistentTime(format!("{local} in {self}")))
    }

    /// Wall-clock reading of `instant` in this zone.
    #[must_use]
    pub fn to_local(self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Utc => instant.naive_utc(),
            Self::Named(tz) => instant.with_timezone(&tz).naive_local(),
            Self::Fixed(offset) => instant.with_timezone(&offset).naive_local(),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc => write!(f, "UTC"),
            Self::Named(tz) => write!(f, "{}", tz.name()),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

fn earliest<Z: TimeZone>(zone: &Z, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Resolver for timezone identifiers.
///
/// Caches resolved zones and falls back to fixed offsets registered from
/// VTIMEZONE components of the calendar being parsed.
#[derive(Debug, Clone, Default)]
pub struct TimeZoneResolver {
    cache: HashMap<String, Zone>,
    fixed: HashMap<String, FixedOffset>,
}

impl TimeZoneResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fallback offset for a calendar-defined TZID.
    ///
    /// IANA names keep their DST-aware resolution; the fallback only applies
    /// to identifiers `chrono-tz` does not know.
    pub fn register_fixed(&mut self, tzid: &str, offset: FixedOffset) {
        self.fixed.insert(tzid.to_string(), offset);
        if matches!(self.cache.get(tzid), Some(Zone::Fixed(_))) {
            self.cache.remove(tzid);
        }
    }

    /// ## Summary
    /// Resolves a timezone identifier.
    ///
    /// Common CalDAV/iCalendar TZIDs (Mozilla prefixes, Windows names) are
    /// mapped to their IANA equivalents first.
    ///
    /// ## Errors
    /// Returns `ConversionError::UnknownTimezone` if the TZID cannot be resolved.
    ///
    /// ## Side Effects
    /// Caches successful resolutions.
    pub fn resolve(&mut self, tzid: &str) -> Result<Zone, ConversionError> {
        if let Some(zone) = self.cache.get(tzid) {
            return Ok(*zone);
        }

        let normalized = normalize_tzid(tzid);
        let zone = if is_utc_alias(&normalized) {
            Zone::Utc
        } else if let Ok(tz) = Tz::from_str(&normalized) {
            Zone::Named(tz)
        } else if let Some(offset) = self.fixed.get(tzid) {
            Zone::Fixed(*offset)
        } else {
            return Err(ConversionError::UnknownTimezone(tzid.to_string()));
        };

        self.cache.insert(tzid.to_string(), zone);
        Ok(zone)
    }
}

fn is_utc_alias(tzid: &str) -> bool {
    ["UTC", "Z", "GMT", "Etc/UTC", "Etc/GMT", "Coordinated Universal Time"]
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(tzid))
}

/// Windows zone names seen in Outlook/Exchange exports.
const WINDOWS_ZONES: &[(&str, &str)] = &[
    ("Eastern Standard Time", "America/New_York"),
    ("Central Standard Time", "America/Chicago"),
    ("Mountain Standard Time", "America/Denver"),
    ("US Mountain Standard Time", "America/Phoenix"),
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("Alaskan Standard Time", "America/Anchorage"),
    ("Hawaiian Standard Time", "Pacific/Honolulu"),
    ("Atlantic Standard Time", "America/Halifax"),
    ("GMT Standard Time", "Europe/London"),
    ("Greenwich Standard Time", "Atlantic/Reykjavik"),
    ("W. Europe Standard Time", "Europe/Berlin"),
    ("Romance Standard Time", "Europe/Paris"),
    ("Central Europe Standard Time", "Europe/Budapest"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("E. Europe Standard Time", "Europe/Chisinau"),
    ("FLE Standard Time", "Europe/Kiev"),
    ("GTB Standard Time", "Europe/Bucharest"),
    ("Russian Standard Time", "Europe/Moscow"),
    ("India Standard Time", "Asia/Kolkata"),
    ("China Standard Time", "Asia/Shanghai"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("Singapore Standard Time", "Asia/Singapore"),
    ("AUS Eastern Standard Time", "Australia/Sydney"),
    ("New Zealand Standard Time", "Pacific/Auckland"),
    ("UTC", "UTC"),
];

/// Normalizes common CalDAV/iCalendar timezone identifiers to IANA names.
#[must_use]
pub fn normalize_tzid(tzid: &str) -> String {
    let trimmed = tzid.trim().trim_matches('"');
    let stripped = trimmed
        .strip_prefix("/mozilla.org/20050126_1/")
        .or_else(|| trimmed.strip_prefix("/mozilla.org/20070129_1/"))
        .or_else(|| trimmed.strip_prefix("/mozilla.org/"))
        .or_else(|| trimmed.strip_prefix("/softwarestudio.org/Olson_20011030_5/"))
        .or_else(|| trimmed.strip_prefix("/softwarestudio.org/"))
        .or_else(|| trimmed.strip_prefix('/'))
        .unwrap_or(trimmed);

    WINDOWS_ZONES
        .iter()
        .find(|(windows, _)| windows.eq_ignore_ascii_case(stripped))
        .map_or_else(|| stripped.to_string(), |(_, iana)| (*iana).to_string())
}

/// ## Summary
/// Converts a wall-clock datetime in `tzid` to UTC.
///
/// ## Errors
/// Returns an error if the timezone cannot be resolved or the time does not
/// exist in it.
///
/// ## Side Effects
/// Updates the resolver's cache if a new timezone is resolved.
pub fn convert_to_utc(
    local_time: NaiveDateTime,
    tzid: &str,
    resolver: &mut TimeZoneResolver,
) -> Result<DateTime<Utc>, ConversionError> {
    resolver.resolve(tzid)?.to_utc(local_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_resolve_standard_timezone() {
        let mut resolver = TimeZoneResolver::new();
        let zone = resolver.resolve("America/New_York").unwrap();
        assert_eq!(zone, Zone::Named(Tz::America__New_York));
        assert!(resolver.cache.contains_key("America/New_York"));
    }

    #[test]
    fn test_normalize_windows_and_mozilla() {
        assert_eq!(normalize_tzid("Eastern Standard Time"), "America/New_York");
        assert_eq!(normalize_tzid("w. europe standard time"), "Europe/Berlin");
        assert_eq!(
            normalize_tzid("/mozilla.org/20050126_1/America/New_York"),
            "America/New_York"
        );
        assert_eq!(normalize_tzid("\"Europe/Paris\""), "Europe/Paris");
    }

    #[test]
    fn test_convert_to_utc_standard_and_dst() {
        let mut resolver = TimeZoneResolver::new();

        let winter = convert_to_utc(local(2026, 1, 15, 10, 0), "America/New_York", &mut resolver)
            .unwrap();
        assert_eq!(winter, Utc.with_ymd_and_hms(2026, 1, 15, 15, 0, 0).unwrap());

        let summer = convert_to_utc(local(2026, 7, 15, 10, 0), "America/New_York", &mut resolver)
            .unwrap();
        assert_eq!(summer, Utc.with_ymd_and_hms(2026, 7, 15, 14, 0, 0).unwrap());
    }

    #[test]
    fn test_gap_shifts_forward() {
        let mut resolver = TimeZoneResolver::new();
        // 2026-03-08 02:30 does not exist in New York
        let utc = convert_to_utc(local(2026, 3, 8, 2, 30), "America/New_York", &mut resolver)
            .unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2026, 3, 8, 7, 30, 0).unwrap());
    }

    #[test]
    fn test_fold_takes_earliest() {
        let mut resolver = TimeZoneResolver::new();
        // 2026-11-01 01:30 happens twice in New York; first is EDT (UTC-4)
        let utc = convert_to_utc(local(2026, 11, 1, 1, 30), "America/New_York", &mut resolver)
            .unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2026, 11, 1, 5, 30, 0).unwrap());
    }

    #[test]
    fn test_fixed_offset_fallback() {
        let mut resolver = TimeZoneResolver::new();
        assert!(matches!(
            resolver.resolve("Company Time"),
            Err(ConversionError::UnknownTimezone(_))
        ));

        resolver.register_fixed("Company Time", FixedOffset::east_opt(2 * 3600).unwrap());
        let zone = resolver.resolve("Company Time").unwrap();
        assert_eq!(zone.to_string(), "+02:00");
        assert_eq!(
            zone.to_utc(local(2026, 5, 1, 12, 0)).unwrap(),
            Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_utc_aliases_and_round_trip() {
        let mut resolver = TimeZoneResolver::new();
        assert_eq!(resolver.resolve("GMT").unwrap(), Zone::Utc);

        let berlin = resolver.resolve("Europe/Berlin").unwrap();
        let instant = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
        assert_eq!(berlin.to_local(instant), local(2026, 6, 1, 10, 0));
    }
}
