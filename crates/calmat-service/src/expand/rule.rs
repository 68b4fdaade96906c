//! Expansion of one recurring series.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use calmat_core::config::PipelineConfig;
use calmat_rfc::rfc::ical::core::DateOrDateTime;
use calmat_rfc::RfcError;
use calmat_rfc::rfc::ical::expand::Zone;
use calmat_rfc::rfc::ical::parse::{parse_date, parse_datetime};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use rrule::{RRule, RRuleSet, Tz, Unvalidated};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::cache::SharedCache;
use crate::calendar::{CalendarEvent, EventOrigin, RawComponent};
use crate::component::{ID_TIMESTAMP_FORMAT, materialize};
use crate::error::{ServiceError, ServiceResult};
use crate::normalize::datetime::next_midnight;
use crate::normalize::{ResolvedTime, TimeContext};

/// Limits applied to every series of one parse call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionSettings {
    /// Occurrences starting before this are skipped and do not count
    /// towards `max_occurrences`.
    pub window_start: DateTime<Utc>,
    /// Occurrences starting after this are not generated.
    pub window_end: DateTime<Utc>,
    pub max_occurrences: usize,
    pub yield_interval: usize,
    pub budget: Duration,
}

impl ExpansionSettings {
    /// Derives the window from `reference` ("now" for the parse call).
    #[must_use]
    pub fn from_config(config: &PipelineConfig, reference: DateTime<Utc>) -> Self {
        let window_end = reference
            .checked_add_signed(TimeDelta::days(i64::from(config.expansion_window_days)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let window_start = reference
            .checked_sub_signed(TimeDelta::days(i64::from(config.expansion_lookback_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Self {
            window_start,
            window_end,
            max_occurrences: config.max_occurrences_per_rule,
            yield_interval: config.yield_interval.max(1),
            budget: config.rule_time_budget(),
        }
    }
}

/// A master queued for expansion.
#[derive(Debug, Clone)]
pub struct ExpansionCandidate {
    pub master: Arc<RawComponent>,
    /// RRULE text as written, without the `RRULE:` prefix.
    pub rule: String,
}

impl ExpansionCandidate {
    /// `None` unless `master` carries a recurrence rule.
    #[must_use]
    pub fn from_master(master: Arc<RawComponent>) -> Option<Self> {
        let rule = master.rrule.clone().filter(|rule| !rule.trim().is_empty())?;
        Some(Self { master, rule })
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.master.uid
    }
}

/// How generation of a series ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// The rule or the window ran out.
    Complete,
    /// Stopped at the per-rule occurrence cap.
    Truncated,
    /// Stopped when the time budget ran out; earlier occurrences are kept.
    BudgetExceeded,
}

#[derive(Debug, Clone)]
pub struct SeriesExpansion {
    pub uid: String,
    /// Chronological by start.
    pub instances: Vec<CalendarEvent>,
    pub outcome: ExpansionOutcome,
    /// Occurrences the rule produced inside the window, before exclusions.
    pub generated: usize,
}

/// EXDATE values normalised against the series' start.
#[derive(Debug, Default)]
struct Exclusions {
    instants: HashSet<DateTime<Utc>>,
    /// Date-only exclusions of a timed series; they remove every occurrence
    /// on that local date.
    dates: HashSet<NaiveDate>,
}

impl Exclusions {
    fn resolve(
        values: &[DateOrDateTime],
        start: &ResolvedTime,
        ctx: &mut TimeContext,
    ) -> Self {
        let mut exclusions = Self::default();
        for value in values {
            match value {
                DateOrDateTime::Date(date) if !start.all_day => {
                    if let Some(day) = date.to_naive() {
                        exclusions.dates.insert(day);
                    }
                }
                _ => match ctx.resolve_in(value, start.zone) {
                    Ok(resolved) => {
                        exclusions.instants.insert(resolved.instant);
                    }
                    Err(e) => tracing::debug!(%value, error = %e, "Ignoring unresolvable EXDATE"),
                },
            }
        }
        exclusions
    }

    fn excludes(&self, instant: DateTime<Utc>, zone: Zone) -> bool {
        self.instants.contains(&instant)
            || (!self.dates.is_empty() && self.dates.contains(&zone.to_local(instant).date()))
    }
}

/// ## Summary
/// Expands one series inside the window.
///
/// Occurrences are generated from the master's own start in its own zone.
/// EXDATEs remove candidates; an override whose RECURRENCE-ID matches a
/// remaining candidate replaces it and its original slot.
///
/// Every `yield_interval` generated occurrences the task checks `cancel`,
/// checks the time budget and yields to the scheduler.
///
/// ## Errors
/// Returns `InvalidRule` if the rule cannot be parsed or built,
/// `InvalidComponent` if the master cannot be resolved and `Cancelled`
/// when `cancel` fires.
#[tracing::instrument(skip_all, fields(uid = %candidate.uid()))]
pub async fn expand_series(
    candidate: &ExpansionCandidate,
    mut ctx: TimeContext,
    cache: &SharedCache,
    settings: &ExpansionSettings,
    cancel: &CancellationToken,
) -> ServiceResult<SeriesExpansion> {
    if cancel.is_cancelled() {
        return Err(ServiceError::Cancelled);
    }

    let master = candidate.master.as_ref();
    let template = materialize(master, &mut ctx)?;
    let (start, end) = ctx.event_span(master)?;
    let rule_set = build_rule_set(candidate, &start, &mut ctx)?;

    let started = Instant::now();
    let mut occurrences = Vec::new();
    let mut outcome = ExpansionOutcome::Complete;

    for (generated, occurrence) in (&rule_set).into_iter().enumerate() {
        if generated > 0 && generated % settings.yield_interval == 0 {
            if cancel.is_cancelled() {
                tracing::debug!(generated, "Expansion cancelled");
                return Err(ServiceError::Cancelled);
            }
            if started.elapsed() > settings.budget {
                tracing::warn!(generated, budget = ?settings.budget, "Expansion over time budget");
                outcome = ExpansionOutcome::BudgetExceeded;
                break;
            }
            tokio::task::yield_now().await;
        }

        let instant = occurrence.with_timezone(&Utc);
        if instant > settings.window_end {
            break;
        }
        if instant < settings.window_start {
            continue;
        }
        if occurrences.len() >= settings.max_occurrences {
            outcome = ExpansionOutcome::Truncated;
            break;
        }
        occurrences.push(instant);
    }

    let generated = occurrences.len();
    let exclusions = Exclusions::resolve(&master.exdates, &start, &mut ctx);
    let mut overrides = load_overrides(cache, &master.uid, start.zone, &mut ctx).await;
    let span = Span::of(&start, end);

    let mut instances = Vec::with_capacity(occurrences.len());
    for original in occurrences {
        if exclusions.excludes(original, start.zone) {
            tracing::trace!(%original, "Occurrence excluded");
            continue;
        }

        let replacement = overrides
            .remove(&original)
            .and_then(|component| match materialize(&component, &mut ctx) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(%original, error = %e, "Ignoring unresolvable override");
                    None
                }
            });

        let instance = match replacement {
            Some(mut event) => {
                event.origin = EventOrigin::Override {
                    source_uid: master.uid.clone(),
                    original_start: original,
                };
                event.is_recurring = true;
                event
            }
            None => {
                let mut event = template.clone();
                event.start = original;
                event.end = span.end_for(original, start.zone)?;
                event.origin = EventOrigin::Expanded {
                    source_uid: master.uid.clone(),
                    original_start: original,
                };
                event
            }
        };
        instances.push(with_instance_id(instance, original));
    }
    instances.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    if !overrides.is_empty() {
        tracing::debug!(unmatched = overrides.len(), "Overrides without a matching occurrence");
    }
    tracing::debug!(generated, instances = instances.len(), ?outcome, "Series expanded");

    Ok(SeriesExpansion {
        uid: master.uid.clone(),
        instances,
        outcome,
        generated,
    })
}

fn build_rule_set(
    candidate: &ExpansionCandidate,
    start: &ResolvedTime,
    ctx: &mut TimeContext,
) -> ServiceResult<RRuleSet> {
    let tz = rule_zone(start.zone);
    let invalid = |e: &dyn std::fmt::Display| {
        ServiceError::InvalidRule(format!("{} ({}): {e}", candidate.uid(), candidate.rule))
    };

    let rule = normalize_until(&candidate.rule, start, ctx)
        .map_err(|e| invalid(&e))?
        .parse::<RRule<Unvalidated>>()
        .map_err(|e| invalid(&e))?;
    let mut rule_set = rule
        .build(start.instant.with_timezone(&tz))
        .map_err(|e| invalid(&e))?;

    if !candidate.master.rdates.is_empty() {
        let mut rdates = Vec::with_capacity(candidate.master.rdates.len());
        for rdate in &candidate.master.rdates {
            rdates.push(ctx.resolve_in(rdate, start.zone)?.instant.with_timezone(&tz));
        }
        rule_set = rule_set.set_rdates(rdates);
    }
    Ok(rule_set)
}

/// Rewrites UNTIL as a UTC date-time.
///
/// A DATE bound covers the whole local day of the series' zone; a floating
/// bound is local time in that zone.
fn normalize_until(
    rule: &str,
    start: &ResolvedTime,
    ctx: &mut TimeContext,
) -> ServiceResult<String> {
    let mut parts = Vec::new();
    for part in rule.split(';') {
        let Some((name, value)) = part.split_once('=') else {
            parts.push(part.to_string());
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("UNTIL") {
            parts.push(part.to_string());
            continue;
        }

        let value = value.trim();
        let until = if value.contains(['T', 't']) {
            let bound = parse_datetime(value, None, 1, 1).map_err(RfcError::from)?;
            ctx.resolve_in(&DateOrDateTime::DateTime(bound), start.zone)?
                .instant
        } else {
            let day = parse_date(value, 1, 1)
                .map_err(RfcError::from)?
                .to_naive()
                .ok_or_else(|| ServiceError::InvalidRule(format!("invalid UNTIL date {value}")))?;
            next_midnight(start.zone, day, 1)? - TimeDelta::seconds(1)
        };
        parts.push(format!("UNTIL={}", until.format(ID_TIMESTAMP_FORMAT)));
    }
    Ok(parts.join(";"))
}

/// Named zones recur on their own wall clock; fixed offsets have no DST so
/// UTC steps are equivalent.
const fn rule_zone(zone: Zone) -> Tz {
    match zone {
        Zone::Named(tz) => Tz::Tz(tz),
        Zone::Utc | Zone::Fixed(_) => Tz::UTC,
    }
}

async fn load_overrides(
    cache: &SharedCache,
    uid: &str,
    zone: Zone,
    ctx: &mut TimeContext,
) -> HashMap<DateTime<Utc>, Arc<RawComponent>> {
    let stored = cache.read().await.overrides_for(uid);
    let mut overrides = HashMap::with_capacity(stored.len());
    for (recurrence_id, component) in stored {
        match ctx.resolve_in(&recurrence_id, zone) {
            Ok(resolved) => {
                overrides.insert(resolved.instant, component);
            }
            Err(e) => tracing::debug!(uid, error = %e, "Unresolvable RECURRENCE-ID"),
        }
    }
    overrides
}

/// Length of one occurrence.
enum Span {
    /// Whole local days, so instances stay midnight to midnight across DST.
    /// Used when an all-day master ends on a later date.
    Days(u64),
    Exact(TimeDelta),
}

impl Span {
    fn of(start: &ResolvedTime, end: DateTime<Utc>) -> Self {
        if start.all_day {
            let end_date = start.zone.to_local(end).date();
            if let Ok(days) = u64::try_from((end_date - start.local_date()).num_days())
                && days > 0
            {
                return Self::Days(days);
            }
        }
        Self::Exact(end - start.instant)
    }

    fn end_for(&self, start: DateTime<Utc>, zone: Zone) -> ServiceResult<DateTime<Utc>> {
        match self {
            Self::Days(days) => next_midnight(zone, zone.to_local(start).date(), *days),
            Self::Exact(delta) => start.checked_add_signed(*delta).ok_or_else(|| {
                ServiceError::InvalidComponent(format!("occurrence end overflows after {start}"))
            }),
        }
    }
}

/// Id of an instance: base UID, original occurrence start and a short hash
/// of the instance content.
fn with_instance_id(mut event: CalendarEvent, original: DateTime<Utc>) -> CalendarEvent {
    let mut hasher = Sha256::new();
    hasher.update(event.uid.as_bytes());
    hasher.update(original.timestamp().to_le_bytes());
    hasher.update(event.start.timestamp().to_le_bytes());
    hasher.update(event.subject.as_bytes());
    let digest = hex::encode(hasher.finalize());

    event.id = format!(
        "{}_{}_{}",
        event.uid,
        original.format(ID_TIMESTAMP_FORMAT),
        &digest[..8]
    );
    event
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
