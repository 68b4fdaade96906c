//! Bounded-concurrency expansion of all series of one parse call.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::rule::{
    ExpansionCandidate, ExpansionOutcome, ExpansionSettings, SeriesExpansion, expand_series,
};
use crate::cache::SharedCache;
use crate::error::{ServiceError, ServiceResult};
use crate::normalize::TimeContext;
use crate::result::{ParseWarning, WarningKind};

/// Result of expanding every candidate.
#[derive(Debug, Default)]
pub struct ExpansionReport {
    /// Successfully expanded series, ordered by UID.
    pub series: Vec<SeriesExpansion>,
    pub warnings: Vec<ParseWarning>,
    /// Series whose rule could not be expanded; their stubs stay as-is.
    pub failed_uids: HashSet<String>,
}

/// Runs [`expand_series`] for many candidates, at most `concurrency` at a time.
///
/// Holds no state between runs; the cache is only read.
pub struct ExpansionOrchestrator {
    settings: Arc<ExpansionSettings>,
    concurrency: usize,
    cache: SharedCache,
    context: TimeContext,
    cancel: CancellationToken,
}

impl ExpansionOrchestrator {
    #[must_use]
    pub fn new(
        settings: ExpansionSettings,
        concurrency: usize,
        cache: SharedCache,
        context: TimeContext,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            concurrency: concurrency.max(1),
            cache,
            context,
            cancel,
        }
    }

    /// ## Summary
    /// Expands all candidates.
    ///
    /// A rule that fails (or panics) becomes a `RuleSkipped` warning and does
    /// not affect the other series.
    ///
    /// ## Errors
    /// Returns `Cancelled` as soon as the token fires; in-flight expansions
    /// stop at their next checkpoint and queued ones never start.
    #[tracing::instrument(skip_all, fields(candidates = candidates.len(), concurrency = self.concurrency))]
    pub async fn run(&self, candidates: Vec<ExpansionCandidate>) -> ServiceResult<ExpansionReport> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for candidate in candidates {
            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|_e| ServiceError::Cancelled)?
                }
                () = self.cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(ServiceError::Cancelled);
                }
            };

            let settings = Arc::clone(&self.settings);
            let cache = self.cache.clone();
            let context = self.context.clone();
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let uid = candidate.uid().to_string();
                let expansion =
                    AssertUnwindSafe(expand_series(&candidate, context, &cache, &settings, &cancel))
                        .catch_unwind()
                        .await;
                (uid, expansion)
            });
        }

        let mut report = ExpansionReport::default();
        while let Some(joined) = tasks.join_next().await {
            let (uid, expansion) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(error = %e, "Expansion task failed to join");
                    continue;
                }
            };

            match expansion {
                Ok(Ok(series)) => {
                    record_outcome(&series, &self.settings, &mut report.warnings);
                    report.series.push(series);
                }
                Ok(Err(ServiceError::Cancelled)) => {
                    tasks.abort_all();
                    return Err(ServiceError::Cancelled);
                }
                Ok(Err(e)) => {
                    tracing::warn!(uid = %uid, error = %e, "Skipping recurrence rule");
                    report.warnings.push(ParseWarning::new(
                        WarningKind::RuleSkipped,
                        Some(&uid),
                        e.to_string(),
                    ));
                    report.failed_uids.insert(uid);
                }
                Err(_panic) => {
                    tracing::error!(uid = %uid, "Recurrence expansion panicked");
                    report.warnings.push(ParseWarning::new(
                        WarningKind::RuleSkipped,
                        Some(&uid),
                        "recurrence expansion aborted",
                    ));
                    report.failed_uids.insert(uid);
                }
            }
        }

        report.series.sort_by(|a, b| a.uid.cmp(&b.uid));
        report.warnings.sort_by(|a, b| a.uid.cmp(&b.uid));
        tracing::debug!(
            expanded = report.series.len(),
            failed = report.failed_uids.len(),
            "Expansion run finished"
        );
        Ok(report)
    }
}

fn record_outcome(
    series: &SeriesExpansion,
    settings: &ExpansionSettings,
    warnings: &mut Vec<ParseWarning>,
) {
    let warning = match series.outcome {
        ExpansionOutcome::Complete => return,
        ExpansionOutcome::Truncated => ParseWarning::new(
            WarningKind::ExpansionTruncated,
            Some(&series.uid),
            format!("stopped after {} occurrences", settings.max_occurrences),
        ),
        ExpansionOutcome::BudgetExceeded => ParseWarning::new(
            WarningKind::ExpansionBudgetExceeded,
            Some(&series.uid),
            format!(
                "time budget of {} ms exhausted after {} occurrences",
                settings.budget.as_millis(),
                series.generated
            ),
        ),
    };
    warnings.push(warning);
}

/// Candidates for every master in the cache, oldest first.
pub async fn collect_candidates(cache: &SharedCache) -> Vec<ExpansionCandidate> {
    cache
        .read()
        .await
        .masters()
        .into_iter()
        .filter_map(ExpansionCandidate::from_master)
        .collect()
}
