//! Recurrence expansion.

pub mod orchestrator;
pub mod rule;

pub use orchestrator::{ExpansionOrchestrator, ExpansionReport, collect_candidates};
pub use rule::{
    ExpansionCandidate, ExpansionOutcome, ExpansionSettings, SeriesExpansion, expand_series,
};
