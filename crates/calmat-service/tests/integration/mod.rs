mod cache_scaling;
mod helpers;
mod pipeline;
mod recurrence;
mod streaming;
