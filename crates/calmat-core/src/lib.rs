//! Shared configuration, error types and tracing setup for the calendar
//! materialisation crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
