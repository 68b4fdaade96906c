//! iCalendar (RFC 5545) support.

pub mod core;
pub mod expand;
pub mod parse;
