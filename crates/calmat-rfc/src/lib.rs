//! RFC 5545 content-line parsing and timezone resolution used by the
//! calendar materialization pipeline.

pub mod error;
pub mod rfc;

pub use error::{RfcError, RfcResult};
