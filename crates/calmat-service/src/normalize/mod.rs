//! Value normalization shared by the component parser and expansion.

pub mod attendee;
pub mod datetime;

pub use attendee::parse_attendee;
pub use datetime::{ResolvedTime, TimeContext};
