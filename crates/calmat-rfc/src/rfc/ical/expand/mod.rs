//! Wall-clock to UTC conversion.

pub mod timezone;

pub use timezone::{ConversionError, TimeZoneResolver, Zone, convert_to_utc, normalize_tzid};
