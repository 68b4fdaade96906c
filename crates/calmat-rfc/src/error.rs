use thiserror::Error;

use crate::rfc::ical::expand::ConversionError;
use crate::rfc::ical::parse::ParseError;

#[derive(Debug, Error)]
pub enum RfcError {
    #[error("iCalendar parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Timezone conversion error: {0}")]
    Timezone(#[from] ConversionError),
}

impl RfcError {
    /// Whether the error invalidates the whole calendar rather than one component.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        match self {
            Self::Parse(e) => e.is_structural(),
            Self::Timezone(_) => false,
        }
    }
}

pub type RfcResult<T> = std::result::Result<T, RfcError>;
