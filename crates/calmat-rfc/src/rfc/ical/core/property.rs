//! iCalendar content lines and properties (RFC 5545 §3.1, §3.5).

use super::{DateOrDateTime, Duration, Parameter, UtcOffset, Value};

/// A lexed content line: `name *(";" param) ":" value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    /// Property name (normalized to uppercase).
    pub name: String,
    pub params: Vec<Parameter>,
    /// Value text exactly as it appeared after the colon.
    pub raw_value: String,
}

impl ContentLine {
    /// Gets a parameter by name (case-insensitive).
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn get_param_value(&self, name: &str) -> Option<&str> {
        self.get_param(name).and_then(Parameter::value)
    }

    /// Returns the VALUE parameter if present.
    #[must_use]
    pub fn value_type(&self) -> Option<&str> {
        self.get_param_value("VALUE")
    }

    /// Returns the TZID parameter if present.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.get_param_value("TZID")
    }
}

/// A parsed property with its decoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub params: Vec<Parameter>,
    pub value: Value,
    /// Original value text, kept for diagnostics and for RRULE which is
    /// handed to the rule engine verbatim.
    pub raw_value: String,
}

impl Property {
    /// Creates a text property.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            raw_value: value.clone(),
            value: Value::Text(value),
        }
    }

    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn get_param_value(&self, name: &str) -> Option<&str> {
        self.get_param(name).and_then(Parameter::value)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        self.value.as_text()
    }

    #[must_use]
    pub fn as_date_or_datetime(&self) -> Option<DateOrDateTime> {
        self.value.as_date_or_datetime()
    }

    #[must_use]
    pub fn as_date_list(&self) -> &[DateOrDateTime] {
        self.value.as_date_list()
    }

    #[must_use]
    pub const fn as_duration(&self) -> Option<&Duration> {
        self.value.as_duration()
    }

    #[must_use]
    pub const fn as_utc_offset(&self) -> Option<UtcOffset> {
        self.value.as_utc_offset()
    }
}
