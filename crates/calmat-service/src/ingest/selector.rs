use crate::error::{ServiceError, ServiceResult};

/// How a document is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionMode {
    /// The whole document is parsed in memory in one pass.
    SinglePass,
    /// Components are assembled line by line from a reader.
    Streaming,
}

impl IngestionMode {
    /// Picks the mode from the UTF-8 length of `input`.
    #[must_use]
    pub const fn select(input: &str, threshold_bytes: usize) -> Self {
        if should_stream(input, threshold_bytes) {
            Self::Streaming
        } else {
            Self::SinglePass
        }
    }
}

/// Whether `input` is larger than the streaming threshold. Never tokenizes.
#[must_use]
pub const fn should_stream(input: &str, threshold_bytes: usize) -> bool {
    input.len() > threshold_bytes
}

/// ## Summary
/// Rejects documents without a VCALENDAR envelope before any component is read.
///
/// ## Errors
/// Returns `StructuralError` for empty or whitespace-only input and for a
/// missing `BEGIN:VCALENDAR` or `END:VCALENDAR` line.
pub fn validate_envelope(input: &str) -> ServiceResult<()> {
    if input.trim().is_empty() {
        return Err(ServiceError::StructuralError(
            "calendar text is empty".to_string(),
        ));
    }

    let mut has_begin = false;
    let mut has_end = false;
    for line in input.lines() {
        let line = line.trim();
        if !has_begin && line.eq_ignore_ascii_case("BEGIN:VCALENDAR") {
            has_begin = true;
        } else if line.eq_ignore_ascii_case("END:VCALENDAR") {
            has_end = true;
        } else {
            // other content
        }
    }

    match (has_begin, has_end) {
        (true, true) => Ok(()),
        (false, _) => Err(ServiceError::StructuralError(
            "missing BEGIN:VCALENDAR".to_string(),
        )),
        (true, false) => Err(ServiceError::StructuralError(
            "missing END:VCALENDAR".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_on_byte_length() {
        assert_eq!(IngestionMode::select("", 0), IngestionMode::SinglePass);
        assert_eq!(IngestionMode::select("abc", 3), IngestionMode::SinglePass);
        assert_eq!(IngestionMode::select("abcd", 3), IngestionMode::Streaming);
        // Two bytes in UTF-8, one char.
        assert!(should_stream("é", 1));
    }

    #[test]
    fn envelope_checks() {
        assert!(validate_envelope("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n").is_ok());
        assert!(validate_envelope("begin:vcalendar\nend:vcalendar").is_ok());

        for bad in ["", "   \r\n ", "BEGIN:VCALENDAR\r\n", "END:VCALENDAR\r\n"] {
            assert!(matches!(
                validate_envelope(bad),
                Err(ServiceError::StructuralError(_))
            ));
        }
    }

    #[test]
    fn missing_end_message() {
        let err = validate_envelope("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nEND:VEVENT\r\n").unwrap_err();
        assert!(err.to_string().contains("END:VCALENDAR"));
    }
}
