//! RFC 5322 `Date` field parsing via `chrono`, with a couple of lenient
//! fallbacks for the two-digit-year and missing-weekday variants seen
//! in the wild (the original's MIME parser accepts both).

use chrono::{DateTime, FixedOffset};

use crate::error::MessageError;

/// Parses an RFC 5322 date-time, trying the strict form first
/// (`chrono`'s `parse_from_rfc2822`) and falling back to a couple of
/// lenient variants before giving up.
pub fn parse_date(input: &str) -> Result<DateTime<FixedOffset>, MessageError> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt);
    }
    // Some senders omit the leading weekday ("Mon, ") entirely, or
    // include it without the comma; chrono's rfc2822 parser requires
    // the comma form, so strip a bare leading weekday token and retry.
    if let Some(stripped) = strip_bare_weekday(trimmed) {
        if let Ok(dt) = DateTime::parse_from_rfc2822(&stripped) {
            return Ok(dt);
        }
    }
    Err(MessageError::bad_date())
}

fn strip_bare_weekday(input: &str) -> Option<String> {
    const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    let mut parts = input.splitn(2, char::is_whitespace);
    let first = parts.next()?;
    let rest = parts.next()?;
    if WEEKDAYS.iter().any(|w| first.eq_ignore_ascii_case(w)) && !first.ends_with(',') {
        Some(format!("{}, {}", first, rest))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_rfc5322_date() {
        let dt = parse_date("Mon, 27 Jul 2026 10:30:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2026-07-27");
    }

    #[test]
    fn parses_date_missing_comma_after_weekday() {
        let dt = parse_date("Mon 27 Jul 2026 10:30:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2026-07-27");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_date("not a date").is_err());
    }
}
