use once_cell::sync::Lazy;
use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::{format_description, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::domain::ValidationWarning;

/// Fixed extraction patterns, in priority order. The first match anywhere in
/// the text wins; there is no fuzzy date guessing.
static EXTRACTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // ISO with optional milliseconds and trailing Z.
        r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{3})?Z?",
        // ISO without milliseconds, space or T separated.
        r"\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}",
        // US date.
        r"\d{2}/\d{2}/\d{4}\s+\d{2}:\d{2}:\d{2}",
        // EU date.
        r"\d{2}-\d{2}-\d{4}\s+\d{2}:\d{2}:\d{2}",
        // Syslog month-day-time.
        r"\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static timestamp pattern"))
    .collect()
});

/// Scan free text for the first recognizable timestamp token.
///
/// Returns the matched text verbatim; callers that need a parsed value go
/// through [`parse_flexible`]. `None` means no pattern matched anywhere.
pub fn extract_timestamp(text: &str) -> Option<String> {
    for pattern in EXTRACTION_PATTERNS.iter() {
        if let Some(m) = pattern.find(text) {
            return Some(m.as_str().to_string());
        }
    }
    None
}

fn parse_primitive_assume_utc(
    raw: &str,
    fmt: &str,
    field: &str,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<OffsetDateTime> {
    let items = match format_description::parse(fmt) {
        Ok(i) => i,
        Err(e) => {
            warnings.push(
                ValidationWarning::new(
                    "TS_FORMAT_CONFIG_FAILED",
                    format!("Timestamp format config error for {field}"),
                )
                .with_details(format!("fmt={fmt}; err={e}")),
            );
            return None;
        }
    };

    let pdt = PrimitiveDateTime::parse(raw, &items).ok()?;

    // This format carries no timezone. We assume UTC deterministically but
    // surface the assumption instead of hiding it.
    warnings.push(
        ValidationWarning::new(
            "TS_TZ_ASSUMED_UTC",
            format!("Assumed UTC timezone for {field}"),
        )
        .with_details(format!("value={raw}; fmt={fmt}")),
    );

    Some(pdt.assume_utc())
}

/// Parse a timestamp trying, in order: RFC3339, then a deterministic
/// allowlist of zone-less ISO shapes (space-separated, T-separated, with
/// fractional seconds).
///
/// Contract: unparseable input yields `None` plus an explicit warning, never
/// an error and never a guessed value.
pub fn parse_flexible(
    field: &str,
    raw: Option<&str>,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<OffsetDateTime> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(dt.to_offset(UtcOffset::UTC));
    }

    for fmt in [
        "[year]-[month]-[day] [hour]:[minute]:[second]",
        "[year]-[month]-[day]T[hour]:[minute]:[second]",
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]",
    ] {
        if let Some(dt) = parse_primitive_assume_utc(raw, fmt, field, warnings) {
            return Some(dt);
        }
    }

    warnings.push(
        ValidationWarning::new(
            "TS_UNPARSEABLE",
            format!("Unparseable timestamp for {field}"),
        )
        .with_details(format!("raw={raw}")),
    );
    None
}

/// Current time as a canonical RFC3339 UTC string.
pub fn now_rfc3339_utc() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

pub fn format_rfc3339_utc(dt: OffsetDateTime) -> String {
    dt.to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Milliseconds since the Unix epoch for the given instant.
pub fn unix_millis(dt: OffsetDateTime) -> i64 {
    (dt.unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_iso_before_syslog() {
        let text = "Jan 15 08:00:00 then 2026-01-15T08:00:00Z happened";
        assert_eq!(
            extract_timestamp(text).as_deref(),
            Some("2026-01-15T08:00:00Z")
        );
    }

    #[test]
    fn extracts_us_format() {
        let text = "failure at 01/15/2026 08:30:00 in prod";
        assert_eq!(
            extract_timestamp(text).as_deref(),
            Some("01/15/2026 08:30:00")
        );
    }

    #[test]
    fn flexible_parse_assumes_utc_with_warning() {
        let mut warnings = Vec::new();
        let dt = parse_flexible("created_at", Some("2026-01-15 08:00:00"), &mut warnings)
            .expect("parse");
        assert_eq!(dt.unix_timestamp(), 1768464000);
        assert!(warnings.iter().any(|w| w.code == "TS_TZ_ASSUMED_UTC"));
    }

    #[test]
    fn flexible_parse_garbage_warns_and_returns_none() {
        let mut warnings = Vec::new();
        assert!(parse_flexible("resolved_at", Some("yesterday-ish"), &mut warnings).is_none());
        assert!(warnings.iter().any(|w| w.code == "TS_UNPARSEABLE"));
    }
}
