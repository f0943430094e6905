//! Log classification.
//!
//! Strict priority order, first match wins at the strategy level:
//! 1. structured key=value extraction,
//! 2. the traditional extractors (java, python, node, generic) folded by
//!    populated-field count,
//! 3. a final fixed-pattern timestamp pass if none was found earlier.
//!
//! Contract: the analyzer only reports what the text contains. A strategy
//! that recognizes nothing contributes nothing; it never guesses and never
//! fails the analysis. A panic anywhere inside analysis is caught at this
//! boundary and reported as an explicit `analysis_error` classification.

pub mod traditional;

use std::panic::{catch_unwind, AssertUnwindSafe};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{AlertClassification, FixType, LogFormat};
use crate::normalize::timestamps::extract_timestamp;
use traditional::{all_extractors, PartialClassification};

static KEY_VALUE: Lazy<Regex> = Lazy::new(|| {
    // key=value with optionally single- or double-quoted values.
    Regex::new(r#"(\w+)=(?:"([^"]+)"|'([^']+)'|(\S+))"#).expect("static key=value pattern")
});
static LEADING_SEVERITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(ERROR|FATAL|WARN|WARNING|RUNTIME_ERROR|EXCEPTION)\b")
        .expect("static severity pattern")
});

const CONFIG_KEYWORDS: &[&str] = &[
    "config",
    "property",
    "setting",
    "parameter",
    "env",
    "connection",
    "timeout",
    "port",
    "host",
    "url",
    "permission",
    "access",
    "auth",
    "credential",
    "file not found",
    "enoent",
    "path",
    "directory",
];

/// Classify raw log text. Never fails: the worst case is an explicit
/// `analysis_error` classification.
pub fn analyze_log(log_content: &str) -> AlertClassification {
    match catch_unwind(AssertUnwindSafe(|| analyze_inner(log_content))) {
        Ok(classification) => classification,
        Err(_) => {
            log::error!("log analysis panicked; returning analysis_error classification");
            AlertClassification::analysis_error("analysis aborted unexpectedly")
        }
    }
}

fn analyze_inner(log_content: &str) -> AlertClassification {
    let mut result = AlertClassification::default();

    let structured = extract_structured(log_content);
    if is_substantial(&structured) {
        structured.merge_into(&mut result);
        result.log_format = Some(LogFormat::Structured);
    } else {
        let mut best: Option<PartialClassification> = None;
        for extractor in all_extractors() {
            let candidate = extractor(log_content);
            let better = match &best {
                // Strict comparison keeps declaration order as tie-breaker.
                Some(current) => candidate.filled_count() > current.filled_count(),
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }
        if let Some(best) = best {
            best.merge_into(&mut result);
        }
        result.log_format = Some(LogFormat::Traditional);
    }

    if result.timestamp.is_none() {
        result.timestamp = extract_timestamp(log_content);
    }

    result.suggested_fix_type = derive_fix_type(&result);
    result
}

/// Structured key=value extraction over the whole text, plus the leading
/// severity token.
fn extract_structured(log_content: &str) -> PartialClassification {
    let mut out = PartialClassification::default();

    for caps in KEY_VALUE.captures_iter(log_content) {
        let key = &caps[1];
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string());
        let Some(value) = value else { continue };

        match key {
            "service" => out.service_name = Some(value),
            "className" => out.class_name = Some(value),
            "methodName" => out.method_name = Some(value),
            "file" => out.file_path = Some(value),
            "line" => {
                if let Ok(n) = value.parse() {
                    out.line_number = Some(n);
                }
            }
            "errorType" => out.error_type = Some(value),
            "endpoint" => out.endpoint = Some(value),
            "timestamp" => out.timestamp = Some(value),
            "message" | "msg" | "error" => {
                if out.root_cause_summary.is_none() {
                    out.root_cause_summary = Some(value);
                }
            }
            _ => {}
        }
    }

    if out.error_type.is_none() {
        if let Some(caps) = LEADING_SEVERITY.captures(log_content) {
            out.error_type = Some(caps[1].to_lowercase());
        }
    }

    out
}

/// A structured result is substantial iff at least 2 of the 4 key fields
/// (service, class, method, error type) were found.
fn is_substantial(candidate: &PartialClassification) -> bool {
    let found = [
        candidate.service_name.is_some(),
        candidate.class_name.is_some(),
        candidate.method_name.is_some(),
        candidate.error_type.is_some(),
    ]
    .iter()
    .filter(|b| **b)
    .count();
    found >= 2
}

/// Configuration when the root cause mentions any known operational keyword;
/// code otherwise.
fn derive_fix_type(result: &AlertClassification) -> FixType {
    let root_cause = result
        .root_cause_summary
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    if CONFIG_KEYWORDS.iter().any(|kw| root_cause.contains(kw)) {
        FixType::Configuration
    } else {
        FixType::Code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_structured_field_is_not_substantial() {
        let partial = extract_structured("service=\"pay-api\" took 14ms");
        assert!(!is_substantial(&partial));
    }

    #[test]
    fn leading_severity_token_fills_error_type() {
        let partial = extract_structured("ERROR service=\"pay-api\"");
        assert_eq!(partial.error_type.as_deref(), Some("error"));
    }

    #[test]
    fn timeout_root_cause_suggests_configuration() {
        let result = analyze_log("ERROR: connection timeout while reaching db");
        assert_eq!(result.suggested_fix_type, FixType::Configuration);
    }

    #[test]
    fn empty_input_yields_empty_traditional_classification() {
        let result = analyze_log("");
        assert_eq!(result.log_format, Some(LogFormat::Traditional));
        assert_eq!(result.service_name, None);
        assert_eq!(result.error_type, None);
        assert_eq!(result.suggested_fix_type, FixType::Code);
    }
}
