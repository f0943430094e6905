//! Traditional-format log extractors.
//!
//! Each extractor is a pure function `&str -> PartialClassification` with no
//! knowledge of the others. The caller folds their outputs, keeping the
//! candidate with the most populated fields (declaration order breaks ties).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::AlertClassification;

/// Candidate fields produced by a single extractor. All optional; an
/// extractor that recognizes nothing returns the default value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialClassification {
    pub service_name: Option<String>,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
    pub line_number: Option<u32>,
    pub error_type: Option<String>,
    pub endpoint: Option<String>,
    pub timestamp: Option<String>,
    pub file_path: Option<String>,
    pub root_cause_summary: Option<String>,
}

impl PartialClassification {
    /// How many fields this candidate populated. The fold ranks candidates
    /// by this count.
    pub fn filled_count(&self) -> usize {
        [
            self.service_name.is_some(),
            self.class_name.is_some(),
            self.method_name.is_some(),
            self.line_number.is_some(),
            self.error_type.is_some(),
            self.endpoint.is_some(),
            self.timestamp.is_some(),
            self.file_path.is_some(),
            self.root_cause_summary.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    /// Copy each populated field onto `out` wherever `out` is still empty.
    pub fn merge_into(&self, out: &mut AlertClassification) {
        if out.service_name.is_none() {
            out.service_name = self.service_name.clone();
        }
        if out.class_name.is_none() {
            out.class_name = self.class_name.clone();
        }
        if out.method_name.is_none() {
            out.method_name = self.method_name.clone();
        }
        if out.line_number.is_none() {
            out.line_number = self.line_number;
        }
        if out.error_type.is_none() {
            out.error_type = self.error_type.clone();
        }
        if out.endpoint.is_none() {
            out.endpoint = self.endpoint.clone();
        }
        if out.timestamp.is_none() {
            out.timestamp = self.timestamp.clone();
        }
        if out.file_path.is_none() {
            out.file_path = self.file_path.clone();
        }
        if out.root_cause_summary.is_none() {
            out.root_cause_summary = self.root_cause_summary.clone();
        }
    }
}

static JAVA_EXCEPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:Exception in thread ".*?" )?([A-Za-z0-9.$_]+(?:Exception|Error)): (.+)"#)
        .expect("static java exception pattern")
});
static JAVA_STACK_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"at ([A-Za-z0-9.$_]+)\.([A-Za-z0-9_$<>]+)\(([^)]*):(\d+)\)")
        .expect("static java stack pattern")
});

/// Java stack traces and exceptions.
pub fn extract_java(log_content: &str) -> PartialClassification {
    let mut out = PartialClassification::default();

    if let Some(caps) = JAVA_EXCEPTION.captures(log_content) {
        out.class_name = Some(caps[1].to_string());
        out.error_type = Some("java_exception".to_string());
        out.root_cause_summary = Some(caps[2].trim().to_string());
    }

    // Topmost frame is the failure site.
    if let Some(caps) = JAVA_STACK_FRAME.captures(log_content) {
        if out.class_name.is_none() {
            out.class_name = Some(caps[1].to_string());
        }
        out.method_name = Some(caps[2].to_string());
        out.line_number = caps[4].parse().ok();
        out.file_path = Some(caps[3].to_string());
    }

    if log_content.contains("OutOfMemoryError") {
        out.error_type = Some("java_memory_error".to_string());
        out.root_cause_summary = Some("Java heap space exhausted".to_string());
    } else if log_content.contains("NullPointerException") {
        out.error_type = Some("java_null_pointer".to_string());
        if out.root_cause_summary.is_none() {
            out.root_cause_summary = Some("Null reference access".to_string());
        }
    }

    out
}

static PYTHON_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"File "([^"]+)", line (\d+), in ([^\n]+)"#).expect("static python frame pattern")
});
static PYTHON_EXCEPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z0-9_]+Error|[A-Za-z0-9_]+Exception): (.+)")
        .expect("static python exception pattern")
});

/// Python tracebacks and exceptions.
pub fn extract_python(log_content: &str) -> PartialClassification {
    let mut out = PartialClassification::default();

    // Pythons print the failing frame last.
    if let Some(caps) = PYTHON_FRAME.captures_iter(log_content).last() {
        out.file_path = Some(caps[1].to_string());
        out.line_number = caps[2].parse().ok();
        out.method_name = Some(caps[3].trim().to_string());
    }

    if let Some(caps) = PYTHON_EXCEPTION.captures(log_content) {
        out.class_name = Some(caps[1].to_string());
        out.error_type = Some("python_exception".to_string());
        out.root_cause_summary = Some(caps[2].trim().to_string());
    }

    if log_content.contains("ImportError") || log_content.contains("ModuleNotFoundError") {
        out.error_type = Some("python_import_error".to_string());
        if out.root_cause_summary.is_none() {
            out.root_cause_summary = Some("Missing module or import issue".to_string());
        }
    }

    out
}

static NODE_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9_]+Error): (.+)").expect("static node error pattern"));
static NODE_STACK_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"at (?:([A-Za-z0-9_.$]+)\s+)?\(([^:]+):(\d+):\d+\)")
        .expect("static node stack pattern")
});

/// Node.js errors and stack traces.
pub fn extract_node(log_content: &str) -> PartialClassification {
    let mut out = PartialClassification::default();

    if let Some(caps) = NODE_ERROR.captures(log_content) {
        out.class_name = Some(caps[1].to_string());
        out.error_type = Some("nodejs_error".to_string());
        out.root_cause_summary = Some(caps[2].trim().to_string());
    }

    // First named frame; anonymous module wrappers carry no signal.
    for caps in NODE_STACK_FRAME.captures_iter(log_content) {
        let method = caps.get(1).map(|m| m.as_str());
        if let Some(method) = method {
            if method != "Object.<anonymous>" {
                out.method_name = Some(method.to_string());
                out.line_number = caps[3].parse().ok();
                out.file_path = Some(caps[2].to_string());
                break;
            }
        }
    }

    if log_content.contains("ENOENT") {
        out.error_type = Some("nodejs_file_not_found".to_string());
        if out.root_cause_summary.is_none() {
            out.root_cause_summary = Some("File or directory not found".to_string());
        }
    } else if log_content.contains("TypeError") && log_content.contains("undefined") {
        out.error_type = Some("nodejs_undefined_reference".to_string());
        if out.root_cause_summary.is_none() {
            out.root_cause_summary = Some("Undefined variable or property access".to_string());
        }
    }

    out
}

static GENERIC_ERROR_LINES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)ERROR[:\s]+(.+)",
        r"(?i)FATAL[:\s]+(.+)",
        r"(?i)SEVERE[:\s]+(.+)",
        r"(?i)fail(?:ed|ure)[:\s]+(.+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static generic error pattern"))
    .collect()
});
static GENERIC_CLASS_METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z][a-zA-Z0-9]*(?:\.[A-Z][a-zA-Z0-9]*)*)\.([a-z][a-zA-Z0-9_]*)\(")
        .expect("static class.method pattern")
});
static GENERIC_LINE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)line\s+(\d+)").expect("static line ref pattern"));

const GENERIC_SUMMARY_LIMIT: usize = 200;

/// Generic application logs: error-level lines, `Class.method(` references,
/// `line N` mentions.
pub fn extract_generic(log_content: &str) -> PartialClassification {
    let mut out = PartialClassification::default();

    for pattern in GENERIC_ERROR_LINES.iter() {
        if let Some(caps) = pattern.captures(log_content) {
            out.error_type = Some("generic_error".to_string());
            let summary: String = caps[1].trim().chars().take(GENERIC_SUMMARY_LIMIT).collect();
            out.root_cause_summary = Some(summary);
            break;
        }
    }

    if let Some(caps) = GENERIC_CLASS_METHOD.captures(log_content) {
        out.class_name = Some(caps[1].to_string());
        out.method_name = Some(caps[2].to_string());
    }

    if let Some(caps) = GENERIC_LINE_REF.captures(log_content) {
        out.line_number = caps[1].parse().ok();
    }

    out
}

/// All traditional extractors in declaration order. Earlier entries win
/// ties in the selection fold.
pub fn all_extractors() -> [fn(&str) -> PartialClassification; 4] {
    [extract_java, extract_python, extract_node, extract_generic]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn java_extractor_reads_topmost_frame() {
        let log = "Exception in thread \"main\" java.lang.NullPointerException: boom\n\
                   \tat com.example.Foo.bar(Foo.java:10)\n\
                   \tat com.example.Main.main(Main.java:3)";
        let got = extract_java(log);
        assert_eq!(got.method_name.as_deref(), Some("bar"));
        assert_eq!(got.line_number, Some(10));
        assert_eq!(got.error_type.as_deref(), Some("java_null_pointer"));
    }

    #[test]
    fn python_extractor_reads_last_frame() {
        let log = "Traceback (most recent call last):\n\
                   File \"app.py\", line 4, in main\n\
                   File \"svc.py\", line 9, in handle\n\
                   KeyError: 'user'";
        let got = extract_python(log);
        assert_eq!(got.file_path.as_deref(), Some("svc.py"));
        assert_eq!(got.line_number, Some(9));
        assert_eq!(got.method_name.as_deref(), Some("handle"));
    }

    #[test]
    fn node_extractor_skips_anonymous_frames() {
        let log = "TypeError: cannot read property of undefined\n\
                   at Object.<anonymous> (/srv/index.js:1:1)\n\
                   at Server.handle (/srv/server.js:22:5)";
        let got = extract_node(log);
        assert_eq!(got.method_name.as_deref(), Some("Server.handle"));
        assert_eq!(got.line_number, Some(22));
    }

    #[test]
    fn generic_extractor_truncates_long_summaries() {
        let log = format!("ERROR: {}", "x".repeat(500));
        let got = extract_generic(&log);
        assert_eq!(
            got.root_cause_summary.map(|s| s.chars().count()),
            Some(GENERIC_SUMMARY_LIMIT)
        );
    }
}
