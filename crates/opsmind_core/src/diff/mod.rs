//! Heuristic fix-patch synthesis.
//!
//! This is a template-matching suggestion engine, not static analysis: given
//! an error-analysis text and a target file, it picks a canned per-language
//! transformation for the detected error category and renders it as a
//! unified diff. Output is advisory text for a human or LLM reviewer, never
//! an applied patch. Keep callers behind [`suggest_patch`] so a real
//! analysis engine can replace this wholesale.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Error category detected by keyword match against the analysis text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FixCategory {
    NullPointer,
    ResourceLeak,
    FileNotFound,
    Configuration,
    Database,
    Timeout,
    General,
}

static CLASS_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"class\s+(\w+)").expect("static class ref pattern"));
static METHOD_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"method\s+(\w+)").expect("static method ref pattern"));
static LINE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"line\s+(\d+)").expect("static line ref pattern"));

/// Location hints parsed out of free-form analysis text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ErrorSite {
    class_name: Option<String>,
    method_name: Option<String>,
    line_number: Option<u32>,
}

fn parse_error_site(error_analysis: &str) -> ErrorSite {
    ErrorSite {
        class_name: CLASS_REF
            .captures(error_analysis)
            .map(|c| c[1].to_string()),
        method_name: METHOD_REF
            .captures(error_analysis)
            .map(|c| c[1].to_string()),
        line_number: LINE_REF
            .captures(error_analysis)
            .and_then(|c| c[1].parse().ok()),
    }
}

/// First matching keyword set wins; unrecognized text falls through to
/// `General`.
pub fn classify_error(error_analysis: &str) -> FixCategory {
    let lower = error_analysis.to_lowercase();
    if error_analysis.contains("NullPointerException") || lower.contains("null pointer") {
        FixCategory::NullPointer
    } else if error_analysis.contains("FileNotFoundException") || lower.contains("file not found") {
        FixCategory::FileNotFound
    } else if lower.contains("resource leak") || lower.contains("connection not closed") {
        FixCategory::ResourceLeak
    } else if lower.contains("configuration") || lower.contains("config") {
        FixCategory::Configuration
    } else if lower.contains("database") || lower.contains("sql") {
        FixCategory::Database
    } else if lower.contains("timeout") {
        FixCategory::Timeout
    } else {
        FixCategory::General
    }
}

struct FixTemplate {
    old_code: &'static str,
    new_code: &'static str,
    default_line: u32,
    context_lines: u32,
}

fn template_for(category: FixCategory, language: &str) -> FixTemplate {
    let language = language.to_lowercase();
    match (category, language.as_str()) {
        (FixCategory::NullPointer, "java") => FixTemplate {
            old_code: "    return paymentGateway.charge(request.getAmount());",
            new_code: "    if (request == null || request.getAmount() == null) {\n        throw new IllegalArgumentException(\"Payment request cannot be null\");\n    }\n    return paymentGateway.charge(request.getAmount());",
            default_line: 45,
            context_lines: 3,
        },
        (FixCategory::NullPointer, "python") => FixTemplate {
            old_code: "    return payment_gateway.charge(request.amount)",
            new_code: "    if request is None or request.amount is None:\n        raise ValueError(\"Payment request cannot be None\")\n    return payment_gateway.charge(request.amount)",
            default_line: 45,
            context_lines: 3,
        },
        (FixCategory::NullPointer, _) => FixTemplate {
            old_code: "    return paymentGateway.charge(request.amount);",
            new_code: "    if (!request || request.amount === null || request.amount === undefined) {\n        throw new Error(\"Payment request cannot be null or undefined\");\n    }\n    return paymentGateway.charge(request.amount);",
            default_line: 45,
            context_lines: 3,
        },
        (FixCategory::ResourceLeak, "java") => FixTemplate {
            old_code: "    Connection conn = DriverManager.getConnection(url);\n    Statement stmt = conn.createStatement();\n    ResultSet rs = stmt.executeQuery(query);",
            new_code: "    try (Connection conn = DriverManager.getConnection(url);\n         Statement stmt = conn.createStatement();\n         ResultSet rs = stmt.executeQuery(query)) {",
            default_line: 30,
            context_lines: 3,
        },
        (FixCategory::ResourceLeak, "python") => FixTemplate {
            old_code: "    file = open(filename, 'r')\n    content = file.read()",
            new_code: "    with open(filename, 'r') as file:\n        content = file.read()",
            default_line: 30,
            context_lines: 2,
        },
        (FixCategory::FileNotFound, "python") => FixTemplate {
            old_code: "    with open(config_path, 'r') as f:",
            new_code: "    if not os.path.exists(config_path):\n        raise FileNotFoundError(f\"Config file not found: {config_path}\")\n    with open(config_path, 'r') as f:",
            default_line: 25,
            context_lines: 3,
        },
        (FixCategory::FileNotFound, "java") => FixTemplate {
            old_code: "    Properties props = new Properties();",
            new_code: "    Properties props = new Properties();\n    if (!new File(configPath).exists()) {\n        throw new FileNotFoundException(\"Config file not found: \" + configPath);\n    }",
            default_line: 25,
            context_lines: 3,
        },
        (FixCategory::Configuration, _) => FixTemplate {
            old_code: "    String dbUrl = System.getProperty(\"db.url\");",
            new_code: "    String dbUrl = System.getProperty(\"db.url\");\n    if (dbUrl == null || dbUrl.isEmpty()) {\n        throw new IllegalStateException(\"Database URL not configured. Please set 'db.url' property\");\n    }",
            default_line: 20,
            context_lines: 3,
        },
        (FixCategory::Database, "java") => FixTemplate {
            old_code: "    Connection conn = DriverManager.getConnection(url, user, password);",
            new_code: "    Connection conn = null;\n    try {\n        conn = DriverManager.getConnection(url, user, password);\n        conn.setAutoCommit(false);\n    } catch (SQLException e) {\n        if (conn != null) {\n            conn.rollback();\n        }\n        throw new RuntimeException(\"Database connection failed: \" + e.getMessage(), e);\n    }",
            default_line: 35,
            context_lines: 5,
        },
        (FixCategory::Timeout, "javascript") => FixTemplate {
            old_code: "    const response = await fetch(url);",
            new_code: "    const controller = new AbortController();\n    const timeoutId = setTimeout(() => controller.abort(), 5000);\n    const response = await fetch(url, { signal: controller.signal });\n    clearTimeout(timeoutId);",
            default_line: 40,
            context_lines: 4,
        },
        (FixCategory::Timeout, "java") => FixTemplate {
            old_code: "    HttpURLConnection connection = (HttpURLConnection) url.openConnection();",
            new_code: "    HttpURLConnection connection = (HttpURLConnection) url.openConnection();\n    connection.setConnectTimeout(5000);\n    connection.setReadTimeout(10000);",
            default_line: 40,
            context_lines: 3,
        },
        (_, "python") => FixTemplate {
            old_code: "    process_data(data)",
            new_code: "    try:\n        process_data(data)\n    except Exception as e:\n        logger.error(f\"Error processing data: {e}\")\n        raise RuntimeError(\"Processing failed\") from e",
            default_line: 50,
            context_lines: 3,
        },
        (_, "javascript") => FixTemplate {
            old_code: "    processData(data);",
            new_code: "    try {\n        processData(data);\n    } catch (error) {\n        console.error(\"Error processing data:\", error);\n        throw new Error(\"Processing failed: \" + error.message);\n    }",
            default_line: 50,
            context_lines: 3,
        },
        _ => FixTemplate {
            old_code: "    processData(data);",
            new_code: "    try {\n        processData(data);\n    } catch (Exception e) {\n        logger.error(\"Error processing data: \" + e.getMessage(), e);\n        throw new RuntimeException(\"Processing failed\", e);\n    }",
            default_line: 50,
            context_lines: 3,
        },
    }
}

/// Synthetic surrounding lines; the analyzer rarely has real file content,
/// so the context names the method and class it does know about.
fn context_lines(site: &ErrorSite, count: u32) -> Vec<String> {
    let method = site.method_name.as_deref().unwrap_or("processMethod");
    let class = site.class_name.as_deref().unwrap_or("ExampleClass");
    (0..count)
        .map(|i| match i {
            0 => format!("     public {method}Type {method}({class}Request request) {{"),
            1 => "         // Method implementation".to_string(),
            _ => "         // Additional context".to_string(),
        })
        .collect()
}

/// Render a unified diff proposing a fix for the error described by
/// `error_analysis`, targeting `file_path`.
///
/// Supported languages: java (default), python, javascript.
pub fn suggest_patch(error_analysis: &str, file_path: &str, language: &str) -> String {
    let site = parse_error_site(error_analysis);
    let category = classify_error(error_analysis);
    let template = template_for(category, language);

    let line_start = site.line_number.unwrap_or(template.default_line);
    let before = context_lines(&site, template.context_lines);
    let after = context_lines(&site, template.context_lines);

    let old_lines: Vec<&str> = template.old_code.lines().collect();
    let new_lines: Vec<&str> = template.new_code.lines().collect();
    let old_count = old_lines.len() as u32 + template.context_lines * 2;
    let new_count = new_lines.len() as u32 + template.context_lines * 2;

    let mut diff = String::new();
    diff.push_str(&format!("--- a/{file_path}\n"));
    diff.push_str(&format!("+++ b/{file_path}\n"));
    diff.push_str(&format!(
        "@@ -{line_start},{old_count} +{line_start},{new_count} @@\n"
    ));
    for line in &before {
        diff.push_str(&format!(" {line}\n"));
    }
    for line in &old_lines {
        diff.push_str(&format!("-{line}\n"));
    }
    for line in &new_lines {
        diff.push_str(&format!("+{line}\n"));
    }
    for line in &after {
        diff.push_str(&format!(" {line}\n"));
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_classification_covers_all_categories() {
        assert_eq!(
            classify_error("NullPointerException in charge"),
            FixCategory::NullPointer
        );
        assert_eq!(
            classify_error("resource leak: connection not closed"),
            FixCategory::ResourceLeak
        );
        assert_eq!(
            classify_error("FileNotFoundException reading settings"),
            FixCategory::FileNotFound
        );
        assert_eq!(
            classify_error("bad config value for pool"),
            FixCategory::Configuration
        );
        assert_eq!(classify_error("SQL deadlock detected"), FixCategory::Database);
        assert_eq!(classify_error("request timeout"), FixCategory::Timeout);
        assert_eq!(classify_error("something else"), FixCategory::General);
    }

    #[test]
    fn error_site_parses_location_hints() {
        let site = parse_error_site("class PaymentService method charge line 42");
        assert_eq!(site.class_name.as_deref(), Some("PaymentService"));
        assert_eq!(site.method_name.as_deref(), Some("charge"));
        assert_eq!(site.line_number, Some(42));
    }
}
