//! Monitoring webhook normalization.
//!
//! Each supported source system has bespoke field paths; anything else goes
//! through a generic extractor that tries an ordered candidate list per
//! field (case-insensitive) and reports which candidate matched.

use serde_json::Value;

use crate::domain::{AlertSeverity, GenericParseDebug, NormalizedAlert};
use crate::error::AppError;
use crate::normalize::timestamps::now_rfc3339_utc;

/// Metric thresholds for severity calculation. Overridable per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: 90.0,
            high: 70.0,
            medium: 50.0,
            low: 30.0,
        }
    }
}

/// `P1` at or above critical, `P2` at high, `P3` at medium, else `P4`.
pub fn calculate_severity(metric_value: f64, thresholds: &SeverityThresholds) -> AlertSeverity {
    if metric_value >= thresholds.critical {
        AlertSeverity::P1
    } else if metric_value >= thresholds.high {
        AlertSeverity::P2
    } else if metric_value >= thresholds.medium {
        AlertSeverity::P3
    } else {
        AlertSeverity::P4
    }
}

/// Fields gathered by a per-source parser before severity is applied.
#[derive(Debug, Clone, Default)]
struct RawAlert {
    service_name: Option<String>,
    alert_type: Option<String>,
    metric_value: f64,
    threshold_breached: bool,
    timestamp: Option<String>,
    raw_message: Option<String>,
    debug_info: Option<GenericParseDebug>,
}

const RAW_MESSAGE_LIMIT: usize = 500;

fn truncated(value: &Value) -> String {
    value.to_string().chars().take(RAW_MESSAGE_LIMIT).collect()
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn numeric_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalize a webhook payload from `source_system` into the internal alert
/// shape.
///
/// Malformed JSON is a parse error; everything downstream degrades to
/// documented defaults rather than failing.
pub fn normalize_alert(
    webhook_payload: &str,
    source_system: &str,
    thresholds: Option<SeverityThresholds>,
) -> Result<NormalizedAlert, AppError> {
    let payload: Value = serde_json::from_str(webhook_payload)
        .map_err(|e| AppError::parse("Invalid JSON webhook payload").with_details(e.to_string()))?;

    let thresholds = thresholds.unwrap_or_default();
    let raw = match source_system.to_lowercase().as_str() {
        "grafana" => parse_grafana(&payload),
        "pagerduty" => parse_pagerduty(&payload),
        "prometheus" => parse_prometheus(&payload),
        "datadog" => parse_datadog(&payload),
        "newrelic" => parse_newrelic(&payload),
        other => {
            log::debug!("unrecognized webhook source '{other}', using generic extractor");
            parse_generic(&payload)
        }
    };

    let severity = calculate_severity(raw.metric_value, &thresholds);
    Ok(NormalizedAlert {
        service_name: raw.service_name.unwrap_or_else(|| "unknown".to_string()),
        alert_type: raw.alert_type.unwrap_or_else(|| "unknown".to_string()),
        severity,
        metric_value: raw.metric_value,
        threshold_breached: raw.threshold_breached,
        timestamp: raw.timestamp.unwrap_or_else(now_rfc3339_utc),
        raw_message: raw.raw_message.unwrap_or_else(|| truncated(&payload)),
        should_create_incident: matches!(severity, AlertSeverity::P1 | AlertSeverity::P2),
        debug_info: raw.debug_info,
    })
}

fn parse_grafana(payload: &Value) -> RawAlert {
    RawAlert {
        service_name: str_field(payload, "ruleName")
            .or_else(|| str_field(payload, "title"))
            .or_else(|| Some("grafana-alert".to_string())),
        alert_type: str_field(payload, "state"),
        metric_value: payload
            .get("evalMatches")
            .and_then(Value::as_array)
            .and_then(|m| m.first())
            .and_then(|m| m.get("value"))
            .and_then(numeric_field)
            .unwrap_or(0.0),
        threshold_breached: str_field(payload, "state").as_deref() == Some("alerting"),
        timestamp: str_field(payload, "date"),
        raw_message: str_field(payload, "message"),
        debug_info: None,
    }
}

fn parse_pagerduty(payload: &Value) -> RawAlert {
    let incident = payload
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|m| m.first())
        .and_then(|m| m.get("incident"));

    match incident {
        Some(incident) => RawAlert {
            service_name: incident
                .get("service")
                .and_then(|s| str_field(s, "name"))
                .or_else(|| Some("pagerduty-alert".to_string())),
            alert_type: str_field(incident, "incident_key")
                .or_else(|| Some("incident".to_string())),
            // PagerDuty events carry no metric sample.
            metric_value: 0.0,
            threshold_breached: matches!(
                str_field(incident, "status").as_deref(),
                Some("triggered") | Some("acknowledged")
            ),
            timestamp: str_field(incident, "created_at"),
            raw_message: str_field(incident, "summary"),
            debug_info: None,
        },
        None => RawAlert {
            service_name: Some("pagerduty-alert".to_string()),
            ..RawAlert::default()
        },
    }
}

fn parse_prometheus(payload: &Value) -> RawAlert {
    let alert = payload
        .get("alerts")
        .and_then(Value::as_array)
        .and_then(|a| a.first());

    match alert {
        Some(alert) => {
            let labels = alert.get("labels").cloned().unwrap_or(Value::Null);
            let annotations = alert.get("annotations").cloned().unwrap_or(Value::Null);
            RawAlert {
                service_name: str_field(&labels, "service")
                    .or_else(|| str_field(&labels, "job"))
                    .or_else(|| str_field(&labels, "instance"))
                    .or_else(|| Some("prometheus-alert".to_string())),
                alert_type: str_field(&labels, "alertname"),
                metric_value: annotations
                    .get("value")
                    .and_then(numeric_field)
                    .unwrap_or(0.0),
                threshold_breached: str_field(alert, "status").as_deref() == Some("firing"),
                timestamp: str_field(alert, "startsAt"),
                raw_message: str_field(&annotations, "summary"),
                debug_info: None,
            }
        }
        None => RawAlert {
            service_name: Some("prometheus-alert".to_string()),
            ..RawAlert::default()
        },
    }
}

fn parse_datadog(payload: &Value) -> RawAlert {
    RawAlert {
        service_name: str_field(payload, "host")
            .or_else(|| payload.get("tags").and_then(|t| str_field(t, "service")))
            .or_else(|| Some("datadog-alert".to_string())),
        alert_type: str_field(payload, "alert_type"),
        metric_value: payload
            .get("snapshot")
            .and_then(numeric_field)
            .unwrap_or(0.0),
        threshold_breached: matches!(
            str_field(payload, "alert_transition").as_deref(),
            Some("Triggered") | Some("No Data")
        ),
        timestamp: str_field(payload, "date"),
        raw_message: str_field(payload, "body"),
        debug_info: None,
    }
}

fn parse_newrelic(payload: &Value) -> RawAlert {
    RawAlert {
        service_name: str_field(payload, "application_name")
            .or_else(|| str_field(payload, "account_name"))
            .or_else(|| Some("newrelic-alert".to_string())),
        alert_type: str_field(payload, "condition_name"),
        metric_value: payload
            .get("metric_value_function")
            .and_then(numeric_field)
            .unwrap_or(0.0),
        threshold_breached: matches!(
            str_field(payload, "current_state").as_deref(),
            Some("open") | Some("acknowledged")
        ),
        timestamp: str_field(payload, "timestamp"),
        raw_message: str_field(payload, "details"),
        debug_info: None,
    }
}

const SERVICE_CANDIDATES: &[&str] = &[
    "service",
    "service_name",
    "serviceName",
    "host",
    "application",
    "app",
    "name",
];
const TYPE_CANDIDATES: &[&str] = &[
    "alert_type",
    "alertType",
    "type",
    "kind",
    "category",
    "event_type",
    "eventType",
    "alert_name",
    "alertName",
];
const TIMESTAMP_CANDIDATES: &[&str] = &[
    "timestamp",
    "time",
    "date",
    "created_at",
    "createdAt",
    "occurred_at",
    "occurredAt",
];
const VALUE_CANDIDATES: &[&str] = &[
    "metric_value",
    "metricValue",
    "value",
    "current_value",
    "currentValue",
    "threshold",
    "score",
    "count",
];
const MESSAGE_CANDIDATES: &[&str] = &[
    "message",
    "description",
    "summary",
    "body",
    "details",
    "text",
];
const BREACH_CANDIDATES: &[&str] = &[
    "alert",
    "critical",
    "warning",
    "breach",
    "triggered",
    "threshold_breached",
    "thresholdBreached",
];
const BREACH_TRUE_VALUES: &[&str] = &[
    "true",
    "1",
    "yes",
    "critical",
    "alert",
    "triggered",
    "breach",
    "high",
    "error",
];

/// Case-insensitive candidate lookup. Returns the actual key that matched so
/// the debug trail names it.
fn find_candidate<'a>(payload: &'a Value, candidates: &[&str]) -> Option<(String, &'a Value)> {
    let obj = payload.as_object()?;
    for candidate in candidates {
        for (key, value) in obj {
            if key.eq_ignore_ascii_case(candidate) && !value.is_null() {
                return Some((key.clone(), value));
            }
        }
    }
    None
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_generic(payload: &Value) -> RawAlert {
    let mut debug = GenericParseDebug {
        payload_keys: payload
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default(),
        parsing_steps: Vec::new(),
    };
    let mut out = RawAlert {
        service_name: Some("generic-alert".to_string()),
        ..RawAlert::default()
    };

    if let Some((key, value)) = find_candidate(payload, SERVICE_CANDIDATES) {
        if let Some(text) = value_to_text(value) {
            debug
                .parsing_steps
                .push(format!("service_name matched key '{key}'"));
            out.service_name = Some(text);
        }
    }

    match find_candidate(payload, TYPE_CANDIDATES) {
        Some((key, value)) => {
            if let Some(text) = value_to_text(value) {
                debug
                    .parsing_steps
                    .push(format!("alert_type matched key '{key}'"));
                out.alert_type = Some(text);
            }
        }
        None => debug.parsing_steps.push(format!(
            "no alert_type candidate matched; tried {TYPE_CANDIDATES:?}"
        )),
    }

    if let Some((key, value)) = find_candidate(payload, TIMESTAMP_CANDIDATES) {
        if let Some(text) = value_to_text(value) {
            debug
                .parsing_steps
                .push(format!("timestamp matched key '{key}'"));
            out.timestamp = Some(text);
        }
    }

    if let Some((key, value)) = find_candidate(payload, VALUE_CANDIDATES) {
        if let Some(n) = numeric_field(value) {
            debug
                .parsing_steps
                .push(format!("metric_value matched key '{key}'"));
            out.metric_value = n;
        }
    }

    if let Some((key, value)) = find_candidate(payload, MESSAGE_CANDIDATES) {
        if let Some(text) = value_to_text(value) {
            debug
                .parsing_steps
                .push(format!("raw_message matched key '{key}'"));
            out.raw_message = Some(text.chars().take(RAW_MESSAGE_LIMIT).collect());
        }
    }

    if let Some((key, value)) = find_candidate(payload, BREACH_CANDIDATES) {
        if let Some(text) = value_to_text(value) {
            if BREACH_TRUE_VALUES.contains(&text.to_lowercase().trim()) {
                debug
                    .parsing_steps
                    .push(format!("threshold_breached matched key '{key}'"));
                out.threshold_breached = true;
            }
        }
    }

    out.debug_info = Some(debug);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_brackets_follow_thresholds() {
        let t = SeverityThresholds::default();
        assert_eq!(calculate_severity(95.0, &t), AlertSeverity::P1);
        assert_eq!(calculate_severity(90.0, &t), AlertSeverity::P1);
        assert_eq!(calculate_severity(70.0, &t), AlertSeverity::P2);
        assert_eq!(calculate_severity(50.0, &t), AlertSeverity::P3);
        assert_eq!(calculate_severity(0.0, &t), AlertSeverity::P4);
    }

    #[test]
    fn candidate_lookup_is_case_insensitive() {
        let payload = serde_json::json!({"ServiceName": "billing"});
        let (key, value) = find_candidate(&payload, SERVICE_CANDIDATES).expect("match");
        assert_eq!(key, "ServiceName");
        assert_eq!(value.as_str(), Some("billing"));
    }
}
