use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Incident severity. Defaults to Medium when the caller omits it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

/// Incident lifecycle status. Defaults to Open at creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IncidentStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
    Closed,
}

impl Default for IncidentStatus {
    fn default() -> Self {
        IncidentStatus::Open
    }
}

/// Canonical incident record, the central persisted entity.
///
/// Notes:
/// - `incident_id` is the unique primary key, format `INC-<unix_millis>`.
/// - `created_at` is set once at creation and never changed afterwards;
///   `last_updated` moves on every successful mutation.
/// - All timestamps are RFC3339 UTC strings so lexical ordering matches
///   chronological ordering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentRecord {
    pub incident_id: String,
    pub service_name: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub timestamp: String,
    pub commander: Option<String>,
    pub communication_lead: Option<String>,
    pub playbook_applied: Option<String>,
    pub timeline: Option<String>,
    pub resolution_details: Option<String>,
    pub created_at: String,
    pub last_updated: String,
}

/// Caller-supplied incident fields for `create` and `update`.
///
/// Every field is optional; `update` applies only the fields that are set,
/// and an all-`None` value is rejected as a no-op. System-managed fields
/// (`created_at`, `last_updated`) are deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentFields {
    pub incident_id: Option<String>,
    pub service_name: Option<String>,
    pub severity: Option<Severity>,
    pub status: Option<IncidentStatus>,
    pub timestamp: Option<String>,
    pub commander: Option<String>,
    pub communication_lead: Option<String>,
    pub playbook_applied: Option<String>,
    pub timeline: Option<String>,
    pub resolution_details: Option<String>,
}

impl IncidentFields {
    /// True when at least one mutable field is set. `incident_id` does not
    /// count: it addresses the record, it does not change it.
    pub fn has_updates(&self) -> bool {
        self.service_name.is_some()
            || self.severity.is_some()
            || self.status.is_some()
            || self.timestamp.is_some()
            || self.commander.is_some()
            || self.communication_lead.is_some()
            || self.playbook_applied.is_some()
            || self.timeline.is_some()
            || self.resolution_details.is_some()
    }
}

/// Suggested fix category derived from a classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FixType {
    Code,
    Configuration,
}

impl Default for FixType {
    fn default() -> Self {
        FixType::Code
    }
}

/// Which extraction path produced a classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Structured,
    Traditional,
    Error,
}

/// Structured output of log analysis. Ephemeral: produced fresh per call,
/// never mutated afterwards, consumed once to seed or enrich an incident.
///
/// Contract: fields are only populated from text actually present in the
/// analyzed log. Absent evidence stays `None` — the analyzer never invents
/// values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertClassification {
    pub service_name: Option<String>,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
    pub line_number: Option<u32>,
    pub error_type: Option<String>,
    pub endpoint: Option<String>,
    pub timestamp: Option<String>,
    pub file_path: Option<String>,
    pub root_cause_summary: Option<String>,
    pub suggested_fix_type: FixType,
    pub log_format: Option<LogFormat>,
}

impl AlertClassification {
    /// Explicit failure classification for when analysis itself blew up.
    /// This is the only case where `log_format` is `Error`.
    pub fn analysis_error(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            error_type: Some("analysis_error".to_string()),
            root_cause_summary: Some(format!("Log analysis encountered an error: {detail}")),
            suggested_fix_type: FixType::Code,
            log_format: Some(LogFormat::Error),
            ..Self::default()
        }
    }
}

/// Monitoring alert severity, P1 (page now) through P4 (informational).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertSeverity {
    P1,
    P2,
    P3,
    P4,
}

impl AlertSeverity {
    /// Severity an incident seeded from this alert should carry.
    pub fn incident_severity(self) -> Severity {
        match self {
            AlertSeverity::P1 => Severity::Critical,
            AlertSeverity::P2 => Severity::High,
            AlertSeverity::P3 => Severity::Medium,
            AlertSeverity::P4 => Severity::Low,
        }
    }
}

/// A monitoring-system webhook payload normalized into the internal alert
/// shape. Ephemeral, like [`AlertClassification`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedAlert {
    pub service_name: String,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub metric_value: f64,
    pub threshold_breached: bool,
    pub timestamp: String,
    pub raw_message: String,
    pub should_create_incident: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<GenericParseDebug>,
}

/// Debug metadata emitted by the generic webhook extractor so operators can
/// see which candidate key matched for each field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenericParseDebug {
    pub payload_keys: Vec<String>,
    pub parsing_steps: Vec<String>,
}

/// Non-fatal finding surfaced during parsing or assembly. Strategies degrade
/// to "no additional fields" and record why, instead of guessing or failing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// JSON-serializable envelope returned by every tool-level operation.
/// The explicit `success` flag matches what agent callers key off.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_incidents: Option<Vec<String>>,
}

impl<T: Serialize> ToolResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
            available_incidents: None,
        }
    }

    pub fn err(err: &AppError) -> Self {
        let mut message = err.message.clone();
        if let Some(details) = &err.details {
            message.push_str(": ");
            message.push_str(details);
        }
        Self {
            success: false,
            data: None,
            error: Some(message),
            error_code: Some(err.code.clone()),
            available_incidents: err.available_incidents.clone(),
        }
    }
}

impl<T: Serialize> From<Result<T, AppError>> for ToolResponse<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_with_spaces() {
        let json = serde_json::to_string(&IncidentStatus::InProgress).expect("encode");
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn empty_fields_report_no_updates() {
        let fields = IncidentFields {
            incident_id: Some("INC-1".to_string()),
            ..IncidentFields::default()
        };
        assert!(!fields.has_updates());
    }

    #[test]
    fn alert_severity_maps_to_incident_severity() {
        assert_eq!(AlertSeverity::P1.incident_severity(), Severity::Critical);
        assert_eq!(AlertSeverity::P4.incident_severity(), Severity::Low);
    }
}
