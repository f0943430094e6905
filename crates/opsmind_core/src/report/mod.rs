//! Retrospective report assembly.
//!
//! Transforms one incident record plus optional external artifact metadata
//! (fix PR, documentation page, chat thread) into the full report document.
//!
//! Contract: the builder never fails because of missing optional context —
//! every absent input renders its documented default ("Unknown", "N/A", or
//! an empty list). Unparseable timestamps yield `None` metrics with a
//! warning, not an error.

use serde::{Deserialize, Serialize};
use time::format_description;
use time::OffsetDateTime;

use crate::domain::{IncidentRecord, ValidationWarning};
use crate::normalize::timestamps::parse_flexible;

/// GitHub pull request metadata handed in by the PR-creation collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequestInfo {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub html_url: Option<String>,
    pub created_at: Option<String>,
    pub merged_at: Option<String>,
    pub changed_files: Option<u64>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
}

/// Documentation page metadata (e.g. a wiki retrospective stub).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocPageInfo {
    pub title: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<String>,
}

/// Chat thread metadata from the team-chat collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatThreadInfo {
    pub channel: Option<String>,
    pub participants: Vec<String>,
    pub message_count: usize,
}

/// Optional enrichment around the stored record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportContext {
    pub resolved_at: Option<String>,
    pub first_response_at: Option<String>,
    pub root_cause: Option<String>,
    pub manual_steps: Vec<String>,
    pub configuration_changes: Vec<String>,
    pub pr: Option<PullRequestInfo>,
    pub doc: Option<DocPageInfo>,
    pub chat: Option<ChatThreadInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetrics {
    pub total_incident_duration_minutes: Option<i64>,
    pub total_incident_duration_hours: Option<f64>,
    pub first_response_time_minutes: Option<i64>,
    pub resolution_method: String,
    pub team_members_involved: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportMetadata {
    pub report_id: String,
    pub generation_timestamp: String,
    pub incident_id: String,
    pub report_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutiveSummary {
    pub incident_id: String,
    pub service_name: String,
    pub severity: String,
    pub status: String,
    pub total_duration_hours: Option<f64>,
    pub first_response_time_minutes: Option<i64>,
    pub resolution_method: String,
    pub brief_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineEvent {
    pub timestamp: String,
    pub event: String,
    pub description: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One line of the free-text timeline recorded on the incident itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineNote {
    pub time: String,
    pub event: String,
    pub raw_line: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootCauseAnalysis {
    pub primary_cause: String,
    pub failure_point: String,
    pub technical_details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeChange {
    pub change_type: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub status: String,
    pub files_changed: u64,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentationChange {
    pub change_type: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolutionActions {
    pub manual_steps: Vec<String>,
    pub code_changes: Vec<CodeChange>,
    pub documentation: Vec<DocumentationChange>,
    pub resolution_details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImpactAssessment {
    pub duration_minutes: Option<i64>,
    pub duration_hours: Option<f64>,
    pub affected_service: String,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseTeam {
    pub incident_commander: String,
    pub communication_lead: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_channel: Option<String>,
    pub chat_participants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LessonsLearned {
    pub playbook_applied: String,
    pub what_went_well: Vec<String>,
    pub what_could_be_improved: Vec<String>,
    pub prevention_recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalReference {
    pub reference_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TechnicalAppendix {
    pub recorded_timeline: Vec<TimelineNote>,
    pub external_references: Vec<ExternalReference>,
    pub warnings: Vec<ValidationWarning>,
}

/// The complete generated report. Built once per request, immutable after
/// creation; a later regeneration supersedes rather than merges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrospectiveReport {
    pub report_metadata: ReportMetadata,
    pub executive_summary: ExecutiveSummary,
    pub incident_details: IncidentRecord,
    pub timeline_events: Vec<TimelineEvent>,
    pub root_cause_analysis: RootCauseAnalysis,
    pub resolution_actions: ResolutionActions,
    pub impact_assessment: ImpactAssessment,
    pub response_team: ResponseTeam,
    pub lessons_learned: LessonsLearned,
    pub technical_appendix: TechnicalAppendix,
    pub key_metrics: ReportMetrics,
}

const UNKNOWN: &str = "Unknown";
const NOT_AVAILABLE: &str = "N/A";
const BRIEF_DESCRIPTION_LIMIT: usize = 200;

fn minutes_between(
    from_field: &str,
    from: Option<&str>,
    to_field: &str,
    to: Option<&str>,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<i64> {
    let from = parse_flexible(from_field, from, warnings)?;
    let to = parse_flexible(to_field, to, warnings)?;
    let secs = (to - from).whole_seconds();
    if secs < 0 {
        warnings.push(
            ValidationWarning::new(
                "REPORT_TS_ORDER_VIOLATION",
                format!("{from_field} must be <= {to_field}"),
            )
            .with_details(format!("{from_field}={from}; {to_field}={to}")),
        );
        return None;
    }
    Some(secs / 60)
}

fn derive_resolution_method(record: &IncidentRecord, context: &ReportContext) -> String {
    let mut methods = Vec::new();
    if context
        .pr
        .as_ref()
        .is_some_and(|pr| pr.merged_at.is_some())
    {
        methods.push("Code Fix");
    }
    if !context.manual_steps.is_empty() {
        methods.push("Manual Intervention");
    }
    if !context.configuration_changes.is_empty() {
        methods.push("Configuration Change");
    }
    if context.doc.is_some() {
        methods.push("Documentation Update");
    }
    // Resolution details recorded on the incident itself count as manual work.
    if methods.is_empty() && record.resolution_details.is_some() {
        methods.push("Manual Intervention");
    }
    if methods.is_empty() {
        UNKNOWN.to_string()
    } else {
        methods.join(", ")
    }
}

fn compute_metrics(
    record: &IncidentRecord,
    context: &ReportContext,
    warnings: &mut Vec<ValidationWarning>,
) -> ReportMetrics {
    let duration_minutes = minutes_between(
        "created_at",
        Some(record.created_at.as_str()),
        "resolved_at",
        context.resolved_at.as_deref(),
        warnings,
    );
    let first_response_minutes = minutes_between(
        "created_at",
        Some(record.created_at.as_str()),
        "first_response_at",
        context.first_response_at.as_deref(),
        warnings,
    );

    ReportMetrics {
        total_incident_duration_minutes: duration_minutes,
        total_incident_duration_hours: duration_minutes
            .map(|m| ((m as f64) / 60.0 * 100.0).round() / 100.0),
        first_response_time_minutes: first_response_minutes,
        resolution_method: derive_resolution_method(record, context),
        team_members_involved: context.chat.as_ref().map(|c| {
            let mut unique = c.participants.clone();
            unique.sort();
            unique.dedup();
            unique.len()
        }),
    }
}

/// Merge all event sources into one chronological sequence. Events whose
/// source has no timestamp are skipped; ISO-8601 UTC strings sort correctly
/// lexically, so the sort key is the raw timestamp string.
fn build_timeline(record: &IncidentRecord, context: &ReportContext) -> Vec<TimelineEvent> {
    let mut events = Vec::new();

    events.push(TimelineEvent {
        timestamp: record.created_at.clone(),
        event: "Incident Created".to_string(),
        description: format!("Incident {} was created", record.incident_id),
        source: "incident_system".to_string(),
        url: None,
    });

    if let Some(ts) = &context.first_response_at {
        events.push(TimelineEvent {
            timestamp: ts.clone(),
            event: "First Response".to_string(),
            description: "Initial response to incident".to_string(),
            source: "incident_system".to_string(),
            url: None,
        });
    }

    if let Some(pr) = &context.pr {
        let number = pr
            .number
            .map(|n| n.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let title = pr.title.as_deref().unwrap_or(NOT_AVAILABLE);
        if let Some(ts) = &pr.created_at {
            events.push(TimelineEvent {
                timestamp: ts.clone(),
                event: "Fix PR Created".to_string(),
                description: format!("PR {number} created: {title}"),
                source: "github".to_string(),
                url: pr.html_url.clone(),
            });
        }
        if let Some(ts) = &pr.merged_at {
            events.push(TimelineEvent {
                timestamp: ts.clone(),
                event: "Fix PR Merged".to_string(),
                description: format!("PR {number} merged"),
                source: "github".to_string(),
                url: pr.html_url.clone(),
            });
        }
    }

    if let Some(doc) = &context.doc {
        if let Some(ts) = &doc.created_at {
            events.push(TimelineEvent {
                timestamp: ts.clone(),
                event: "Documentation Created".to_string(),
                description: format!(
                    "Documentation page created: {}",
                    doc.title.as_deref().unwrap_or(NOT_AVAILABLE)
                ),
                source: "documentation".to_string(),
                url: doc.url.clone(),
            });
        }
    }

    if let Some(ts) = &context.resolved_at {
        events.push(TimelineEvent {
            timestamp: ts.clone(),
            event: "Incident Resolved".to_string(),
            description: "Incident marked as resolved".to_string(),
            source: "incident_system".to_string(),
            url: None,
        });
    }

    events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    events
}

/// Split the record's free-text timeline into structured notes. Lines look
/// like `"08:05 - mitigation started"`; anything without the separator keeps
/// its text with an unknown time.
pub fn split_timeline_notes(raw: &str) -> Vec<TimelineNote> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(" - ") {
            Some((time, event)) => TimelineNote {
                time: time.trim().to_string(),
                event: event.trim().to_string(),
                raw_line: line.to_string(),
            },
            None => TimelineNote {
                time: UNKNOWN.to_string(),
                event: line.to_string(),
                raw_line: line.to_string(),
            },
        })
        .collect()
}

fn severity_label(record: &IncidentRecord) -> String {
    serde_json::to_value(record.severity)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn status_label(record: &IncidentRecord) -> String {
    serde_json::to_value(record.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn report_id(incident_id: &str, now: OffsetDateTime) -> String {
    let fmt = format_description::parse("[year][month][day]-[hour][minute][second]")
        .expect("static report id format");
    let stamp = now
        .format(&fmt)
        .unwrap_or_else(|_| "00000000-000000".to_string());
    format!("RETRO-{incident_id}-{stamp}")
}

/// Assemble the full retrospective for `record`.
///
/// `now` stamps the report metadata; passing it in keeps generation
/// deterministic for tests and replay.
pub fn build_report(
    record: &IncidentRecord,
    context: &ReportContext,
    now: OffsetDateTime,
) -> RetrospectiveReport {
    let mut warnings = Vec::new();
    let metrics = compute_metrics(record, context, &mut warnings);

    let brief_description = record
        .resolution_details
        .as_deref()
        .or(context.root_cause.as_deref())
        .unwrap_or("No description provided")
        .chars()
        .take(BRIEF_DESCRIPTION_LIMIT)
        .collect();

    let mut code_changes = Vec::new();
    if let Some(pr) = &context.pr {
        code_changes.push(CodeChange {
            change_type: "Pull Request".to_string(),
            title: pr.title.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            url: pr.html_url.clone(),
            status: if pr.merged_at.is_some() { "Merged" } else { "Open" }.to_string(),
            files_changed: pr.changed_files.unwrap_or(0),
            additions: pr.additions.unwrap_or(0),
            deletions: pr.deletions.unwrap_or(0),
        });
    }

    let mut documentation = Vec::new();
    if let Some(doc) = &context.doc {
        documentation.push(DocumentationChange {
            change_type: "Documentation Page".to_string(),
            title: doc.title.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            url: doc.url.clone(),
            created_at: doc.created_at.clone(),
        });
    }

    let mut external_references = Vec::new();
    if let Some(pr) = &context.pr {
        if pr.html_url.is_some() {
            external_references.push(ExternalReference {
                reference_type: "GitHub PR".to_string(),
                url: pr.html_url.clone(),
                title: pr.title.clone().unwrap_or_else(|| "Fix PR".to_string()),
            });
        }
    }
    if let Some(doc) = &context.doc {
        if doc.url.is_some() {
            external_references.push(ExternalReference {
                reference_type: "Documentation".to_string(),
                url: doc.url.clone(),
                title: doc
                    .title
                    .clone()
                    .unwrap_or_else(|| "Incident Documentation".to_string()),
            });
        }
    }
    if let Some(chat) = &context.chat {
        if let Some(channel) = &chat.channel {
            external_references.push(ExternalReference {
                reference_type: "Chat Channel".to_string(),
                url: None,
                title: channel.clone(),
            });
        }
    }

    let recorded_timeline = record
        .timeline
        .as_deref()
        .map(split_timeline_notes)
        .unwrap_or_default();

    RetrospectiveReport {
        report_metadata: ReportMetadata {
            report_id: report_id(&record.incident_id, now),
            generation_timestamp: crate::normalize::timestamps::format_rfc3339_utc(now),
            incident_id: record.incident_id.clone(),
            report_version: "1.0".to_string(),
        },
        executive_summary: ExecutiveSummary {
            incident_id: record.incident_id.clone(),
            service_name: record.service_name.clone(),
            severity: severity_label(record),
            status: status_label(record),
            total_duration_hours: metrics.total_incident_duration_hours,
            first_response_time_minutes: metrics.first_response_time_minutes,
            resolution_method: metrics.resolution_method.clone(),
            brief_description,
        },
        incident_details: record.clone(),
        timeline_events: build_timeline(record, context),
        root_cause_analysis: RootCauseAnalysis {
            primary_cause: context
                .root_cause
                .clone()
                .unwrap_or_else(|| "Investigation ongoing".to_string()),
            failure_point: record
                .playbook_applied
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            technical_details: record
                .resolution_details
                .clone()
                .unwrap_or_else(|| "No technical details provided".to_string()),
        },
        resolution_actions: ResolutionActions {
            manual_steps: context.manual_steps.clone(),
            code_changes,
            documentation,
            resolution_details: record
                .resolution_details
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        },
        impact_assessment: ImpactAssessment {
            duration_minutes: metrics.total_incident_duration_minutes,
            duration_hours: metrics.total_incident_duration_hours,
            affected_service: record.service_name.clone(),
            severity: severity_label(record),
        },
        response_team: ResponseTeam {
            incident_commander: record
                .commander
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            communication_lead: record
                .communication_lead
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            chat_channel: context.chat.as_ref().and_then(|c| c.channel.clone()),
            chat_participants: context
                .chat
                .as_ref()
                .map(|c| {
                    let mut unique = c.participants.clone();
                    unique.sort();
                    unique.dedup();
                    unique
                })
                .unwrap_or_default(),
        },
        lessons_learned: LessonsLearned {
            playbook_applied: record
                .playbook_applied
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            what_went_well: Vec::new(),
            what_could_be_improved: Vec::new(),
            prevention_recommendations: Vec::new(),
        },
        technical_appendix: TechnicalAppendix {
            recorded_timeline,
            external_references,
            warnings,
        },
        key_metrics: metrics,
    }
}
