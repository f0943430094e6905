//! End-to-end incident pipeline.
//!
//! One run: classify raw log text, persist an incident seeded from the
//! classification, build the retrospective, and write the report artifact
//! unless one already exists at the resolved path.
//!
//! Concurrency model: a single process-wide mutex wraps the whole run.
//! Concurrent callers queue behind it rather than interleave, which is what
//! guarantees that the store mutation a run performs is visible to the
//! report generation inside the same run, and totally orders mutations
//! across runs in one process. There is no cross-process coordination.

use std::fs;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::analyze::analyze_log;
use crate::artifacts::{check_existing, ArtifactKind, ArtifactPathResolver};
use crate::domain::{
    AlertClassification, IncidentFields, IncidentRecord, IncidentStatus, NormalizedAlert,
};
use crate::error::AppError;
use crate::report::{build_report, ReportContext, RetrospectiveReport};
use crate::store::IncidentStore;

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineOutcome {
    pub incident_id: String,
    pub classification: AlertClassification,
    pub report_path: String,
    /// True when an artifact already existed and generation was skipped.
    pub report_skipped: bool,
    pub report_file_size: u64,
}

const FALLBACK_SERVICE: &str = "unknown-service";

/// Pipeline state shared by the HTTP and CLI shells.
pub struct Pipeline {
    store: Mutex<IncidentStore>,
    resolver: ArtifactPathResolver,
}

impl Pipeline {
    pub fn new(store: IncidentStore, resolver: ArtifactPathResolver) -> Self {
        Self {
            store: Mutex::new(store),
            resolver,
        }
    }

    fn lock_store(&self) -> Result<std::sync::MutexGuard<'_, IncidentStore>, AppError> {
        self.store
            .lock()
            .map_err(|_| AppError::internal("pipeline lock poisoned by an earlier panic"))
    }

    /// Classify `log_content`, persist a new incident, and generate its
    /// report artifact. Holds the pipeline lock for the whole run.
    pub fn run(&self, log_content: &str) -> Result<PipelineOutcome, AppError> {
        let mut store = self.lock_store()?;
        let now = OffsetDateTime::now_utc();

        let classification = analyze_log(log_content);
        log::info!(
            "classified log ({:?} format, error_type={:?})",
            classification.log_format,
            classification.error_type
        );

        let record = store.create_with_now(seed_fields(&classification), now)?;
        generate_report_artifact(&self.resolver, &record, &classification, now)
    }

    /// Regenerate the report for an already-stored incident.
    pub fn replay(&self, incident_id: &str) -> Result<PipelineOutcome, AppError> {
        let incident_id = incident_id.trim();
        if incident_id.is_empty() {
            return Err(AppError::validation(
                "A concrete incident ID is required for replay",
            ));
        }

        let mut store = self.lock_store()?;
        let record = store.read(incident_id)?;
        let now = OffsetDateTime::now_utc();
        generate_report_artifact(&self.resolver, &record, &AlertClassification::default(), now)
    }

    /// Seed an incident from a normalized monitoring alert. Returns `None`
    /// when the alert severity does not warrant an incident.
    pub fn seed_from_alert(
        &self,
        alert: &NormalizedAlert,
    ) -> Result<Option<IncidentRecord>, AppError> {
        if !alert.should_create_incident {
            log::debug!(
                "alert '{}' for {} below incident threshold, skipping",
                alert.alert_type,
                alert.service_name
            );
            return Ok(None);
        }

        let mut store = self.lock_store()?;
        let record = store.create(IncidentFields {
            service_name: Some(alert.service_name.clone()),
            severity: Some(alert.severity.incident_severity()),
            timestamp: Some(alert.timestamp.clone()),
            timeline: Some(format!(
                "{} - {} alert: {}",
                alert.timestamp, alert.alert_type, alert.raw_message
            )),
            ..IncidentFields::default()
        })?;
        Ok(Some(record))
    }

    /// List every stored incident, most recent first.
    pub fn list_incidents(&self) -> Result<Vec<IncidentRecord>, AppError> {
        self.lock_store()?.list()
    }
}

fn seed_fields(classification: &AlertClassification) -> IncidentFields {
    IncidentFields {
        service_name: Some(
            classification
                .service_name
                .clone()
                .unwrap_or_else(|| FALLBACK_SERVICE.to_string()),
        ),
        timestamp: classification.timestamp.clone(),
        timeline: classification
            .root_cause_summary
            .as_ref()
            .map(|summary| format!("detected - {summary}")),
        ..IncidentFields::default()
    }
}

/// Build and write the report for `record`, honoring the duplicate check.
///
/// A failure to write the artifact is fatal for the run and propagates; it
/// is the one filesystem condition this pipeline does not absorb.
fn generate_report_artifact(
    resolver: &ArtifactPathResolver,
    record: &IncidentRecord,
    classification: &AlertClassification,
    now: OffsetDateTime,
) -> Result<PipelineOutcome, AppError> {
    let path = resolver.resolve(&record.incident_id, &ArtifactKind::Report)?;

    if let Some(existing) = check_existing(&path) {
        log::info!(
            "report for {} already exists ({} bytes), skipping generation",
            record.incident_id,
            existing.file_size
        );
        return Ok(PipelineOutcome {
            incident_id: record.incident_id.clone(),
            classification: classification.clone(),
            report_path: existing.path,
            report_skipped: true,
            report_file_size: existing.file_size,
        });
    }

    let report = build_report(record, &report_context(record, classification), now);
    let json = render_report(&report)?;
    fs::write(&path, json.as_bytes()).map_err(|e| {
        AppError::new("REPORT_WRITE_FAILED", "Failed to write report artifact")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;

    let file_size = json.len() as u64;
    log::info!(
        "wrote report for {} to {} ({} bytes)",
        record.incident_id,
        path.display(),
        file_size
    );
    Ok(PipelineOutcome {
        incident_id: record.incident_id.clone(),
        classification: classification.clone(),
        report_path: path.to_string_lossy().to_string(),
        report_skipped: false,
        report_file_size: file_size,
    })
}

fn report_context(record: &IncidentRecord, classification: &AlertClassification) -> ReportContext {
    ReportContext {
        // A resolved incident's last mutation closed it out.
        resolved_at: matches!(record.status, IncidentStatus::Resolved)
            .then(|| record.last_updated.clone()),
        root_cause: classification.root_cause_summary.clone(),
        ..ReportContext::default()
    }
}

fn render_report(report: &RetrospectiveReport) -> Result<String, AppError> {
    serde_json::to_string_pretty(report).map_err(|e| {
        AppError::new("REPORT_ENCODE_FAILED", "Failed to encode report").with_details(e.to_string())
    })
}
