use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use time::OffsetDateTime;

use crate::domain::{IncidentFields, IncidentRecord};
use crate::error::AppError;
use crate::normalize::timestamps::{format_rfc3339_utc, unix_millis};

static INCIDENT_ID_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^INC-\d+$").expect("static incident id pattern"));

/// Durable CRUD store for [`IncidentRecord`], mirrored to a single JSON
/// file.
///
/// Persistence protocol:
/// - The mirror is loaded lazily on first access per store lifetime; a
///   missing file is not an error, the store just starts empty.
/// - After every successful mutation the entire map is re-serialized and the
///   mirror rewritten wholesale (pretty-printed UTF-8, keyed by incident ID).
/// - There is no cross-process coordination. Two processes sharing one
///   mirror race on the rewrite and the last writer's snapshot wins; the
///   design assumes single-process ownership per deployment.
///
/// The store is an explicitly constructed value passed by reference to its
/// consumers — never ambient global state — so tests get isolated stores.
#[derive(Debug)]
pub struct IncidentStore {
    mirror_path: Option<PathBuf>,
    records: BTreeMap<String, IncidentRecord>,
    loaded: bool,
}

impl IncidentStore {
    /// Store mirrored at `path`. No I/O happens until the first operation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            mirror_path: Some(path.into()),
            records: BTreeMap::new(),
            loaded: false,
        }
    }

    /// Ephemeral store with no mirror file.
    pub fn in_memory() -> Self {
        Self {
            mirror_path: None,
            records: BTreeMap::new(),
            loaded: true,
        }
    }

    pub fn mirror_path(&self) -> Option<&Path> {
        self.mirror_path.as_deref()
    }

    fn ensure_loaded(&mut self) -> Result<(), AppError> {
        if self.loaded {
            return Ok(());
        }
        self.loaded = true;

        let Some(path) = self.mirror_path.as_deref() else {
            return Ok(());
        };
        if !path.exists() {
            log::debug!("incident mirror {} absent, starting empty", path.display());
            return Ok(());
        }

        let bytes = fs::read(path).map_err(|e| {
            AppError::new("STORE_MIRROR_READ_FAILED", "Failed to read incident mirror")
                .with_details(format!("path={}: {}", path.display(), e))
        })?;
        self.records = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::new(
                "STORE_MIRROR_DECODE_FAILED",
                "Failed to decode incident mirror",
            )
            .with_details(format!("path={}: {}", path.display(), e))
        })?;
        log::info!(
            "loaded {} incident(s) from {}",
            self.records.len(),
            path.display()
        );
        Ok(())
    }

    fn persist(&self) -> Result<(), AppError> {
        let Some(path) = self.mirror_path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::new(
                        "STORE_MIRROR_WRITE_FAILED",
                        "Failed to create incident mirror directory",
                    )
                    .with_details(format!("path={}: {}", parent.display(), e))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&self.records).map_err(|e| {
            AppError::new(
                "STORE_MIRROR_ENCODE_FAILED",
                "Failed to encode incident mirror",
            )
            .with_details(e.to_string())
        })?;
        fs::write(path, json.as_bytes()).map_err(|e| {
            AppError::new(
                "STORE_MIRROR_WRITE_FAILED",
                "Failed to write incident mirror",
            )
            .with_details(format!("path={}: {}", path.display(), e))
        })
    }

    /// All known incident IDs, for not-found error context.
    pub fn known_ids(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Create a record, generating `INC-<unix_millis>` when the caller ID is
    /// absent or does not match `INC-<digits>`.
    ///
    /// Creating with an ID that already exists overwrites the stored record
    /// silently (last-write-wins). That matches the upstream automation's
    /// behavior and is deliberately preserved, not an oversight.
    pub fn create(&mut self, fields: IncidentFields) -> Result<IncidentRecord, AppError> {
        self.create_with_now(fields, OffsetDateTime::now_utc())
    }

    /// Deterministic variant of [`create`](Self::create); `now` supplies the
    /// generated ID, `created_at` and `last_updated`.
    pub fn create_with_now(
        &mut self,
        fields: IncidentFields,
        now: OffsetDateTime,
    ) -> Result<IncidentRecord, AppError> {
        self.ensure_loaded()?;

        let service_name = fields
            .service_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::validation("service_name is required for creating an incident")
            })?
            .to_string();

        let incident_id = match fields.incident_id.as_deref().map(str::trim) {
            Some(id) if INCIDENT_ID_FORMAT.is_match(id) => id.to_string(),
            _ => format!("INC-{}", unix_millis(now)),
        };

        let now_str = format_rfc3339_utc(now);
        let record = IncidentRecord {
            incident_id: incident_id.clone(),
            service_name,
            severity: fields.severity.unwrap_or_default(),
            status: fields.status.unwrap_or_default(),
            timestamp: fields.timestamp.unwrap_or_else(|| now_str.clone()),
            commander: fields.commander,
            communication_lead: fields.communication_lead,
            playbook_applied: fields.playbook_applied,
            timeline: fields.timeline,
            resolution_details: fields.resolution_details,
            created_at: now_str.clone(),
            last_updated: now_str,
        };

        if self.records.insert(incident_id.clone(), record.clone()).is_some() {
            log::warn!("incident {incident_id} existed and was overwritten");
        }
        self.persist()?;
        log::info!("created incident {incident_id}");
        Ok(record)
    }

    /// Full record for `incident_id`, or a not-found error listing every
    /// known ID so the caller can self-correct.
    pub fn read(&mut self, incident_id: &str) -> Result<IncidentRecord, AppError> {
        self.ensure_loaded()?;
        match self.records.get(incident_id) {
            Some(record) => Ok(record.clone()),
            None => Err(AppError::not_found(incident_id, self.known_ids())),
        }
    }

    /// Merge every set field over the existing record and refresh
    /// `last_updated`. An all-`None` update is rejected as a no-op before
    /// anything is touched, leaving the stored record byte-identical.
    pub fn update(
        &mut self,
        incident_id: &str,
        fields: IncidentFields,
    ) -> Result<IncidentRecord, AppError> {
        self.update_with_now(incident_id, fields, OffsetDateTime::now_utc())
    }

    pub fn update_with_now(
        &mut self,
        incident_id: &str,
        fields: IncidentFields,
        now: OffsetDateTime,
    ) -> Result<IncidentRecord, AppError> {
        self.ensure_loaded()?;

        if !self.records.contains_key(incident_id) {
            return Err(AppError::not_found(incident_id, self.known_ids()));
        }
        if !fields.has_updates() {
            return Err(AppError::no_op(
                "No fields provided for update. At least one field must be specified.",
            ));
        }

        let record = self
            .records
            .get_mut(incident_id)
            .ok_or_else(|| AppError::internal("record vanished between lookup and update"))?;

        if let Some(v) = fields.service_name {
            record.service_name = v;
        }
        if let Some(v) = fields.severity {
            record.severity = v;
        }
        if let Some(v) = fields.status {
            record.status = v;
        }
        if let Some(v) = fields.timestamp {
            record.timestamp = v;
        }
        if let Some(v) = fields.commander {
            record.commander = Some(v);
        }
        if let Some(v) = fields.communication_lead {
            record.communication_lead = Some(v);
        }
        if let Some(v) = fields.playbook_applied {
            record.playbook_applied = Some(v);
        }
        if let Some(v) = fields.timeline {
            record.timeline = Some(v);
        }
        if let Some(v) = fields.resolution_details {
            record.resolution_details = Some(v);
        }
        record.last_updated = format_rfc3339_utc(now);

        let updated = record.clone();
        self.persist()?;
        log::info!("updated incident {incident_id}");
        Ok(updated)
    }

    /// All records, most recently created first. An empty store yields an
    /// empty vec, not an error.
    pub fn list(&mut self) -> Result<Vec<IncidentRecord>, AppError> {
        self.ensure_loaded()?;
        let mut out: Vec<IncidentRecord> = self.records.values().cloned().collect();
        // RFC3339 UTC sorts correctly as a string; ID breaks exact ties.
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.incident_id.cmp(&a.incident_id))
        });
        Ok(out)
    }

    /// Remove and return the record.
    pub fn delete(&mut self, incident_id: &str) -> Result<IncidentRecord, AppError> {
        self.ensure_loaded()?;
        match self.records.remove(incident_id) {
            Some(record) => {
                self.persist()?;
                log::info!("deleted incident {incident_id}");
                Ok(record)
            }
            None => Err(AppError::not_found(incident_id, self.known_ids())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_match_the_documented_format() {
        let mut store = IncidentStore::in_memory();
        let record = store
            .create(IncidentFields {
                service_name: Some("checkout".to_string()),
                ..IncidentFields::default()
            })
            .expect("create");
        assert!(INCIDENT_ID_FORMAT.is_match(&record.incident_id));
    }

    #[test]
    fn malformed_caller_id_is_replaced() {
        let mut store = IncidentStore::in_memory();
        let record = store
            .create(IncidentFields {
                incident_id: Some("not-an-id".to_string()),
                service_name: Some("checkout".to_string()),
                ..IncidentFields::default()
            })
            .expect("create");
        assert_ne!(record.incident_id, "not-an-id");
        assert!(record.incident_id.starts_with("INC-"));
    }
}
