//! Artifact path resolution and file plumbing.
//!
//! Paths are deterministic per (incident, kind): resolving twice returns the
//! same path, and an existing file at that path short-circuits regeneration.
//! The existence check is the system's only duplicate-prevention mechanism —
//! no content hashing of inputs, no versioning.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// What kind of output file an incident artifact is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ArtifactKind {
    Report,
    Timeline,
    Gantt,
    Other(String),
}

impl ArtifactKind {
    fn file_name(&self, incident_id: &str) -> String {
        match self {
            ArtifactKind::Report => format!("COE_{incident_id}.pdf"),
            ArtifactKind::Timeline => format!("timeline_{incident_id}.html"),
            ArtifactKind::Gantt => format!("gantt_{incident_id}.html"),
            ArtifactKind::Other(kind) => format!("{kind}_{incident_id}.pdf"),
        }
    }
}

/// Replace path separators and colons so incident IDs are safe directory
/// names.
fn sanitize_incident_id(incident_id: &str) -> String {
    incident_id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

/// Deterministic, collision-avoiding output-path computation.
#[derive(Debug, Clone)]
pub struct ArtifactPathResolver {
    base_dir: PathBuf,
}

impl Default for ArtifactPathResolver {
    fn default() -> Self {
        Self::new("outputs")
    }
}

impl ArtifactPathResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory that holds every artifact for one incident, created if
    /// absent.
    pub fn incident_dir(&self, incident_id: &str) -> Result<PathBuf, AppError> {
        let dir = self.base_dir.join(sanitize_incident_id(incident_id));
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::new(
                "ARTIFACT_DIR_CREATE_FAILED",
                "Failed to create incident output directory",
            )
            .with_details(format!("path={}: {}", dir.display(), e))
        })?;
        Ok(dir)
    }

    /// Full path for the artifact. Calling twice with the same inputs always
    /// returns the identical path.
    pub fn resolve(&self, incident_id: &str, kind: &ArtifactKind) -> Result<PathBuf, AppError> {
        Ok(self.incident_dir(incident_id)?.join(kind.file_name(incident_id)))
    }
}

/// An artifact that already exists on disk; generation was skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExistingArtifact {
    pub path: String,
    pub file_size: u64,
}

/// Check for an existing artifact at `path`. Callers must consult this
/// before generating and skip generation when it answers `Some`.
pub fn check_existing(path: &Path) -> Option<ExistingArtifact> {
    let meta = fs::metadata(path).ok()?;
    meta.is_file().then(|| ExistingArtifact {
        path: path.to_string_lossy().to_string(),
        file_size: meta.len(),
    })
}

/// Conversion is refused for files above this size.
pub const BASE64_SIZE_CEILING: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Base64File {
    pub filename: String,
    pub file_size: u64,
    pub base64_content: String,
}

/// Read a file and return its base64 representation, refusing anything
/// larger than [`BASE64_SIZE_CEILING`].
pub fn file_to_base64(path: &Path) -> Result<Base64File, AppError> {
    let meta = fs::metadata(path).map_err(|e| {
        AppError::new("ARTIFACT_NOT_FOUND", "File not found for base64 conversion")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    if !meta.is_file() {
        return Err(
            AppError::new("ARTIFACT_NOT_FOUND", "Path is not a file")
                .with_details(path.display().to_string()),
        );
    }
    if meta.len() > BASE64_SIZE_CEILING {
        return Err(AppError::validation(format!(
            "File exceeds the {BASE64_SIZE_CEILING} byte base64 ceiling"
        ))
        .with_details(format!("path={}; bytes={}", path.display(), meta.len())));
    }

    let bytes = fs::read(path).map_err(|e| {
        AppError::new("ARTIFACT_READ_FAILED", "Failed to read file for base64")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    Ok(Base64File {
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        file_size: meta.len(),
        base64_content: BASE64.encode(bytes),
    })
}

fn sha256_file_hex(path: &Path) -> Result<String, AppError> {
    let mut f = fs::File::open(path).map_err(|e| {
        AppError::new("ARTIFACT_READ_FAILED", "Failed to open file for hashing")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = f.read(&mut buf).map_err(|e| {
            AppError::new("ARTIFACT_READ_FAILED", "Failed to read file for hashing")
                .with_details(format!("path={}: {}", path.display(), e))
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn file_type_for(filename: &str) -> &'static str {
    match Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("pdf") => "report",
        Some("html") => "visualization",
        Some("png") => "image",
        Some("json") | Some("csv") => "data",
        Some("txt") => "text",
        Some("md") => "documentation",
        _ => "other",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactFileEntry {
    pub filename: String,
    pub path: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub file_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentFileSummary {
    pub incident_id: String,
    pub output_folder: String,
    pub total_files: usize,
    pub files: Vec<ArtifactFileEntry>,
}

/// Everything generated for one incident, deterministically ordered by
/// filename with a content hash per file.
pub fn summarize_incident_files(
    resolver: &ArtifactPathResolver,
    incident_id: &str,
) -> Result<IncidentFileSummary, AppError> {
    let dir = resolver.incident_dir(incident_id)?;

    let mut entries: Vec<fs::DirEntry> = fs::read_dir(&dir)
        .map_err(|e| {
            AppError::new(
                "ARTIFACT_READDIR_FAILED",
                "Failed to read incident output directory",
            )
            .with_details(format!("path={}: {}", dir.display(), e))
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            AppError::new(
                "ARTIFACT_READDIR_FAILED",
                "Failed to read incident output entry",
            )
            .with_details(format!("path={}: {}", dir.display(), e))
        })?;
    entries.sort_by_key(|e| e.file_name());

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().to_string();
        let meta = entry.metadata().map_err(|e| {
            AppError::new("ARTIFACT_READDIR_FAILED", "Failed to stat incident output")
                .with_details(format!("path={}: {}", path.display(), e))
        })?;
        files.push(ArtifactFileEntry {
            file_type: file_type_for(&filename).to_string(),
            sha256: sha256_file_hex(&path)?,
            path: path.to_string_lossy().to_string(),
            size_bytes: meta.len(),
            filename,
        });
    }

    Ok(IncidentFileSummary {
        incident_id: incident_id.to_string(),
        output_folder: dir.to_string_lossy().to_string(),
        total_files: files.len(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitization_replaces_separators_and_colons() {
        assert_eq!(sanitize_incident_id("INC/1:a\\b"), "INC_1_a_b");
    }

    #[test]
    fn kinds_map_to_documented_templates() {
        assert_eq!(ArtifactKind::Report.file_name("INC-1"), "COE_INC-1.pdf");
        assert_eq!(
            ArtifactKind::Timeline.file_name("INC-1"),
            "timeline_INC-1.html"
        );
        assert_eq!(ArtifactKind::Gantt.file_name("INC-1"), "gantt_INC-1.html");
        assert_eq!(
            ArtifactKind::Other("summary".to_string()).file_name("INC-1"),
            "summary_INC-1.pdf"
        );
    }
}
