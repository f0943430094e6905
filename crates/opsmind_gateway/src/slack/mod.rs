//! Slack file-sharing client.
//!
//! Implements the three-step presigned upload flow of the Files API v2:
//! request an upload URL, POST the raw bytes to it, then finalize and share
//! into a channel. Each step has its own fixed timeout; the byte upload gets
//! the longest one.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use opsmind_core::error::AppError;

const TOKEN_ENV: &str = "SLACK_BOT_AUTH";
const GET_UPLOAD_URL: &str = "https://slack.com/api/files.getUploadURLExternal";
const COMPLETE_UPLOAD: &str = "https://slack.com/api/files.completeUploadExternal";
const STEP_TIMEOUT: Duration = Duration::from_secs(30);
const BYTES_TIMEOUT: Duration = Duration::from_secs(60);

/// Content type by file extension; Slack renders previews from it.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "html" => "text/html",
        "png" => "image/png",
        "json" => "application/json",
        "csv" => "text/csv",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlackUpload {
    pub file_id: String,
    pub permalink: Option<String>,
    pub filename: String,
    pub file_size: u64,
    pub channel: String,
}

/// Slack client authenticated with a bot token from the environment.
#[derive(Debug, Clone)]
pub struct SlackClient {
    token: String,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let token = env::var(TOKEN_ENV).map_err(|_| {
            AppError::validation(format!("{TOKEN_ENV} environment variable not set"))
        })?;
        if token.trim().is_empty() {
            return Err(AppError::validation(format!("{TOKEN_ENV} is empty")));
        }
        Ok(Self::new(token))
    }

    /// Slack wraps failures in 200 responses with `ok: false`; unwrap that
    /// into the same error shape as a rejected status.
    fn require_ok(step: &str, body: Value) -> Result<Value, AppError> {
        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(body);
        }
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown Slack API error");
        Err(AppError::remote_rejected(200, format!("{step}: {reason}")))
    }

    fn form_call(&self, url: &str, form: &[(&str, &str)]) -> Result<Value, AppError> {
        let response = ureq::post(url)
            .timeout(STEP_TIMEOUT)
            .set("Authorization", &format!("Bearer {}", self.token))
            .send_form(form);
        match response {
            Ok(r) => r.into_json::<Value>().map_err(|e| {
                AppError::parse("Failed to decode Slack response").with_details(e.to_string())
            }),
            Err(ureq::Error::Status(status, r)) => Err(AppError::remote_rejected(
                status,
                r.into_string()
                    .unwrap_or_else(|e| format!("<unreadable body: {e}>")),
            )),
            Err(ureq::Error::Transport(t)) => Err(AppError::transport(
                "Failed to reach the Slack API",
            )
            .with_details(t.to_string())),
        }
    }

    /// Upload `file_path` and share it into `channel_id`.
    pub fn upload_file(
        &self,
        file_path: &Path,
        channel_id: &str,
        title: &str,
        initial_comment: Option<&str>,
    ) -> Result<SlackUpload, AppError> {
        let meta = fs::metadata(file_path).map_err(|e| {
            AppError::validation("File to upload does not exist")
                .with_details(format!("path={}: {}", file_path.display(), e))
        })?;
        if !meta.is_file() {
            return Err(AppError::validation("Upload path is not a file")
                .with_details(file_path.display().to_string()));
        }
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.bin".to_string());
        let file_size = meta.len();

        // Step 1: presigned upload URL.
        let length = file_size.to_string();
        let granted = Self::require_ok(
            "getUploadURLExternal",
            self.form_call(
                GET_UPLOAD_URL,
                &[("filename", filename.as_str()), ("length", length.as_str())],
            )?,
        )?;
        let upload_url = granted
            .get("upload_url")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::internal("Slack grant had no upload_url"))?
            .to_string();
        let file_id = granted
            .get("file_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::internal("Slack grant had no file_id"))?
            .to_string();

        // Step 2: raw bytes to the presigned URL.
        let bytes = fs::read(file_path).map_err(|e| {
            AppError::new("ARTIFACT_READ_FAILED", "Failed to read file for upload")
                .with_details(format!("path={}: {}", file_path.display(), e))
        })?;
        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let upload_result = ureq::post(&upload_url)
            .timeout(BYTES_TIMEOUT)
            .set("Content-Type", mime_for_extension(extension))
            .send_bytes(&bytes);
        match upload_result {
            Ok(_) => {}
            Err(ureq::Error::Status(status, r)) => {
                return Err(AppError::remote_rejected(
                    status,
                    r.into_string()
                        .unwrap_or_else(|e| format!("<unreadable body: {e}>")),
                ));
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(
                    AppError::transport("Failed to upload file bytes to Slack")
                        .with_details(t.to_string()),
                );
            }
        }
        log::debug!("uploaded {file_size} bytes for {filename}");

        // Step 3: finalize and share.
        let files_payload = json!([{ "id": file_id, "title": title }]).to_string();
        let mut form: Vec<(&str, &str)> = vec![("files", files_payload.as_str())];
        if !channel_id.trim().is_empty() {
            form.push(("channel_id", channel_id));
        }
        if let Some(comment) = initial_comment.filter(|c| !c.trim().is_empty()) {
            form.push(("initial_comment", comment));
        }
        let completed = Self::require_ok(
            "completeUploadExternal",
            self.form_call(COMPLETE_UPLOAD, &form)?,
        )?;

        let permalink = completed
            .pointer("/files/0/permalink")
            .and_then(Value::as_str)
            .map(str::to_string);
        log::info!("shared {filename} to {channel_id}");

        Ok(SlackUpload {
            file_id,
            permalink,
            filename,
            file_size,
            channel: channel_id.to_string(),
        })
    }
}
