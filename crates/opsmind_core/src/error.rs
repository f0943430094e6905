use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across all layers and serialized into
/// tool result envelopes.
///
/// Notes:
/// - `code` is a stable machine-readable identifier; `message` is for humans.
/// - `retryable` is true only for transport-level failures (timeout,
///   connection refused). HTTP error statuses are never retryable.
/// - `available_incidents` is populated on store lookups that miss, so an
///   agent caller can self-correct with a known ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_incidents: Option<Vec<String>>,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
            available_incidents: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_available_incidents(mut self, ids: Vec<String>) -> Self {
        self.available_incidents = Some(ids);
        self
    }

    /// Required input missing or malformed.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_FAILED", message)
    }

    /// Store lookup missed; carries every currently known ID.
    pub fn not_found(incident_id: &str, known_ids: Vec<String>) -> Self {
        Self::new(
            "STORE_NOT_FOUND",
            format!("Incident with ID '{incident_id}' not found"),
        )
        .with_available_incidents(known_ids)
    }

    /// Update carried zero effective field changes.
    pub fn no_op(message: impl Into<String>) -> Self {
        Self::new("STORE_NO_OP", message)
    }

    /// Malformed JSON or otherwise undecodable input.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new("PARSE_FAILED", message)
    }

    /// Network-level failure reaching an external API. Retryable.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new("TRANSPORT_FAILED", message).with_retryable(true)
    }

    /// External API answered with a non-2xx status. Never retried.
    pub fn remote_rejected(status: u16, body: impl Into<String>) -> Self {
        Self::new(
            "REMOTE_REJECTED",
            format!("External API returned status {status}"),
        )
        .with_details(body)
    }

    /// Wall-clock budget for a multi-step external operation elapsed.
    pub fn timeout_budget(message: impl Into<String>) -> Self {
        Self::new("TIMEOUT_BUDGET_EXCEEDED", message)
    }

    /// Unexpected failure inside a component boundary.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_FAILED", message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_known_ids() {
        let err = AppError::not_found("INC-1", vec!["INC-2".to_string(), "INC-3".to_string()]);
        assert_eq!(err.code, "STORE_NOT_FOUND");
        assert_eq!(
            err.available_incidents.as_deref(),
            Some(&["INC-2".to_string(), "INC-3".to_string()][..])
        );
    }

    #[test]
    fn transport_is_retryable_but_rejection_is_not() {
        assert!(AppError::transport("timed out").retryable);
        assert!(!AppError::remote_rejected(404, "missing").retryable);
    }
}
