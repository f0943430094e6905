//! Blocking HTTP plumbing shared by the REST clients.
//!
//! Retry policy: transport-level failures (timeout, connection refused) are
//! retried a small bounded number of times with a fixed one-second backoff.
//! HTTP error statuses are never retried — a 4xx/5xx means the remote made a
//! decision, and it is surfaced immediately with the response body attached.

use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use opsmind_core::error::AppError;

/// Bounded retry for transport failures only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

/// Wall-clock ceiling for a multi-step external operation. Checked between
/// steps; once elapsed, remaining steps are abandoned.
#[derive(Debug, Clone)]
pub struct WallClockBudget {
    started: Instant,
    limit: Duration,
}

impl WallClockBudget {
    pub fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn check(&self, step: &str) -> Result<(), AppError> {
        if self.started.elapsed() > self.limit {
            return Err(AppError::timeout_budget(format!(
                "Operation exceeded its {}s budget before step '{step}'",
                self.limit.as_secs()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

/// A successfully decoded 2xx response.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    pub status: u16,
    pub body: Value,
}

fn build_request(
    method: Method,
    url: &str,
    headers: &[(&str, &str)],
    timeout: Duration,
) -> ureq::Request {
    let mut request = ureq::request(method.as_str(), url).timeout(timeout);
    for (name, value) in headers {
        request = request.set(name, value);
    }
    request
}

fn decode_body(response: ureq::Response) -> JsonResponse {
    let status = response.status();
    let body = response
        .into_json::<Value>()
        .unwrap_or_else(|e| Value::String(format!("<undecodable body: {e}>")));
    JsonResponse { status, body }
}

/// Issue a JSON request with the given retry policy.
///
/// Returns `Ok` only for 2xx. A non-2xx status maps to `REMOTE_REJECTED`
/// with the body in the details; transport failures map to
/// `TRANSPORT_FAILED` after the policy's attempts are spent.
pub fn request_json(
    method: Method,
    url: &str,
    headers: &[(&str, &str)],
    body: Option<&Value>,
    timeout: Duration,
    policy: RetryPolicy,
) -> Result<JsonResponse, AppError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_transport_error = String::new();

    for attempt in 1..=attempts {
        let request = build_request(method, url, headers, timeout);
        let result = match body {
            Some(json) => request.send_json(json.clone()),
            None => request.call(),
        };

        match result {
            Ok(response) => return Ok(decode_body(response)),
            Err(ureq::Error::Status(status, response)) => {
                let body_text = response
                    .into_string()
                    .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
                log::warn!("{} {url} rejected with status {status}", method.as_str());
                return Err(AppError::remote_rejected(status, body_text));
            }
            Err(ureq::Error::Transport(transport)) => {
                last_transport_error = transport.to_string();
                log::warn!(
                    "{} {url} transport failure on attempt {attempt}/{attempts}: {last_transport_error}",
                    method.as_str()
                );
                if attempt < attempts {
                    thread::sleep(policy.backoff);
                }
            }
        }
    }

    Err(AppError::transport(format!(
        "Request to {url} failed after {attempts} attempt(s)"
    ))
    .with_details(last_transport_error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_three_attempts_with_fixed_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_secs(1));
    }

    #[test]
    fn spent_budget_rejects_the_next_step() {
        let budget = WallClockBudget::new(Duration::ZERO);
        thread::sleep(Duration::from_millis(5));
        let err = budget.check("create branch").expect_err("must fail");
        assert_eq!(err.code, "TIMEOUT_BUDGET_EXCEEDED");
        assert!(err.message.contains("create branch"));
    }

    #[test]
    fn fresh_budget_allows_steps() {
        let budget = WallClockBudget::new(Duration::from_secs(60));
        assert!(budget.check("validate token").is_ok());
    }

    #[test]
    fn connection_refused_surfaces_as_transport_error() {
        // Nothing listens on this port; ureq fails at the transport level.
        let err = request_json(
            Method::Get,
            "http://127.0.0.1:9/unreachable",
            &[],
            None,
            Duration::from_millis(200),
            RetryPolicy::attempts(1),
        )
        .expect_err("must fail");
        assert_eq!(err.code, "TRANSPORT_FAILED");
        assert!(err.retryable);
    }
}
