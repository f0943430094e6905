//! GitHub REST client for the fix-PR flow.
//!
//! Covers exactly what the automation needs: token and repository
//! validation, branch creation from the base ref, per-file content commits,
//! pull-request creation, tree listing and file retrieval. The whole
//! multi-step PR flow runs under one wall-clock budget; once it elapses the
//! remaining steps are abandoned and a budget error is returned.

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::format_description;
use time::OffsetDateTime;

use opsmind_core::error::AppError;

use crate::http::{request_json, Method, RetryPolicy, WallClockBudget};

const API_ROOT: &str = "https://api.github.com";
const TOKEN_ENV: &str = "GITHUB_API_KEY";
const USER_AGENT: &str = "opsmind-incident-automation/1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const PR_FLOW_BUDGET: Duration = Duration::from_secs(180);
const BRANCH_SLUG_LIMIT: usize = 20;

static REPO_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://github\.com/([^/]+)/([^/]+?)/?$").expect("static repo url pattern")
});

/// Parse `https://github.com/<owner>/<repo>` into its components.
pub fn parse_repo_url(repository_url: &str) -> Result<(String, String), AppError> {
    let caps = REPO_URL.captures(repository_url.trim()).ok_or_else(|| {
        AppError::validation("Invalid GitHub repository URL")
            .with_details(format!("expected https://github.com/owner/repo, got {repository_url}"))
    })?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

/// Branch name from a PR title: lowercased, hyphenated, stripped to
/// alphanumerics, capped at 20 characters, suffixed with a timestamp.
pub fn generate_branch_name(pr_title: &str, now: OffsetDateTime) -> String {
    let mut slug = String::new();
    let mut last_was_hyphen = false;
    for c in pr_title.to_lowercase().chars() {
        let mapped = match c {
            'a'..='z' | '0'..='9' => Some(c),
            ' ' | '-' => Some('-'),
            _ => None,
        };
        if let Some(mapped) = mapped {
            if mapped == '-' {
                if last_was_hyphen {
                    continue;
                }
                last_was_hyphen = true;
            } else {
                last_was_hyphen = false;
            }
            slug.push(mapped);
        }
    }
    let mut slug: String = slug.trim_matches('-').chars().take(BRANCH_SLUG_LIMIT).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("fix");
    }

    let fmt = format_description::parse("[year][month][day]-[hour][minute][second]")
        .expect("static branch timestamp format");
    let stamp = now
        .format(&fmt)
        .unwrap_or_else(|_| "00000000-000000".to_string());
    format!("{slug}-{stamp}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequestCreated {
    pub number: u64,
    pub html_url: String,
    pub branch_name: String,
    pub committed_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub entry_type: String,
    pub size: Option<u64>,
}

/// Authenticated GitHub client. The token comes from the process
/// environment, never from configuration files.
#[derive(Debug, Clone)]
pub struct GithubClient {
    token: String,
}

impl GithubClient {
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

    fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, AppError> {
        let auth = format!("Bearer {}", self.token);
        let headers = [
            ("Authorization", auth.as_str()),
            ("Accept", "application/vnd.github.v3+json"),
            ("User-Agent", USER_AGENT),
        ];
        let response = request_json(
            method,
            url,
            &headers,
            body,
            REQUEST_TIMEOUT,
            RetryPolicy::attempts(2),
        )?;
        Ok(response.body)
    }

    /// GET that tolerates a 404 by answering `None`, used for existence
    /// probes (does this file exist on the branch yet?).
    fn request_optional(&self, url: &str) -> Result<Option<Value>, AppError> {
        match self.request(Method::Get, url, None) {
            Ok(body) => Ok(Some(body)),
            Err(err) if err.code == "REMOTE_REJECTED" && err.message.contains("404") => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Fail fast when the token is unusable; every later step would fail
    /// with a worse error message.
    fn validate_token(&self) -> Result<String, AppError> {
        let user = self.request(Method::Get, &format!("{API_ROOT}/user"), None)?;
        let login = user
            .get("login")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        log::debug!("authenticated to GitHub as {login}");
        Ok(login)
    }

    fn base_sha(&self, owner: &str, repo: &str, base_branch: &str) -> Result<String, AppError> {
        let body = self.request(
            Method::Get,
            &format!("{API_ROOT}/repos/{owner}/{repo}/git/ref/heads/{base_branch}"),
            None,
        )?;
        body.pointer("/object/sha")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::internal("Base branch reference response had no object.sha")
                    .with_details(body.to_string())
            })
    }

    /// Full fix-PR flow: validate, branch, commit each file, open the PR.
    ///
    /// `file_changes` maps repository paths to their complete new contents.
    pub fn create_fix_pull_request(
        &self,
        repository_url: &str,
        pr_title: &str,
        pr_description: &str,
        file_changes: &BTreeMap<String, String>,
        base_branch: &str,
    ) -> Result<PullRequestCreated, AppError> {
        if file_changes.is_empty() {
            return Err(AppError::validation(
                "At least one file change is required to open a fix PR",
            ));
        }

        let (owner, repo) = parse_repo_url(repository_url)?;
        let budget = WallClockBudget::new(PR_FLOW_BUDGET);
        let repo_api = format!("{API_ROOT}/repos/{owner}/{repo}");

        budget.check("validate token")?;
        self.validate_token()?;

        budget.check("validate repository")?;
        self.request(Method::Get, &repo_api, None)?;

        budget.check("resolve base branch")?;
        let base_sha = self.base_sha(&owner, &repo, base_branch)?;

        budget.check("create branch")?;
        let branch_name = generate_branch_name(pr_title, OffsetDateTime::now_utc());
        self.request(
            Method::Post,
            &format!("{repo_api}/git/refs"),
            Some(&json!({
                "ref": format!("refs/heads/{branch_name}"),
                "sha": base_sha,
            })),
        )?;
        log::info!("created branch {branch_name} in {owner}/{repo}");

        let mut committed_files = Vec::new();
        for (path, content) in file_changes {
            budget.check("commit file")?;

            // Updating an existing file needs its current blob sha.
            let existing = self
                .request_optional(&format!("{repo_api}/contents/{path}?ref={branch_name}"))?;
            let mut commit = json!({
                "message": format!("Update {path}"),
                "content": BASE64.encode(content.as_bytes()),
                "branch": branch_name,
            });
            if let Some(sha) = existing
                .as_ref()
                .and_then(|f| f.get("sha"))
                .and_then(Value::as_str)
            {
                commit["sha"] = Value::String(sha.to_string());
            }

            self.request(
                Method::Put,
                &format!("{repo_api}/contents/{path}"),
                Some(&commit),
            )?;
            committed_files.push(path.clone());
        }

        budget.check("create pull request")?;
        let pr = self.request(
            Method::Post,
            &format!("{repo_api}/pulls"),
            Some(&json!({
                "title": pr_title,
                "body": pr_description,
                "head": branch_name,
                "base": base_branch,
            })),
        )?;

        let number = pr.get("number").and_then(Value::as_u64).ok_or_else(|| {
            AppError::internal("Pull request response had no number").with_details(pr.to_string())
        })?;
        let html_url = pr
            .get("html_url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        log::info!("opened PR #{number} for {owner}/{repo}");

        Ok(PullRequestCreated {
            number,
            html_url,
            branch_name,
            committed_files,
        })
    }

    /// Flat listing of the repository tree on `branch`.
    pub fn list_repository_tree(
        &self,
        repository_url: &str,
        branch: &str,
    ) -> Result<Vec<TreeEntry>, AppError> {
        let (owner, repo) = parse_repo_url(repository_url)?;
        let body = self.request(
            Method::Get,
            &format!("{API_ROOT}/repos/{owner}/{repo}/git/trees/{branch}?recursive=1"),
            None,
        )?;

        let entries = body
            .get("tree")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AppError::internal("Tree response had no tree array").with_details(body.to_string())
            })?
            .iter()
            .filter_map(|entry| {
                Some(TreeEntry {
                    path: entry.get("path")?.as_str()?.to_string(),
                    entry_type: entry.get("type")?.as_str()?.to_string(),
                    size: entry.get("size").and_then(Value::as_u64),
                })
            })
            .collect();
        Ok(entries)
    }

    /// Decoded contents of one file on `branch`.
    pub fn fetch_file_content(
        &self,
        repository_url: &str,
        path: &str,
        branch: &str,
    ) -> Result<String, AppError> {
        let (owner, repo) = parse_repo_url(repository_url)?;
        let body = self.request(
            Method::Get,
            &format!("{API_ROOT}/repos/{owner}/{repo}/contents/{path}?ref={branch}"),
            None,
        )?;

        let encoded = body
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::internal("File content response had no content field")
                    .with_details(format!("path={path}"))
            })?
            .replace(['\n', '\r'], "");
        let bytes = BASE64.decode(encoded.as_bytes()).map_err(|e| {
            AppError::parse("File content was not valid base64")
                .with_details(format!("path={path}: {e}"))
        })?;
        String::from_utf8(bytes).map_err(|e| {
            AppError::parse("File content was not valid UTF-8")
                .with_details(format!("path={path}: {e}"))
        })
    }
}
