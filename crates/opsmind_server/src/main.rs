//! `opsmind` - incident automation entry points.
//!
//! Thin shell over the pipeline: a webhook HTTP server plus run-once,
//! replay, harness, share and fix-pr commands. Argument-count problems exit
//! non-zero; pipeline-internal failures print the structured error envelope
//! and exit zero, matching fire-and-forget automation semantics.

mod serve;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use opsmind_core::artifacts::{check_existing, ArtifactKind, ArtifactPathResolver};
use opsmind_core::diff::suggest_patch;
use opsmind_core::domain::ToolResponse;
use opsmind_core::error::AppError;
use opsmind_core::pipeline::Pipeline;
use opsmind_core::store::IncidentStore;
use opsmind_gateway::github::{GithubClient, PullRequestCreated};
use opsmind_gateway::slack::{SlackClient, SlackUpload};

/// On-disk layout, relative to the working directory.
const STORE_PATH: &str = "data/incidents.json";
const OUTPUTS_DIR: &str = "outputs";
const DEFAULT_PORT: u16 = 8080;

const SAMPLE_LOG: &str = "ERROR service=\"sample-service\" className=\"SampleController\" \
                          methodName=\"handle\" errorType=\"RuntimeException\" \
                          message=\"sample incident for a dry run\"";

#[derive(Parser)]
#[command(name = "opsmind", about = "Incident-response automation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the webhook HTTP server.
    Serve {
        /// Port to listen on; falls back to $PORT, then 8080.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the pipeline once over a log file (or a built-in sample).
    Run {
        /// Path to a file with raw log content.
        log_file: Option<PathBuf>,
    },
    /// Regenerate the report for a stored incident.
    Replay {
        /// Incident ID, e.g. INC-1700000000000.
        incident_id: String,
    },
    /// Run the pipeline repeatedly over one log file and summarize.
    Harness {
        /// Number of iterations.
        iterations: u32,
        /// Path to a file with raw log content.
        log_file: PathBuf,
    },
    /// Share a generated report artifact into a chat channel.
    Share {
        /// Incident whose report should be shared.
        incident_id: String,
        /// Channel ID to share into.
        channel: String,
    },
    /// Open an advisory fix pull request from an error-analysis file.
    FixPr {
        /// Repository URL, e.g. https://github.com/acme/pay-api.
        repository_url: String,
        /// File containing the error analysis text.
        error_analysis_file: PathBuf,
        /// Repository path of the file the fix targets.
        target_file: String,
        /// Language of the target file.
        #[arg(long, default_value = "java")]
        language: String,
        /// Base branch to open the PR against.
        #[arg(long, default_value = "main")]
        base_branch: String,
    },
}

fn build_pipeline() -> Arc<Pipeline> {
    Arc::new(Pipeline::new(
        IncidentStore::open(STORE_PATH),
        ArtifactPathResolver::new(OUTPUTS_DIR),
    ))
}

fn read_log_content(log_file: Option<&PathBuf>) -> Result<String, AppError> {
    match log_file {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            AppError::validation("Failed to read log file")
                .with_details(format!("path={}: {}", path.display(), e))
        }),
        None => Ok(SAMPLE_LOG.to_string()),
    }
}

fn print_envelope<T: serde::Serialize>(result: Result<T, AppError>) {
    let envelope = ToolResponse::from(result);
    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("{{\"success\": false, \"error\": \"encode failure: {e}\"}}"),
    }
}

fn resolve_port(flag: Option<u16>) -> u16 {
    flag.or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
        .unwrap_or(DEFAULT_PORT)
}

/// Upload the already-generated report for `incident_id`. Sharing never
/// generates; a missing artifact is the caller's cue to run replay first.
fn share_report(incident_id: &str, channel: &str) -> Result<SlackUpload, AppError> {
    let resolver = ArtifactPathResolver::new(OUTPUTS_DIR);
    let path = resolver.resolve(incident_id, &ArtifactKind::Report)?;
    if check_existing(&path).is_none() {
        return Err(AppError::validation(format!(
            "No report artifact exists for {incident_id}; run replay first"
        ))
        .with_details(path.display().to_string()));
    }

    let client = SlackClient::from_env()?;
    client.upload_file(
        &path,
        channel,
        &format!("Incident report {incident_id}"),
        Some(&format!("Retrospective report for {incident_id}")),
    )
}

/// Synthesize an advisory patch for the analysis text and open a PR that
/// carries it as a `.diff` file, with the patch inlined in the description.
fn open_fix_pr(
    repository_url: &str,
    error_analysis_file: &PathBuf,
    target_file: &str,
    language: &str,
    base_branch: &str,
) -> Result<PullRequestCreated, AppError> {
    let analysis = fs::read_to_string(error_analysis_file).map_err(|e| {
        AppError::validation("Failed to read error analysis file")
            .with_details(format!("path={}: {}", error_analysis_file.display(), e))
    })?;

    let diff_text = suggest_patch(&analysis, target_file, language);
    let patch_path = format!("patches/{}.diff", target_file.replace(['/', '\\'], "_"));
    let mut file_changes = BTreeMap::new();
    file_changes.insert(patch_path, diff_text.clone());

    let title = format!("Automated fix suggestion for {target_file}");
    let description = format!(
        "Advisory patch generated from incident analysis. Review before applying.\n\n\
         ```diff\n{diff_text}```\n\n---\n\nAnalysis excerpt:\n\n{}",
        analysis.chars().take(1000).collect::<String>()
    );

    let client = GithubClient::from_env()?;
    client.create_fix_pull_request(
        repository_url,
        &title,
        &description,
        &file_changes,
        base_branch,
    )
}

fn main() {
    // Best-effort: tokens and ports may live in a local .env file.
    let _ = dotenv::dotenv();
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port } => {
            let port = resolve_port(port);
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("failed to start async runtime: {e}");
                    std::process::exit(1);
                }
            };
            if let Err(err) = runtime.block_on(serve::serve(build_pipeline(), port)) {
                eprintln!("{err}");
                std::process::exit(1);
            }
        }
        Command::Run { log_file } => {
            let pipeline = build_pipeline();
            let outcome = read_log_content(log_file.as_ref())
                .and_then(|content| pipeline.run(&content));
            print_envelope(outcome);
        }
        Command::Replay { incident_id } => {
            print_envelope(build_pipeline().replay(&incident_id));
        }
        Command::Harness {
            iterations,
            log_file,
        } => {
            let pipeline = build_pipeline();
            match read_log_content(Some(&log_file)) {
                Ok(content) => {
                    for iteration in 1..=iterations {
                        println!("--- iteration {iteration}/{iterations} ---");
                        print_envelope(pipeline.run(&content));
                    }
                }
                Err(err) => print_envelope::<()>(Err(err)),
            }
        }
        Command::Share {
            incident_id,
            channel,
        } => {
            print_envelope(share_report(&incident_id, &channel));
        }
        Command::FixPr {
            repository_url,
            error_analysis_file,
            target_file,
            language,
            base_branch,
        } => {
            print_envelope(open_fix_pr(
                &repository_url,
                &error_analysis_file,
                &target_file,
                &language,
                &base_branch,
            ));
        }
    }
}
