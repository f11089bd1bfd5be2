//! Command-line surface for `scanforge`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// scanforge - orchestrates security-analysis tool workflows
#[derive(Parser)]
#[command(name = "scanforge")]
#[command(about = "Orchestrates SAST/SCA/DAST/secrets tool workflows behind one broker")]
#[command(long_about = r#"
scanforge runs a fixed set of scenario templates (code_commit, dependency_update,
emergency_vuln, release_regression) as checkpointed node plans, normalizing every
adapter's native findings into one schema and deduplicating across tools.

EXAMPLES:
  # Run the default code_commit scenario against a local checkout
  scanforge run --scenario code_commit --target /path/to/repo --tool semgrep

  # Run two scanners in parallel and gate on severity
  scanforge run --scenario emergency_vuln --target /path/to/repo \
      --tool semgrep --tool trivy --severity-floor high

  # Check on a running or paused workflow
  scanforge status --workflow-id wf-123

  # Resume a workflow paused at its human_review node
  scanforge resume --workflow-id wf-123 --annotation "approved by reviewer"

  # Cancel an in-flight workflow
  scanforge cancel --workflow-id wf-123

  # Enforce a findings policy against a finished workflow's latest checkpoint
  scanforge gate --workflow-id wf-123 --severity-floor high

  # Serve the JSON-RPC tool broker over stdio
  scanforge broker

  # Check which adapter binaries are reachable on PATH
  scanforge doctor

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > environment > config file > defaults
  Config file is discovered by looking for ./scanforge.toml in the current directory
  Use --config to specify an explicit config file path
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured checkpoint directory
    #[arg(long, global = true)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Cap on concurrently-running scan tasks
    #[arg(long, global = true)]
    pub max_parallel: Option<usize>,

    /// Minimum severity a finding must meet to avoid being tagged policy_violation
    #[arg(long, global = true)]
    pub severity_floor: Option<String>,

    /// Emit debug-level logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create and drive a new workflow to completion, a pause, or a failure
    Run {
        /// Workflow id; generated from the scenario and current time if omitted
        #[arg(long)]
        workflow_id: Option<String>,

        /// Scenario template: code_commit, dependency_update, emergency_vuln, release_regression
        #[arg(long)]
        scenario: String,

        /// Target location: a local path, or an http(s):// URL for a DAST target
        #[arg(long)]
        target: String,

        /// Target kind override; inferred from `--target`'s scheme when omitted
        #[arg(long, value_parser = ["local_path", "git_repo", "container_image", "http_url"])]
        target_kind: Option<String>,

        /// VCS branch the target was checked out at
        #[arg(long)]
        branch: Option<String>,

        /// VCS commit the target was checked out at
        #[arg(long)]
        commit: Option<String>,

        /// Content-addressable digest identifying the target (e.g. a container image digest)
        #[arg(long)]
        digest: Option<String>,

        /// Adapter tool_id to run; repeat for parallel_scan scenarios
        #[arg(long = "tool", required = true)]
        tools: Vec<String>,

        /// Required CWE ids a finding must carry to conform to the validation node's policy
        #[arg(long = "required-cwe")]
        required_cwes: Vec<u32>,

        /// CWE ids whose findings never conform to the validation node's policy
        #[arg(long = "excluded-cwe")]
        excluded_cwes: Vec<u32>,

        /// Per-adapter timeout, in seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,

        /// Cap on findings a single adapter run may report
        #[arg(long)]
        max_findings: Option<u32>,

        /// Allow adapters that need network access (e.g. zap_baseline) to reach it
        #[arg(long)]
        network_allowed: bool,

        /// Project name recorded on the scan's context, for adapters/reports that surface it
        #[arg(long, default_value = "")]
        project_name: String,

        /// Who/what triggered this run (CI job, operator, scheduled job, ...)
        #[arg(long, default_value = "cli")]
        triggered_by: String,

        /// Print the final workflow state as JSON instead of a text summary
        #[arg(long)]
        json: bool,
    },

    /// Show one workflow's current phase and progress, or list every known workflow
    Status {
        /// Workflow id to report on; omit with --all to list every workflow
        #[arg(long)]
        workflow_id: Option<String>,

        /// List every workflow's metadata instead of one workflow's detail
        #[arg(long)]
        all: bool,

        /// Print effective configuration (and its source per field) instead of workflow state
        #[arg(long = "effective-config")]
        show_config: bool,

        /// Print as JSON instead of a text summary
        #[arg(long)]
        json: bool,
    },

    /// Resume a workflow paused at its human_review node
    Resume {
        #[arg(long)]
        workflow_id: String,

        /// Checkpoint sequence to resume from; defaults to the latest checkpoint
        #[arg(long)]
        checkpoint_seq: Option<u64>,

        /// Annotation attached to the human_review node before resuming
        #[arg(long)]
        annotation: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Cancel a running or paused workflow
    Cancel {
        #[arg(long)]
        workflow_id: String,
    },

    /// Evaluate a workflow's latest checkpoint against a findings policy
    Gate {
        #[arg(long)]
        workflow_id: String,

        /// Reject if any finding is at or above this severity and carries a policy_violation tag
        #[arg(long)]
        severity_floor: Option<String>,

        /// Reject unless every finding's CWE is in this set (when non-empty)
        #[arg(long = "required-cwe")]
        required_cwes: Vec<u32>,

        /// Reject if any finding carries one of these CWEs
        #[arg(long = "excluded-cwe")]
        excluded_cwes: Vec<u32>,

        #[arg(long)]
        json: bool,
    },

    /// Serve the JSON-RPC 2.0 tool broker over stdio
    Broker {
        /// Cap on concurrently in-flight `tools/call` requests
        #[arg(long, default_value_t = 4)]
        max_parallel_calls: usize,
    },

    /// Diagnose the local environment: adapter binaries, runtime, platform
    Doctor {
        /// Treat warnings (e.g. a missing adapter binary) as failures
        #[arg(long)]
        strict: bool,

        #[arg(long)]
        json: bool,
    },
}
