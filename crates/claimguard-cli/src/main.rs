//! Claimguard CLI
//!
//! The `claimguard` command audits agent output records stored as JSON.
//!
//! ## Commands
//!
//! - `audit`: Score a record and print the result and policy action
//! - `interval`: Print the severity-weighted confidence interval
//! - `degrade`: Audit, then print the weakened output
//! - `check-config`: Validate an audit configuration file

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use claimguard_core::{
    AgentOutput, AgentRecord, AuditAction, AuditConfig, AuditContext, AuditError, AuditResult,
    ClaimAuditor, ConfidenceInterval,
};

/// Exit status when the block policy fires.
const EXIT_BLOCKED: u8 = 2;

#[derive(Parser)]
#[command(name = "claimguard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic claim/evidence audits for agent output", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit one agent record
    Audit {
        /// Path to the agent record (JSON)
        record: PathBuf,

        /// Audit configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Audit context (JSON); flags below override its fields
        #[arg(long)]
        context: Option<PathBuf>,

        /// Complexity level hint (LOW, MEDIUM, HIGH, CRITICAL)
        #[arg(long)]
        complexity: Option<String>,

        /// Task type, used for tunnel-vision exemptions
        #[arg(long)]
        task_type: Option<String>,

        /// Number of retries already spent on this output
        #[arg(long)]
        retry_count: Option<u32>,

        /// Skip the audit and report it as disabled
        #[arg(long)]
        skip: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Print the confidence interval of a record's findings
    Interval {
        /// Path to the agent record (JSON)
        record: PathBuf,
    },

    /// Audit a record and print its degraded output
    Degrade {
        /// Path to the agent record (JSON)
        record: PathBuf,

        /// Audit configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate an audit configuration file
    CheckConfig {
        /// Configuration file (.yaml, .yml or .json)
        file: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { Level::DEBUG } else { Level::WARN });

    match cli.command {
        Commands::Audit {
            record,
            config,
            context,
            complexity,
            task_type,
            retry_count,
            skip,
            format,
        } => {
            let overrides = ContextFlags {
                complexity,
                task_type,
                retry_count,
                skip,
            };
            cmd_audit(&record, config.as_deref(), context.as_deref(), overrides, format)
        }
        Commands::Interval { record } => cmd_interval(&record),
        Commands::Degrade { record, config } => cmd_degrade(&record, config.as_deref()),
        Commands::CheckConfig { file } => cmd_check_config(&file),
    }
}

/// Log to stderr so stdout stays machine-readable.
fn init_tracing(level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

/// Context fields given on the command line.
#[derive(Default)]
struct ContextFlags {
    complexity: Option<String>,
    task_type: Option<String>,
    retry_count: Option<u32>,
    skip: bool,
}

impl ContextFlags {
    fn apply(self, mut context: AuditContext) -> AuditContext {
        if let Some(complexity) = self.complexity {
            context.complexity = Some(complexity);
        }
        if let Some(task_type) = self.task_type {
            context.task_type = Some(task_type);
        }
        if let Some(retry_count) = self.retry_count {
            context.retry_count = retry_count;
        }
        context.skip_audit |= self.skip;
        context
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} {}", what, path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {} {}", what, path.display()))
}

fn load_auditor(config: Option<&Path>) -> Result<ClaimAuditor> {
    match config {
        Some(path) => ClaimAuditor::from_file(path)
            .with_context(|| format!("Failed to load audit config {}", path.display())),
        None => Ok(ClaimAuditor::default()),
    }
}

/// Run an audit, turning a block into an ordinary result.
fn run_audit(
    auditor: &ClaimAuditor,
    record: &mut AgentRecord,
    context: &AuditContext,
) -> Result<AuditResult> {
    match auditor.audit(record, context) {
        Ok(result) => Ok(result),
        Err(AuditError::Blocked { result, .. }) => Ok(*result),
        Err(e) => Err(e).context("Audit failed"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_audit(
    record_path: &Path,
    config: Option<&Path>,
    context_path: Option<&Path>,
    flags: ContextFlags,
    format: OutputFormat,
) -> Result<ExitCode> {
    let auditor = load_auditor(config)?;
    let mut record: AgentRecord = read_json(record_path, "agent record")?;
    let context = match context_path {
        Some(path) => read_json(path, "audit context")?,
        None => AuditContext::default(),
    };
    let context = flags.apply(context);

    let result = run_audit(&auditor, &mut record, &context)?;
    debug!(agent = %result.agent_name, action = %result.action, "Audit finished");

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => print!("{}", render_text(&result)),
    }

    if result.action == AuditAction::BlockOutput {
        Ok(ExitCode::from(EXIT_BLOCKED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn cmd_interval(record_path: &Path) -> Result<ExitCode> {
    let record: AgentRecord = read_json(record_path, "agent record")?;
    let interval: ConfidenceInterval = claimguard_core::confidence_interval(&record.findings);
    print_json(&interval)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_degrade(record_path: &Path, config: Option<&Path>) -> Result<ExitCode> {
    let auditor = load_auditor(config)?;
    let mut record: AgentRecord = read_json(record_path, "agent record")?;
    let output: AgentOutput = read_json(record_path, "agent output")?;

    let result = run_audit(&auditor, &mut record, &AuditContext::default())?;
    if result.passed {
        debug!(agent = %result.agent_name, "Audit passed, output unchanged");
        print_json(&output)?;
    } else {
        print_json(&auditor.apply_degrade_policy(&output, &result))?;
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_check_config(path: &Path) -> Result<ExitCode> {
    let config = AuditConfig::from_file(path)
        .with_context(|| format!("Invalid audit config {}", path.display()))?;
    println!(
        "{}: ok (policy {:?}, pass score {})",
        path.display(),
        config.failure_policy,
        config.thresholds.pass_score
    );
    Ok(ExitCode::SUCCESS)
}

fn render_text(result: &AuditResult) -> String {
    let mut out = format!(
        "{} {}: score {} / pass {} -> {}\n",
        if result.passed { "PASS" } else { "FAIL" },
        result.agent_name,
        result.audit_score,
        result.pass_score,
        result.action
    );
    if let Some(complexity) = result.complexity {
        out.push_str(&format!("  complexity: {}\n", complexity));
    }
    if let Some(backoff) = result.backoff_ms {
        out.push_str(&format!("  backoff: {}ms\n", backoff));
    }
    for issue in &result.issues {
        out.push_str(&format!("  issue  {:<34} {:+}\n", issue.kind().as_str(), issue.delta()));
    }
    for reward in &result.rewards {
        out.push_str(&format!("  reward {:<34} {:+}\n", reward.kind().as_str(), reward.delta()));
    }
    for skipped in &result.checks_skipped {
        out.push_str(&format!("  skipped {} ({})\n", skipped.check, skipped.reason));
    }
    out
}
