//! The claim/evidence auditor.
//!
//! Runs every check against an agent record, accumulates the score,
//! bounds the record's metadata, and resolves the failure-policy action.
//! Under the `block` policy a failed audit is returned as an error that
//! carries the full result.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::checks::{default_checks, AuditCheck, AuditRequest, CheckOutcome, PatternTable};
use crate::complexity::infer_complexity;
use crate::config::{resolve_action, AuditAction, AuditConfig, ConfigError};
use crate::degrade::{apply_degrade_policy, AgentOutput};
use crate::interval::{confidence_interval, ConfidenceInterval};
use crate::metadata::enforce_with_report;
use crate::types::{AgentRecord, AuditContext, AuditResult, CheckKind, Finding, SkippedCheck};

/// Environment variable that disables every audit in the process.
pub const KILL_SWITCH_ENV: &str = "CLAIMGUARD_AUDIT_DISABLED";

/// Error name reported for blocked output.
pub const BLOCKED_ERROR_NAME: &str = "ClaimEvidenceAuditException";

const DISABLED_REASON: &str = "audit_disabled";

/// Errors returned by [`ClaimAuditor::audit`].
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Claim/evidence audit blocked output from {agent_name}: score {score} below pass score {pass_score}")]
    Blocked {
        agent_name: String,
        score: f64,
        pass_score: f64,
        result: Box<AuditResult>,
    },

    #[error("Invalid audit configuration: {0}")]
    Config(#[from] ConfigError),
}

impl AuditError {
    pub fn name(&self) -> &'static str {
        match self {
            AuditError::Blocked { .. } => BLOCKED_ERROR_NAME,
            AuditError::Config(_) => "ConfigError",
        }
    }

    /// Blocked output may succeed on a retry; a bad config will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuditError::Blocked { .. })
    }

    pub fn agent_name(&self) -> Option<&str> {
        match self {
            AuditError::Blocked { agent_name, .. } => Some(agent_name.as_str()),
            AuditError::Config(_) => None,
        }
    }

    pub fn audit_result(&self) -> Option<&AuditResult> {
        match self {
            AuditError::Blocked { result, .. } => Some(&**result),
            AuditError::Config(_) => None,
        }
    }
}

/// Parse a kill-switch value: `1`, `true`, `yes`, or `on`, any case.
pub fn parse_kill_switch(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn kill_switch_engaged() -> bool {
    std::env::var(KILL_SWITCH_ENV)
        .map(|v| parse_kill_switch(&v))
        .unwrap_or(false)
}

/// A resolved configuration and its compiled phrase table.
#[derive(Debug, Clone)]
struct AuditProfile {
    config: AuditConfig,
    patterns: PatternTable,
}

impl AuditProfile {
    fn compile(config: AuditConfig) -> Result<Self, ConfigError> {
        let patterns = PatternTable::from_config(&config)?;
        Ok(Self { config, patterns })
    }
}

/// Audits agent records against one configuration.
///
/// Per-agent overrides are resolved and compiled when the auditor is
/// built; a caller override in the context is resolved per call. Nothing
/// is shared between calls.
pub struct ClaimAuditor {
    base: AuditProfile,
    agent_profiles: BTreeMap<String, AuditProfile>,
    checks: Vec<Box<dyn AuditCheck>>,
}

impl ClaimAuditor {
    pub fn new(config: AuditConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut agent_profiles = BTreeMap::new();
        for (key, overlay) in &config.agent_overrides {
            let resolved = config.merged_with([overlay])?;
            agent_profiles.insert(key.clone(), AuditProfile::compile(resolved)?);
        }

        Ok(Self {
            base: AuditProfile::compile(config)?,
            agent_profiles,
            checks: default_checks(),
        })
    }

    /// Build an auditor from a YAML or JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::new(AuditConfig::from_file(path)?)
    }

    pub fn config(&self) -> &AuditConfig {
        &self.base.config
    }

    /// Configuration that applies to `record`, before any caller override.
    pub fn config_for(&self, record: &AgentRecord) -> &AuditConfig {
        &self.profile_for(record).config
    }

    fn profile_for(&self, record: &AgentRecord) -> &AuditProfile {
        self.base
            .config
            .override_key(record)
            .and_then(|key| self.agent_profiles.get(key))
            .unwrap_or(&self.base)
    }

    /// Audit one agent record.
    ///
    /// The record's metadata is replaced by its size-bounded form. Under
    /// the `block` policy a failed audit returns [`AuditError::Blocked`].
    pub fn audit(
        &self,
        record: &mut AgentRecord,
        context: &AuditContext,
    ) -> Result<AuditResult, AuditError> {
        self.audit_with_switch(record, context, kill_switch_engaged())
    }

    fn audit_with_switch(
        &self,
        record: &mut AgentRecord,
        context: &AuditContext,
        kill_switch: bool,
    ) -> Result<AuditResult, AuditError> {
        let agent_name = record.display_name().to_string();

        if context.skip_audit || kill_switch {
            let pass_score = self.config_for(record).thresholds.pass_score;
            return Ok(disabled_result(agent_name, pass_score, context.retry_count));
        }

        let agent_profile = self.profile_for(record);
        let call_profile;
        let profile = match context.config_override.as_ref() {
            Some(overlay) => {
                call_profile = AuditProfile::compile(agent_profile.config.merged_with([overlay])?)?;
                &call_profile
            }
            None => agent_profile,
        };
        let config = &profile.config;

        if !config.enabled {
            return Ok(disabled_result(
                agent_name,
                config.thresholds.pass_score,
                context.retry_count,
            ));
        }

        let complexity = infer_complexity(&*record, context);
        let mut result = AuditResult::new(agent_name, config.thresholds.pass_score);
        result.complexity = Some(complexity);
        result.retry_count = context.retry_count;

        let request = AuditRequest {
            record: &*record,
            context,
            config,
            patterns: &profile.patterns,
            complexity,
        };
        for check in &self.checks {
            match check.run(&request) {
                CheckOutcome::Completed(report) => {
                    tracing::debug!(
                        check = %check.kind(),
                        issues = report.issues.len(),
                        rewards = report.rewards.len(),
                        delta = report.score_delta(),
                        "Check completed"
                    );
                    result.audit_score += report.score_delta();
                    result.checks_run.push(check.kind());
                    result.issues.extend(report.issues);
                    result.rewards.extend(report.rewards);
                }
                CheckOutcome::Skipped { reason } => {
                    tracing::debug!(check = %check.kind(), %reason, "Check skipped");
                    result.checks_skipped.push(SkippedCheck {
                        check: check.kind(),
                        reason,
                    });
                }
            }
        }

        if let Some(metadata) = record.metadata.as_ref() {
            let (enforced, report) = enforce_with_report(metadata, &config.metadata_limits);
            result.metadata_size_bytes = Some(report.final_bytes);
            result.metadata_enforced = report.enforced;
            record.metadata = Some(enforced);
        }

        result.passed = result.audit_score >= result.pass_score;
        let decision = resolve_action(config, result.passed, context.retry_count);
        result.action = decision.action;
        result.backoff_ms = decision.backoff_ms;

        log_result(&result);

        if result.action == AuditAction::BlockOutput {
            return Err(AuditError::Blocked {
                agent_name: result.agent_name.clone(),
                score: result.audit_score,
                pass_score: result.pass_score,
                result: Box::new(result),
            });
        }

        Ok(result)
    }

    /// Severity-weighted confidence interval of `findings`.
    pub fn confidence_interval(&self, findings: &[Finding]) -> ConfidenceInterval {
        confidence_interval(findings)
    }

    /// Weaken `output` after a failed audit.
    pub fn apply_degrade_policy(&self, output: &AgentOutput, result: &AuditResult) -> AgentOutput {
        apply_degrade_policy(output, result)
    }
}

impl Default for ClaimAuditor {
    fn default() -> Self {
        Self {
            base: AuditProfile {
                config: AuditConfig::default(),
                patterns: PatternTable::default(),
            },
            agent_profiles: BTreeMap::new(),
            checks: default_checks(),
        }
    }
}

fn disabled_result(agent_name: String, pass_score: f64, retry_count: u32) -> AuditResult {
    let mut result = AuditResult::new(agent_name, pass_score);
    result.retry_count = retry_count;
    result.checks_skipped = CheckKind::ALL
        .iter()
        .map(|check| SkippedCheck {
            check: *check,
            reason: DISABLED_REASON.to_string(),
        })
        .collect();

    tracing::debug!(agent = %result.agent_name, "Audit disabled");
    result
}

fn log_result(result: &AuditResult) {
    let issues: Vec<&str> = result.issues.iter().map(|i| i.kind().as_str()).collect();

    if result.passed {
        tracing::info!(
            agent = %result.agent_name,
            score = result.audit_score,
            pass_score = result.pass_score,
            action = %result.action,
            rewards = result.rewards.len(),
            "Claim/evidence audit passed"
        );
    } else {
        tracing::warn!(
            agent = %result.agent_name,
            score = result.audit_score,
            pass_score = result.pass_score,
            action = %result.action,
            issues = ?issues,
            retry_count = result.retry_count,
            "Claim/evidence audit failed"
        );
    }
}
