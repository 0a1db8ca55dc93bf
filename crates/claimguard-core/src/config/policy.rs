//! Failure-policy resolution.
//!
//! What happens to an output that failed its audit is a pure function of
//! `(failurePolicy, passed, retryCount)`. Retries back off along a fixed
//! exponential table and escalate once the retry budget runs low.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::AuditConfig;

/// Backoff delays indexed by retry count.
pub const BACKOFF_TABLE_MS: [u64; 3] = [1000, 2000, 4000];

/// Delay for a plain retry past the end of the table.
pub const RETRY_FALLBACK_MS: u64 = 1000;

/// Delay for an escalating retry past the end of the table.
pub const ESCALATION_FALLBACK_MS: u64 = 4000;

/// Response to a failed audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Warn,
    Block,
    Retry,
    Degrade,
    /// Any other value; treated as `warn`
    #[serde(other)]
    Unknown,
}

/// The action the caller should take with the audited output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Continue,
    ContinueWithWarning,
    BlockOutput,
    Retry,
    RetryWithEscalation,
    Escalate,
    DegradeConfidence,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Continue => "CONTINUE",
            AuditAction::ContinueWithWarning => "CONTINUE_WITH_WARNING",
            AuditAction::BlockOutput => "BLOCK_OUTPUT",
            AuditAction::Retry => "RETRY",
            AuditAction::RetryWithEscalation => "RETRY_WITH_ESCALATION",
            AuditAction::Escalate => "ESCALATE",
            AuditAction::DegradeConfidence => "DEGRADE_CONFIDENCE",
        }
    }

    /// True when the output may be emitted (possibly with a warning).
    pub fn allows_output(self) -> bool {
        matches!(self, AuditAction::Continue | AuditAction::ContinueWithWarning)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved action plus the recommended retry delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDecision {
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,
}

impl ActionDecision {
    fn immediate(action: AuditAction) -> Self {
        Self {
            action,
            backoff_ms: None,
        }
    }
}

/// Resolve the action for an audit outcome.
pub fn resolve_action(config: &AuditConfig, passed: bool, retry_count: u32) -> ActionDecision {
    if passed {
        return ActionDecision::immediate(AuditAction::Continue);
    }

    match config.failure_policy {
        FailurePolicy::Warn | FailurePolicy::Unknown => {
            ActionDecision::immediate(AuditAction::ContinueWithWarning)
        }
        FailurePolicy::Block => ActionDecision::immediate(AuditAction::BlockOutput),
        FailurePolicy::Degrade => ActionDecision::immediate(AuditAction::DegradeConfidence),
        FailurePolicy::Retry => {
            let retry = &config.retry;
            if retry_count >= retry.max_retries {
                ActionDecision::immediate(AuditAction::Escalate)
            } else if retry_count >= retry.escalate_after_retries {
                ActionDecision {
                    action: AuditAction::RetryWithEscalation,
                    backoff_ms: Some(backoff_ms(retry_count, ESCALATION_FALLBACK_MS)),
                }
            } else {
                ActionDecision {
                    action: AuditAction::Retry,
                    backoff_ms: Some(backoff_ms(retry_count, RETRY_FALLBACK_MS)),
                }
            }
        }
    }
}

fn backoff_ms(retry_count: u32, fallback: u64) -> u64 {
    BACKOFF_TABLE_MS
        .get(retry_count as usize)
        .copied()
        .unwrap_or(fallback)
}
