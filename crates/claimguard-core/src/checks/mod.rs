//! The audit checks.
//!
//! Each check answers one question about an agent record:
//!
//! - **claimEvidence**: is confidence backed by evidence?
//! - **tunnelVision**: were alternatives considered and rejected?
//! - **calibratedUncertainty**: is hedging justified by what the agent knows?
//!
//! Checks are independent and never fail; they either report issues and
//! rewards or say why they were skipped.

mod calibrated_uncertainty;
mod claim_evidence;
pub mod patterns;
mod tunnel_vision;

pub use calibrated_uncertainty::CalibratedUncertaintyCheck;
pub use claim_evidence::ClaimEvidenceCheck;
pub use patterns::PatternTable;
pub use tunnel_vision::TunnelVisionCheck;

use crate::complexity::ComplexityLevel;
use crate::config::AuditConfig;
use crate::types::{AgentRecord, AuditContext, AuditIssue, AuditReward, CheckKind};

/// Everything a check sees for one audit call.
#[derive(Debug, Clone, Copy)]
pub struct AuditRequest<'a> {
    pub record: &'a AgentRecord,
    pub context: &'a AuditContext,
    /// The configuration resolved for this record
    pub config: &'a AuditConfig,
    pub patterns: &'a PatternTable,
    pub complexity: ComplexityLevel,
}

/// Issues and rewards from a check that ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub issues: Vec<AuditIssue>,
    pub rewards: Vec<AuditReward>,
}

impl CheckReport {
    pub fn score_delta(&self) -> f64 {
        self.issues.iter().map(AuditIssue::delta).sum::<f64>()
            + self.rewards.iter().map(AuditReward::delta).sum::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Completed(CheckReport),
    Skipped { reason: String },
}

impl CheckOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        CheckOutcome::Skipped {
            reason: reason.into(),
        }
    }
}

/// Trait for audit checks.
pub trait AuditCheck: Send + Sync {
    /// Which check this is.
    fn kind(&self) -> CheckKind;

    /// Inspect the record.
    fn run(&self, request: &AuditRequest<'_>) -> CheckOutcome;
}

/// The three checks, in the order they run.
pub fn default_checks() -> Vec<Box<dyn AuditCheck>> {
    vec![
        Box::new(ClaimEvidenceCheck::new()),
        Box::new(TunnelVisionCheck::new()),
        Box::new(CalibratedUncertaintyCheck::new()),
    ]
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Run one check against a record with the given config and context.
    pub fn run_check(
        check: &dyn AuditCheck,
        record: &AgentRecord,
        context: &AuditContext,
        config: &AuditConfig,
    ) -> CheckOutcome {
        let patterns = PatternTable::from_config(config).unwrap();
        let request = AuditRequest {
            record,
            context,
            config,
            patterns: &patterns,
            complexity: crate::complexity::infer_complexity(record, context),
        };
        check.run(&request)
    }

    pub fn completed(outcome: CheckOutcome) -> CheckReport {
        match outcome {
            CheckOutcome::Completed(report) => report,
            CheckOutcome::Skipped { reason } => panic!("check skipped: {}", reason),
        }
    }
}
