//! # claimguard-core
//!
//! Deterministic claim/evidence audit engine for agent output.
//!
//! This crate inspects a structured agent record (a set of findings, each
//! with a confidence, optional evidence, and optional metadata) and answers:
//! - Is each claim's confidence backed by evidence?
//! - Did the agent consider alternatives before concluding?
//! - Is its hedging justified?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same record and config always produce the same score
//! 2. **No LLM calls**: All checks are rule-based
//! 3. **No network**: URLs and artifacts are never fetched
//! 4. **Isolated**: Each call resolves its own configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimguard_core::{AgentRecord, AuditContext, ClaimAuditor, EvidencePointer, Finding};
//!
//! let auditor = ClaimAuditor::from_file("audit.yaml")?;
//! let mut record = AgentRecord::new("SecurityAgent")
//!     .with_type("SECURITY")
//!     .with_finding(
//!         Finding::new("f1", "Login form is injectable")
//!             .with_confidence(0.9)
//!             .with_evidence(EvidencePointer::file(".", "src/login.rs").at_lines(40, 52)),
//!     );
//!
//! match auditor.audit(&mut record, &AuditContext::default()) {
//!     Ok(result) => println!("{}: {}", result.action, result.audit_score),
//!     Err(AuditError::Blocked { result, .. }) => println!("BLOCKED: {:?}", result.issues),
//!     Err(e) => return Err(e.into()),
//! }
//! ```

pub mod auditor;
pub mod checks;
pub mod complexity;
pub mod config;
pub mod degrade;
pub mod evidence;
pub mod hypothesis;
pub mod interval;
pub mod metadata;
pub mod types;

// Re-export main types at crate root
pub use auditor::{parse_kill_switch, AuditError, ClaimAuditor, BLOCKED_ERROR_NAME, KILL_SWITCH_ENV};
pub use checks::{AuditCheck, AuditRequest, CheckOutcome, CheckReport, PatternTable};
pub use complexity::{
    infer_complexity, infer_complexity_with_source, meets_complexity_threshold, AgentIdentity,
    ComplexityLevel, ComplexitySource,
};
pub use config::{resolve_action, ActionDecision, AuditAction, AuditConfig, ConfigError, FailurePolicy};
pub use degrade::{apply_degrade_policy, AgentOutput, DegradeStamp};
pub use evidence::{
    evidence_score, has_conflicting_evidence, score_evidence, validate_for_confidence,
    ConfidenceValidation, EvidenceLocation, EvidencePointer, EvidenceType, VerificationMethod,
};
pub use hypothesis::{
    HypothesisArtifact, HypothesisInput, HypothesisStatus, HypothesisTracker, ReasoningSummary,
    RejectedHypothesis, RejectionCode, RejectionReason, TrackerError,
};
pub use interval::{confidence_interval, ConfidenceInterval, IntervalMethod};
pub use metadata::{enforce_metadata_limits, enforce_with_report, EnforcementReport, MetadataLimits};
pub use types::{
    AgentRecord, AuditContext, AuditIssue, AuditResult, AuditReward, CalibrationBasis, CheckKind,
    Finding, FindingMetadata, IssueKind, NextStep, RewardKind, Severity, SkippedCheck,
};

/// Audit a record with the default configuration.
///
/// This is the shortest entry point. Callers with their own configuration
/// build a [`ClaimAuditor`] once and reuse it.
pub fn audit(record: &mut AgentRecord, context: &AuditContext) -> Result<AuditResult, AuditError> {
    ClaimAuditor::default().audit(record, context)
}

/// Round to a fixed number of decimals.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_audit_from_json_record() {
        let mut record: AgentRecord = serde_json::from_value(json!({
            "name": "FactCheckAgent",
            "type": "VALIDATION",
            "findings": [{
                "id": "f1",
                "description": "The API returns 404 for unknown ids",
                "confidence": 0.8,
                "severity": "low",
                "evidence": [
                    { "type": "test_result", "reference": "api::unknown_id_404", "verified": true },
                    { "type": "inline", "reference": "HTTP/1.1 404 Not Found", "verified": true }
                ]
            }]
        }))
        .unwrap();

        let result = audit(&mut record, &AuditContext::default()).unwrap();
        assert!(result.passed);
        assert_eq!(result.action, AuditAction::Continue);
    }

    #[test]
    fn test_tunnel_vision_from_json_record() {
        let mut record: AgentRecord = serde_json::from_value(json!({
            "name": "ArchitectAgent",
            "type": "ARCHITECT",
            "findings": [{ "id": "f1", "description": "Split the service", "confidence": 0.6 }]
        }))
        .unwrap();

        let result = audit(&mut record, &AuditContext::default()).unwrap();
        assert!(result.has_issue(IssueKind::TunnelVision));
        assert_eq!(result.audit_score, 80.0);
        assert!(result.passed);
    }

    #[test]
    fn test_serialized_bypass_suppresses_tunnel_vision() {
        let mut record: AgentRecord = serde_json::from_value(json!({
            "name": "ArchitectAgent",
            "type": "ARCHITECT",
            "_rejectedHypotheses": [{
                "id": "N/A",
                "alternative_id": "N/A",
                "rejection_reason": { "code": "NA_DETERMINISTIC", "description": "Single answer" },
                "confidence_at_rejection": 1.0
            }]
        }))
        .unwrap();

        let result = audit(&mut record, &AuditContext::default()).unwrap();
        assert!(!result.has_issue(IssueKind::TunnelVision));
        assert_eq!(result.checks_run.len(), 3);
    }

    #[test]
    fn test_malformed_record_still_audited() {
        let mut record: AgentRecord = serde_json::from_value(json!({
            "name": "FactCheckAgent",
            "type": "VALIDATION",
            "findings": [{
                "id": "f1",
                "description": "The cache is stale",
                "confidence": "high",
                "evidence": [{ "reference": "cache.log" }]
            }]
        }))
        .unwrap();

        let result = audit(&mut record, &AuditContext::default()).unwrap();
        assert!(result.checks_run.contains(&CheckKind::ClaimEvidence));
        assert!(!result.has_issue(IssueKind::HighConfidenceWithoutEvidence));
    }

    #[test]
    fn test_result_serializes_wire_names() {
        let mut record = AgentRecord::new("SecurityAgent")
            .with_type("SECURITY")
            .with_finding(Finding::new("f1", "Definitely vulnerable").with_confidence(0.95));
        let result = audit(&mut record, &AuditContext::default()).unwrap();
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["action"], json!("CONTINUE_WITH_WARNING"));
        assert_eq!(value["checks_run"][0], json!("claimEvidence"));
        assert_eq!(value["issues"][0]["type"], json!("high_confidence_without_evidence"));
        assert_eq!(value["complexity"], json!("HIGH"));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.1 + 0.2, 3), 0.3);
        assert_eq!(round_to(0.85555, 4), 0.8556);
    }
}
