//! Tunnel-vision check
//!
//! **Question**: Did the agent consider and reject at least one alternative?
//!
//! Only applies to work at or above the configured complexity. A
//! deterministic bypass (a task with a single correct answer) satisfies it.

use crate::types::{AuditIssue, CheckKind};

use super::{AuditCheck, AuditRequest, CheckOutcome, CheckReport};

pub struct TunnelVisionCheck;

impl TunnelVisionCheck {
    pub fn new() -> Self {
        Self
    }

    /// Why the check does not apply to this request, if it does not.
    fn gate(&self, request: &AuditRequest<'_>) -> Option<String> {
        let settings = &request.config.checks.tunnel_vision;
        if !settings.enabled {
            return Some("disabled".to_string());
        }

        if let Some(task_type) = request.context.task_type.as_deref() {
            let exempt = settings
                .exempt_task_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(task_type.trim()));
            if exempt {
                return Some(format!("exempt_task_type:{}", task_type));
            }
        }

        if !request.complexity.meets(settings.min_complexity) {
            return Some(format!(
                "below_complexity_threshold:{}<{}",
                request.complexity, settings.min_complexity
            ));
        }

        None
    }
}

impl Default for TunnelVisionCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditCheck for TunnelVisionCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::TunnelVision
    }

    fn run(&self, request: &AuditRequest<'_>) -> CheckOutcome {
        if let Some(reason) = self.gate(request) {
            return CheckOutcome::skipped(reason);
        }

        let settings = &request.config.checks.tunnel_vision;
        let record = request.record;
        let rejected = record.rejected_hypotheses();

        let bypassed = rejected.iter().any(|r| r.is_bypass())
            || record.metadata_flag(&settings.bypass_metadata_key);

        let mut report = CheckReport::default();
        if !bypassed && rejected.len() < settings.min_rejected_alternatives {
            report.issues.push(AuditIssue::TunnelVision {
                complexity: request.complexity,
                rejected_count: rejected.len(),
                required: settings.min_rejected_alternatives,
                shortfall: settings.min_rejected_alternatives - rejected.len(),
                penalty: request.config.scoring.tunnel_vision_penalty,
            });
        }

        CheckOutcome::Completed(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{completed, run_check};
    use crate::config::AuditConfig;
    use crate::hypothesis::RejectionCode;
    use crate::types::{AgentRecord, AuditContext, IssueKind};
    use serde_json::{json, Map};

    fn run(record: &AgentRecord, context: &AuditContext) -> CheckOutcome {
        run_check(&TunnelVisionCheck::new(), record, context, &AuditConfig::default())
    }

    #[test]
    fn test_no_alternatives_flagged() {
        let record = AgentRecord::new("ArchitectAgent").with_type("ARCHITECT");
        let report = completed(run(&record, &AuditContext::default()));

        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind(), IssueKind::TunnelVision);
        match &report.issues[0] {
            AuditIssue::TunnelVision {
                rejected_count,
                shortfall,
                penalty,
                ..
            } => {
                assert_eq!(*rejected_count, 0);
                assert_eq!(*shortfall, 1);
                assert_eq!(*penalty, -20.0);
            }
            other => panic!("unexpected issue {:?}", other),
        }
    }

    #[test]
    fn test_rejected_alternative_satisfies() {
        let mut record = AgentRecord::new("ArchitectAgent").with_type("ARCHITECT");
        let tracker = record.attach_tracker();
        tracker.consider(Some("h1"), "Use a message queue");
        tracker
            .reject("h1", "Adds operational burden", vec![], RejectionCode::ConstraintViolation)
            .unwrap();

        let report = completed(run(&record, &AuditContext::default()));
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_deterministic_bypass_suppresses() {
        let mut record = AgentRecord::new("AnalysisAgent").with_type("ANALYSIS");
        record.attach_tracker().add_deterministic_bypass("Single factual answer");

        let report = completed(run(&record, &AuditContext::default()));
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_metadata_flag_bypass() {
        let mut metadata = Map::new();
        metadata.insert("deterministic_bypass".to_string(), json!(true));
        let record = AgentRecord::new("DesignAgent")
            .with_type("DESIGN")
            .with_metadata(metadata);

        let report = completed(run(&record, &AuditContext::default()));
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_exempt_task_type_skips() {
        let record = AgentRecord::new("SecurityAgent").with_type("SECURITY");
        let context = AuditContext::new().with_task_type("lookup");
        match run(&record, &context) {
            CheckOutcome::Skipped { reason } => {
                assert!(reason.contains("exempt_task_type"));
                assert_eq!(reason, "exempt_task_type:lookup");
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_low_complexity_skips() {
        let record = AgentRecord::new("DocMonAgent").with_type("DOCMON");
        assert_eq!(
            run(&record, &AuditContext::default()),
            CheckOutcome::skipped("below_complexity_threshold:LOW<MEDIUM")
        );
    }

    #[test]
    fn test_exemption_checked_before_complexity() {
        // "lookup" is also LOW complexity; the exemption is reported
        let record = AgentRecord::new("A");
        let context = AuditContext::new().with_task_type("lookup");
        assert_eq!(
            run(&record, &context),
            CheckOutcome::skipped("exempt_task_type:lookup")
        );
    }

    #[test]
    fn test_disabled_check_skips_before_other_gates() {
        let mut config = AuditConfig::default();
        config.checks.tunnel_vision.enabled = false;
        let record = AgentRecord::new("ArchitectAgent").with_type("ARCHITECT");

        let outcome = run_check(&TunnelVisionCheck::new(), &record, &AuditContext::default(), &config);
        assert_eq!(outcome, CheckOutcome::skipped("disabled"));

        // Also wins over an exempt task type
        let context = AuditContext::new().with_task_type("lookup");
        let outcome = run_check(&TunnelVisionCheck::new(), &record, &context, &config);
        assert_eq!(outcome, CheckOutcome::skipped("disabled"));
    }

    #[test]
    fn test_required_count_configurable() {
        let mut config = AuditConfig::default();
        config.checks.tunnel_vision.min_rejected_alternatives = 2;

        let mut record = AgentRecord::new("RiskAgent").with_type("RISK");
        let tracker = record.attach_tracker();
        tracker.consider(Some("h1"), "Accept the risk");
        tracker
            .reject("h1", "Exposure too high", vec![], RejectionCode::LowConfidence)
            .unwrap();

        let outcome = run_check(&TunnelVisionCheck::new(), &record, &AuditContext::default(), &config);
        let report = completed(outcome);
        match &report.issues[0] {
            AuditIssue::TunnelVision { shortfall, required, .. } => {
                assert_eq!(*required, 2);
                assert_eq!(*shortfall, 1);
            }
            other => panic!("unexpected issue {:?}", other),
        }
    }
}
