//! Calibrated-uncertainty check
//!
//! **Question**: When the agent hedges, does it say why?
//!
//! A hedged finding is calibrated when its metadata explains the
//! uncertainty: evidence is reported missing and the score agrees, evidence
//! is reported conflicting and the pointers agree, or a concrete next step
//! to resolve it is given.

use crate::evidence::{evidence_score, has_conflicting_evidence};
use crate::types::{AuditIssue, AuditReward, CalibrationBasis, CheckKind, Finding};

use super::{AuditCheck, AuditRequest, CheckOutcome, CheckReport};

pub struct CalibratedUncertaintyCheck;

impl CalibratedUncertaintyCheck {
    pub fn new() -> Self {
        Self
    }

    fn calibration_basis(finding: &Finding, missing_evidence_threshold: f64) -> Vec<CalibrationBasis> {
        let metadata = &finding.metadata;
        let mut basis = Vec::new();

        if metadata.missing_evidence == Some(true)
            && evidence_score(finding) < missing_evidence_threshold
        {
            basis.push(CalibrationBasis::MissingEvidence);
        }

        if metadata.conflicting_evidence == Some(true) && has_conflicting_evidence(&finding.evidence) {
            basis.push(CalibrationBasis::ConflictingEvidence);
        }

        if metadata
            .next_step_to_resolve
            .as_ref()
            .is_some_and(|step| step.is_actionable())
        {
            basis.push(CalibrationBasis::NextStepToResolve);
        }

        basis
    }
}

impl Default for CalibratedUncertaintyCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditCheck for CalibratedUncertaintyCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::CalibratedUncertainty
    }

    fn run(&self, request: &AuditRequest<'_>) -> CheckOutcome {
        let settings = &request.config.checks.calibrated_uncertainty;
        if !settings.enabled {
            return CheckOutcome::skipped("disabled");
        }

        let scoring = &request.config.scoring;
        let mut report = CheckReport::default();
        let mut hedged = 0usize;
        let mut calibrated = 0usize;

        for finding in &request.record.findings {
            let hedges = request.patterns.hedge_matches(&finding.claim_text());
            if hedges.is_empty() {
                continue;
            }
            hedged += 1;

            let basis = Self::calibration_basis(finding, settings.missing_evidence_threshold);
            if basis.is_empty() {
                continue;
            }
            calibrated += 1;
            report.rewards.push(AuditReward::CalibratedUncertainty {
                finding_id: finding.id.clone(),
                hedges,
                basis,
                bonus: scoring.calibrated_uncertainty_bonus,
            });
        }

        let uncalibrated = hedged - calibrated;
        if uncalibrated > settings.max_uncalibrated_hedges {
            report.issues.push(AuditIssue::ExcessiveHedging {
                hedged,
                calibrated,
                uncalibrated,
                max_allowed: settings.max_uncalibrated_hedges,
                penalty: scoring.excessive_hedging_penalty,
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
    use crate::evidence::EvidencePointer;
    use crate::types::{AgentRecord, AuditContext, FindingMetadata, IssueKind, NextStep};
    use serde_json::json;

    fn run(record: &AgentRecord) -> CheckReport {
        completed(run_check(
            &CalibratedUncertaintyCheck::new(),
            record,
            &AuditContext::default(),
            &AuditConfig::default(),
        ))
    }

    fn hedged(id: &str) -> Finding {
        Finding::new(id, "This might be a memory leak").with_confidence(0.5)
    }

    #[test]
    fn test_missing_evidence_calibrates() {
        let mut finding = hedged("f1");
        finding.metadata.missing_evidence = Some(true);
        let report = run(&AgentRecord::new("A").with_finding(finding));

        assert!(report.issues.is_empty());
        match &report.rewards[0] {
            AuditReward::CalibratedUncertainty { basis, hedges, bonus, .. } => {
                assert_eq!(basis, &vec![CalibrationBasis::MissingEvidence]);
                assert_eq!(hedges, &vec!["might".to_string()]);
                assert_eq!(*bonus, 5.0);
            }
            other => panic!("unexpected reward {:?}", other),
        }
    }

    #[test]
    fn test_missing_evidence_claim_contradicted_by_score() {
        // Strong evidence present, so "missing evidence" does not hold
        let mut finding = hedged("f1")
            .with_evidence(EvidencePointer::test_result("leak::grows"))
            .with_evidence(EvidencePointer::inline("rss: 2GB"));
        finding.metadata.missing_evidence = Some(true);
        let report = run(&AgentRecord::new("A").with_finding(finding));
        assert!(report.rewards.is_empty());
    }

    #[test]
    fn test_conflicting_evidence_calibrates_when_evidence_conflicts() {
        let mut finding = hedged("f1")
            .with_evidence(EvidencePointer::citation("vendor-advisory"))
            .with_evidence(EvidencePointer::citation("conflicting-report"));
        finding.metadata.conflicting_evidence = Some(true);
        let report = run(&AgentRecord::new("A").with_finding(finding));

        match &report.rewards[0] {
            AuditReward::CalibratedUncertainty { basis, .. } => {
                assert!(basis.contains(&CalibrationBasis::ConflictingEvidence));
            }
            other => panic!("unexpected reward {:?}", other),
        }
    }

    #[test]
    fn test_structured_next_step_calibrates() {
        let mut finding = hedged("f1");
        finding.metadata = serde_json::from_value::<FindingMetadata>(json!({
            "nextStepToResolve": {
                "action": "run_profiler",
                "tool": "Chrome DevTools",
                "expected_result": "Memory allocation timeline"
            }
        }))
        .unwrap();
        let report = run(&AgentRecord::new("A").with_finding(finding));
        assert_eq!(report.rewards.len(), 1);
    }

    #[test]
    fn test_free_text_next_step_does_not_calibrate() {
        let mut finding = hedged("f1");
        finding.metadata.next_step_to_resolve = Some(NextStep::Note("Investigate later".to_string()));
        let report = run(&AgentRecord::new("A").with_finding(finding));
        assert!(report.rewards.is_empty());
    }

    #[test]
    fn test_excessive_hedging_single_issue() {
        let mut record = AgentRecord::new("A");
        for i in 0..5 {
            record = record.with_finding(hedged(&format!("f{}", i)));
        }
        let report = run(&record);

        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind(), IssueKind::ExcessiveHedging);
        match &report.issues[0] {
            AuditIssue::ExcessiveHedging {
                hedged,
                uncalibrated,
                max_allowed,
                ..
            } => {
                assert_eq!(*hedged, 5);
                assert_eq!(*uncalibrated, 5);
                assert_eq!(*max_allowed, 2);
            }
            other => panic!("unexpected issue {:?}", other),
        }
    }

    #[test]
    fn test_hedging_within_limit() {
        let record = AgentRecord::new("A")
            .with_finding(hedged("f1"))
            .with_finding(hedged("f2"));
        let report = run(&record);
        assert!(report.issues.is_empty());
        assert!(report.rewards.is_empty());
    }
}
