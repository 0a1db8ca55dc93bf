//! Claim/Evidence check
//!
//! **Question**: Is each claim's confidence backed by evidence?
//!
//! Penalizes high-confidence claims with weak evidence and certainty
//! language without support; rewards strongly evidenced claims. A finding
//! whose text matches any exclusion pattern is never flagged for certainty
//! language.

use crate::evidence::{evidence_score, validate_for_confidence};
use crate::types::{AuditIssue, AuditReward, CheckKind};

use super::{AuditCheck, AuditRequest, CheckOutcome, CheckReport};

pub struct ClaimEvidenceCheck;

impl ClaimEvidenceCheck {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClaimEvidenceCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditCheck for ClaimEvidenceCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::ClaimEvidence
    }

    fn run(&self, request: &AuditRequest<'_>) -> CheckOutcome {
        let config = request.config;
        let settings = &config.checks.claim_evidence;
        if !settings.enabled {
            return CheckOutcome::skipped("disabled");
        }

        let scoring = &config.scoring;
        let mut report = CheckReport::default();

        for finding in &request.record.findings {
            let validation = validate_for_confidence(
                finding,
                config.thresholds.high_confidence_threshold,
                settings.min_evidence_score,
            );
            if !validation.valid {
                report.issues.push(AuditIssue::HighConfidenceWithoutEvidence {
                    finding_id: finding.id.clone(),
                    confidence: validation.confidence,
                    evidence_score: validation.evidence_score,
                    required_score: validation.required_score,
                    gap: validation.gap,
                    penalty: scoring.high_confidence_without_evidence_penalty,
                });
            }

            let score = evidence_score(finding);

            if settings.penalize_unsupported_certainty && score < settings.min_evidence_score {
                let text = finding.claim_text();
                let phrases = if request.patterns.is_excluded(&text) {
                    Vec::new()
                } else {
                    request.patterns.certainty_matches(&text)
                };
                if !phrases.is_empty() {
                    report.issues.push(AuditIssue::UnsupportedCertainty {
                        finding_id: finding.id.clone(),
                        phrases,
                        evidence_score: score,
                        penalty: scoring.unsupported_certainty_penalty,
                    });
                }
            }

            if score >= settings.strong_evidence_threshold {
                report.rewards.push(AuditReward::StrongEvidence {
                    finding_id: finding.id.clone(),
                    evidence_score: score,
                    bonus: scoring.strong_evidence_bonus,
                });
            }
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
    use crate::types::{AgentRecord, AuditContext, Finding, IssueKind, RewardKind};

    fn run(record: &AgentRecord, config: &AuditConfig) -> CheckReport {
        completed(run_check(
            &ClaimEvidenceCheck::new(),
            record,
            &AuditContext::default(),
            config,
        ))
    }

    fn issue_kinds(report: &CheckReport) -> Vec<IssueKind> {
        report.issues.iter().map(AuditIssue::kind).collect()
    }

    #[test]
    fn test_high_confidence_without_evidence() {
        let record = AgentRecord::new("SecurityAgent")
            .with_finding(Finding::new("f1", "SQL injection in login").with_confidence(0.95));
        let report = run(&record, &AuditConfig::default());

        assert_eq!(issue_kinds(&report), vec![IssueKind::HighConfidenceWithoutEvidence]);
        match &report.issues[0] {
            AuditIssue::HighConfidenceWithoutEvidence { gap, penalty, .. } => {
                assert_eq!(*gap, 0.5);
                assert_eq!(*penalty, -20.0);
            }
            other => panic!("unexpected issue {:?}", other),
        }
    }

    #[test]
    fn test_moderate_confidence_not_penalized() {
        let record = AgentRecord::new("A")
            .with_finding(Finding::new("f1", "Possible race").with_confidence(0.6));
        assert!(run(&record, &AuditConfig::default()).issues.is_empty());
    }

    #[test]
    fn test_unsupported_certainty_lists_phrases() {
        let record = AgentRecord::new("A").with_finding(
            Finding::new("f1", "This is definitely the root cause")
                .with_confidence(0.7)
                .with_recommendation("Obviously revert the change"),
        );
        let report = run(&record, &AuditConfig::default());

        assert_eq!(issue_kinds(&report), vec![IssueKind::UnsupportedCertainty]);
        match &report.issues[0] {
            AuditIssue::UnsupportedCertainty { phrases, penalty, .. } => {
                assert_eq!(phrases, &vec!["definitely".to_string(), "obviously".to_string()]);
                assert_eq!(*penalty, -15.0);
            }
            other => panic!("unexpected issue {:?}", other),
        }
    }

    #[test]
    fn test_certainty_with_evidence_allowed() {
        let record = AgentRecord::new("A").with_finding(
            Finding::new("f1", "Definitely failing")
                .with_confidence(0.7)
                .with_evidence(EvidencePointer::test_result("auth::login_rejects_bad_password"))
                .with_evidence(EvidencePointer::inline("assertion failed: status == 401")),
        );
        let report = run(&record, &AuditConfig::default());
        assert!(!report.issues.iter().any(|i| i.kind() == IssueKind::UnsupportedCertainty));
    }

    #[test]
    fn test_negated_certainty_ignored() {
        let record = AgentRecord::new("A").with_finding(
            Finding::new("f1", "The cache is not definitely involved").with_confidence(0.6),
        );
        assert!(run(&record, &AuditConfig::default()).issues.is_empty());
    }

    #[test]
    fn test_exclusion_anywhere_skips_certainty_flag() {
        let record = AgentRecord::new("A").with_finding(
            Finding::new("f1", "It may not be related, but this is definitely broken")
                .with_confidence(0.6),
        );
        let report = run(&record, &AuditConfig::default());
        assert!(!issue_kinds(&report).contains(&IssueKind::UnsupportedCertainty));

        let quoted = AgentRecord::new("A").with_finding(
            Finding::new("f1", r#"The log says "retrying" and clearly loops"#).with_confidence(0.6),
        );
        assert!(run(&quoted, &AuditConfig::default()).issues.is_empty());
    }

    #[test]
    fn test_certainty_penalty_can_be_disabled() {
        let mut config = AuditConfig::default();
        config.checks.claim_evidence.penalize_unsupported_certainty = false;
        let record = AgentRecord::new("A")
            .with_finding(Finding::new("f1", "Clearly broken").with_confidence(0.6));
        assert!(run(&record, &config).issues.is_empty());
    }

    #[test]
    fn test_strong_evidence_rewarded() {
        let record = AgentRecord::new("A").with_finding(
            Finding::new("f1", "Null dereference in parser")
                .with_confidence(0.95)
                .with_evidence(EvidencePointer::test_result("parser::null_input"))
                .with_evidence(EvidencePointer::inline("thread 'main' panicked")),
        );
        let report = run(&record, &AuditConfig::default());

        assert!(report.issues.is_empty());
        assert_eq!(report.rewards.len(), 1);
        assert_eq!(report.rewards[0].kind(), RewardKind::StrongEvidence);
        assert_eq!(report.score_delta(), 5.0);
    }

    #[test]
    fn test_disabled_check_skips() {
        let mut config = AuditConfig::default();
        config.checks.claim_evidence.enabled = false;
        let outcome = run_check(
            &ClaimEvidenceCheck::new(),
            &AgentRecord::new("A"),
            &AuditContext::default(),
            &config,
        );
        assert_eq!(outcome, CheckOutcome::skipped("disabled"));
    }
}
