//! Core types shared across the audit engine.
//!
//! Agent records, findings, and contexts arrive from an upstream
//! orchestration layer as JSON, so every optional field deserializes
//! leniently: absent, `null`, or malformed values fall back to safe
//! defaults, and malformed list entries are dropped.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::complexity::ComplexityLevel;
use crate::config::AuditAction;
use crate::evidence::EvidencePointer;
use crate::hypothesis::{HypothesisTracker, RejectedHypothesis};

/// Confidence assumed for findings that do not state one.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Starting score of every audit.
pub const BASE_AUDIT_SCORE: f64 = 100.0;

/// Deserialize a value that does not fit `T` (including `null`) as the
/// type's default.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Deserialize a list, dropping entries that do not fit `T`. Anything
/// other than an array becomes an empty list.
pub(crate) fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    let total = entries.len();
    let items: Vec<T> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    if items.len() < total {
        tracing::warn!(dropped = total - items.len(), "Skipped malformed list entries");
    }
    Ok(items)
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    #[serde(other)]
    Unknown,
}

impl Severity {
    /// Weight used by the confidence-interval estimator.
    pub fn weight(self) -> f64 {
        match self {
            Severity::Critical => 4.0,
            Severity::High => 3.0,
            Severity::Medium => 2.0,
            Severity::Low => 1.0,
            Severity::Info => 0.5,
            Severity::Unknown => 1.0,
        }
    }
}

/// Structured plan for resolving an uncertainty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextStepPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,

    /// Tool, owner, and anything else the producer attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `nextStepToResolve` as sent by producers: a plan object or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextStep {
    Plan(NextStepPlan),
    Note(String),
    Other(Value),
}

impl NextStep {
    /// Only a plan naming both an action and an expected result counts.
    pub fn is_actionable(&self) -> bool {
        match self {
            NextStep::Plan(plan) => {
                let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
                present(&plan.action) && present(&plan.expected_result)
            }
            NextStep::Note(_) | NextStep::Other(_) => false,
        }
    }
}

/// Self-reported flags attached to a finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindingMetadata {
    #[serde(
        rename = "missingEvidence",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub missing_evidence: Option<bool>,

    #[serde(
        rename = "conflictingEvidence",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub conflicting_evidence: Option<bool>,

    #[serde(
        rename = "nextStepToResolve",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub next_step_to_resolve: Option<NextStep>,

    /// Set by the degrade transform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_capped: Option<bool>,

    /// Confidence before the degrade transform capped it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_confidence: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single claim produced by an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,

    /// Producer-specific category (e.g. "SECURITY")
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub description: String,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    #[serde(default, deserialize_with = "lenient_items")]
    pub evidence: Vec<EvidencePointer>,

    #[serde(default, deserialize_with = "lenient")]
    pub metadata: FindingMetadata,

    /// Set when the degrade transform moved this finding to uncertainties
    #[serde(default, skip_serializing_if = "is_false")]
    pub demoted_from_findings: bool,
}

impl Finding {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_evidence(mut self, evidence: EvidencePointer) -> Self {
        self.evidence.push(evidence);
        self
    }

    /// Confidence, or 0.5 when absent or not a finite number.
    pub fn confidence_or_default(&self) -> f64 {
        self.confidence
            .filter(|c| c.is_finite())
            .unwrap_or(DEFAULT_CONFIDENCE)
    }

    pub fn severity_or_default(&self) -> Severity {
        self.severity.unwrap_or(Severity::Unknown)
    }

    /// Description and recommendation, the text scanned for phrases.
    pub fn claim_text(&self) -> String {
        match self.recommendation.as_deref() {
            Some(rec) if !rec.is_empty() => format!("{} {}", self.description, rec),
            _ => self.description.clone(),
        }
    }
}

/// Agent output under audit.
///
/// The record optionally owns the [`HypothesisTracker`] used during the
/// agent's analysis. Records deserialized from upstream carry the
/// serialized rejected list instead (`_rejectedHypotheses`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRecord {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type", default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(rename = "agentType", default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, deserialize_with = "lenient_items")]
    pub findings: Vec<Finding>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    #[serde(
        rename = "_rejectedHypotheses",
        default,
        deserialize_with = "lenient_items",
        skip_serializing_if = "Vec::is_empty"
    )]
    rejected_hypotheses: Vec<RejectedHypothesis>,

    #[serde(skip)]
    tracker: Option<HypothesisTracker>,
}

impl AgentRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_finding(mut self, finding: Finding) -> Self {
        self.findings.push(finding);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Replace the serialized rejected list (records without a tracker).
    pub fn with_rejected_hypotheses(mut self, rejected: Vec<RejectedHypothesis>) -> Self {
        match self.tracker.as_mut() {
            Some(tracker) => tracker.replace_rejected(rejected),
            None => self.rejected_hypotheses = rejected,
        }
        self
    }

    /// Name used in logs and errors.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }

    /// Attach a hypothesis tracker, or return the one already attached.
    ///
    /// A serialized rejected list carried by the record seeds the new tracker.
    pub fn attach_tracker(&mut self) -> &mut HypothesisTracker {
        let serialized = &mut self.rejected_hypotheses;
        self.tracker
            .get_or_insert_with(|| HypothesisTracker::with_rejected(std::mem::take(serialized)))
    }

    pub fn has_tracker(&self) -> bool {
        self.tracker.is_some()
    }

    pub fn tracker(&self) -> Option<&HypothesisTracker> {
        self.tracker.as_ref()
    }

    /// Detach the tracker at the end of a run, leaving its rejected list behind.
    pub fn detach_tracker(&mut self) -> Option<HypothesisTracker> {
        let tracker = self.tracker.take()?;
        self.rejected_hypotheses = tracker.rejected().to_vec();
        Some(tracker)
    }

    /// Read-only view of the rejected alternatives, in evaluation order.
    pub fn rejected_hypotheses(&self) -> &[RejectedHypothesis] {
        match &self.tracker {
            Some(tracker) => tracker.rejected(),
            None => &self.rejected_hypotheses,
        }
    }

    /// True when `metadata[key]` is the boolean `true`.
    pub fn metadata_flag(&self, key: &str) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Per-call context supplied by the orchestration layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditContext {
    /// Explicit complexity; only LOW/MEDIUM/HIGH/CRITICAL are honored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,

    pub retry_count: u32,

    pub skip_audit: bool,

    /// Partial configuration merged over the agent's configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_override: Option<Value>,
}

impl AuditContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_complexity(mut self, complexity: impl Into<String>) -> Self {
        self.complexity = Some(complexity.into());
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_config_override(mut self, overlay: Value) -> Self {
        self.config_override = Some(overlay);
        self
    }

    pub fn skipping_audit(mut self) -> Self {
        self.skip_audit = true;
        self
    }
}

/// The checks an audit runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckKind {
    ClaimEvidence,
    TunnelVision,
    CalibratedUncertainty,
}

impl CheckKind {
    pub const ALL: [CheckKind; 3] = [
        CheckKind::ClaimEvidence,
        CheckKind::TunnelVision,
        CheckKind::CalibratedUncertainty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::ClaimEvidence => "claimEvidence",
            CheckKind::TunnelVision => "tunnelVision",
            CheckKind::CalibratedUncertainty => "calibratedUncertainty",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A check that did not run, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCheck {
    pub check: CheckKind,
    pub reason: String,
}

/// Why a hedged finding counts as calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationBasis {
    MissingEvidence,
    ConflictingEvidence,
    NextStepToResolve,
}

/// Discriminant of [`AuditIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    HighConfidenceWithoutEvidence,
    UnsupportedCertainty,
    TunnelVision,
    ExcessiveHedging,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::HighConfidenceWithoutEvidence => "high_confidence_without_evidence",
            IssueKind::UnsupportedCertainty => "unsupported_certainty",
            IssueKind::TunnelVision => "tunnel_vision",
            IssueKind::ExcessiveHedging => "excessive_hedging",
        }
    }
}

/// A penalized detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditIssue {
    HighConfidenceWithoutEvidence {
        finding_id: String,
        confidence: f64,
        evidence_score: f64,
        required_score: f64,
        gap: f64,
        penalty: f64,
    },
    UnsupportedCertainty {
        finding_id: String,
        phrases: Vec<String>,
        evidence_score: f64,
        penalty: f64,
    },
    TunnelVision {
        complexity: ComplexityLevel,
        rejected_count: usize,
        required: usize,
        shortfall: usize,
        penalty: f64,
    },
    ExcessiveHedging {
        hedged: usize,
        calibrated: usize,
        uncalibrated: usize,
        max_allowed: usize,
        penalty: f64,
    },
}

impl AuditIssue {
    pub fn kind(&self) -> IssueKind {
        match self {
            AuditIssue::HighConfidenceWithoutEvidence { .. } => IssueKind::HighConfidenceWithoutEvidence,
            AuditIssue::UnsupportedCertainty { .. } => IssueKind::UnsupportedCertainty,
            AuditIssue::TunnelVision { .. } => IssueKind::TunnelVision,
            AuditIssue::ExcessiveHedging { .. } => IssueKind::ExcessiveHedging,
        }
    }

    /// Signed score delta (penalties are negative).
    pub fn delta(&self) -> f64 {
        match self {
            AuditIssue::HighConfidenceWithoutEvidence { penalty, .. }
            | AuditIssue::UnsupportedCertainty { penalty, .. }
            | AuditIssue::TunnelVision { penalty, .. }
            | AuditIssue::ExcessiveHedging { penalty, .. } => *penalty,
        }
    }
}

/// Discriminant of [`AuditReward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RewardKind {
    StrongEvidence,
    CalibratedUncertainty,
}

impl RewardKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RewardKind::StrongEvidence => "strong_evidence",
            RewardKind::CalibratedUncertainty => "calibrated_uncertainty",
        }
    }
}

/// A rewarded behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditReward {
    StrongEvidence {
        finding_id: String,
        evidence_score: f64,
        bonus: f64,
    },
    CalibratedUncertainty {
        finding_id: String,
        hedges: Vec<String>,
        basis: Vec<CalibrationBasis>,
        bonus: f64,
    },
}

impl AuditReward {
    pub fn kind(&self) -> RewardKind {
        match self {
            AuditReward::StrongEvidence { .. } => RewardKind::StrongEvidence,
            AuditReward::CalibratedUncertainty { .. } => RewardKind::CalibratedUncertainty,
        }
    }

    pub fn delta(&self) -> f64 {
        match self {
            AuditReward::StrongEvidence { bonus, .. }
            | AuditReward::CalibratedUncertainty { bonus, .. } => *bonus,
        }
    }
}

/// Outcome of one audit call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub agent_name: String,

    pub passed: bool,

    /// Starts at 100; signed deltas accumulate without clamping
    pub audit_score: f64,

    pub pass_score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ComplexityLevel>,

    pub checks_run: Vec<CheckKind>,

    pub checks_skipped: Vec<SkippedCheck>,

    pub issues: Vec<AuditIssue>,

    pub rewards: Vec<AuditReward>,

    pub action: AuditAction,

    /// Recommended delay before a retry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,

    pub retry_count: u32,

    /// Serialized metadata size after enforcement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_size_bytes: Option<usize>,

    #[serde(default)]
    pub metadata_enforced: bool,

    pub timestamp: DateTime<Utc>,
}

impl AuditResult {
    /// A fresh result at the base score, before any check has run.
    pub fn new(agent_name: impl Into<String>, pass_score: f64) -> Self {
        Self {
            agent_name: agent_name.into(),
            passed: true,
            audit_score: BASE_AUDIT_SCORE,
            pass_score,
            complexity: None,
            checks_run: Vec::new(),
            checks_skipped: Vec::new(),
            issues: Vec::new(),
            rewards: Vec::new(),
            action: AuditAction::Continue,
            backoff_ms: None,
            retry_count: 0,
            metadata_size_bytes: None,
            metadata_enforced: false,
            timestamp: Utc::now(),
        }
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &AuditIssue> {
        self.issues.iter().filter(move |i| i.kind() == kind)
    }

    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues_of(kind).next().is_some()
    }

    pub fn rewards_of(&self, kind: RewardKind) -> impl Iterator<Item = &AuditReward> {
        self.rewards.iter().filter(move |r| r.kind() == kind)
    }

    pub fn skipped(&self, check: CheckKind) -> Option<&SkippedCheck> {
        self.checks_skipped.iter().find(|s| s.check == check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finding_lenient_deserialization() {
        let finding: Finding = serde_json::from_value(json!({
            "id": "f1",
            "description": "Simple observation",
            "confidence": 0.6,
            "severity": "low",
            "evidence": null
        }))
        .unwrap();
        assert!(finding.evidence.is_empty());
        assert_eq!(finding.severity, Some(Severity::Low));
        assert_eq!(finding.metadata, FindingMetadata::default());
    }

    #[test]
    fn test_malformed_optional_fields_fall_back() {
        let record: AgentRecord = serde_json::from_value(json!({
            "name": "SecurityAgent",
            "type": 7,
            "findings": [
                {
                    "id": "f1",
                    "description": "Token leaks into logs",
                    "confidence": "high",
                    "severity": 3,
                    "metadata": { "missingEvidence": "yes" },
                    "evidence": [
                        { "reference": "logs/app.log" },
                        "not a pointer",
                        { "type": "test_result", "reference": "logging::redacts", "verified": true }
                    ]
                },
                "not a finding"
            ],
            "_rejectedHypotheses": "none"
        }))
        .unwrap();

        assert_eq!(record.kind, None);
        assert_eq!(record.findings.len(), 1);
        assert!(record.rejected_hypotheses().is_empty());

        let finding = &record.findings[0];
        assert_eq!(finding.confidence, None);
        assert_eq!(finding.confidence_or_default(), 0.5);
        assert_eq!(finding.severity_or_default(), Severity::Unknown);
        assert_eq!(finding.metadata.missing_evidence, None);
        assert_eq!(finding.evidence.len(), 2);
        assert_eq!(finding.evidence[0].kind, crate::evidence::EvidenceType::Other);
        assert_eq!(finding.evidence[0].reference, "logs/app.log");
        assert!(finding.evidence[1].is_verified());
    }

    #[test]
    fn test_unknown_severity_weighs_one() {
        let finding: Finding = serde_json::from_value(json!({ "severity": "blocker" })).unwrap();
        assert_eq!(finding.severity_or_default().weight(), 1.0);
        assert_eq!(finding.confidence_or_default(), DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_next_step_shapes() {
        let metadata: FindingMetadata = serde_json::from_value(json!({
            "nextStepToResolve": {
                "action": "run_profiler",
                "tool": "Chrome DevTools",
                "expected_result": "Memory allocation timeline"
            }
        }))
        .unwrap();
        let step = metadata.next_step_to_resolve.unwrap();
        assert!(step.is_actionable());
        if let NextStep::Plan(plan) = &step {
            assert_eq!(plan.extra.get("tool"), Some(&json!("Chrome DevTools")));
        }

        let note: NextStep = serde_json::from_value(json!("Run more tests")).unwrap();
        assert!(!note.is_actionable());

        let partial: NextStep = serde_json::from_value(json!({ "action": "profile" })).unwrap();
        assert!(!partial.is_actionable());
    }

    #[test]
    fn test_claim_text_includes_recommendation() {
        let finding = Finding::new("f1", "Index missing").with_recommendation("Definitely add one");
        assert_eq!(finding.claim_text(), "Index missing Definitely add one");
    }

    #[test]
    fn test_record_reads_serialized_rejections() {
        let record: AgentRecord = serde_json::from_value(json!({
            "name": "FactCheckAgent",
            "type": "VALIDATION",
            "_rejectedHypotheses": [{
                "id": "N/A",
                "alternative_id": "N/A",
                "alternative_name": "No plausible alternatives",
                "rejection_reason": { "code": "NA_DETERMINISTIC", "description": "Single answer" },
                "confidence_at_rejection": 1.0
            }]
        }))
        .unwrap();
        assert_eq!(record.rejected_hypotheses().len(), 1);
        assert!(record.rejected_hypotheses()[0].is_bypass());
    }

    #[test]
    fn test_attach_tracker_is_idempotent_and_seeds() {
        let mut record = AgentRecord::new("TestAgent");
        record.attach_tracker().add_deterministic_bypass("Lookup");
        assert!(record.has_tracker());

        // Second attach keeps the existing tracker and its entries
        record.attach_tracker();
        assert_eq!(record.rejected_hypotheses().len(), 1);

        let tracker = record.detach_tracker().unwrap();
        assert_eq!(tracker.rejected().len(), 1);
        assert!(!record.has_tracker());
        assert_eq!(record.rejected_hypotheses().len(), 1);
    }

    #[test]
    fn test_metadata_flag() {
        let mut metadata = Map::new();
        metadata.insert("deterministic_bypass".to_string(), json!(true));
        metadata.insert("note".to_string(), json!("true"));
        let record = AgentRecord::new("A").with_metadata(metadata);
        assert!(record.metadata_flag("deterministic_bypass"));
        assert!(!record.metadata_flag("note"));
        assert!(!record.metadata_flag("absent"));
    }

    #[test]
    fn test_issue_serializes_with_type_tag() {
        let issue = AuditIssue::ExcessiveHedging {
            hedged: 5,
            calibrated: 1,
            uncalibrated: 4,
            max_allowed: 2,
            penalty: -15.0,
        };
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["type"], "excessive_hedging");
        assert_eq!(issue.delta(), -15.0);
    }

    #[test]
    fn test_context_deserializes_camel_case() {
        let context: AuditContext = serde_json::from_value(json!({
            "complexity": "HIGH",
            "taskType": "architecture",
            "retryCount": 2,
            "skipAudit": false
        }))
        .unwrap();
        assert_eq!(context.task_type.as_deref(), Some("architecture"));
        assert_eq!(context.retry_count, 2);
    }
}
