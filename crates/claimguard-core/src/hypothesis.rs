//! Hypothesis tracking during agent analysis.
//!
//! An agent records the alternatives it considers while it works. Each
//! hypothesis starts in `considering` and ends in `accepted` or `rejected`;
//! both are terminal. Every rejection is appended to an ordered rejected
//! list, which is what the tunnel-vision check inspects.
//!
//! Deterministic tasks (a single correct answer) record a bypass entry
//! instead of inventing alternatives.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::round_to;

/// Confidence range given to a new hypothesis.
pub const DEFAULT_CONFIDENCE_RANGE: (f64, f64) = (0.3, 0.7);

/// Rejected-list descriptions are truncated to this many characters.
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// At most this many rejected entries are persisted as artifact metadata.
pub const ARTIFACT_REJECTED_LIMIT: usize = 10;

pub const ARTIFACT_SCHEMA_VERSION: &str = "1.0.0";

/// Id of synthetic bypass entries.
pub const BYPASS_ID: &str = "N/A";

/// Largest downward shift applied by `mark_uncertain`.
const MAX_UNCERTAINTY_SHIFT: f64 = 0.3;

/// Shift applied per recorded uncertainty.
const UNCERTAINTY_STEP: f64 = 0.1;

/// The upper bound of a range never drops below this.
const MIN_RANGE_HIGH: f64 = 0.1;

/// Errors from tracker transitions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Unknown hypothesis: {0}")]
    UnknownHypothesis(String),

    #[error("Hypothesis {id} is already {status:?}")]
    AlreadyResolved { id: String, status: HypothesisStatus },
}

/// Lifecycle state of a hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisStatus {
    Considering,
    Accepted,
    Rejected,
}

impl HypothesisStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, HypothesisStatus::Considering)
    }
}

/// Why an alternative was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    LowConfidence,
    ContradictedByEvidence,
    InsufficientEvidence,
    OutOfScope,
    Superseded,
    ConstraintViolation,
    /// Deterministic task: a single correct answer, no real alternatives
    NaDeterministic,
    /// A code sent by a producer that this version does not know
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionReason {
    pub code: RejectionCode,
    #[serde(default)]
    pub description: String,
}

/// A hypothesis under consideration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: String,
    pub description: String,
    pub confidence_range: (f64, f64),
    pub status: HypothesisStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<RejectionReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_reason: Option<String>,

    /// Supporting evidence on accept, counter-evidence on reject
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uncertainties: Vec<String>,

    pub considered_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Hypothesis {
    /// Midpoint of the confidence range.
    pub fn confidence(&self) -> f64 {
        round_to((self.confidence_range.0 + self.confidence_range.1) / 2.0, 3)
    }
}

/// Input for [`HypothesisTracker::consider`].
#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisInput {
    pub description: String,
    pub confidence_range: Option<(f64, f64)>,
}

impl HypothesisInput {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            confidence_range: None,
        }
    }

    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        self.confidence_range = Some((low.min(high), low.max(high)));
        self
    }
}

impl From<&str> for HypothesisInput {
    fn from(description: &str) -> Self {
        Self::new(description)
    }
}

impl From<String> for HypothesisInput {
    fn from(description: String) -> Self {
        Self::new(description)
    }
}

/// Normalized rejected-list entry, the persisted projection of a rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedHypothesis {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub alternative_id: String,

    /// Truncated description of the alternative
    #[serde(default)]
    pub alternative_name: String,

    pub rejection_reason: RejectionReason,

    #[serde(default)]
    pub confidence_at_rejection: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub counter_evidence: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl RejectedHypothesis {
    /// True for deterministic-task bypass entries.
    pub fn is_bypass(&self) -> bool {
        self.rejection_reason.code == RejectionCode::NaDeterministic
            || self.id == BYPASS_ID
            || self.alternative_id == BYPASS_ID
    }
}

/// Counts by status plus the rejected list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningSummary {
    pub considering: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub total: usize,
    pub rejected_hypotheses: Vec<RejectedHypothesis>,
    pub has_deterministic_bypass: bool,
}

/// Bounded projection persisted alongside an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisArtifact {
    #[serde(rename = "_schema_version")]
    pub schema_version: String,
    pub rejected_alternatives: Vec<RejectedHypothesis>,
    pub rejection_count: usize,
    pub last_rejection_at: Option<DateTime<Utc>>,
    pub has_deterministic_bypass: bool,
}

/// Per-run tracker of considered, accepted, and rejected hypotheses.
#[derive(Debug, Clone, Default)]
pub struct HypothesisTracker {
    hypotheses: BTreeMap<String, Hypothesis>,
    rejected: Vec<RejectedHypothesis>,
}

impl HypothesisTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker seeded with a previously serialized rejected list.
    pub fn with_rejected(rejected: Vec<RejectedHypothesis>) -> Self {
        Self {
            hypotheses: BTreeMap::new(),
            rejected,
        }
    }

    pub(crate) fn replace_rejected(&mut self, rejected: Vec<RejectedHypothesis>) {
        self.rejected = rejected;
    }

    /// Start (or restart) considering a hypothesis. Returns its id.
    ///
    /// Without an explicit id, one is derived from the description's hash.
    pub fn consider(&mut self, id: Option<&str>, input: impl Into<HypothesisInput>) -> String {
        let input = input.into();
        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => content_id(&input.description),
        };

        let hypothesis = Hypothesis {
            id: id.clone(),
            description: input.description,
            confidence_range: input.confidence_range.unwrap_or(DEFAULT_CONFIDENCE_RANGE),
            status: HypothesisStatus::Considering,
            rejection_reason: None,
            acceptance_reason: None,
            evidence: Vec::new(),
            uncertainties: Vec::new(),
            considered_at: Utc::now(),
            resolved_at: None,
        };
        self.hypotheses.insert(id.clone(), hypothesis);
        id
    }

    /// Transition a hypothesis to `accepted`.
    pub fn accept(
        &mut self,
        id: &str,
        reason: impl Into<String>,
        evidence: Vec<Value>,
    ) -> Result<(), TrackerError> {
        let hypothesis = self.open_hypothesis(id)?;
        hypothesis.status = HypothesisStatus::Accepted;
        hypothesis.acceptance_reason = Some(reason.into());
        hypothesis.evidence = evidence;
        hypothesis.resolved_at = Some(Utc::now());
        Ok(())
    }

    /// Transition a hypothesis to `rejected` and append it to the rejected list.
    pub fn reject(
        &mut self,
        id: &str,
        reason: impl Into<String>,
        counter_evidence: Vec<Value>,
        code: RejectionCode,
    ) -> Result<&RejectedHypothesis, TrackerError> {
        let sequence = self.rejected.len() + 1;
        let reason = RejectionReason {
            code,
            description: reason.into(),
        };

        let hypothesis = self.open_hypothesis(id)?;
        let now = Utc::now();
        hypothesis.status = HypothesisStatus::Rejected;
        hypothesis.rejection_reason = Some(reason.clone());
        hypothesis.evidence = counter_evidence.clone();
        hypothesis.resolved_at = Some(now);

        let entry = RejectedHypothesis {
            id: format!("rej-{}", sequence),
            alternative_id: hypothesis.id.clone(),
            alternative_name: truncate_chars(&hypothesis.description, MAX_DESCRIPTION_CHARS),
            rejection_reason: reason,
            confidence_at_rejection: hypothesis.confidence(),
            counter_evidence,
            rejected_at: Some(now),
        };

        tracing::debug!(
            hypothesis = %entry.alternative_id,
            code = ?entry.rejection_reason.code,
            "Hypothesis rejected"
        );

        self.rejected.push(entry);
        Ok(&self.rejected[self.rejected.len() - 1])
    }

    /// Shift a hypothesis' confidence range down for each open uncertainty.
    ///
    /// The shift is `min(0.3, 0.1 × count)`; the range never goes below
    /// `[0, 0.1]`. Returns the new range.
    pub fn mark_uncertain<S: AsRef<str>>(
        &mut self,
        id: &str,
        uncertainties: &[S],
    ) -> Result<(f64, f64), TrackerError> {
        let hypothesis = self.open_hypothesis(id)?;
        let shift = (UNCERTAINTY_STEP * uncertainties.len() as f64).min(MAX_UNCERTAINTY_SHIFT);

        let (low, high) = hypothesis.confidence_range;
        hypothesis.confidence_range = (
            round_to((low - shift).max(0.0), 3),
            round_to((high - shift).max(MIN_RANGE_HIGH), 3),
        );
        hypothesis
            .uncertainties
            .extend(uncertainties.iter().map(|u| u.as_ref().to_string()));

        Ok(hypothesis.confidence_range)
    }

    /// Record that the task has a single correct answer.
    pub fn add_deterministic_bypass(&mut self, reason: impl Into<String>) -> &RejectedHypothesis {
        let entry = RejectedHypothesis {
            id: BYPASS_ID.to_string(),
            alternative_id: BYPASS_ID.to_string(),
            alternative_name: "No plausible alternatives".to_string(),
            rejection_reason: RejectionReason {
                code: RejectionCode::NaDeterministic,
                description: truncate_chars(&reason.into(), MAX_DESCRIPTION_CHARS),
            },
            confidence_at_rejection: 1.0,
            counter_evidence: Vec::new(),
            rejected_at: Some(Utc::now()),
        };
        self.rejected.push(entry);
        &self.rejected[self.rejected.len() - 1]
    }

    pub fn get(&self, id: &str) -> Option<&Hypothesis> {
        self.hypotheses.get(id)
    }

    /// Rejected list in evaluation order.
    pub fn rejected(&self) -> &[RejectedHypothesis] {
        &self.rejected
    }

    pub fn has_deterministic_bypass(&self) -> bool {
        self.rejected.iter().any(RejectedHypothesis::is_bypass)
    }

    pub fn summary(&self) -> ReasoningSummary {
        let count = |status: HypothesisStatus| {
            self.hypotheses
                .values()
                .filter(|h| h.status == status)
                .count()
        };

        ReasoningSummary {
            considering: count(HypothesisStatus::Considering),
            accepted: count(HypothesisStatus::Accepted),
            rejected: count(HypothesisStatus::Rejected),
            total: self.hypotheses.len(),
            rejected_hypotheses: self.rejected.clone(),
            has_deterministic_bypass: self.has_deterministic_bypass(),
        }
    }

    /// Bounded projection for persistence: the first ten rejections.
    pub fn to_artifact_metadata(&self) -> HypothesisArtifact {
        HypothesisArtifact {
            schema_version: ARTIFACT_SCHEMA_VERSION.to_string(),
            rejected_alternatives: self
                .rejected
                .iter()
                .take(ARTIFACT_REJECTED_LIMIT)
                .cloned()
                .collect(),
            rejection_count: self.rejected.len(),
            last_rejection_at: self.rejected.iter().filter_map(|r| r.rejected_at).max(),
            has_deterministic_bypass: self.has_deterministic_bypass(),
        }
    }

    fn open_hypothesis(&mut self, id: &str) -> Result<&mut Hypothesis, TrackerError> {
        let hypothesis = self
            .hypotheses
            .get_mut(id)
            .ok_or_else(|| TrackerError::UnknownHypothesis(id.to_string()))?;

        if hypothesis.status.is_terminal() {
            return Err(TrackerError::AlreadyResolved {
                id: id.to_string(),
                status: hypothesis.status,
            });
        }

        Ok(hypothesis)
    }
}

fn content_id(description: &str) -> String {
    let digest = Sha256::digest(description.as_bytes());
    format!("hyp-{}", &hex::encode(digest)[..12])
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}
