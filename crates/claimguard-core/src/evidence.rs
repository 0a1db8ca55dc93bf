//! Evidence pointers and deterministic evidence scoring.
//!
//! Every claim an agent makes may carry evidence pointers: typed references
//! to files, artifacts, URLs, citations, test results, or inline proof.
//! The score computed here is a pure function of the pointer list, so the
//! same finding always scores the same.
//!
//! ## Scoring rubric
//!
//! | Component | Contribution |
//! |-----------|--------------|
//! | Presence | `min(0.2, 0.6 / n)` per item (at most 0.6 total) |
//! | Verification | `0.2 / n` per verified item (at most 0.2 total) |
//! | Diversity | `+0.2` when at least two evidence types are present |
//!
//! The sum is capped at 1.0.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::round_to;
use crate::types::{lenient, Finding};

/// Total presence credit spread over all evidence items.
pub const PRESENCE_TOTAL: f64 = 0.6;

/// Presence credit cap for a single item.
pub const PRESENCE_PER_ITEM_CAP: f64 = 0.2;

/// Total verification credit spread over all evidence items.
pub const VERIFICATION_TOTAL: f64 = 0.2;

/// Bonus for evidence of two or more distinct types.
pub const DIVERSITY_BONUS: f64 = 0.2;

/// Default confidence at which a claim needs supporting evidence.
pub const DEFAULT_HIGH_CONFIDENCE_THRESHOLD: f64 = 0.9;

/// Default minimum evidence score for high-confidence claims.
pub const DEFAULT_MIN_EVIDENCE_SCORE: f64 = 0.5;

/// Markers in a location section that signal disagreement between sources.
const CONFLICT_SECTION_MARKERS: [&str; 2] = ["conflicting", "contradicts"];

/// Kind of artifact an evidence pointer references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    File,
    Artifact,
    Url,
    Citation,
    TestResult,
    Inline,
    /// Anything an upstream producer sent that we do not recognize, or
    /// nothing at all
    #[default]
    #[serde(other)]
    Other,
}

/// How the `verified` flag of a pointer was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    FileExists,
    ArtifactLookup,
    UrlReachable,
    Inline,
    #[default]
    #[serde(other)]
    Unverified,
}

/// Location inside the referenced artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl EvidenceLocation {
    fn signals_conflict(&self) -> bool {
        self.section
            .as_deref()
            .map(|section| {
                let lower = section.to_lowercase();
                CONFLICT_SECTION_MARKERS.iter().any(|m| lower.contains(m))
            })
            .unwrap_or(false)
    }
}

/// A typed reference asserting support for a claim.
///
/// `verified` can only be set by a verification routine: the constructors
/// below and [`EvidencePointer::record_artifact_lookup`] /
/// [`EvidencePointer::record_url_check`]. Records deserialized from an
/// upstream producer keep whatever that producer verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePointer {
    /// What kind of artifact is referenced
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: EvidenceType,

    /// Path, id, URL, or inline text
    #[serde(alias = "ref", default, deserialize_with = "lenient")]
    pub reference: String,

    /// Optional line range / section
    #[serde(
        alias = "loc",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<EvidenceLocation>,

    #[serde(default, deserialize_with = "lenient")]
    verified: bool,

    #[serde(default, deserialize_with = "lenient")]
    verification_method: VerificationMethod,

    #[serde(default = "Utc::now", deserialize_with = "timestamp_or_now")]
    pub created_at: DateTime<Utc>,
}

fn timestamp_or_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|_| Utc::now()))
}

impl EvidencePointer {
    fn new(
        kind: EvidenceType,
        reference: impl Into<String>,
        verified: bool,
        verification_method: VerificationMethod,
    ) -> Self {
        Self {
            kind,
            reference: reference.into(),
            location: None,
            verified,
            verification_method,
            created_at: Utc::now(),
        }
    }

    /// File evidence, verified by checking that `base/path` exists.
    ///
    /// Only existence is checked; file contents are never read.
    pub fn file(base: impl AsRef<Path>, path: impl Into<String>) -> Self {
        let path = path.into();
        let exists = base.as_ref().join(&path).exists();
        let method = if exists {
            VerificationMethod::FileExists
        } else {
            VerificationMethod::Unverified
        };
        Self::new(EvidenceType::File, path, exists, method)
    }

    /// Artifact evidence. Unverified until [`Self::record_artifact_lookup`].
    pub fn artifact(id: impl Into<String>) -> Self {
        Self::new(EvidenceType::Artifact, id, false, VerificationMethod::Unverified)
    }

    /// URL evidence. Unverified until [`Self::record_url_check`].
    pub fn url(url: impl Into<String>) -> Self {
        Self::new(EvidenceType::Url, url, false, VerificationMethod::Unverified)
    }

    /// Citation of a document or source.
    pub fn citation(source: impl Into<String>) -> Self {
        Self::new(EvidenceType::Citation, source, false, VerificationMethod::Unverified)
    }

    /// Test result evidence, self-verified.
    pub fn test_result(test_id: impl Into<String>) -> Self {
        Self::new(EvidenceType::TestResult, test_id, true, VerificationMethod::Inline)
    }

    /// Inline proof, self-verified.
    pub fn inline(content: impl Into<String>) -> Self {
        Self::new(EvidenceType::Inline, content, true, VerificationMethod::Inline)
    }

    /// Attach a line range.
    pub fn at_lines(mut self, start: u32, end: u32) -> Self {
        let location = self.location.get_or_insert_with(EvidenceLocation::default);
        location.line_start = Some(start);
        location.line_end = Some(end);
        self
    }

    /// Attach a section label.
    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        let location = self.location.get_or_insert_with(EvidenceLocation::default);
        location.section = Some(section.into());
        self
    }

    /// Record the outcome of an external artifact lookup.
    ///
    /// No-op for pointers that are not artifacts.
    pub fn record_artifact_lookup(&mut self, found: bool) {
        if self.kind == EvidenceType::Artifact {
            self.verified = found;
            self.verification_method = VerificationMethod::ArtifactLookup;
        }
    }

    /// Record the outcome of an external reachability check.
    ///
    /// No-op for pointers that are not URLs.
    pub fn record_url_check(&mut self, reachable: bool) {
        if self.kind == EvidenceType::Url {
            self.verified = reachable;
            self.verification_method = VerificationMethod::UrlReachable;
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn verification_method(&self) -> VerificationMethod {
        self.verification_method
    }
}

/// Outcome of checking a claim's confidence against its evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceValidation {
    pub valid: bool,
    pub confidence: f64,
    pub evidence_score: f64,
    pub required_score: f64,
    /// How far the evidence score falls short (0 when valid)
    pub gap: f64,
}

/// Deterministic evidence score for a finding, in `[0, 1]`.
pub fn evidence_score(finding: &Finding) -> f64 {
    score_evidence(&finding.evidence)
}

/// Deterministic evidence score for a pointer list, in `[0, 1]`.
///
/// Rounded to three decimals so that rubric boundaries (0.4, 0.8, ...)
/// compare exactly.
pub fn score_evidence(evidence: &[EvidencePointer]) -> f64 {
    if evidence.is_empty() {
        return 0.0;
    }

    let n = evidence.len() as f64;

    let presence = (PRESENCE_TOTAL / n).min(PRESENCE_PER_ITEM_CAP) * n;

    let verified = evidence.iter().filter(|e| e.verified).count() as f64;
    let verification = verified * (VERIFICATION_TOTAL / n);

    let distinct_types: BTreeSet<EvidenceType> = evidence.iter().map(|e| e.kind).collect();
    let diversity = if distinct_types.len() >= 2 {
        DIVERSITY_BONUS
    } else {
        0.0
    };

    round_to((presence + verification + diversity).min(1.0), 3)
}

/// Check that a high-confidence claim is backed by enough evidence.
///
/// Claims below `high_confidence_threshold` are always valid. A missing
/// confidence counts as 0.5.
pub fn validate_for_confidence(
    finding: &Finding,
    high_confidence_threshold: f64,
    min_evidence_score: f64,
) -> ConfidenceValidation {
    let confidence = finding.confidence_or_default();
    let score = evidence_score(finding);
    let valid = confidence < high_confidence_threshold || score >= min_evidence_score;

    ConfidenceValidation {
        valid,
        confidence,
        evidence_score: score,
        required_score: min_evidence_score,
        gap: if valid {
            0.0
        } else {
            round_to(min_evidence_score - score, 3)
        },
    }
}

/// Heuristic check for disagreement among evidence items.
///
/// Explicit markers win: a location section containing "conflicting" or
/// "contradicts", or a reference containing "conflict". Failing that, any
/// evidence type with two or more items where at least one is unverified
/// is treated as unresolved disagreement.
// TODO: same-type corroborating evidence that is merely unverified trips the
// second rule; replace with a semantic comparison once pointers carry verdicts.
pub fn has_conflicting_evidence(evidence: &[EvidencePointer]) -> bool {
    let explicit = evidence.iter().any(|e| {
        e.location
            .as_ref()
            .map(EvidenceLocation::signals_conflict)
            .unwrap_or(false)
            || e.reference.to_lowercase().contains("conflict")
    });
    if explicit {
        return true;
    }

    // type -> (count, any unverified)
    let mut by_type: BTreeMap<EvidenceType, (usize, bool)> = BTreeMap::new();
    for e in evidence {
        let entry = by_type.entry(e.kind).or_insert((0, false));
        entry.0 += 1;
        entry.1 |= !e.verified;
    }

    by_type
        .values()
        .any(|(count, any_unverified)| *count >= 2 && *any_unverified)
}
