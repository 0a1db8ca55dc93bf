//! Confidence degradation for outputs that failed an audit.
//!
//! Under the `degrade` failure policy the output is still emitted, but
//! with its claims weakened: high confidences are capped, weak claims are
//! moved to the uncertainty list, and the overall score drops in
//! proportion to the audit shortfall.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{lenient, lenient_items, AuditResult, Finding, BASE_AUDIT_SCORE};

/// Confidences above this are capped to it.
pub const CONFIDENCE_CAP: f64 = 0.7;

/// Findings below this confidence are demoted to uncertainties.
pub const DEMOTION_THRESHOLD: f64 = 0.5;

/// Share of the audit shortfall taken off the output score.
pub const SCORE_REDUCTION_FACTOR: f64 = 0.5;

/// Audit stamp attached to a degraded output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradeStamp {
    pub degraded: bool,
    pub degraded_at: DateTime<Utc>,
    pub result: AuditResult,
}

/// Agent output as emitted to downstream consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    #[serde(default, deserialize_with = "lenient_items")]
    pub findings: Vec<Finding>,

    #[serde(default, deserialize_with = "lenient_items")]
    pub uncertainties: Vec<Finding>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(rename = "_audit", default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<DegradeStamp>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentOutput {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            ..Default::default()
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn is_degraded(&self) -> bool {
        self.audit.as_ref().is_some_and(|a| a.degraded)
    }
}

/// Weaken `output` according to `result`. The input is not modified.
pub fn apply_degrade_policy(output: &AgentOutput, result: &AuditResult) -> AgentOutput {
    let mut degraded = AgentOutput {
        findings: Vec::with_capacity(output.findings.len()),
        uncertainties: output.uncertainties.clone(),
        score: output.score,
        audit: None,
        extra: output.extra.clone(),
    };

    for finding in &output.findings {
        let mut finding = finding.clone();
        let confidence = finding.confidence_or_default();

        if confidence < DEMOTION_THRESHOLD {
            finding.demoted_from_findings = true;
            degraded.uncertainties.push(finding);
            continue;
        }

        if confidence > CONFIDENCE_CAP {
            finding.metadata.original_confidence = Some(confidence);
            finding.metadata.confidence_capped = Some(true);
            finding.confidence = Some(CONFIDENCE_CAP);
        }
        degraded.findings.push(finding);
    }

    if let Some(score) = output.score {
        let shortfall = (BASE_AUDIT_SCORE - result.audit_score).max(0.0);
        degraded.score = Some((score - shortfall * SCORE_REDUCTION_FACTOR).max(0.0));
    }

    degraded.audit = Some(DegradeStamp {
        degraded: true,
        degraded_at: Utc::now(),
        result: result.clone(),
    });

    tracing::info!(
        agent = %result.agent_name,
        capped = degraded.findings.iter().filter(|f| f.metadata.confidence_capped == Some(true)).count(),
        demoted = degraded.uncertainties.iter().filter(|f| f.demoted_from_findings).count(),
        "Output degraded"
    );

    degraded
}
