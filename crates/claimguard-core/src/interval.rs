//! Severity-weighted confidence interval over a set of findings.
//!
//! Small samples (fewer than five findings) get a heuristic band around the
//! weighted average that narrows as the sample grows. Larger samples use
//! the 10th and 90th percentiles of the raw confidences, widened if needed
//! so the band always contains the average.

use serde::{Deserialize, Serialize};

use crate::round_to;
use crate::types::{Finding, DEFAULT_CONFIDENCE};

/// Samples smaller than this use the heuristic band.
pub const PERCENTILE_MIN_SAMPLE: usize = 5;

/// Half-width of the heuristic band for a single finding.
pub const HEURISTIC_MAX_MARGIN: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMethod {
    HeuristicSmallSample,
    PercentileBands,
}

/// Intermediate values the interval was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalInputs {
    pub weighted_average: f64,
    pub total_weight: f64,
    pub n: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p10: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p90: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Severity-weighted average confidence
    pub center: f64,
    pub lower: f64,
    pub upper: f64,
    pub method: IntervalMethod,
    pub n: usize,
    pub inputs: IntervalInputs,
}

impl ConfidenceInterval {
    pub fn width(&self) -> f64 {
        round_to(self.upper - self.lower, 4)
    }

    pub fn contains(&self, confidence: f64) -> bool {
        (self.lower..=self.upper).contains(&confidence)
    }
}

/// Compute the confidence interval of `findings`.
///
/// Missing confidences count as 0.5 and missing severities weigh 1. An
/// empty slice behaves like a single finding at 0.5.
pub fn confidence_interval(findings: &[Finding]) -> ConfidenceInterval {
    let samples: Vec<(f64, f64)> = findings
        .iter()
        .map(|f| {
            (
                f.confidence_or_default().clamp(0.0, 1.0),
                f.severity_or_default().weight(),
            )
        })
        .collect();

    let (average, total_weight, n) = if samples.is_empty() {
        (DEFAULT_CONFIDENCE, 1.0, 1)
    } else {
        let total_weight: f64 = samples.iter().map(|(_, w)| w).sum();
        let weighted: f64 = samples.iter().map(|(c, w)| c * w).sum();
        (weighted / total_weight, total_weight, samples.len())
    };

    let mut inputs = IntervalInputs {
        weighted_average: round_to(average, 4),
        total_weight: round_to(total_weight, 4),
        n,
        margin: None,
        p10: None,
        p90: None,
    };

    let (lower, upper, method) = if n < PERCENTILE_MIN_SAMPLE {
        let margin = HEURISTIC_MAX_MARGIN * (PERCENTILE_MIN_SAMPLE - n) as f64 / 4.0;
        inputs.margin = Some(round_to(margin, 4));
        (
            (average - margin).max(0.0),
            (average + margin).min(1.0),
            IntervalMethod::HeuristicSmallSample,
        )
    } else {
        let mut sorted: Vec<f64> = samples.iter().map(|(c, _)| *c).collect();
        sorted.sort_by(f64::total_cmp);
        let p10 = percentile(&sorted, 0.10);
        let p90 = percentile(&sorted, 0.90);
        inputs.p10 = Some(round_to(p10, 4));
        inputs.p90 = Some(round_to(p90, 4));
        (p10.min(average), p90.max(average), IntervalMethod::PercentileBands)
    };

    ConfidenceInterval {
        center: round_to(average, 4),
        lower: round_to(lower, 4),
        upper: round_to(upper, 4),
        method,
        n,
        inputs,
    }
}

/// Linear interpolation at rank `p × (n − 1)` of a sorted, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    let fraction = rank - low as f64;
    sorted[low] + (sorted[high] - sorted[low]) * fraction
}
