//! Audit configuration parsing from YAML/JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::policy::FailurePolicy;
use super::schema::check_document;
use crate::checks::patterns::{
    PatternTable, DEFAULT_CERTAINTY_PHRASES, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_HEDGE_PHRASES,
};
use crate::complexity::{AgentIdentity, ComplexityLevel};
use crate::evidence::{DEFAULT_HIGH_CONFIDENCE_THRESHOLD, DEFAULT_MIN_EVIDENCE_SCORE};
use crate::metadata::MetadataLimits;
use crate::types::AgentRecord;

/// Task types that never need alternatives.
pub const DEFAULT_EXEMPT_TASK_TYPES: [&str; 8] = [
    "retrieval",
    "lookup",
    "factual_lookup",
    "verification",
    "validation",
    "formatting",
    "status_check",
    "deterministic",
];

/// Errors that can occur when loading or resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Config schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Evidence-vs-confidence and certainty-language check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimEvidenceConfig {
    pub enabled: bool,
    pub min_evidence_score: f64,
    /// Evidence score at or above which a finding earns a reward
    pub strong_evidence_threshold: f64,
    pub penalize_unsupported_certainty: bool,
    pub certainty_patterns: Vec<String>,
    /// Regexes; certainty phrases inside a match are ignored
    pub exclude_patterns: Vec<String>,
}

impl Default for ClaimEvidenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_evidence_score: DEFAULT_MIN_EVIDENCE_SCORE,
            strong_evidence_threshold: 0.8,
            penalize_unsupported_certainty: true,
            certainty_patterns: strings(&DEFAULT_CERTAINTY_PHRASES),
            exclude_patterns: strings(&DEFAULT_EXCLUDE_PATTERNS),
        }
    }
}

/// Alternatives-considered check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TunnelVisionConfig {
    pub enabled: bool,
    pub min_complexity: ComplexityLevel,
    pub exempt_task_types: Vec<String>,
    pub min_rejected_alternatives: usize,
    /// Record metadata flag that marks the task as deterministic
    pub bypass_metadata_key: String,
}

impl Default for TunnelVisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_complexity: ComplexityLevel::Medium,
            exempt_task_types: strings(&DEFAULT_EXEMPT_TASK_TYPES),
            min_rejected_alternatives: 1,
            bypass_metadata_key: "deterministic_bypass".to_string(),
        }
    }
}

/// Hedging-language check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibratedUncertaintyConfig {
    pub enabled: bool,
    pub hedge_patterns: Vec<String>,
    pub max_uncalibrated_hedges: usize,
    /// A `missingEvidence` hedge is calibrated only below this score
    pub missing_evidence_threshold: f64,
}

impl Default for CalibratedUncertaintyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hedge_patterns: strings(&DEFAULT_HEDGE_PHRASES),
            max_uncalibrated_hedges: 2,
            missing_evidence_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckSettings {
    pub claim_evidence: ClaimEvidenceConfig,
    pub tunnel_vision: TunnelVisionConfig,
    pub calibrated_uncertainty: CalibratedUncertaintyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    pub pass_score: f64,
    pub high_confidence_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pass_score: 70.0,
            high_confidence_threshold: DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Signed score deltas. Penalties are negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringWeights {
    pub high_confidence_without_evidence_penalty: f64,
    pub unsupported_certainty_penalty: f64,
    pub strong_evidence_bonus: f64,
    pub tunnel_vision_penalty: f64,
    pub calibrated_uncertainty_bonus: f64,
    pub excessive_hedging_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            high_confidence_without_evidence_penalty: -20.0,
            unsupported_certainty_penalty: -15.0,
            strong_evidence_bonus: 5.0,
            tunnel_vision_penalty: -20.0,
            calibrated_uncertainty_bonus: 5.0,
            excessive_hedging_penalty: -15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub escalate_after_retries: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            escalate_after_retries: 2,
        }
    }
}

/// Complete audit configuration.
///
/// Every field has a default, so partial documents are valid. Unknown keys
/// are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub failure_policy: FailurePolicy,
    pub checks: CheckSettings,
    pub thresholds: Thresholds,
    pub scoring: ScoringWeights,
    pub retry: RetrySettings,
    pub metadata_limits: MetadataLimits,

    /// Partial documents merged over this config, keyed by agent type or name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub agent_overrides: BTreeMap<String, Value>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_policy: FailurePolicy::default(),
            checks: CheckSettings::default(),
            thresholds: Thresholds::default(),
            scoring: ScoringWeights::default(),
            retry: RetrySettings::default(),
            metadata_limits: MetadataLimits::default(),
            agent_overrides: BTreeMap::new(),
        }
    }
}

impl AuditConfig {
    /// Parse a config from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_document(value)
    }

    /// Parse a config from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_document(value)
    }

    /// Parse a config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a config file, choosing the format by extension (`.json`, else YAML).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_yaml_file(path)
        }
    }

    /// Validate a raw document against the schema, then deserialize it.
    pub fn from_document(value: Value) -> Result<Self, ConfigError> {
        check_document(&value)?;
        let config: AuditConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// The config as a JSON document.
    pub fn to_value(&self) -> Result<Value, ConfigError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Key in `agentOverrides` that applies to `record`, if any.
    ///
    /// Tried in order: type, agentType, name, code, then the normalized type tag.
    pub fn override_key(&self, record: &AgentRecord) -> Option<&str> {
        if self.agent_overrides.is_empty() {
            return None;
        }

        let candidates = [&record.kind, &record.agent_type, &record.name, &record.code];
        candidates
            .into_iter()
            .flatten()
            .chain(record.type_tag().as_ref())
            .find_map(|key| self.agent_overrides.get_key_value(key.as_str()))
            .map(|(key, _)| key.as_str())
    }

    /// Build the effective config for `record`.
    ///
    /// The agent's override and then `caller_override` are deep-merged over
    /// a copy of this config. `self` is never modified.
    pub fn resolve(
        &self,
        record: &AgentRecord,
        caller_override: Option<&Value>,
    ) -> Result<AuditConfig, ConfigError> {
        let agent_override = self
            .override_key(record)
            .and_then(|key| self.agent_overrides.get(key));

        self.merged_with([agent_override, caller_override].into_iter().flatten())
    }

    /// Deep-merge partial documents over a copy of this config, in order.
    pub fn merged_with<'a, I>(&self, overlays: I) -> Result<AuditConfig, ConfigError>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut overlays = overlays.into_iter().peekable();
        if overlays.peek().is_none() {
            return Ok(self.clone());
        }

        let mut document = self.to_value()?;
        for overlay in overlays {
            if !overlay.is_object() {
                return Err(ConfigError::ValidationError(
                    "config overrides must be objects".to_string(),
                ));
            }
            deep_merge(&mut document, overlay);
        }

        let merged: AuditConfig = serde_json::from_value(document)?;
        merged.validate()?;
        Ok(merged)
    }

    /// Semantic checks the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit_interval = [
            ("thresholds.highConfidenceThreshold", self.thresholds.high_confidence_threshold),
            ("checks.claimEvidence.minEvidenceScore", self.checks.claim_evidence.min_evidence_score),
            (
                "checks.claimEvidence.strongEvidenceThreshold",
                self.checks.claim_evidence.strong_evidence_threshold,
            ),
            (
                "checks.calibratedUncertainty.missingEvidenceThreshold",
                self.checks.calibrated_uncertainty.missing_evidence_threshold,
            ),
        ];
        for (field, value) in unit_interval {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be within [0, 1], got {}",
                    field, value
                )));
            }
        }

        if !self.thresholds.pass_score.is_finite() {
            return Err(ConfigError::ValidationError(
                "thresholds.passScore must be a finite number".to_string(),
            ));
        }

        if self.metadata_limits.max_total_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "metadataLimits.maxTotalBytes must be positive".to_string(),
            ));
        }

        for (key, overlay) in &self.agent_overrides {
            if !overlay.is_object() {
                return Err(ConfigError::ValidationError(format!(
                    "agentOverrides.{} must be an object",
                    key
                )));
            }
        }

        PatternTable::from_config(self).map(|_| ())
    }
}

/// Merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value replaces the base
/// value, arrays included. `null` overlay values leave the base untouched.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay.clone(),
    }
}
