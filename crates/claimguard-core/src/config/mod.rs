//! Audit configuration and failure policy.
//!
//! Configuration is structured data validated against JSON Schema. This
//! module handles loading YAML/JSON configs, resolving per-agent overrides,
//! and mapping a failed audit to an action.

mod parser;
mod policy;
mod schema;

pub use parser::{
    deep_merge, AuditConfig, CalibratedUncertaintyConfig, CheckSettings, ClaimEvidenceConfig,
    ConfigError, RetrySettings, ScoringWeights, Thresholds, TunnelVisionConfig,
    DEFAULT_EXEMPT_TASK_TYPES,
};
pub use policy::{
    resolve_action, ActionDecision, AuditAction, FailurePolicy, BACKOFF_TABLE_MS,
    ESCALATION_FALLBACK_MS, RETRY_FALLBACK_MS,
};
pub use schema::{check_document, schema_violations};
