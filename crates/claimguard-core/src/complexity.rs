//! Complexity classification for agents and tasks.
//!
//! The tunnel-vision check only applies to work complex enough to have
//! plausible alternatives. Complexity is resolved with strict priority:
//!
//! 1. An explicit `context.complexity` (LOW, MEDIUM, HIGH, CRITICAL)
//! 2. `context.taskType` looked up in the task-type table
//! 3. The agent's type tag looked up in the agent-type table
//! 4. MEDIUM

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::types::{AgentRecord, AuditContext};

/// Totally ordered complexity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ComplexityLevel {
    /// Parse one of the four recognized level names (case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn meets(self, minimum: ComplexityLevel) -> bool {
        self >= minimum
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an inferred complexity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexitySource {
    Context,
    TaskType,
    AgentType,
    Default,
}

lazy_static! {
    static ref TASK_TYPE_COMPLEXITY: HashMap<&'static str, ComplexityLevel> = {
        use ComplexityLevel::*;
        HashMap::from([
            ("retrieval", Low),
            ("lookup", Low),
            ("factual_lookup", Low),
            ("status_check", Low),
            ("formatting", Low),
            ("verification", Low),
            ("validation", Low),
            ("documentation", Medium),
            ("testing", Medium),
            ("code_review", Medium),
            ("bug_fix", Medium),
            ("implementation", Medium),
            ("analysis", Medium),
            ("refactoring", High),
            ("design", High),
            ("architecture", High),
            ("security_review", High),
            ("performance_optimization", High),
            ("root_cause_analysis", High),
            ("schema_change", Critical),
            ("data_migration", Critical),
            ("security_incident", Critical),
        ])
    };

    static ref AGENT_TYPE_COMPLEXITY: HashMap<&'static str, ComplexityLevel> = {
        use ComplexityLevel::*;
        HashMap::from([
            ("VALIDATION", Low),
            ("DOCMON", Low),
            ("GITHUB", Low),
            ("STORIES", Low),
            ("INFO", Low),
            ("DESIGN", Medium),
            ("TESTING", Medium),
            ("ANALYSIS", Medium),
            ("API", Medium),
            ("DEPENDENCY", Medium),
            ("UAT", Medium),
            ("RETRO", Medium),
            ("REGRESSION", Medium),
            ("SECURITY", High),
            ("DATABASE", High),
            ("ARCHITECT", High),
            ("PERFORMANCE", High),
            ("RISK", High),
            ("MIGRATION", Critical),
        ])
    };
}

/// Anything that can name an agent type.
pub trait AgentIdentity {
    /// Uppercased agent-type tag, with "Agent"/"SubAgent" suffixes stripped.
    fn type_tag(&self) -> Option<String>;
}

impl AgentIdentity for str {
    fn type_tag(&self) -> Option<String> {
        normalize_tag(self)
    }
}

impl AgentIdentity for String {
    fn type_tag(&self) -> Option<String> {
        normalize_tag(self)
    }
}

impl AgentIdentity for AgentRecord {
    fn type_tag(&self) -> Option<String> {
        [&self.kind, &self.agent_type, &self.code, &self.name]
            .into_iter()
            .flatten()
            .find_map(|raw| normalize_tag(raw))
    }
}

fn normalize_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_suffix("SubAgent")
        .or_else(|| trimmed.strip_suffix("Agent"))
        .unwrap_or(trimmed)
        .trim();

    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_uppercase())
    }
}

/// Infer complexity for an agent run.
pub fn infer_complexity<A>(agent: &A, context: &AuditContext) -> ComplexityLevel
where
    A: AgentIdentity + ?Sized,
{
    infer_complexity_with_source(agent, context).0
}

/// Infer complexity and report which rule decided it.
pub fn infer_complexity_with_source<A>(
    agent: &A,
    context: &AuditContext,
) -> (ComplexityLevel, ComplexitySource)
where
    A: AgentIdentity + ?Sized,
{
    if let Some(level) = context.complexity.as_deref().and_then(ComplexityLevel::parse) {
        return (level, ComplexitySource::Context);
    }

    if let Some(level) = context
        .task_type
        .as_deref()
        .and_then(|t| TASK_TYPE_COMPLEXITY.get(t.trim().to_lowercase().as_str()))
    {
        return (*level, ComplexitySource::TaskType);
    }

    if let Some(level) = agent
        .type_tag()
        .and_then(|tag| AGENT_TYPE_COMPLEXITY.get(tag.as_str()).copied())
    {
        return (level, ComplexitySource::AgentType);
    }

    (ComplexityLevel::Medium, ComplexitySource::Default)
}

/// True when `level` is at least `minimum`.
pub fn meets_complexity_threshold(level: ComplexityLevel, minimum: ComplexityLevel) -> bool {
    level.meets(minimum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(ComplexityLevel::Low < ComplexityLevel::Medium);
        assert!(ComplexityLevel::Medium < ComplexityLevel::High);
        assert!(ComplexityLevel::High < ComplexityLevel::Critical);
        assert!(meets_complexity_threshold(ComplexityLevel::High, ComplexityLevel::Medium));
        assert!(meets_complexity_threshold(ComplexityLevel::Medium, ComplexityLevel::Medium));
        assert!(!meets_complexity_threshold(ComplexityLevel::Low, ComplexityLevel::Medium));
    }

    #[test]
    fn test_infer_from_agent_type() {
        let context = AuditContext::default();
        let security = AgentRecord::default().with_type("SECURITY");
        let validation = AgentRecord::default().with_type("VALIDATION");

        assert_eq!(infer_complexity(&security, &context), ComplexityLevel::High);
        assert_eq!(infer_complexity(&validation, &context), ComplexityLevel::Low);
    }

    #[test]
    fn test_context_complexity_wins() {
        let context = AuditContext::new()
            .with_complexity("LOW")
            .with_task_type("architecture");
        let (level, source) = infer_complexity_with_source("SECURITY", &context);
        assert_eq!(level, ComplexityLevel::Low);
        assert_eq!(source, ComplexitySource::Context);
    }

    #[test]
    fn test_unrecognized_context_complexity_ignored() {
        let context = AuditContext::new()
            .with_complexity("EXTREME")
            .with_task_type("data_migration");
        let (level, source) = infer_complexity_with_source("VALIDATION", &context);
        assert_eq!(level, ComplexityLevel::Critical);
        assert_eq!(source, ComplexitySource::TaskType);
    }

    #[test]
    fn test_task_type_before_agent_type() {
        let context = AuditContext::new().with_task_type("retrieval");
        assert_eq!(infer_complexity("SECURITY", &context), ComplexityLevel::Low);
    }

    #[test]
    fn test_name_suffix_stripped() {
        let context = AuditContext::default();
        assert_eq!(infer_complexity("SecuritySubAgent", &context), ComplexityLevel::High);
        assert_eq!(infer_complexity("DatabaseAgent", &context), ComplexityLevel::High);

        let record = AgentRecord::new("ValidationAgent");
        assert_eq!(record.type_tag().as_deref(), Some("VALIDATION"));
    }

    #[test]
    fn test_type_field_preferred_over_name() {
        let record = AgentRecord::new("ValidationAgent").with_type("SECURITY");
        assert_eq!(record.type_tag().as_deref(), Some("SECURITY"));
    }

    #[test]
    fn test_unknown_defaults_to_medium() {
        let (level, source) = infer_complexity_with_source("Mystery", &AuditContext::default());
        assert_eq!(level, ComplexityLevel::Medium);
        assert_eq!(source, ComplexitySource::Default);

        let (level, _) = infer_complexity_with_source("", &AuditContext::default());
        assert_eq!(level, ComplexityLevel::Medium);
    }
}
