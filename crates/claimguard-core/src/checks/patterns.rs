//! Phrase tables shared by the checks.
//!
//! Certainty phrases, exclusion patterns, and hedge phrases come from the
//! configuration. They are compiled once per configuration into a
//! [`PatternTable`]; the default table is built lazily on first use.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::{AuditConfig, ConfigError};

/// Phrases that assert certainty.
pub const DEFAULT_CERTAINTY_PHRASES: [&str; 10] = [
    "definitely",
    "certainly",
    "obviously",
    "clearly",
    "guaranteed",
    "undoubtedly",
    "without a doubt",
    "absolutely",
    "proven",
    "100%",
];

/// Text where certainty language is not a claim: quotations and negations.
pub const DEFAULT_EXCLUDE_PATTERNS: [&str; 4] = [
    r#""[^"]*""#,
    r"“[^”]*”",
    r"\b(not|never|isn't|is not|cannot be|can't be)\s+(definitely|certainly|clearly|obviously|guaranteed|absolutely)\b",
    r"\bmay not be\b",
];

/// Phrases that hedge a claim.
pub const DEFAULT_HEDGE_PHRASES: [&str; 14] = [
    "might",
    "may",
    "possibly",
    "perhaps",
    "uncertain",
    "unclear",
    "unsure",
    "not sure",
    "likely",
    "could be",
    "potentially",
    "appears to",
    "seems",
    "it is possible",
];

lazy_static! {
    /// Table compiled from the default phrase lists.
    pub static ref DEFAULT_PATTERNS: PatternTable = PatternTable::compile(
        &DEFAULT_CERTAINTY_PHRASES,
        &DEFAULT_EXCLUDE_PATTERNS,
        &DEFAULT_HEDGE_PHRASES,
    )
    .expect("default patterns compile");
}

/// A certainty phrase and its whole-word matcher.
#[derive(Debug, Clone)]
struct CertaintyPattern {
    phrase: String,
    regex: Regex,
}

/// Compiled phrase lists.
#[derive(Debug, Clone)]
pub struct PatternTable {
    certainty: Vec<CertaintyPattern>,
    exclusions: Vec<Regex>,
    hedges: Vec<String>,
}

impl PatternTable {
    /// Compile phrase lists.
    ///
    /// Certainty phrases match whole words, case-insensitively. Exclusions
    /// are case-insensitive regexes. Hedges are case-insensitive substrings.
    pub fn compile<S: AsRef<str>>(
        certainty: &[S],
        exclusions: &[S],
        hedges: &[S],
    ) -> Result<Self, ConfigError> {
        let certainty = certainty
            .iter()
            .map(|phrase| {
                let phrase = phrase.as_ref();
                let regex = compile_regex(&certainty_regex(phrase), phrase)?;
                Ok(CertaintyPattern {
                    phrase: phrase.to_string(),
                    regex,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let exclusions = exclusions
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                compile_regex(&format!("(?i){}", pattern), pattern)
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let hedges = hedges
            .iter()
            .map(|h| h.as_ref().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();

        Ok(Self {
            certainty,
            exclusions,
            hedges,
        })
    }

    /// Compile the phrase lists of a configuration.
    pub fn from_config(config: &AuditConfig) -> Result<Self, ConfigError> {
        let claim = &config.checks.claim_evidence;
        Self::compile(
            claim.certainty_patterns.as_slice(),
            claim.exclude_patterns.as_slice(),
            config.checks.calibrated_uncertainty.hedge_patterns.as_slice(),
        )
    }

    /// Certainty phrases asserted in `text`.
    ///
    /// Exclusions are not applied here; callers check [`Self::is_excluded`]
    /// first and skip the whole text when it matches.
    pub fn certainty_matches(&self, text: &str) -> Vec<String> {
        self.certainty
            .iter()
            .filter(|p| p.regex.is_match(text))
            .map(|p| p.phrase.clone())
            .collect()
    }

    /// Hedge phrases contained in `text`.
    pub fn hedge_matches(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.hedges
            .iter()
            .filter(|h| lowered.contains(h.as_str()))
            .cloned()
            .collect()
    }

    /// True when any exclusion pattern matches `text`.
    pub fn is_excluded(&self, text: &str) -> bool {
        self.exclusions.iter().any(|r| r.is_match(text))
    }
}

impl Default for PatternTable {
    fn default() -> Self {
        DEFAULT_PATTERNS.clone()
    }
}

/// Whole-word, case-insensitive matcher for a phrase.
///
/// Word boundaries are only added at ends that are word characters, so
/// phrases such as "100%" still match.
fn certainty_regex(phrase: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let body = regex::escape(phrase.trim()).replace(' ', r"\s+");

    let mut pattern = String::from("(?i)");
    if is_word(phrase.trim().chars().next()) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&body);
    if is_word(phrase.trim().chars().last()) {
        pattern.push_str(r"\b");
    }
    pattern
}

fn compile_regex(source: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(source).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certainty_whole_word() {
        let table = PatternTable::default();
        assert_eq!(table.certainty_matches("This is Definitely the cause"), vec!["definitely"]);
        assert!(table.certainty_matches("The proven_path variable").is_empty());
        assert!(table.certainty_matches("Unclearly worded").is_empty());
    }

    #[test]
    fn test_percent_phrase_matches() {
        let table = PatternTable::default();
        assert_eq!(table.certainty_matches("We are 100% sure"), vec!["100%"]);
    }

    #[test]
    fn test_multi_word_phrase_spans_whitespace() {
        let table = PatternTable::default();
        assert_eq!(
            table.certainty_matches("This is, without  a doubt, the bug"),
            vec!["without a doubt"]
        );
    }

    #[test]
    fn test_quoted_and_negated_phrases_excluded() {
        let table = PatternTable::default();
        assert!(table.is_excluded(r#"The docs say "definitely safe" here"#));
        assert!(table.is_excluded("This is not definitely a leak"));
        assert!(table.is_excluded("It may not be related"));
        // Exclusion covers the whole text, not just the quoted span
        assert!(table.is_excluded(r#"Quoted "maybe" but clearly broken"#));
        assert!(!table.is_excluded("This is clearly broken"));
    }

    #[test]
    fn test_hedges_are_substrings() {
        let table = PatternTable::default();
        let hedges = table.hedge_matches("This MIGHT be a leak, possibly in the cache");
        assert!(hedges.contains(&"might".to_string()));
        assert!(hedges.contains(&"possibly".to_string()));
        assert!(table.hedge_matches("The index is missing").is_empty());
    }

    #[test]
    fn test_invalid_exclusion_reported() {
        let result = PatternTable::compile(&["sure"], &["[unclosed"], &["might"]);
        match result {
            Err(ConfigError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "[unclosed"),
            other => panic!("expected InvalidPattern, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_custom_phrase_is_escaped() {
        let table = PatternTable::compile(&["for sure (really)"], &[], &[]).unwrap();
        assert_eq!(table.certainty_matches("It works for sure (really)"), vec!["for sure (really)"]);
    }
}
