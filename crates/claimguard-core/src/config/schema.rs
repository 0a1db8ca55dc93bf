//! JSON Schema checks for audit configuration documents.
//!
//! Documents are checked against `schema/audit-config.schema.json` before
//! deserialization, so a type error is reported with its JSON pointer.
//! `failurePolicy` is only typed as a string here: unrecognized policies
//! load and resolve to `CONTINUE_WITH_WARNING`.

use std::sync::OnceLock;

use serde_json::Value;

use super::ConfigError;

const AUDIT_CONFIG_SCHEMA: &str = include_str!("../../../../schema/audit-config.schema.json");

/// Compiled once per process. A failure is kept as its message so every
/// caller sees the same error.
static VALIDATOR: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn validator() -> Result<&'static jsonschema::Validator, ConfigError> {
    VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(AUDIT_CONFIG_SCHEMA)
                .map_err(|e| format!("embedded schema is not JSON: {}", e))?;
            jsonschema::options()
                .build(&schema)
                .map_err(|e| format!("embedded schema does not compile: {}", e))
        })
        .as_ref()
        .map_err(|reason| ConfigError::SchemaUnavailable(reason.clone()))
}

/// Every violation in `document`, as `"<message> at <pointer>"`.
pub fn schema_violations(document: &Value) -> Result<Vec<String>, ConfigError> {
    Ok(validator()?
        .iter_errors(document)
        .map(|violation| format!("{} at {}", violation, violation.instance_path))
        .collect())
}

/// Fail with [`ConfigError::SchemaError`] unless `document` conforms.
pub fn check_document(document: &Value) -> Result<(), ConfigError> {
    let violations = schema_violations(document)?;
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::SchemaError(violations))
    }
}
