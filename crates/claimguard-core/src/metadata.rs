//! Metadata size enforcement.
//!
//! Agent metadata is persisted next to the output, so its serialized size
//! is bounded. Oversized metadata is reduced field by field in a fixed
//! priority order: first by truncating a field down to its own budget,
//! then, if that is not enough, by nulling whole fields.
//!
//! Metadata at or under `maxTotalBytes` is returned unchanged apart from
//! `_size_bytes`, the serialized size of the metadata without that key.
//! Once a map is over the limit, it is reduced to leave room for that
//! annotation. Enforcing an already-enforced map changes nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SIZE_KEY: &str = "_size_bytes";
pub const ENFORCED_KEY: &str = "_enforced";

/// Fields reduced first, in this order.
pub const PRIORITY_FIELDS: [&str; 3] = ["context_snapshot", "evidence", "rejected_alternatives"];

/// Object keys kept first when an object is rebuilt under budget.
const PRIORITY_KEYS: [&str; 7] = ["id", "name", "type", "status", "code", "message", "summary"];

/// Room left for the `_size_bytes` annotation when reducing a map.
const SIZE_ANNOTATION_RESERVE: usize = 32;

const ELLIPSIS: &str = "...";

pub const DEFAULT_MAX_TOTAL_BYTES: usize = 10_000;

fn default_max_total_bytes() -> usize {
    DEFAULT_MAX_TOTAL_BYTES
}

fn default_field_budgets() -> BTreeMap<String, usize> {
    BTreeMap::from([
        ("context_snapshot".to_string(), 4000),
        ("evidence".to_string(), 3000),
        ("rejected_alternatives".to_string(), 2000),
    ])
}

/// Byte limits for persisted metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataLimits {
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: usize,

    /// Per-field budgets; fields without one get a quarter of the total
    #[serde(default = "default_field_budgets")]
    pub field_budgets: BTreeMap<String, usize>,
}

impl Default for MetadataLimits {
    fn default() -> Self {
        Self {
            max_total_bytes: default_max_total_bytes(),
            field_budgets: default_field_budgets(),
        }
    }
}

impl MetadataLimits {
    pub fn budget_for(&self, field: &str) -> usize {
        self.field_budgets
            .get(field)
            .copied()
            .unwrap_or(self.max_total_bytes / 4)
    }

    /// Priority fields first, then any other budgeted field by name.
    fn field_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = PRIORITY_FIELDS.to_vec();
        order.extend(
            self.field_budgets
                .keys()
                .map(String::as_str)
                .filter(|k| !PRIORITY_FIELDS.contains(k)),
        );
        order
    }

    /// Target body size once a map is being reduced.
    fn reduction_target(&self) -> usize {
        self.max_total_bytes.saturating_sub(SIZE_ANNOTATION_RESERVE)
    }
}

/// What enforcement did to a metadata map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementReport {
    pub original_bytes: usize,
    pub final_bytes: usize,
    pub truncated: Vec<String>,
    pub removed: Vec<String>,
    /// True when any field was truncated or removed
    pub enforced: bool,
    pub within_limit: bool,
}

/// Bound `metadata` to `limits`, returning the annotated copy.
pub fn enforce_metadata_limits(metadata: &Map<String, Value>, limits: &MetadataLimits) -> Map<String, Value> {
    enforce_with_report(metadata, limits).0
}

/// Bound `metadata` to `limits` and report what changed.
pub fn enforce_with_report(
    metadata: &Map<String, Value>,
    limits: &MetadataLimits,
) -> (Map<String, Value>, EnforcementReport) {
    let mut out = metadata.clone();
    out.remove(SIZE_KEY);

    let mut report = EnforcementReport {
        original_bytes: map_size(&out),
        ..Default::default()
    };

    if report.original_bytes > limits.max_total_bytes {
        let target = limits.reduction_target();
        let order = limits.field_order();
        truncate_fields(&mut out, limits, &order, target, &mut report);
        if map_size(&out) > target {
            remove_fields(&mut out, metadata, &order, target, &mut report);
        }
    }

    if report.enforced {
        out.insert(ENFORCED_KEY.to_string(), Value::Bool(true));
    }

    report.final_bytes = map_size(&out);
    report.within_limit = report.final_bytes <= limits.max_total_bytes;

    if report.enforced {
        tracing::warn!(
            original_bytes = report.original_bytes,
            final_bytes = report.final_bytes,
            truncated = ?report.truncated,
            removed = ?report.removed,
            "Metadata exceeded size limit"
        );
    }

    out.insert(SIZE_KEY.to_string(), Value::from(report.final_bytes));
    (out, report)
}

fn truncate_fields(
    out: &mut Map<String, Value>,
    limits: &MetadataLimits,
    order: &[&str],
    limit: usize,
    report: &mut EnforcementReport,
) {
    for field in order {
        if map_size(out) <= limit {
            return;
        }
        let budget = limits.budget_for(field);
        let Some(value) = out.get(*field) else {
            continue;
        };
        if value.is_null() || value_size(value) <= budget {
            continue;
        }

        let truncated = truncate_value(value, budget);
        out.insert(field.to_string(), truncated);
        out.insert(format!("_{}_truncated", field), Value::Bool(true));
        report.truncated.push(field.to_string());
        report.enforced = true;
    }
}

fn remove_fields(
    out: &mut Map<String, Value>,
    original: &Map<String, Value>,
    order: &[&str],
    limit: usize,
    report: &mut EnforcementReport,
) {
    for field in order {
        if map_size(out) <= limit {
            return;
        }
        match out.get(*field) {
            Some(value) if !value.is_null() => {}
            _ => continue,
        }

        let original_bytes = original.get(*field).map_or(0, value_size);
        out.insert(field.to_string(), Value::Null);
        out.insert(format!("_{}_removed", field), Value::Bool(true));
        out.entry(format!("_{}_original_bytes", field))
            .or_insert_with(|| Value::from(original_bytes));
        report.removed.push(field.to_string());
        report.enforced = true;
    }
}

/// Shrink a single value until its serialized form fits `budget`.
fn truncate_value(value: &Value, budget: usize) -> Value {
    if value_size(value) <= budget {
        return value.clone();
    }
    match value {
        Value::String(text) => Value::String(truncate_string(text, budget)),
        Value::Array(items) => Value::Array(truncate_array(items, budget)),
        Value::Object(map) => Value::Object(truncate_object(map, budget)),
        // Scalars cannot shrink; the removal pass handles them
        other => other.clone(),
    }
}

fn truncate_string(text: &str, budget: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut keep = chars.len();
    loop {
        keep = keep * 9 / 10;
        let mut candidate: String = chars[..keep].iter().collect();
        candidate.push_str(ELLIPSIS);
        if keep == 0 || value_size(&Value::String(candidate.clone())) <= budget {
            return candidate;
        }
    }
}

fn truncate_array(items: &[Value], budget: usize) -> Vec<Value> {
    let mut kept = items.to_vec();
    while kept.len() > 1 && array_size(&kept) > budget {
        kept.pop();
    }
    if kept.len() == 1 && array_size(&kept) > budget {
        // Brackets take two bytes
        let inner = truncate_value(&kept[0], budget.saturating_sub(2));
        kept[0] = inner;
    }
    kept
}

fn truncate_object(map: &Map<String, Value>, budget: usize) -> Map<String, Value> {
    let mut keys: Vec<&str> = PRIORITY_KEYS
        .iter()
        .copied()
        .filter(|k| map.contains_key(*k))
        .collect();
    let mut rest: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|k| !PRIORITY_KEYS.contains(k))
        .collect();
    rest.sort_unstable();
    keys.extend(rest);

    let mut rebuilt = Map::new();
    for key in keys {
        let value = &map[key];
        rebuilt.insert(key.to_string(), value.clone());
        if map_size(&rebuilt) <= budget {
            continue;
        }

        rebuilt.insert(key.to_string(), truncate_value(value, budget / 2));
        if map_size(&rebuilt) > budget {
            rebuilt.remove(key);
        }
    }
    rebuilt
}

fn value_size(value: &Value) -> usize {
    serde_json::to_vec(value).map_or(0, |bytes| bytes.len())
}

fn map_size(map: &Map<String, Value>) -> usize {
    serde_json::to_vec(map).map_or(0, |bytes| bytes.len())
}

fn array_size(items: &[Value]) -> usize {
    serde_json::to_vec(items).map_or(0, |bytes| bytes.len())
}
