//! Metadata filters for search queries.
//!
//! A [`FilterClause`] is a post-result predicate over record metadata:
//! `must` conditions are AND-ed, `must_not` conditions are AND-NOT-ed.
//! Operators: `eq`, `ne`, `gt`, `lt`, `gte`, `lte`, `in`.

use crate::record::MetadataValue;
use serde::Deserialize;
use std::collections::HashMap;

/// Metadata filter clause with `must` (AND) and `must_not` (AND-NOT) conditions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterClause {
    #[serde(default)]
    pub must: Vec<FilterCondition>,
    #[serde(default)]
    pub must_not: Vec<FilterCondition>,
}

/// A single condition on one metadata field.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub op: FilterOperator,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub values: Option<Vec<serde_json::Value>>,
}

/// Comparison operator for filter conditions.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
}

/// Whether `metadata` satisfies every `must` and no `must_not` condition.
pub fn matches_filter(metadata: &HashMap<String, MetadataValue>, filter: &FilterClause) -> bool {
    filter.must.iter().all(|c| evaluate(metadata, c))
        && !filter.must_not.iter().any(|c| evaluate(metadata, c))
}

fn evaluate(metadata: &HashMap<String, MetadataValue>, cond: &FilterCondition) -> bool {
    let Some(field_value) = metadata.get(&cond.field) else {
        return false;
    };

    use std::cmp::Ordering;
    match cond.op {
        FilterOperator::Eq => cond.value.as_ref().is_some_and(|v| json_eq(field_value, v)),
        FilterOperator::Ne => cond.value.as_ref().is_some_and(|v| !json_eq(field_value, v)),
        FilterOperator::Gt => cmp_is(field_value, cond.value.as_ref(), |o| o == Ordering::Greater),
        FilterOperator::Lt => cmp_is(field_value, cond.value.as_ref(), |o| o == Ordering::Less),
        FilterOperator::Gte => cmp_is(field_value, cond.value.as_ref(), |o| o != Ordering::Less),
        FilterOperator::Lte => cmp_is(field_value, cond.value.as_ref(), |o| o != Ordering::Greater),
        FilterOperator::In => cond
            .values
            .as_ref()
            .is_some_and(|vs| vs.iter().any(|v| json_eq(field_value, v))),
    }
}

fn cmp_is(
    meta: &MetadataValue,
    json: Option<&serde_json::Value>,
    pred: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    json.and_then(|v| json_cmp(meta, v)).is_some_and(pred)
}

/// Equality between a metadata value and a JSON literal.
fn json_eq(meta: &MetadataValue, json: &serde_json::Value) -> bool {
    match (meta, json) {
        (MetadataValue::String(s), serde_json::Value::String(js)) => s == js,
        (MetadataValue::Boolean(b), serde_json::Value::Bool(jb)) => b == jb,
        (MetadataValue::Integer(i), serde_json::Value::Number(n)) => {
            n.as_i64().is_some_and(|ni| *i == ni)
                || n.as_f64()
                    .is_some_and(|nf| (*i as f64 - nf).abs() < f64::EPSILON)
        }
        (MetadataValue::Float(f), serde_json::Value::Number(n)) => {
            n.as_f64().is_some_and(|nf| (*f - nf).abs() < f64::EPSILON)
        }
        _ => false,
    }
}

/// Numeric ordering between a metadata value and a JSON number.
/// Non-numeric operands are incomparable.
fn json_cmp(meta: &MetadataValue, json: &serde_json::Value) -> Option<std::cmp::Ordering> {
    let meta_f = match meta {
        MetadataValue::Integer(i) => *i as f64,
        MetadataValue::Float(f) => *f,
        _ => return None,
    };
    meta_f.partial_cmp(&json.as_f64()?)
}
