//! Rendering residual conditions as a client-facing filter expression.
//!
//! Output cells look like `{"op": "eq", "field": "job.id", "value": "1"}`;
//! composites are `{"op": "AND" | "OR", "content": [...]}`. The match-all
//! filter is `{"op": "any", "field": "", "value": []}`.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use warden_types::AttrValue;

use crate::condition::{Condition, Leaf};
use crate::error::{AbacError, Result};

/// The filter that matches everything.
pub fn any_expression() -> Value {
    json!({"op": "any", "field": "", "value": []})
}

/// The filter returned when no policy can ever pass.
pub fn empty_expression() -> Value {
    Value::Object(Map::new())
}

impl Condition {
    /// Translates this condition into a filter cell.
    ///
    /// With `with_system == false` the leading `{system}.` of each field key
    /// is dropped, so `bk_test.job.id` becomes `job.id`.
    pub fn translate(&self, with_system: bool) -> Result<Value> {
        match self {
            Self::Any => Ok(any_expression()),
            Self::And(children) => composite("AND", children, with_system),
            Self::Or(children) => composite("OR", children, with_system),

            Self::StringEquals(leaf) | Self::NumericEquals(leaf) => {
                let field = field_name(leaf, with_system);
                match leaf.values.as_slice() {
                    [] => Err(empty_values(leaf)),
                    [single] => Ok(cell("eq", field, single.clone().into())),
                    many => Ok(cell("in", field, to_json_list(many))),
                }
            }
            Self::StringPrefix(leaf) => one_cell_per_value("starts_with", leaf, with_system),
            Self::StringContains(leaf) => one_cell_per_value("string_contains", leaf, with_system),

            Self::NumericGt(leaf) => single_value("gt", leaf, with_system),
            Self::NumericGte(leaf) => single_value("gte", leaf, with_system),
            Self::NumericLt(leaf) => single_value("lt", leaf, with_system),
            Self::NumericLte(leaf) => single_value("lte", leaf, with_system),
            Self::Bool(leaf) => single_value("eq", leaf, with_system),
        }
    }
}

/// Translates a set of residual conditions, OR'd together.
///
/// - no conditions: `{}`
/// - any condition translating to `any`: `any`
/// - `eq`/`in` cells on the same field are merged into one `in`
pub fn conditions_to_expression(conditions: &[Condition]) -> Result<Value> {
    let mut content = Vec::with_capacity(conditions.len());
    for condition in conditions {
        let expr = condition.translate(false)?;
        if op_of(&expr) == Some("any") {
            return Ok(any_expression());
        }
        content.push(expr);
    }

    if content.len() > 1 {
        content = merge_same_field(content);
    }

    Ok(match content.len() {
        0 => empty_expression(),
        1 => content.remove(0),
        _ => json!({"op": "OR", "content": content}),
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn cell(op: &str, field: String, value: Value) -> Value {
    json!({"op": op, "field": field, "value": value})
}

fn op_of(expr: &Value) -> Option<&str> {
    expr.get("op").and_then(Value::as_str)
}

fn to_json_list(values: &[AttrValue]) -> Value {
    Value::Array(values.iter().cloned().map(Value::from).collect())
}

fn empty_values(leaf: &Leaf) -> AbacError {
    AbacError::translate(format!("{} value must not be empty", leaf.key))
}

fn composite(op: &str, children: &[Condition], with_system: bool) -> Result<Value> {
    let content = children
        .iter()
        .map(|c| c.translate(with_system))
        .collect::<Result<Vec<_>>>()?;
    Ok(json!({"op": op, "content": content}))
}

/// `a starts_with [x, y]` is not expressible; emit `a starts_with x OR a starts_with y`.
fn one_cell_per_value(op: &str, leaf: &Leaf, with_system: bool) -> Result<Value> {
    let field = field_name(leaf, with_system);
    let mut cells: Vec<Value> = leaf
        .values
        .iter()
        .map(|v| cell(op, field.clone(), v.clone().into()))
        .collect();

    match cells.len() {
        0 => Err(empty_values(leaf)),
        1 => Ok(cells.remove(0)),
        _ => Ok(json!({"op": "OR", "content": cells})),
    }
}

fn single_value(op: &str, leaf: &Leaf, with_system: bool) -> Result<Value> {
    match leaf.values.as_slice() {
        [] => Err(empty_values(leaf)),
        [single] => Ok(cell(op, field_name(leaf, with_system), single.clone().into())),
        many => Err(AbacError::translate(format!(
            "{op} does not support multiple values, got {}",
            many.len()
        ))),
    }
}

fn field_name(leaf: &Leaf, with_system: bool) -> String {
    if with_system {
        leaf.key.clone()
    } else {
        remove_system(&leaf.key).to_string()
    }
}

/// Drops the leading `{system}.` when the key has at least two dots.
fn remove_system(key: &str) -> &str {
    match (key.find('.'), key.rfind('.')) {
        (Some(first), Some(last)) if first != last => &key[first + 1..],
        _ => key,
    }
}

/// Merges `eq` and `in` cells that share a field into one `in`, keeping
/// first-seen field order after the unmergeable cells.
fn merge_same_field(content: Vec<Value>) -> Vec<Value> {
    let mut merged: IndexMap<String, Vec<Value>> = IndexMap::new();
    let mut out = Vec::with_capacity(content.len());

    for expr in content {
        let field = match (op_of(&expr), expr.get("field").and_then(Value::as_str)) {
            (Some("eq" | "in"), Some(field)) => field.to_string(),
            _ => {
                out.push(expr);
                continue;
            }
        };
        merged.entry(field).or_default().push(expr);
    }

    for (field, mut exprs) in merged {
        if exprs.len() == 1 {
            out.extend(exprs.pop());
            continue;
        }

        let mut values = Vec::new();
        for mut expr in exprs {
            let is_in = op_of(&expr) == Some("in");
            match expr.get_mut("value").map(Value::take) {
                Some(Value::Array(items)) if is_in => values.extend(items),
                Some(value) => values.push(value),
                None => {}
            }
        }
        out.push(cell("in", field, Value::Array(values)));
    }
    out
}
