//! Parsing policy expressions into condition trees.
//!
//! Wire format of a single condition:
//!
//! ```text
//! {"StringEquals": {"owner": ["admin"]}}
//! {"AND": {"content": [<condition>, <condition>]}}
//! ```
//!
//! A stored policy expression is a JSON array of per-resource-type entries,
//! `[{"system": "bk_test", "type": "job", "expression": <condition>}]`.
//! Leaf fields are qualified to `{system}.{type}.{field}` while parsing.

use serde::Deserialize;
use serde_json::{Map, Value};
use warden_types::AttrValue;

use super::{Condition, Leaf, Operator};
use crate::error::{AbacError, Result};

/// One entry of a stored policy expression.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceExpression {
    pub system: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub expression: Value,
}

impl Condition {
    /// Parses a stored policy expression.
    ///
    /// `""` and `[]` yield [`Condition::Any`]: the action binds no resource.
    /// Several entries are joined with `AND`, since one action can depend on
    /// several resource types at once.
    pub fn from_policy_expression(expression: &str) -> Result<Self> {
        if expression.trim().is_empty() {
            return Ok(Self::Any);
        }

        let entries: Vec<ResourceExpression> = serde_json::from_str(expression)
            .map_err(|e| AbacError::parse(format!("invalid expression json: {e}")))?;

        let mut conditions = entries
            .iter()
            .map(|entry| {
                Self::from_json_with_prefix(
                    &entry.expression,
                    &format!("{}.{}", entry.system, entry.kind),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(match conditions.len() {
            0 => Self::Any,
            1 => conditions.remove(0),
            _ => Self::And(conditions),
        })
    }

    /// Parses one condition whose leaf fields are already qualified.
    pub fn from_json(value: &Value) -> Result<Self> {
        parse_node(value, None)
    }

    /// Parses one condition, qualifying every leaf field with `prefix`.
    pub fn from_json_with_prefix(value: &Value, prefix: &str) -> Result<Self> {
        parse_node(value, Some(prefix))
    }
}

fn single_entry<'a>(map: &'a Map<String, Value>, what: &str) -> Result<(&'a String, &'a Value)> {
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        (None, _) => Err(AbacError::parse(format!("empty {what}"))),
        (Some(_), Some(_)) => Err(AbacError::parse(format!(
            "{what} must have exactly one key, got {}",
            map.len()
        ))),
    }
}

fn parse_node(value: &Value, prefix: Option<&str>) -> Result<Condition> {
    let Value::Object(node) = value else {
        return Err(AbacError::parse(format!("condition must be an object, got {value}")));
    };

    let (tag, options) = single_entry(node, "condition")?;
    let operator = Operator::from_name(tag).ok_or_else(|| AbacError::UnknownOperator {
        operator: tag.clone(),
    })?;

    if operator == Operator::Any {
        return Ok(Condition::Any);
    }

    let Value::Object(options) = options else {
        return Err(AbacError::parse(format!("{operator} options must be an object")));
    };
    let (field, values) = single_entry(options, "operator options")?;
    let Value::Array(values) = values else {
        return Err(AbacError::parse(format!("{operator} values must be an array")));
    };

    match operator {
        Operator::And | Operator::Or => {
            if field != "content" {
                return Err(AbacError::parse(format!(
                    "{operator} condition does not support key {field}"
                )));
            }
            let children = values
                .iter()
                .map(|v| parse_node(v, prefix))
                .collect::<Result<Vec<_>>>()?;
            Ok(if operator == Operator::And {
                Condition::And(children)
            } else {
                Condition::Or(children)
            })
        }
        _ => {
            let key = match prefix {
                Some(prefix) => format!("{prefix}.{field}"),
                None => field.clone(),
            };
            let values = values
                .iter()
                .cloned()
                .map(AttrValue::try_from)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AbacError::parse(format!("{operator} {field}: {e}")))?;
            make_leaf(operator, Leaf::new(key, values))
                .ok_or_else(|| AbacError::parse(format!("{operator} is not a leaf operator")))
        }
    }
}

fn make_leaf(operator: Operator, leaf: Leaf) -> Option<Condition> {
    Some(match operator {
        Operator::StringEquals => Condition::StringEquals(leaf),
        Operator::StringPrefix => Condition::StringPrefix(leaf),
        Operator::StringContains => Condition::StringContains(leaf),
        Operator::NumericEquals => Condition::NumericEquals(leaf),
        Operator::NumericGt => Condition::NumericGt(leaf),
        Operator::NumericGte => Condition::NumericGte(leaf),
        Operator::NumericLt => Condition::NumericLt(leaf),
        Operator::NumericLte => Condition::NumericLte(leaf),
        Operator::Bool => Condition::Bool(leaf),
        Operator::And | Operator::Or | Operator::Any => return None,
    })
}
