//! Attribute values and attribute bags.
//!
//! Resource, subject and environment attributes arrive as loosely typed JSON.
//! [`AttrValue`] closes that space to the scalar and list shapes the
//! condition evaluator understands; nested objects are rejected on
//! conversion instead of being carried around as opaque blobs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TypeError;

// ============================================================================
// AttrValue
// ============================================================================

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// JSON `null`.
    Null,
    /// A boolean flag.
    Bool(bool),
    /// An integral number.
    Int(i64),
    /// A non-integral number, or an integer outside the `i64` range.
    Float(f64),
    /// A string.
    String(String),
    /// A homogeneous or mixed list of values.
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an integral value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the flag if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the elements if this is a list.
    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the elements as strings if this is a list made only of strings.
    pub fn as_str_list(&self) -> Option<Vec<&str>> {
        self.as_list()?.iter().map(AttrValue::as_str).collect()
    }

    /// Numeric equality across integer and float representations.
    ///
    /// Returns `None` when either side is not a number.
    pub fn numeric_eq(&self, other: &AttrValue) -> Option<bool> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a == b),
            _ => Some((self.as_f64()? - other.as_f64()?).abs() < f64::EPSILON),
        }
    }

    /// Numeric ordering across integer and float representations.
    ///
    /// Returns `None` when either side is not a number or a float is NaN.
    pub fn numeric_cmp(&self, other: &AttrValue) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    /// The name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<serde_json::Value> for AttrValue {
    type Error = TypeError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().ok_or_else(|| TypeError::Unsupported {
                    found: n.to_string(),
                })?),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(_) => {
                return Err(TypeError::Unsupported {
                    found: "object".to_string(),
                });
            }
        })
    }
}

impl From<AttrValue> for serde_json::Value {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::Null => Self::Null,
            AttrValue::Bool(b) => Self::Bool(b),
            AttrValue::Int(n) => Self::from(n),
            AttrValue::Float(x) => {
                serde_json::Number::from_f64(x).map_or(Self::Null, Self::Number)
            }
            AttrValue::String(s) => Self::String(s),
            AttrValue::List(items) => Self::Array(items.into_iter().map(Into::into).collect()),
        }
    }
}

// ============================================================================
// Attribute
// ============================================================================

/// An attribute bag: field name to value, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attribute(BTreeMap<String, AttrValue>);

impl Attribute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn delete(&mut self, key: &str) -> Option<AttrValue> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set(key, value);
        self
    }
}

impl FromIterator<(String, AttrValue)> for Attribute {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Attribute {
    type Item = (String, AttrValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, AttrValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl TryFrom<serde_json::Value> for Attribute {
    type Error = TypeError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| Ok((k, AttrValue::try_from(v)?)))
                .collect(),
            serde_json::Value::Null => Ok(Self::new()),
            other => Err(TypeError::NotAnObject {
                found: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion_keeps_integers_integral() {
        let value = AttrValue::try_from(json!([1, 2.5, "a", true, null])).unwrap();
        assert_eq!(
            value,
            AttrValue::List(vec![
                AttrValue::Int(1),
                AttrValue::Float(2.5),
                AttrValue::String("a".into()),
                AttrValue::Bool(true),
                AttrValue::Null,
            ])
        );
        assert_eq!(serde_json::Value::from(value), json!([1, 2.5, "a", true, null]));
    }

    #[test]
    fn test_nested_object_is_a_type_error() {
        let err = AttrValue::try_from(json!({"a": 1})).unwrap_err();
        assert!(matches!(err, TypeError::Unsupported { .. }));

        let err = AttrValue::try_from(json!([1, {"a": 1}])).unwrap_err();
        assert!(matches!(err, TypeError::Unsupported { .. }));
    }

    #[test]
    fn test_typed_accessors_do_not_coerce() {
        let n = AttrValue::Int(7);
        assert_eq!(n.as_i64(), Some(7));
        assert_eq!(n.as_str(), None);
        assert_eq!(n.as_bool(), None);

        let s = AttrValue::from("7");
        assert_eq!(s.as_i64(), None);
        assert_eq!(s.as_str(), Some("7"));

        let mixed = AttrValue::from(vec![AttrValue::from("a"), AttrValue::Int(1)]);
        assert_eq!(mixed.as_str_list(), None);
        let strings = AttrValue::from(vec!["a", "b"]);
        assert_eq!(strings.as_str_list(), Some(vec!["a", "b"]));
    }

    #[test]
    fn test_numeric_comparison_crosses_int_and_float() {
        assert_eq!(AttrValue::Int(2).numeric_eq(&AttrValue::Float(2.0)), Some(true));
        assert_eq!(
            AttrValue::Int(2).numeric_cmp(&AttrValue::Float(2.5)),
            Some(std::cmp::Ordering::Less)
        );
        assert_eq!(AttrValue::from("2").numeric_eq(&AttrValue::Int(2)), None);
    }

    #[test]
    fn test_attribute_from_json_object() {
        let attrs = Attribute::try_from(json!({"owner": "admin", "level": 3})).unwrap();
        assert_eq!(attrs.get("owner"), Some(&AttrValue::from("admin")));
        assert_eq!(attrs.keys().collect::<Vec<_>>(), vec!["level", "owner"]);

        assert!(Attribute::try_from(json!([1])).is_err());
        assert!(Attribute::try_from(json!(null)).unwrap().is_empty());
    }

    #[test]
    fn test_untagged_deserialize() {
        let attrs: Attribute =
            serde_json::from_str(r#"{"a": 1, "b": [true, "x"], "c": 1.5}"#).unwrap();
        assert_eq!(attrs.get("a"), Some(&AttrValue::Int(1)));
        assert_eq!(
            attrs.get("b"),
            Some(&AttrValue::List(vec![true.into(), "x".into()]))
        );
        assert_eq!(attrs.get("c"), Some(&AttrValue::Float(1.5)));
    }
}
