//! Policy condition trees.
//!
//! A condition is a closed tree of composites (`AND`, `OR`, `Any`) and leaf
//! predicates over dotted attribute keys. Trees are immutable after parsing
//! and shared behind `Arc` across requests.
//!
//! Leaves use "any-of" semantics: when the attribute is a list, the leaf
//! passes if any element matches any literal; otherwise the scalar is tested
//! against each literal. An attribute the context does not know always
//! evaluates false.

mod parse;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use warden_types::{AttrValue, IAM_PATH_SUFFIX};

pub use parse::ResourceExpression;

// ============================================================================
// Attribute Lookup
// ============================================================================

/// Read access to the attributes a condition is evaluated against.
pub trait AttributeLookup {
    /// Resolves `{system}.{type}.{field}`; `None` means unknown.
    fn get_attr(&self, key: &str) -> Option<&AttrValue>;

    /// Whether attributes for `{system}.{type}` are present at all.
    fn has_resource(&self, namespace: &str) -> bool;
}

// ============================================================================
// Operator
// ============================================================================

/// Operator tags as they appear in policy expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
    Any,
    StringEquals,
    StringPrefix,
    StringContains,
    NumericEquals,
    NumericGt,
    NumericGte,
    NumericLt,
    NumericLte,
    Bool,
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Any => "Any",
            Self::StringEquals => "StringEquals",
            Self::StringPrefix => "StringPrefix",
            Self::StringContains => "StringContains",
            Self::NumericEquals => "NumericEquals",
            Self::NumericGt => "NumericGt",
            Self::NumericGte => "NumericGte",
            Self::NumericLt => "NumericLt",
            Self::NumericLte => "NumericLte",
            Self::Bool => "Bool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "AND" => Self::And,
            "OR" => Self::Or,
            "Any" => Self::Any,
            "StringEquals" => Self::StringEquals,
            "StringPrefix" => Self::StringPrefix,
            "StringContains" => Self::StringContains,
            "NumericEquals" => Self::NumericEquals,
            "NumericGt" => Self::NumericGt,
            "NumericGte" => Self::NumericGte,
            "NumericLt" => Self::NumericLt,
            "NumericLte" => Self::NumericLte,
            "Bool" => Self::Bool,
            _ => return None,
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Condition
// ============================================================================

/// A leaf predicate: a qualified attribute key and its literal values.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    /// `{system}.{type}.{field}`.
    pub key: String,
    pub values: Vec<AttrValue>,
}

impl Leaf {
    pub fn new(key: impl Into<String>, values: Vec<AttrValue>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    /// The namespace part of the key, everything before the last dot.
    pub fn namespace(&self) -> Option<&str> {
        self.key.rfind('.').map(|idx| &self.key[..idx])
    }
}

/// A node of a parsed policy condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// True iff every child is true; `And([])` is true.
    And(Vec<Condition>),
    /// True iff some child is true; `Or([])` is false.
    Or(Vec<Condition>),
    /// Always true.
    Any,
    StringEquals(Leaf),
    StringPrefix(Leaf),
    StringContains(Leaf),
    NumericEquals(Leaf),
    NumericGt(Leaf),
    NumericGte(Leaf),
    NumericLt(Leaf),
    NumericLte(Leaf),
    Bool(Leaf),
}

/// Outcome of evaluating a condition with only part of its attributes known.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialOutcome {
    /// The known attributes already rule the condition out.
    Denied,
    /// The condition holds regardless of the unknown attributes.
    Passed,
    /// What is left to check once the missing attributes are available.
    Residual(Condition),
}

impl Condition {
    pub fn operator(&self) -> Operator {
        match self {
            Self::And(_) => Operator::And,
            Self::Or(_) => Operator::Or,
            Self::Any => Operator::Any,
            Self::StringEquals(_) => Operator::StringEquals,
            Self::StringPrefix(_) => Operator::StringPrefix,
            Self::StringContains(_) => Operator::StringContains,
            Self::NumericEquals(_) => Operator::NumericEquals,
            Self::NumericGt(_) => Operator::NumericGt,
            Self::NumericGte(_) => Operator::NumericGte,
            Self::NumericLt(_) => Operator::NumericLt,
            Self::NumericLte(_) => Operator::NumericLte,
            Self::Bool(_) => Operator::Bool,
        }
    }

    /// The leaf predicate, if this is not a composite.
    pub fn leaf(&self) -> Option<&Leaf> {
        match self {
            Self::And(_) | Self::Or(_) | Self::Any => None,
            Self::StringEquals(leaf)
            | Self::StringPrefix(leaf)
            | Self::StringContains(leaf)
            | Self::NumericEquals(leaf)
            | Self::NumericGt(leaf)
            | Self::NumericGte(leaf)
            | Self::NumericLt(leaf)
            | Self::NumericLte(leaf)
            | Self::Bool(leaf) => Some(leaf),
        }
    }

    /// Evaluates the tree against the given attributes.
    pub fn eval(&self, ctx: &impl AttributeLookup) -> bool {
        match self {
            Self::And(children) => children.iter().all(|c| c.eval(ctx)),
            Self::Or(children) => children.iter().any(|c| c.eval(ctx)),
            Self::Any => true,

            Self::StringEquals(leaf) => leaf.for_or(ctx, |attr, expr| {
                matches!((attr.as_str(), expr.as_str()), (Some(a), Some(b)) if a == b)
            }),
            Self::StringPrefix(leaf) => {
                let is_iam_path = leaf.key.ends_with(IAM_PATH_SUFFIX);
                leaf.for_or(ctx, |attr, expr| {
                    let (Some(a), Some(mut b)) = (attr.as_str(), expr.as_str()) else {
                        return false;
                    };
                    // `/biz,1/set,*/` matches every set under biz 1
                    if is_iam_path && b.ends_with(",*/") {
                        b = &b[..b.len() - 2];
                    }
                    a.starts_with(b)
                })
            }
            Self::StringContains(leaf) => leaf.for_or(ctx, |attr, expr| {
                matches!((attr.as_str(), expr.as_str()), (Some(a), Some(b)) if a.contains(b))
            }),

            Self::NumericEquals(leaf) => {
                leaf.for_or(ctx, |attr, expr| attr.numeric_eq(expr) == Some(true))
            }
            Self::NumericGt(leaf) => leaf.compare_single(ctx, Ordering::is_gt),
            Self::NumericGte(leaf) => leaf.compare_single(ctx, Ordering::is_ge),
            Self::NumericLt(leaf) => leaf.compare_single(ctx, Ordering::is_lt),
            Self::NumericLte(leaf) => leaf.compare_single(ctx, Ordering::is_le),

            Self::Bool(leaf) => {
                let [expected] = leaf.values.as_slice() else {
                    return false;
                };
                match (ctx.get_attr(&leaf.key), expected.as_bool()) {
                    (Some(AttrValue::Bool(actual)), Some(expected)) => *actual == expected,
                    _ => false,
                }
            }
        }
    }

    /// Every leaf attribute key in the subtree, in tree order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys(&self, keys: &mut Vec<String>) {
        match self {
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_keys(keys);
                }
            }
            Self::Any => {}
            _ => {
                if let Some(leaf) = self.leaf() {
                    keys.push(leaf.key.clone());
                }
            }
        }
    }

    /// Whether any leaf key satisfies `pred`.
    pub fn has_key(&self, pred: &impl Fn(&str) -> bool) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.iter().any(|c| c.has_key(pred)),
            _ => self.leaf().is_some_and(|leaf| pred(&leaf.key)),
        }
    }

    /// Literal values of the first leaf, depth first, whose key satisfies `pred`.
    pub fn first_match_key_values(&self, pred: &impl Fn(&str) -> bool) -> Option<&[AttrValue]> {
        match self {
            Self::And(children) | Self::Or(children) => children
                .iter()
                .find_map(|c| c.first_match_key_values(pred)),
            _ => self
                .leaf()
                .filter(|leaf| pred(&leaf.key))
                .map(|leaf| leaf.values.as_slice()),
        }
    }

    /// Evaluates what can be evaluated and returns the remainder.
    ///
    /// A leaf is decided when its namespace is present in `ctx`; otherwise it
    /// is kept as residual. Composites drop decided children and collapse to
    /// a single residual when only one is left.
    pub fn partial_eval(&self, ctx: &impl AttributeLookup) -> PartialOutcome {
        match self {
            Self::Any => PartialOutcome::Passed,
            Self::And(children) => {
                let mut residuals = Vec::with_capacity(children.len());
                for child in children {
                    match child.partial_eval(ctx) {
                        PartialOutcome::Denied => return PartialOutcome::Denied,
                        PartialOutcome::Passed => {}
                        PartialOutcome::Residual(c) => residuals.push(c),
                    }
                }
                collapse(residuals, Self::And, PartialOutcome::Passed)
            }
            Self::Or(children) => {
                let mut residuals = Vec::with_capacity(children.len());
                for child in children {
                    match child.partial_eval(ctx) {
                        PartialOutcome::Passed => return PartialOutcome::Passed,
                        PartialOutcome::Denied => {}
                        PartialOutcome::Residual(c) => residuals.push(c),
                    }
                }
                collapse(residuals, Self::Or, PartialOutcome::Denied)
            }
            _ => {
                let Some(namespace) = self.leaf().and_then(Leaf::namespace) else {
                    return PartialOutcome::Denied;
                };
                if !ctx.has_resource(namespace) {
                    PartialOutcome::Residual(self.clone())
                } else if self.eval(ctx) {
                    PartialOutcome::Passed
                } else {
                    PartialOutcome::Denied
                }
            }
        }
    }
}

fn collapse(
    mut residuals: Vec<Condition>,
    wrap: fn(Vec<Condition>) -> Condition,
    when_empty: PartialOutcome,
) -> PartialOutcome {
    match residuals.len() {
        0 => when_empty,
        1 => PartialOutcome::Residual(residuals.remove(0)),
        _ => PartialOutcome::Residual(wrap(residuals)),
    }
}

impl Leaf {
    /// Any attribute element matches any literal under `matches`.
    fn for_or(
        &self,
        ctx: &impl AttributeLookup,
        matches: impl Fn(&AttrValue, &AttrValue) -> bool,
    ) -> bool {
        let Some(attr) = ctx.get_attr(&self.key) else {
            return false;
        };
        match attr {
            AttrValue::List(items) => items
                .iter()
                .any(|item| self.values.iter().any(|expr| matches(item, expr))),
            scalar => self.values.iter().any(|expr| matches(scalar, expr)),
        }
    }

    /// Ordered comparison; only one literal is allowed.
    fn compare_single(&self, ctx: &impl AttributeLookup, accept: fn(Ordering) -> bool) -> bool {
        if self.values.len() != 1 {
            return false;
        }
        self.for_or(ctx, |attr, expr| attr.numeric_cmp(expr).is_some_and(accept))
    }
}
