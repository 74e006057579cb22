//! # warden-abac: Attribute-Based Access Control
//!
//! Evaluates stored policy expressions against the attributes of a request.
//! A policy is a condition tree over `{system}.{type}.{field}` keys; a
//! subject is authorized for an action if any of its policies holds.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Request                                     │
//! │  (Subject + Action + Resources)              │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  EvalContext                                 │
//! │  ├─ Attribute bags keyed by system.type      │
//! │  ├─ Injected resource id                     │
//! │  └─ Per-policy time environment              │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Evaluator                                   │
//! │  ├─ Parse expressions (cached by signature)  │
//! │  ├─ eval: first passing policy               │
//! │  └─ partial_eval: passes + residuals         │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  translate                                   │
//! │  Residuals as a client filter expression     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use warden_abac::{EvalContext, Evaluator};
//! use warden_types::{
//!     Action, ActionAttribute, ActionResourceType, Attribute, AuthPolicy, AuthType, Request,
//!     Resource, Subject,
//! };
//!
//! let action = Action::new("view_job").with_attribute(ActionAttribute {
//!     pk: 1,
//!     auth_type: AuthType::Abac,
//!     resource_types: vec![ActionResourceType::new("bk_job", "job")],
//! });
//! let request = Request::new("bk_job", Subject::new("user", "admin"), action).with_resource(
//!     Resource::new("bk_job", "job", "j1").with_attribute(Attribute::new().with("owner", "admin")),
//! );
//! let policy = AuthPolicy::new(
//!     7,
//!     r#"[{"system":"bk_job","type":"job","expression":{"StringEquals":{"owner":["admin"]}}}]"#,
//! );
//!
//! let evaluator = Evaluator::default();
//! let mut ctx = EvalContext::new(&request);
//! let result = evaluator.eval_policies(&mut ctx, &[policy], Utc::now());
//! assert!(result.passed);
//! assert_eq!(result.policy_id, Some(7));
//! ```

pub mod condition;
pub mod context;
mod error;
pub mod evaluator;
pub mod expression;
mod object_set;
pub mod time_env;
pub mod translate;


pub use condition::{AttributeLookup, Condition, Leaf, Operator, PartialOutcome};
pub use context::EvalContext;
pub use error::{AbacError, Result};
pub use evaluator::{
    Evaluator, PartialEvaluation, PolicyFilter, PolicyMatch, policy_attr_keys,
};
pub use expression::ExpressionCache;
pub use object_set::ObjectSet;
pub use time_env::TimeEnvCache;
pub use translate::{any_expression, conditions_to_expression, empty_expression};
