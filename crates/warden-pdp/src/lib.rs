//! # warden-pdp: Policy decision point
//!
//! Ties the evaluation crates to the collaborators that supply actions,
//! subjects, policies and remote attributes.
//!
//! - [`Pdp::eval`] answers "may this subject do this action on these
//!   resources", consulting RBAC first for RBAC-granted actions.
//! - [`Pdp::query`] returns a filter expression describing every resource
//!   the subject may act on.
//! - [`Pdp::query_by_ext_resources`] does the same and fetches the
//!   attributes of external instances the expression refers to.
//! - [`Pdp::query_auth_policies`] lists the subject's raw policies.
//!
//! Denials are [`Decision`]s; a [`PdpError`] means no decision was made.

mod decision;
mod error;
mod pipeline;
mod remote;
pub mod source;

pub use decision::{Decision, DenyReason};
pub use error::{PdpError, Result};
pub use pipeline::{Pdp, Sources};
pub use source::{ActionDetailSource, PolicySource, RemoteResourceSource, SubjectDetailSource};
