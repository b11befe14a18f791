//! Authorization Policy.
//!
//! Every role and ownership rule of the portal lives in [`engine`]. Route
//! handlers and services never compare roles or owners themselves; they ask
//! [`decide`] (or [`check_role`] before the resource is loaded).

pub mod engine;

pub use engine::{
    AccessDecision, Action, DenyReason, Operation, ResourceKind, authorize, check_role, decide,
};
