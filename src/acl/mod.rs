//! Access Control List (ACL) module
//!
//! Role-scoped topic rules, compiled once per load and evaluated against an
//! immutable snapshot.

mod evaluator;
mod rules;

pub use evaluator::{AccessDecision, AuthorizationEngine, EngineOptions, Evaluation};
pub use rules::{CompiledRule, Role, RuleCompiler, RuleSnapshot};
