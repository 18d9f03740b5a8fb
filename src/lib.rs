//! MQTT Topic Authorization Engine for Sentinel
//!
//! Decides whether an authenticated identity may read from or write to an
//! MQTT topic:
//!
//! - **Topic Matching**: `+` single-level and `#` multi-level wildcards
//! - **Role Rules**: `(topic filter, permission, role)` rows, union across roles
//! - **Default Deny**: no matching grant, no roles, or a failed role lookup all deny
//! - **Atomic Reload**: rule tables are validated, built, then swapped in whole
//! - **Identity Resolution**: file directory and username-pattern role bindings
//!
//! # Architecture
//!
//! ```text
//! RuleRow[] → RuleCompiler → RuleSnapshot ─┐
//!                                          ├→ AuthorizationEngine::authorize → Allow | Deny
//! identity → RoleResolver → {role} ────────┘
//! ```
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "acl": {
//!     "rules": [
//!       { "topic_pattern": "#", "permission": "readwrite", "role": "admin" },
//!       { "topic_pattern": "sensors/+/data", "permission": "write", "role": "sensor" },
//!       { "topic_pattern": "sensors/+/data", "permission": "read", "role": "user" }
//!     ],
//!     "protect-system-topics": false
//!   },
//!   "identities": {
//!     "bindings": [
//!       { "username-regex": "^sensor-", "roles": ["sensor"] }
//!     ]
//!   }
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use sentinel_mqtt_authz::{AuthorizationEngine, EngineOptions, Operation, Permission, RuleRow};
//!
//! let rules = vec![RuleRow::new("sensors/+/data", Permission::Write, "sensor")];
//! let engine = AuthorizationEngine::with_rules(&rules, EngineOptions::default()).unwrap();
//!
//! assert!(engine.authorize(["sensor"], "sensors/temp001/data", Operation::Write).is_allowed());
//! assert!(!engine.authorize(["sensor"], "actuators/valve001/command", Operation::Write).is_allowed());
//! ```

pub mod acl;
pub mod auth;
pub mod config;
pub mod error;
pub mod mqtt;

// Re-export main types
pub use acl::{AccessDecision, AuthorizationEngine, EngineOptions, Evaluation, RuleCompiler, RuleSnapshot};
pub use auth::{ResolverChain, RoleResolver, RoleSet};
pub use config::{AuthzConfig, Operation, Permission, RuleRow};
pub use error::{AuthzError, FilterError};
pub use mqtt::TopicMatcher;

/// Validate a topic filter without loading it, for linting rule files
pub fn validate_filter(filter: &str) -> Result<(), FilterError> {
    TopicMatcher::new().validate_filter(filter)
}
