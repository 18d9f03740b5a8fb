//! Rule compilation and the immutable rule snapshot

use crate::config::{Permission, RuleRow};
use crate::error::{AuthzError, Result};
use crate::mqtt::TopicFilter;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A role name
///
/// Cheap to clone: every rule of a role shares one allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Role(Arc<str>);

impl Role {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Role {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compiled rule for efficient matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    pub filter: TopicFilter,
    pub permission: Permission,
    pub role: Role,
}

impl CompiledRule {
    /// Compile a rule from a configuration row
    pub fn from_row(index: usize, row: &RuleRow) -> Result<Self> {
        if row.role.is_empty() {
            return Err(AuthzError::EmptyRole {
                index,
                topic_pattern: row.topic_pattern.clone(),
            });
        }

        let filter = TopicFilter::parse(&row.topic_pattern).map_err(|reason| {
            AuthzError::InvalidRule {
                index,
                topic_pattern: row.topic_pattern.clone(),
                role: row.role.clone(),
                reason,
            }
        })?;

        Ok(Self {
            filter,
            permission: row.permission,
            role: Role::new(&row.role),
        })
    }
}

/// Immutable, fully validated rule table indexed by role
///
/// Never mutated after construction; the engine replaces it wholesale on reload.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    version: u64,
    rules: HashMap<Role, Vec<CompiledRule>>,
    rule_count: usize,
}

impl RuleSnapshot {
    /// An empty snapshot, which grants nothing
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Version tag assigned by the engine when the snapshot was activated
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Rules of a role in insertion order; empty for unknown roles
    pub fn rules_for(&self, role: &str) -> &[CompiledRule] {
        self.rules.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Roles that have at least one rule
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.rules.keys()
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn role_count(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }
}

/// Validates raw rule rows and builds snapshots
#[derive(Debug, Clone, Default)]
pub struct RuleCompiler;

impl RuleCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile rule rows into a snapshot
    ///
    /// Fails on the first invalid row without building anything. A later row
    /// with the same (filter, role) pair replaces the earlier permission but
    /// keeps the earlier position.
    pub fn compile(&self, rows: &[RuleRow]) -> Result<RuleSnapshot> {
        let mut rules: HashMap<Role, Vec<CompiledRule>> = HashMap::new();
        let mut positions: HashMap<(Role, String), usize> = HashMap::new();
        let mut rule_count = 0;

        for (index, row) in rows.iter().enumerate() {
            let compiled = CompiledRule::from_row(index, row)?;
            let role_rules = rules.entry(compiled.role.clone()).or_default();
            let key = (compiled.role.clone(), row.topic_pattern.clone());

            match positions.get(&key) {
                Some(&position) => role_rules[position].permission = compiled.permission,
                None => {
                    positions.insert(key, role_rules.len());
                    role_rules.push(compiled);
                    rule_count += 1;
                }
            }
        }

        Ok(RuleSnapshot {
            version: 0,
            rules,
            rule_count,
        })
    }

    /// Report every invalid row, for linting rule files before deployment
    pub fn lint(&self, rows: &[RuleRow]) -> Vec<AuthzError> {
        rows.iter()
            .enumerate()
            .filter_map(|(index, row)| CompiledRule::from_row(index, row).err())
            .collect()
    }
}
