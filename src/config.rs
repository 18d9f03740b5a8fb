//! Configuration types for the MQTT authorization engine
//!
//! Provides JSON-serializable configuration for the rule table and the
//! identity sources that resolve usernames to roles.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// MQTT Authorization Configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct AuthzConfig {
    /// Access control rules
    pub acl: AclConfig,

    /// Identity to role resolution
    pub identities: IdentityConfig,
}

impl AuthzConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

// ============================================================================
// ACL Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct AclConfig {
    /// Inline rule rows
    pub rules: Vec<RuleRow>,

    /// Load additional rule rows from file (JSON array)
    pub rules_file: Option<PathBuf>,

    /// Keep leading `+`/`#` rule filters away from `$`-prefixed topics
    pub protect_system_topics: bool,
}

impl AclConfig {
    /// All rule rows: inline rules first, then the rules file
    pub fn load_rules(&self) -> Result<Vec<RuleRow>> {
        let mut rows = self.rules.clone();

        if let Some(ref path) = self.rules_file {
            rows.extend(load_rules_file(path)?);
        }

        Ok(rows)
    }
}

/// Read a JSON array of rule rows
pub fn load_rules_file(path: &Path) -> Result<Vec<RuleRow>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse rules file: {}", path.display()))
}

/// One configured rule: a topic filter granted to a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRow {
    /// Topic filter (may contain `+` and `#` wildcards)
    pub topic_pattern: String,
    /// Access granted on matching topics
    pub permission: Permission,
    /// Role the grant belongs to
    pub role: String,
}

impl RuleRow {
    pub fn new(topic_pattern: &str, permission: Permission, role: &str) -> Self {
        Self {
            topic_pattern: topic_pattern.to_string(),
            permission,
            role: role.to_string(),
        }
    }
}

/// Access granted by a rule
///
/// The discriminants form a bitmask so a grant check is one AND.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Permission {
    Read = 0b01,
    Write = 0b10,
    #[serde(alias = "read_write", alias = "read-write")]
    ReadWrite = 0b11,
}

impl Permission {
    /// Whether this permission allows the operation
    #[inline]
    pub fn grants(self, op: Operation) -> bool {
        (self as u8) & (op as u8) != 0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::ReadWrite => "readwrite",
        })
    }
}

/// Operation being authorized
///
/// Subscribing reads from a topic, publishing writes to it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Operation {
    Read = 0b01,
    Write = 0b10,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Read => "read",
            Operation::Write => "write",
        })
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" | "subscribe" => Ok(Operation::Read),
            "write" | "publish" => Ok(Operation::Write),
            other => Err(format!("unknown operation '{}', expected read or write", other)),
        }
    }
}

// ============================================================================
// Identity Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct IdentityConfig {
    /// File-backed identity directory
    pub directory: Option<DirectoryConfig>,

    /// Pattern-based role bindings
    pub bindings: Vec<RoleBinding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DirectoryConfig {
    /// Path to the identity directory (JSON)
    pub path: PathBuf,
    /// Reload file on every lookup (for development)
    #[serde(default)]
    pub hot_reload: bool,
}

/// Grants roles to every identity matching a username or username pattern
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RoleBinding {
    /// Match by exact username
    #[serde(default)]
    pub username: Option<String>,
    /// Match by username regex
    #[serde(default)]
    pub username_regex: Option<String>,
    /// Roles granted on match
    pub roles: Vec<String>,
}
