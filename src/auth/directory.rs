//! File-backed identity directory

use super::{RoleResolver, RoleSet};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Identity entry in the directory file
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEntry {
    /// Roles held by the identity
    #[serde(default)]
    pub roles: Vec<String>,
    /// Whether the identity is active
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Directory file format
#[derive(Debug, Clone, Deserialize)]
struct DirectoryFile {
    /// Map of identity to entry
    users: HashMap<String, IdentityEntry>,
}

/// Resolves roles from a JSON identity directory
pub struct DirectoryResolver {
    /// Path to directory file
    path: PathBuf,
    /// Cached identities
    users: RwLock<HashMap<String, IdentityEntry>>,
    /// Reload on every lookup
    hot_reload: bool,
}

impl DirectoryResolver {
    /// Create from a directory file
    pub fn from_file(path: &Path, hot_reload: bool) -> Result<Self> {
        let users = load_directory_file(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            users: RwLock::new(users),
            hot_reload,
        })
    }

    /// Reload identities from file
    ///
    /// On failure the previously loaded identities stay in place.
    pub fn reload(&self) -> Result<()> {
        let users = load_directory_file(&self.path)?;
        *self.users.write() = users;
        Ok(())
    }

    /// Add or replace an identity (for programmatic use)
    pub fn set_identity(&self, identity: &str, entry: IdentityEntry) {
        self.users.write().insert(identity.to_string(), entry);
    }

    /// Remove an identity
    pub fn remove_identity(&self, identity: &str) -> bool {
        self.users.write().remove(identity).is_some()
    }

    /// Get identity count
    pub fn identity_count(&self) -> usize {
        self.users.read().len()
    }
}

impl RoleResolver for DirectoryResolver {
    fn resolve(&self, identity: &str) -> Result<RoleSet> {
        if self.hot_reload {
            self.reload()?;
        }

        let users = self.users.read();
        let roles = match users.get(identity) {
            Some(entry) if entry.enabled => entry.roles.iter().cloned().collect(),
            _ => RoleSet::new(),
        };

        Ok(roles)
    }

    fn name(&self) -> &str {
        "identity-directory"
    }
}

fn load_directory_file(path: &Path) -> Result<HashMap<String, IdentityEntry>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read identity directory: {}", path.display()))?;

    let file: DirectoryFile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse identity directory: {}", path.display()))?;

    Ok(file.users)
}
