//! Username pattern role bindings

use super::{RoleResolver, RoleSet};
use crate::config::RoleBinding;
use anyhow::{anyhow, Context, Result};
use regex::Regex;

/// Compiled binding for efficient matching
#[derive(Debug)]
struct CompiledBinding {
    username_regex: Regex,
    roles: Vec<String>,
}

impl CompiledBinding {
    fn from_config(binding: &RoleBinding) -> Result<Self> {
        let username_regex = match (&binding.username, &binding.username_regex) {
            (Some(exact), _) => Regex::new(&format!("^{}$", regex::escape(exact)))
                .context("Invalid username pattern")?,
            (_, Some(pattern)) => Regex::new(pattern)
                .with_context(|| format!("Invalid username regex: {}", pattern))?,
            (None, None) => return Err(anyhow!("Binding needs a username or username-regex")),
        };

        Ok(Self {
            username_regex,
            roles: binding.roles.clone(),
        })
    }
}

/// Grants roles to identities whose name matches a binding
pub struct BindingResolver {
    bindings: Vec<CompiledBinding>,
}

impl BindingResolver {
    /// Compile bindings from configuration
    pub fn new(bindings: &[RoleBinding]) -> Result<Self> {
        let bindings = bindings
            .iter()
            .enumerate()
            .map(|(i, b)| {
                CompiledBinding::from_config(b).with_context(|| format!("Role binding #{}", i))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { bindings })
    }

    /// Number of compiled bindings
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}

impl RoleResolver for BindingResolver {
    fn resolve(&self, identity: &str) -> Result<RoleSet> {
        Ok(self
            .bindings
            .iter()
            .filter(|b| b.username_regex.is_match(identity))
            .flat_map(|b| b.roles.iter().cloned())
            .collect())
    }

    fn name(&self) -> &str {
        "role-bindings"
    }
}
