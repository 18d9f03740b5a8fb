//! Identity to role resolution
//!
//! The engine only ever sees role names. These resolvers turn an
//! authenticated identity (usually the MQTT username) into that role set.

mod bindings;
mod directory;

pub use bindings::BindingResolver;
pub use directory::{DirectoryResolver, IdentityEntry};

use crate::config::IdentityConfig;
use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Roles held by one identity
pub type RoleSet = BTreeSet<String>;

/// Role resolver trait
///
/// Unknown or inactive identities resolve to an empty set. An `Err` means the
/// lookup itself failed; callers treat that as an empty set too.
pub trait RoleResolver: Send + Sync {
    /// Resolve the roles held by an identity
    fn resolve(&self, identity: &str) -> Result<RoleSet>;

    /// Resolver name for logging
    fn name(&self) -> &str;
}

/// Multi-provider resolver: the union of every provider's roles
///
/// Any provider failure fails the whole resolution.
#[derive(Default)]
pub struct ResolverChain {
    providers: Vec<Arc<dyn RoleResolver>>,
}

impl ResolverChain {
    /// Build the resolvers described by configuration
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let mut providers: Vec<Arc<dyn RoleResolver>> = Vec::new();

        if let Some(ref directory) = config.directory {
            let resolver = DirectoryResolver::from_file(&directory.path, directory.hot_reload)?;
            info!(
                path = %directory.path.display(),
                identities = resolver.identity_count(),
                "Loaded identity directory"
            );
            providers.push(Arc::new(resolver));
        }

        if !config.bindings.is_empty() {
            let resolver = BindingResolver::new(&config.bindings)?;
            info!(bindings = resolver.binding_count(), "Compiled role bindings");
            providers.push(Arc::new(resolver));
        }

        if providers.is_empty() {
            warn!("No identity sources configured, every identity resolves to no roles");
        }

        Ok(Self { providers })
    }

    /// Append a provider
    pub fn push(&mut self, provider: Arc<dyn RoleResolver>) {
        self.providers.push(provider);
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

impl RoleResolver for ResolverChain {
    fn resolve(&self, identity: &str) -> Result<RoleSet> {
        let mut roles = RoleSet::new();

        for provider in &self.providers {
            let resolved = provider.resolve(identity).map_err(|e| {
                e.context(format!("identity resolver '{}' failed", provider.name()))
            })?;
            roles.extend(resolved);
        }

        debug!(identity = %identity, roles = ?roles, "Resolved identity");
        Ok(roles)
    }

    fn name(&self) -> &str {
        "chain"
    }
}
