//! Authorization engine: evaluates role sets against the active rule snapshot

use crate::auth::RoleResolver;
use crate::config::{Operation, RuleRow};
use crate::error::Result;
use crate::mqtt::TopicMatcher;
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::rules::{CompiledRule, Role, RuleCompiler, RuleSnapshot};

/// Outcome of one authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessDecision {
    Allow,
    Deny,
}

impl AccessDecision {
    #[inline]
    pub fn is_allowed(self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// A decision together with what produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: AccessDecision,
    /// Version of the snapshot the decision was made against
    pub snapshot_version: u64,
    /// Role and filter of the granting rule, when allowed
    pub granted_by: Option<(Role, String)>,
}

impl Evaluation {
    fn deny(snapshot_version: u64) -> Self {
        Self {
            decision: AccessDecision::Deny,
            snapshot_version,
            granted_by: None,
        }
    }

    fn allow(snapshot_version: u64, rule: &CompiledRule) -> Self {
        Self {
            decision: AccessDecision::Allow,
            snapshot_version,
            granted_by: Some((rule.role.clone(), rule.filter.to_string())),
        }
    }
}

/// Engine behaviour switches fixed at construction
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// When set, a rule filter starting with `+` or `#` never matches a
    /// topic starting with `$` (broker system topics, cloud shadow topics).
    pub protect_system_topics: bool,
}

/// What the caller is asking to access
#[derive(Clone, Copy)]
enum Target<'a> {
    Topic(&'a str),
    Subscription(&'a str),
}

/// Authorization engine - decides allow/deny from a role set, topic and operation
///
/// Evaluation never blocks on a reload: the read path is one atomic load of
/// the active snapshot and then works on that snapshot alone.
pub struct AuthorizationEngine {
    /// Active rule snapshot
    active: ArcSwap<RuleSnapshot>,
    /// Last version handed out
    version: AtomicU64,
    /// Serializes reloads so versions activate in order
    reload_lock: parking_lot::Mutex<()>,
    compiler: RuleCompiler,
    topic_matcher: TopicMatcher,
    options: EngineOptions,
}

impl AuthorizationEngine {
    /// Create an engine with an empty rule table (everything denied)
    pub fn new(options: EngineOptions) -> Self {
        Self {
            active: ArcSwap::from_pointee(RuleSnapshot::empty()),
            version: AtomicU64::new(0),
            reload_lock: parking_lot::Mutex::new(()),
            compiler: RuleCompiler::new(),
            topic_matcher: TopicMatcher::new(),
            options,
        }
    }

    /// Create an engine and load an initial rule table
    pub fn with_rules(rows: &[RuleRow], options: EngineOptions) -> Result<Self> {
        let engine = Self::new(options);
        engine.reload(rows)?;
        Ok(engine)
    }

    /// Replace the rule table
    ///
    /// The new snapshot is fully built before it becomes visible. On error the
    /// previous snapshot keeps serving and the error is returned.
    pub fn reload(&self, rows: &[RuleRow]) -> Result<()> {
        let _guard = self.reload_lock.lock();

        let snapshot = match self.compiler.compile(rows) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    error = %e,
                    active_version = self.active.load().version(),
                    "Rejected rule reload, keeping active rules"
                );
                return Err(e);
            }
        };

        let version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = Arc::new(snapshot.with_version(version));

        info!(
            version,
            rules = snapshot.rule_count(),
            roles = snapshot.role_count(),
            "Activated rule snapshot"
        );

        // Readers still holding the previous snapshot keep it alive
        self.active.store(snapshot);
        Ok(())
    }

    /// The currently active snapshot
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.active.load_full()
    }

    /// Decide whether any of `roles` may perform `op` on `topic`
    pub fn authorize<I, S>(&self, roles: I, topic: &str, op: Operation) -> AccessDecision
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.authorize_traced(roles, topic, op).decision
    }

    /// Same as [`authorize`](Self::authorize), also reporting the snapshot
    /// version and the granting rule
    pub fn authorize_traced<I, S>(&self, roles: I, topic: &str, op: Operation) -> Evaluation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let snapshot = self.snapshot();

        if !self.topic_matcher.is_valid_topic(topic) {
            warn!(topic = %topic, op = %op, "Malformed topic, denying");
            return Evaluation::deny(snapshot.version());
        }

        let levels: Vec<&str> = topic.split('/').collect();
        let system_topic = self.topic_matcher.is_system_topic(topic);

        self.evaluate(&snapshot, roles, Target::Topic(topic), &levels, system_topic, op)
    }

    /// Resolve an identity's roles and authorize them
    ///
    /// A resolver failure is treated as an empty role set.
    pub fn authorize_identity(
        &self,
        resolver: &dyn RoleResolver,
        identity: &str,
        topic: &str,
        op: Operation,
    ) -> AccessDecision {
        match resolver.resolve(identity) {
            Ok(roles) => self.authorize(&roles, topic, op),
            Err(e) => {
                warn!(
                    resolver = %resolver.name(),
                    identity = %identity,
                    error = %e,
                    "Role resolution failed, denying"
                );
                AccessDecision::Deny
            }
        }
    }

    /// Check if a topic can be published to
    pub fn can_publish<I, S>(&self, roles: I, topic: &str) -> AccessDecision
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.authorize(roles, topic, Operation::Write)
    }

    /// Check if a topic filter can be subscribed to
    ///
    /// Allowed only when one readable rule filter covers every topic the
    /// subscription filter could deliver.
    pub fn can_subscribe<I, S>(&self, roles: I, topic_filter: &str) -> AccessDecision
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let snapshot = self.snapshot();

        if let Err(e) = self.topic_matcher.validate_filter(topic_filter) {
            warn!(filter = %topic_filter, error = %e, "Malformed subscription filter, denying");
            return AccessDecision::Deny;
        }

        let levels: Vec<&str> = topic_filter.split('/').collect();
        let system_topic = self.topic_matcher.is_system_topic(topic_filter);

        self.evaluate(
            &snapshot,
            roles,
            Target::Subscription(topic_filter),
            &levels,
            system_topic,
            Operation::Read,
        )
        .decision
    }

    /// Get the number of loaded rules
    pub fn rule_count(&self) -> usize {
        self.active.load().rule_count()
    }

    /// Scan each role's rules; the first rule that matches and grants wins.
    fn evaluate<I, S>(
        &self,
        snapshot: &RuleSnapshot,
        roles: I,
        target: Target<'_>,
        levels: &[&str],
        system_topic: bool,
        op: Operation,
    ) -> Evaluation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let guard_system = system_topic && self.options.protect_system_topics;
        let mut role_count = 0usize;

        for role in roles {
            role_count += 1;

            for rule in snapshot.rules_for(role.as_ref()) {
                if !rule.permission.grants(op) {
                    continue;
                }
                if guard_system && rule.filter.starts_with_wildcard() {
                    continue;
                }

                let matched = match target {
                    Target::Topic(_) => rule.filter.matches_levels(levels),
                    Target::Subscription(_) => rule.filter.covers_levels(levels),
                };

                if matched {
                    debug!(
                        role = %rule.role,
                        filter = %rule.filter,
                        topic = %target.as_str(),
                        op = %op,
                        version = snapshot.version(),
                        "Access granted"
                    );
                    return Evaluation::allow(snapshot.version(), rule);
                }
            }
        }

        debug!(
            topic = %target.as_str(),
            op = %op,
            roles = role_count,
            version = snapshot.version(),
            "No rule granted access, denying"
        );
        Evaluation::deny(snapshot.version())
    }
}

impl Target<'_> {
    fn as_str(&self) -> &str {
        match self {
            Target::Topic(s) | Target::Subscription(s) => s,
        }
    }
}

impl Default for AuthorizationEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Permission;

    const NO_ROLES: [&str; 0] = [];

    fn engine(rows: Vec<RuleRow>) -> AuthorizationEngine {
        AuthorizationEngine::with_rules(&rows, EngineOptions::default()).unwrap()
    }

    #[test]
    fn test_admin_wildcard() {
        let engine = engine(vec![RuleRow::new("#", Permission::ReadWrite, "admin")]);

        let decision = engine.authorize(["admin"], "factory/line1/sensor1/temperature", Operation::Write);
        assert_eq!(decision, AccessDecision::Allow);
    }

    #[test]
    fn test_default_deny() {
        let engine = engine(vec![RuleRow::new("#", Permission::ReadWrite, "admin")]);

        assert_eq!(engine.authorize(NO_ROLES, "any/topic", Operation::Read), AccessDecision::Deny);
        assert_eq!(
            engine.authorize(["unknown_role"], "any/topic", Operation::Read),
            AccessDecision::Deny
        );
    }

    #[test]
    fn test_new_engine_denies_everything() {
        let engine = AuthorizationEngine::default();
        assert_eq!(engine.rule_count(), 0);
        assert_eq!(engine.snapshot().version(), 0);
        assert_eq!(engine.authorize(["admin"], "a", Operation::Read), AccessDecision::Deny);
    }

    #[test]
    fn test_permission_per_operation() {
        let engine = engine(vec![
            RuleRow::new("sensors/+/data", Permission::Write, "sensor"),
            RuleRow::new("sensors/+/data", Permission::Read, "user"),
        ]);

        assert!(engine.can_publish(["sensor"], "sensors/temp001/data").is_allowed());
        assert!(!engine.can_publish(["sensor"], "actuators/valve001/command").is_allowed());
        assert!(!engine.can_publish(["user"], "sensors/temp001/data").is_allowed());
        assert!(engine.authorize(["sensor", "user"], "sensors/temp001/data", Operation::Read).is_allowed());
    }

    #[test]
    fn test_malformed_topic_denied() {
        let engine = engine(vec![RuleRow::new("#", Permission::ReadWrite, "admin")]);

        for topic in ["", "a/+", "a/#", "a\0b"] {
            assert_eq!(engine.authorize(["admin"], topic, Operation::Read), AccessDecision::Deny);
        }
    }

    #[test]
    fn test_traced_reports_granting_rule() {
        let engine = engine(vec![
            RuleRow::new("logs/#", Permission::Read, "ops"),
            RuleRow::new("logs/app/+", Permission::ReadWrite, "dev"),
        ]);

        let eval = engine.authorize_traced(["ops", "dev"], "logs/app/error", Operation::Write);
        assert_eq!(eval.decision, AccessDecision::Allow);
        assert_eq!(eval.snapshot_version, 1);
        let (role, filter) = eval.granted_by.unwrap();
        assert_eq!(role.as_str(), "dev");
        assert_eq!(filter, "logs/app/+");

        let eval = engine.authorize_traced(["ops"], "logs/app/error", Operation::Write);
        assert_eq!(eval, Evaluation::deny(1));
    }

    #[test]
    fn test_failed_reload_keeps_previous_rules() {
        let engine = engine(vec![RuleRow::new("a/#", Permission::Read, "x")]);

        let err = engine.reload(&[RuleRow::new("a/b#", Permission::Read, "x")]);
        assert!(err.is_err());
        assert_eq!(engine.snapshot().version(), 1);
        assert!(engine.authorize(["x"], "a/b", Operation::Read).is_allowed());
    }

    #[test]
    fn test_reload_replaces_rules() {
        let engine = engine(vec![RuleRow::new("a/#", Permission::Read, "x")]);

        engine.reload(&[RuleRow::new("b/#", Permission::Read, "x")]).unwrap();
        assert_eq!(engine.snapshot().version(), 2);
        assert!(!engine.authorize(["x"], "a/b", Operation::Read).is_allowed());
        assert!(engine.authorize(["x"], "b", Operation::Read).is_allowed());
    }

    #[test]
    fn test_held_snapshot_outlives_reload() {
        let engine = engine(vec![RuleRow::new("a/#", Permission::Read, "x")]);
        let held = engine.snapshot();

        engine.reload(&[RuleRow::new("b/#", Permission::Read, "x")]).unwrap();

        assert_eq!(held.version(), 1);
        assert_eq!(held.rules_for("x")[0].filter.as_str(), "a/#");
        assert_eq!(engine.snapshot().version(), 2);
        assert!(!Arc::ptr_eq(&held, &engine.snapshot()));
        assert_eq!(Arc::strong_count(&held), 1);
    }

    #[test]
    fn test_system_topic_protection() {
        let rows = vec![
            RuleRow::new("#", Permission::Read, "viewer"),
            RuleRow::new("+/things/+/shadow/#", Permission::Read, "device"),
            RuleRow::new("$aws/things/+/shadow/#", Permission::Read, "shadow"),
        ];
        let topic = "$aws/things/t1/shadow/update";

        let open = AuthorizationEngine::with_rules(&rows, EngineOptions::default()).unwrap();
        assert!(open.authorize(["viewer"], topic, Operation::Read).is_allowed());
        assert!(open.authorize(["device"], topic, Operation::Read).is_allowed());

        let protected = AuthorizationEngine::with_rules(
            &rows,
            EngineOptions { protect_system_topics: true },
        )
        .unwrap();
        assert!(!protected.authorize(["viewer"], topic, Operation::Read).is_allowed());
        assert!(!protected.authorize(["device"], topic, Operation::Read).is_allowed());
        assert!(protected.authorize(["shadow"], topic, Operation::Read).is_allowed());
        assert!(protected.authorize(["viewer"], "plain/topic", Operation::Read).is_allowed());
    }

    #[test]
    fn test_subscribe_requires_covering_filter() {
        let engine = engine(vec![
            RuleRow::new("sensors/#", Permission::Read, "user"),
            RuleRow::new("alerts/+", Permission::ReadWrite, "user"),
            RuleRow::new("cmd/#", Permission::Write, "user"),
        ]);

        assert!(engine.can_subscribe(["user"], "sensors/+/data").is_allowed());
        assert!(engine.can_subscribe(["user"], "sensors/#").is_allowed());
        assert!(engine.can_subscribe(["user"], "alerts/+").is_allowed());
        assert!(!engine.can_subscribe(["user"], "alerts/#").is_allowed());
        assert!(!engine.can_subscribe(["user"], "#").is_allowed());
        assert!(!engine.can_subscribe(["user"], "cmd/x").is_allowed());
        assert!(!engine.can_subscribe(["user"], "sensors/a#").is_allowed());
    }
}
