//! Entitlement gate
//!
//! Routes may require capabilities the caller must hold. Requirements are
//! declared on families and cases; whether a caller holds a capability is
//! answered by an external [`EntitlementStore`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A named capability (e.g. `"pro"`, `"team.admin"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    /// Create a new capability
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Capability name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Which capabilities satisfy a requirement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "rule", content = "capabilities", rename_all = "camelCase")]
pub enum EntitlementRule {
    /// Open to everyone
    #[default]
    None,
    /// Requires one capability
    Single(Capability),
    /// Requires at least one of the capabilities; empty never matches
    AnyOf(Vec<Capability>),
    /// Requires every capability; empty always matches
    AllOf(Vec<Capability>),
}

/// Entitlement requirement for a route
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct EntitlementRequirement {
    /// The capability rule
    pub rule: EntitlementRule,
    /// Whether a denial should automatically surface blocking UI
    #[serde(default)]
    pub auto_block_ui: bool,
}

impl EntitlementRequirement {
    /// No requirement
    pub fn none() -> Self {
        Self::default()
    }

    /// Requires a single capability
    pub fn single(capability: impl Into<Capability>) -> Self {
        Self { rule: EntitlementRule::Single(capability.into()), auto_block_ui: false }
    }

    /// Requires any of the capabilities
    pub fn any_of<I, C>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Capability>,
    {
        Self {
            rule: EntitlementRule::AnyOf(capabilities.into_iter().map(Into::into).collect()),
            auto_block_ui: false,
        }
    }

    /// Requires all of the capabilities
    pub fn all_of<I, C>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Capability>,
    {
        Self {
            rule: EntitlementRule::AllOf(capabilities.into_iter().map(Into::into).collect()),
            auto_block_ui: false,
        }
    }

    /// Set the auto-block-UI policy
    pub fn auto_block_ui(mut self, enabled: bool) -> Self {
        self.auto_block_ui = enabled;
        self
    }

    /// Whether this requirement gates anything
    pub fn is_none(&self) -> bool {
        matches!(self.rule, EntitlementRule::None)
    }

    /// Check the requirement against an entitlement store
    pub fn is_satisfied_by(&self, store: &dyn EntitlementStore) -> bool {
        match &self.rule {
            EntitlementRule::None => true,
            EntitlementRule::Single(cap) => store.has_entitlement(cap),
            EntitlementRule::AnyOf(caps) => caps.iter().any(|c| store.has_entitlement(c)),
            EntitlementRule::AllOf(caps) => caps.iter().all(|c| store.has_entitlement(c)),
        }
    }
}

/// Answers whether the current user holds a capability
pub trait EntitlementStore: Send + Sync {
    /// Check a single capability
    fn has_entitlement(&self, capability: &Capability) -> bool;
}

/// A fixed set of capabilities
impl EntitlementStore for HashSet<Capability> {
    fn has_entitlement(&self, capability: &Capability) -> bool {
        self.contains(capability)
    }
}
