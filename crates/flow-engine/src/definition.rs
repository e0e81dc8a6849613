//! Flow definitions and step resolution
//!
//! A flow is a canonical ordered list of steps plus conditional rules:
//! branches swap a step for another in place, skips drop a step. Which
//! rules are active is decided by an injected [`ConditionEvaluator`].

use crate::error::{FlowError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Identity of a step: `(flow, step)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowStep {
    /// Flow name
    pub flow: String,
    /// Step name
    pub step: String,
}

/// Replace `replacing` with `with` when `when` is active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRule {
    /// Canonical step being replaced
    pub replacing: String,
    /// Replacement step
    pub with: String,
    /// Condition key
    pub when: String,
}

/// Drop `step` when `when` is active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRule {
    /// Step to drop (canonical or branched-in)
    pub step: String,
    /// Condition key
    pub when: String,
}

/// Answers whether a condition key is currently true
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluate a condition key; unknown keys are false
    fn is_active(&self, key: &str) -> bool;
}

impl ConditionEvaluator for HashMap<String, bool> {
    fn is_active(&self, key: &str) -> bool {
        self.get(key).copied().unwrap_or(false)
    }
}

/// Mutable condition set shared between the app and the engine
#[derive(Debug, Default)]
pub struct ConditionSet {
    flags: RwLock<HashMap<String, bool>>,
}

impl ConditionSet {
    /// Create an empty set (every condition false)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a condition
    pub fn set(&self, key: impl Into<String>, value: bool) {
        self.flags.write().insert(key.into(), value);
    }

    /// Builder-style set
    pub fn with(self, key: impl Into<String>, value: bool) -> Self {
        self.set(key, value);
        self
    }
}

impl ConditionEvaluator for ConditionSet {
    fn is_active(&self, key: &str) -> bool {
        self.flags.read().get(key).copied().unwrap_or(false)
    }
}

/// A declared flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// Flow name
    pub name: String,
    /// Canonical step order
    pub steps: Vec<String>,
    /// Branch rules in declaration order
    #[serde(default)]
    pub branches: Vec<BranchRule>,
    /// Skip rules
    #[serde(default)]
    pub skips: Vec<SkipRule>,
    /// Whether state survives restarts
    #[serde(default)]
    pub persists: bool,
}

impl FlowDefinition {
    /// Declare a flow with its canonical steps
    pub fn new<I, S>(name: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            steps: steps.into_iter().map(Into::into).collect(),
            branches: Vec::new(),
            skips: Vec::new(),
            persists: false,
        }
    }

    /// Add a branch rule
    pub fn branch(
        mut self,
        replacing: impl Into<String>,
        with: impl Into<String>,
        when: impl Into<String>,
    ) -> Self {
        self.branches.push(BranchRule {
            replacing: replacing.into(),
            with: with.into(),
            when: when.into(),
        });
        self
    }

    /// Add a skip rule
    pub fn skip(mut self, step: impl Into<String>, when: impl Into<String>) -> Self {
        self.skips.push(SkipRule { step: step.into(), when: when.into() });
        self
    }

    /// Mark the flow as persistent
    pub fn persists(mut self, persists: bool) -> Self {
        self.persists = persists;
        self
    }

    /// Check the declaration is internally consistent
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| FlowError::InvalidDefinition { flow: self.name.clone(), reason };

        if self.steps.is_empty() {
            return Err(invalid("no steps declared".to_string()));
        }

        let canonical: HashSet<&str> = self.steps.iter().map(String::as_str).collect();
        if canonical.len() != self.steps.len() {
            return Err(invalid("duplicate step names".to_string()));
        }

        for rule in &self.branches {
            if !canonical.contains(rule.replacing.as_str()) {
                return Err(invalid(format!("branch replaces unknown step {}", rule.replacing)));
            }
            if canonical.contains(rule.with.as_str()) {
                return Err(invalid(format!("branch target {} is already a canonical step", rule.with)));
            }
        }

        for rule in &self.skips {
            let known = canonical.contains(rule.step.as_str())
                || self.branches.iter().any(|b| b.with == rule.step);
            if !known {
                return Err(invalid(format!("skip names unknown step {}", rule.step)));
            }
        }

        Ok(())
    }

    /// Whether `step` can ever appear in this flow
    pub fn knows_step(&self, step: &str) -> bool {
        self.steps.iter().any(|s| s == step) || self.branches.iter().any(|b| b.with == step)
    }

    /// Canonical position of a step; a branched-in step takes the slot it replaces
    pub fn canonical_position(&self, step: &str) -> Option<usize> {
        self.steps.iter().position(|s| s == step).or_else(|| {
            self.branches
                .iter()
                .find(|b| b.with == step)
                .and_then(|b| self.steps.iter().position(|s| *s == b.replacing))
        })
    }

    /// Resolve the active step list
    ///
    /// Branches are matched against canonical steps; when several active
    /// rules target the same step the last declared wins. Skips run after
    /// branches, so a branched-in step can still be skipped.
    pub fn resolve(&self, conditions: &dyn ConditionEvaluator) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| {
                self.branches
                    .iter()
                    .rev()
                    .find(|rule| rule.replacing == *step && conditions.is_active(&rule.when))
                    .map(|rule| rule.with.clone())
                    .unwrap_or_else(|| step.clone())
            })
            .filter(|step| {
                !self
                    .skips
                    .iter()
                    .any(|rule| rule.step == *step && conditions.is_active(&rule.when))
            })
            .collect()
    }
}
