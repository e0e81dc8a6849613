//! Flow instance state
//!
//! [`FlowState`] is the pure state machine behind a running flow. It knows
//! nothing about validation, locking or persistence; the engine drives it
//! on a scratch copy and commits only when every side effect succeeded.

use crate::definition::{ConditionEvaluator, FlowDefinition};
use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Data accumulated across steps
pub type DataBag = BTreeMap<String, serde_json::Value>;

/// State of one running flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    flow: String,
    steps: Vec<String>,
    current: usize,
    history: Vec<String>,
    #[serde(default)]
    data: DataBag,
}

impl FlowState {
    /// Fresh state at the first resolved step
    pub(crate) fn start(definition: &FlowDefinition, conditions: &dyn ConditionEvaluator) -> Result<Self> {
        let steps = resolve_non_empty(definition, conditions)?;
        Ok(Self {
            flow: definition.name.clone(),
            steps,
            current: 0,
            history: Vec::new(),
            data: DataBag::new(),
        })
    }

    /// Fresh state positioned at `step`, with the preceding steps as history
    pub(crate) fn start_at(
        definition: &FlowDefinition,
        conditions: &dyn ConditionEvaluator,
        step: &str,
    ) -> Result<Self> {
        let mut state = Self::start(definition, conditions)?;
        let index = state.index_of(step).ok_or_else(|| FlowError::InvalidJump {
            from: state.steps[0].clone(),
            to: step.to_string(),
        })?;
        state.history = state.steps[..index].to_vec();
        state.current = index;
        Ok(state)
    }

    /// Flow name
    pub fn flow(&self) -> &str {
        &self.flow
    }

    /// Resolved step list
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Current step name
    pub fn current_step(&self) -> &str {
        &self.steps[self.current]
    }

    /// Index of the current step within [`FlowState::steps`]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Visited steps, oldest first
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Collected data
    pub fn data(&self) -> &DataBag {
        &self.data
    }

    /// Consume the state, keeping only its data
    pub fn into_data(self) -> DataBag {
        self.data
    }

    /// Whether the current step is the last resolved step
    pub fn is_at_final_step(&self) -> bool {
        self.current + 1 == self.steps.len()
    }

    fn index_of(&self, step: &str) -> Option<usize> {
        self.steps.iter().position(|s| s == step)
    }

    /// Move to the next resolved step, merging `data`
    pub(crate) fn advance(&mut self, data: DataBag) -> Result<()> {
        if self.is_at_final_step() {
            return Err(FlowError::AtFinalStep);
        }
        self.history.push(self.current_step().to_string());
        self.current += 1;
        self.data.extend(data);
        Ok(())
    }

    /// Return to the most recent history entry that is still resolved
    pub(crate) fn back(&mut self) -> Result<()> {
        let mut history = self.history.clone();
        while let Some(step) = history.pop() {
            if let Some(index) = self.index_of(&step) {
                self.history = history;
                self.current = index;
                return Ok(());
            }
        }
        Err(FlowError::NoHistory)
    }

    /// Whether [`jump_to`](crate::FlowEngine::jump_to) may move to `step`
    ///
    /// Forward jumps within the resolved steps are allowed; backward jumps
    /// need the target in history.
    pub fn can_jump_to(&self, step: &str) -> bool {
        match self.index_of(step) {
            Some(index) if index > self.current => true,
            Some(index) if index < self.current => self.history.iter().any(|s| s == step),
            Some(_) => true,
            None => false,
        }
    }

    /// Jump to a resolved step
    ///
    /// History is truncated to the point a backward target was left.
    /// Forward targets record the current step.
    pub(crate) fn jump_to(&mut self, step: &str) -> Result<()> {
        if !self.can_jump_to(step) {
            return Err(FlowError::InvalidJump {
                from: self.current_step().to_string(),
                to: step.to_string(),
            });
        }
        let Some(index) = self.index_of(step) else {
            return Ok(());
        };

        if index == self.current {
            return Ok(());
        }

        if index < self.current {
            if let Some(position) = self.history.iter().rposition(|s| s == step) {
                self.history.truncate(position);
            }
        } else {
            self.history.push(self.current_step().to_string());
        }
        self.current = index;
        Ok(())
    }

    /// Re-resolve the step list against current conditions
    ///
    /// If the current step is no longer resolved the state moves to the
    /// nearest following survivor by canonical position, or the last step.
    pub(crate) fn reconcile(&mut self, definition: &FlowDefinition, conditions: &dyn ConditionEvaluator) -> Result<()> {
        let steps = resolve_non_empty(definition, conditions)?;
        let current = self.current_step().to_string();

        let index = steps.iter().position(|s| *s == current).unwrap_or_else(|| {
            definition
                .canonical_position(&current)
                .and_then(|anchor| {
                    steps
                        .iter()
                        .position(|s| definition.canonical_position(s).is_some_and(|p| p >= anchor))
                })
                .unwrap_or(steps.len() - 1)
        });

        if index != self.current || steps != self.steps {
            tracing::debug!(flow = %self.flow, from = %current, to = %steps[index], "Flow steps re-resolved");
        }
        self.steps = steps;
        self.current = index;
        Ok(())
    }

    /// Whether this state was restored into a definition it still fits
    pub(crate) fn fits(&self, definition: &FlowDefinition) -> bool {
        self.flow == definition.name
            && self.current < self.steps.len()
            && self.steps.iter().all(|s| definition.knows_step(s))
    }
}

fn resolve_non_empty(definition: &FlowDefinition, conditions: &dyn ConditionEvaluator) -> Result<Vec<String>> {
    let steps = definition.resolve(conditions);
    if steps.is_empty() {
        return Err(FlowError::EmptyFlow(definition.name.clone()));
    }
    Ok(steps)
}
