//! Flow engine
//!
//! Owns every running flow instance. Transitions of one instance are
//! serialized by an async mutex held across validation and persistence;
//! different flows proceed independently.

use crate::definition::{ConditionEvaluator, ConditionSet, FlowDefinition, FlowStep};
use crate::error::{FlowError, Result};
use crate::state::{DataBag, FlowState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use storage::{MemorySnapshotStore, SnapshotStore};
use tokio::sync::watch;

/// Snapshot schema version written by default
pub const DEFAULT_SNAPSHOT_VERSION: u32 = 1;

/// Validates a step before the flow advances past it
#[async_trait]
pub trait StepValidator: Send + Sync {
    /// Accept or reject leaving `step` with `data`
    async fn validate(&self, step: &FlowStep, data: &DataBag) -> Result<()>;
}

/// Validator that accepts everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

#[async_trait]
impl StepValidator for AcceptAll {
    async fn validate(&self, _step: &FlowStep, _data: &DataBag) -> Result<()> {
        Ok(())
    }
}

struct FlowInstance {
    definition: Arc<FlowDefinition>,
    state: tokio::sync::Mutex<Option<FlowState>>,
    cancel: watch::Sender<bool>,
}

impl FlowInstance {
    fn new(definition: Arc<FlowDefinition>, state: FlowState) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            definition,
            state: tokio::sync::Mutex::new(Some(state)),
            cancel,
        }
    }
}

/// Builder for [`FlowEngine`]
pub struct FlowEngineBuilder {
    definitions: Vec<FlowDefinition>,
    conditions: Arc<dyn ConditionEvaluator>,
    validator: Arc<dyn StepValidator>,
    store: Arc<dyn SnapshotStore>,
    snapshot_version: u32,
}

impl Default for FlowEngineBuilder {
    fn default() -> Self {
        Self {
            definitions: Vec::new(),
            conditions: Arc::new(ConditionSet::new()),
            validator: Arc::new(AcceptAll),
            store: Arc::new(MemorySnapshotStore::new()),
            snapshot_version: DEFAULT_SNAPSHOT_VERSION,
        }
    }
}

impl FlowEngineBuilder {
    /// Register a flow
    pub fn flow(mut self, definition: FlowDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Set the condition evaluator
    pub fn conditions(mut self, conditions: Arc<dyn ConditionEvaluator>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set the step validator
    pub fn validator(mut self, validator: Arc<dyn StepValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Set the snapshot store
    pub fn store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = store;
        self
    }

    /// Set the snapshot schema version
    pub fn snapshot_version(mut self, version: u32) -> Self {
        self.snapshot_version = version;
        self
    }

    /// Validate every definition and build the engine
    pub fn build(self) -> Result<FlowEngine> {
        let mut definitions = HashMap::new();
        for definition in self.definitions {
            definition.validate()?;
            let name = definition.name.clone();
            if definitions.insert(name.clone(), Arc::new(definition)).is_some() {
                return Err(FlowError::InvalidDefinition {
                    flow: name,
                    reason: "registered twice".to_string(),
                });
            }
        }

        Ok(FlowEngine {
            definitions,
            conditions: self.conditions,
            validator: self.validator,
            store: self.store,
            snapshot_version: self.snapshot_version,
            instances: Mutex::new(HashMap::new()),
        })
    }
}

/// Runs flows
pub struct FlowEngine {
    definitions: HashMap<String, Arc<FlowDefinition>>,
    conditions: Arc<dyn ConditionEvaluator>,
    validator: Arc<dyn StepValidator>,
    store: Arc<dyn SnapshotStore>,
    snapshot_version: u32,
    instances: Mutex<HashMap<String, Arc<FlowInstance>>>,
}

impl FlowEngine {
    /// Start building an engine
    pub fn builder() -> FlowEngineBuilder {
        FlowEngineBuilder::default()
    }

    /// A registered definition
    pub fn definition(&self, name: &str) -> Result<Arc<FlowDefinition>> {
        self.definitions
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::UnknownFlow(name.to_string()))
    }

    /// Whether a flow with this name is registered
    pub fn has_flow(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Names of flows with a live instance
    pub fn active_flows(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn live(&self, name: &str) -> Result<Arc<FlowInstance>> {
        if !self.definitions.contains_key(name) {
            return Err(FlowError::UnknownFlow(name.to_string()));
        }
        self.instances
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::NotStarted(name.to_string()))
    }

    fn snapshot_key(name: &str) -> String {
        format!("flow:{}", name)
    }

    /// Start a flow
    ///
    /// A persistent flow resumes its live instance or stored snapshot. A
    /// non-persistent flow always starts fresh at the first resolved step.
    pub async fn start_flow(&self, name: &str) -> Result<FlowState> {
        let definition = self.definition(name)?;

        if definition.persists {
            if let Ok(instance) = self.live(name) {
                if let Some(state) = instance.state.lock().await.as_ref() {
                    return Ok(state.clone());
                }
            }
            if let Some(state) = self.restore(&definition).await? {
                tracing::info!(flow = %name, step = %state.current_step(), "Resumed persisted flow");
                return self.install(definition, state).await;
            }
        }

        let state = FlowState::start(&definition, self.conditions.as_ref())?;
        tracing::info!(flow = %name, step = %state.current_step(), "Started flow");
        self.install(definition, state).await
    }

    /// Start a flow fresh, positioned at `step`
    pub async fn start_flow_at(&self, name: &str, step: &str) -> Result<FlowState> {
        let definition = self.definition(name)?;
        let state = FlowState::start_at(&definition, self.conditions.as_ref(), step)?;
        tracing::info!(flow = %name, step = %step, "Started flow at step");
        self.install(definition, state).await
    }

    /// Load every persisted flow that has no live instance yet
    pub async fn restore_persisted(&self) -> Result<Vec<String>> {
        let mut restored = Vec::new();
        for definition in self.definitions.values().filter(|d| d.persists) {
            if self.instances.lock().contains_key(&definition.name) {
                continue;
            }
            if let Some(state) = self.restore(definition).await? {
                self.install(Arc::clone(definition), state).await?;
                restored.push(definition.name.clone());
            }
        }
        restored.sort();
        Ok(restored)
    }

    async fn restore(&self, definition: &FlowDefinition) -> Result<Option<FlowState>> {
        let key = Self::snapshot_key(&definition.name);
        let Some(bytes) = self.store.load(&key).await? else {
            return Ok(None);
        };

        match storage::open::<FlowState>(self.snapshot_version, &bytes) {
            Ok(mut state) if state.fits(definition) => {
                state.reconcile(definition, self.conditions.as_ref())?;
                Ok(Some(state))
            }
            Ok(_) => {
                tracing::warn!(flow = %definition.name, "Discarding snapshot that no longer fits its flow");
                self.store.remove(&key).await?;
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(flow = %definition.name, error = %e, "Discarding unreadable flow snapshot");
                self.store.remove(&key).await?;
                Ok(None)
            }
        }
    }

    async fn install(&self, definition: Arc<FlowDefinition>, state: FlowState) -> Result<FlowState> {
        self.persist(&definition, &state).await?;
        let name = definition.name.clone();
        let instance = Arc::new(FlowInstance::new(definition, state.clone()));
        if let Some(previous) = self.instances.lock().insert(name, instance) {
            previous.cancel.send_replace(true);
        }
        Ok(state)
    }

    async fn persist(&self, definition: &FlowDefinition, state: &FlowState) -> Result<()> {
        if !definition.persists {
            return Ok(());
        }
        let blob = storage::seal(self.snapshot_version, state)?;
        self.store.save(&Self::snapshot_key(&definition.name), blob).await?;
        Ok(())
    }

    /// Run a synchronous transition on a scratch copy and commit it after persisting
    async fn transition<F>(&self, name: &str, op: F) -> Result<FlowState>
    where
        F: FnOnce(&mut FlowState) -> Result<()> + Send,
    {
        let instance = self.live(name)?;
        let mut guard = instance.state.lock().await;
        let state = guard.as_mut().ok_or_else(|| FlowError::NotStarted(name.to_string()))?;

        let mut next = state.clone();
        next.reconcile(&instance.definition, self.conditions.as_ref())?;
        op(&mut next)?;
        self.persist(&instance.definition, &next).await?;

        tracing::debug!(flow = %name, step = %next.current_step(), "Flow transition");
        *state = next;
        Ok(state.clone())
    }

    /// Validate the current step, then move forward merging `data`
    ///
    /// A concurrent [`FlowEngine::cancel`] aborts a pending validation; the
    /// call then fails with [`FlowError::Cancelled`] and nothing is merged.
    pub async fn advance(&self, name: &str, data: DataBag) -> Result<FlowState> {
        let instance = self.live(name)?;
        let mut cancelled = instance.cancel.subscribe();
        let mut guard = instance.state.lock().await;
        let state = guard.as_mut().ok_or_else(|| FlowError::NotStarted(name.to_string()))?;

        let mut next = state.clone();
        next.reconcile(&instance.definition, self.conditions.as_ref())?;
        if next.is_at_final_step() {
            return Err(FlowError::AtFinalStep);
        }

        let step = FlowStep {
            flow: name.to_string(),
            step: next.current_step().to_string(),
        };

        tokio::select! {
            biased;
            _ = wait_for_cancel(&mut cancelled) => {
                tracing::debug!(flow = %name, step = %step.step, "Advance cancelled during validation");
                return Err(FlowError::Cancelled);
            }
            result = self.validator.validate(&step, &data) => {
                if let Err(e) = result {
                    tracing::debug!(flow = %name, step = %step.step, error = %e, "Step validation failed");
                    return Err(e);
                }
            }
        }

        next.advance(data)?;
        self.persist(&instance.definition, &next).await?;

        tracing::debug!(flow = %name, from = %step.step, to = %next.current_step(), "Flow advanced");
        *state = next;
        Ok(state.clone())
    }

    /// Return to the previous step
    pub async fn back(&self, name: &str) -> Result<FlowState> {
        self.transition(name, FlowState::back).await
    }

    /// Jump to a step
    pub async fn jump_to(&self, name: &str, step: &str) -> Result<FlowState> {
        self.transition(name, |state| state.jump_to(step)).await
    }

    /// Re-resolve a running flow after its conditions changed
    pub async fn refresh_conditions(&self, name: &str) -> Result<FlowState> {
        self.transition(name, |_| Ok(())).await
    }

    /// Finish a flow at its final step, returning the collected data
    pub async fn complete(&self, name: &str) -> Result<DataBag> {
        let instance = self.live(name)?;
        let mut guard = instance.state.lock().await;
        let state = guard.as_ref().ok_or_else(|| FlowError::NotStarted(name.to_string()))?;

        let mut last = state.clone();
        last.reconcile(&instance.definition, self.conditions.as_ref())?;
        if !last.is_at_final_step() {
            return Err(FlowError::NotAtFinalStep);
        }

        if instance.definition.persists {
            self.store.remove(&Self::snapshot_key(name)).await?;
        }
        guard.take();
        drop(guard);
        self.forget(name, &instance);

        tracing::info!(flow = %name, "Flow completed");
        Ok(last.into_data())
    }

    /// Cancel a flow, aborting any in-flight validation
    ///
    /// Returns whether a live instance existed. A stored snapshot is removed
    /// either way.
    pub async fn cancel(&self, name: &str) -> Result<bool> {
        let definition = self.definition(name)?;
        let instance = self.instances.lock().remove(name);

        let was_running = match instance {
            Some(instance) => {
                instance.cancel.send_replace(true);
                instance.state.lock().await.take().is_some()
            }
            None => false,
        };

        if definition.persists {
            self.store.remove(&Self::snapshot_key(name)).await?;
        }

        tracing::info!(flow = %name, was_running, "Flow cancelled");
        Ok(was_running)
    }

    /// Current state of a flow, if running
    pub async fn state(&self, name: &str) -> Option<FlowState> {
        let instance = self.live(name).ok()?;
        let guard = instance.state.lock().await;
        guard.clone()
    }

    fn forget(&self, name: &str, instance: &Arc<FlowInstance>) {
        let mut instances = self.instances.lock();
        if instances.get(name).is_some_and(|live| Arc::ptr_eq(live, instance)) {
            instances.remove(name);
        }
    }
}

async fn wait_for_cancel(cancelled: &mut watch::Receiver<bool>) {
    let closed = cancelled.wait_for(|flag| *flag).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
