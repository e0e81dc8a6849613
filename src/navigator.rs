//! Navigator facade
//!
//! The single owner of navigation state. Tree transitions run under one
//! lock, so a deep link's compound transition is never interleaved with
//! other callers. Flow transitions go through the flow engine, which
//! serializes each flow on its own.

use crate::config::NavigatorConfig;
use crate::error::Result;
use deep_link::{DeepLinkPlan, DeepLinkResolver, Resolution};
use flow_engine::{
    ConditionEvaluator, DataBag, FlowDefinition, FlowEngine, FlowEngineBuilder, FlowState, StepValidator,
};
use navigation::{
    BlockedNavigation, NavigationCoordinator, NavigationOutcome, NavigationTree, StackEntry,
};
use parking_lot::Mutex;
use route_model::{Capability, EntitlementRequirement, EntitlementStore, PresentationStyle, Route, RouteRegistry, TabId};
use std::collections::HashSet;
use std::sync::Arc;
use storage::SnapshotStore;

/// What handling a deep link did
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// The navigation tree now shows the link's target
    Navigated,
    /// A route was denied; the tree is unchanged
    Blocked {
        /// Denied route, when known
        route: Option<Route>,
        /// Requirement the caller failed
        requirement: EntitlementRequirement,
    },
    /// A flow was started
    FlowStarted(FlowState),
}

impl From<BlockedNavigation> for HandleOutcome {
    fn from(blocked: BlockedNavigation) -> Self {
        HandleOutcome::Blocked { route: Some(blocked.route), requirement: blocked.requirement }
    }
}

/// Builder for [`Navigator`]
pub struct NavigatorBuilder {
    registry: RouteRegistry,
    entitlements: Arc<dyn EntitlementStore>,
    flows: FlowEngineBuilder,
    config: NavigatorConfig,
}

impl NavigatorBuilder {
    /// Set the entitlement store (defaults to an empty grant set)
    pub fn entitlements(mut self, entitlements: Arc<dyn EntitlementStore>) -> Self {
        self.entitlements = entitlements;
        self
    }

    /// Register a flow
    pub fn flow(mut self, definition: FlowDefinition) -> Self {
        self.flows = self.flows.flow(definition);
        self
    }

    /// Set the flow condition evaluator
    pub fn conditions(mut self, conditions: Arc<dyn ConditionEvaluator>) -> Self {
        self.flows = self.flows.conditions(conditions);
        self
    }

    /// Set the flow step validator
    pub fn validator(mut self, validator: Arc<dyn StepValidator>) -> Self {
        self.flows = self.flows.validator(validator);
        self
    }

    /// Set the flow snapshot store
    pub fn store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.flows = self.flows.store(store);
        self
    }

    /// Set the configuration
    pub fn config(mut self, config: NavigatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the navigator
    pub fn build(self) -> Result<Navigator> {
        let flows = self.flows.snapshot_version(self.config.snapshot_version).build()?;
        let coordinator = NavigationCoordinator::new(
            self.registry.clone(),
            Arc::clone(&self.entitlements),
            self.config.coordinator(),
        );
        let resolver = DeepLinkResolver::new(self.registry, self.config.resolver());

        Ok(Navigator {
            coordinator: Mutex::new(coordinator),
            flows,
            resolver,
            entitlements: self.entitlements,
        })
    }
}

/// Facade over the coordinator, the flow engine and the deep link resolver
pub struct Navigator {
    coordinator: Mutex<NavigationCoordinator>,
    flows: FlowEngine,
    resolver: DeepLinkResolver,
    entitlements: Arc<dyn EntitlementStore>,
}

impl Navigator {
    /// Start building a navigator over a registry
    pub fn builder(registry: RouteRegistry) -> NavigatorBuilder {
        NavigatorBuilder {
            registry,
            entitlements: Arc::new(HashSet::<Capability>::new()),
            flows: FlowEngine::builder(),
            config: NavigatorConfig::default(),
        }
    }

    /// The route registry
    pub fn registry(&self) -> &RouteRegistry {
        self.resolver.codec().registry()
    }

    /// The flow engine
    pub fn flows(&self) -> &FlowEngine {
        &self.flows
    }

    /// The deep link resolver
    pub fn resolver(&self) -> &DeepLinkResolver {
        &self.resolver
    }

    /// Run a read-only closure against the coordinator
    pub fn inspect<R>(&self, f: impl FnOnce(&NavigationCoordinator) -> R) -> R {
        f(&self.coordinator.lock())
    }

    /// Snapshot of the navigation tree
    pub fn tree(&self) -> NavigationTree {
        self.coordinator.lock().tree().clone()
    }

    /// Route currently on screen in the active tab
    pub fn current_route(&self) -> Option<Route> {
        self.coordinator.lock().current_route().cloned()
    }

    /// Active tab
    pub fn active_tab(&self) -> TabId {
        self.coordinator.lock().active_tab()
    }

    /// Root stack of a tab
    pub fn tab_stack(&self, tab: TabId) -> Vec<StackEntry> {
        self.coordinator.lock().tab_stack(tab).map(<[StackEntry]>::to_vec).unwrap_or_default()
    }

    /// Number of overlays in the active tab
    pub fn overlay_depth(&self) -> usize {
        self.coordinator.lock().overlay_depth()
    }

    /// Resolve a route's presentation style
    pub fn resolve_style(&self, route: &Route) -> PresentationStyle {
        self.registry().resolve_style(route)
    }

    /// Resolve a route's entitlement requirement
    pub fn resolve_entitlement(&self, route: &Route) -> EntitlementRequirement {
        self.registry().resolve_entitlement(route)
    }

    /// Encode a route as a URL path
    pub fn encode(&self, route: &Route) -> Result<String> {
        Ok(self.resolver.codec().encode(route)?)
    }

    /// Decode a URL path into a route
    pub fn decode(&self, path: &str) -> Result<Route> {
        Ok(self.resolver.codec().decode(path)?)
    }

    /// Navigate with an explicit style
    pub fn navigate(&self, route: Route, style: PresentationStyle) -> Result<NavigationOutcome> {
        Ok(self.coordinator.lock().navigate(route, style)?)
    }

    /// Navigate with the route's declared style
    pub fn navigate_resolved(&self, route: Route) -> Result<NavigationOutcome> {
        Ok(self.coordinator.lock().navigate_resolved(route)?)
    }

    /// Dismiss up to `levels` overlays, returning how many were dismissed
    pub fn dismiss(&self, levels: usize) -> usize {
        self.coordinator.lock().dismiss(levels)
    }

    /// Dismiss the innermost overlay unless it is dismiss-locked
    pub fn interactive_dismiss(&self) -> bool {
        self.coordinator.lock().interactive_dismiss()
    }

    /// Clear the active tab's root stack
    pub fn pop_to_root(&self) {
        self.coordinator.lock().pop_to_root();
    }

    /// Go back one step
    pub fn go_back(&self) -> bool {
        self.coordinator.lock().go_back()
    }

    /// Switch tab and replay routes, all or nothing
    pub fn switch_tab(&self, tab: TabId, then: Vec<(Route, PresentationStyle)>) -> Result<NavigationOutcome> {
        Ok(self.coordinator.lock().switch_tab(tab, then)?)
    }

    /// Handle an incoming deep link
    pub async fn handle(&self, url: &str) -> Result<HandleOutcome> {
        tracing::info!(url = %url, "Handling deep link");

        let plan = match self.resolver.resolve(url, self.entitlements.as_ref())? {
            Resolution::Blocked(blocked) => {
                self.coordinator.lock().record_blocked(blocked.clone());
                return Ok(blocked.into());
            }
            Resolution::Success(plan) => plan,
        };

        match plan {
            DeepLinkPlan::Navigate { actions, .. } => {
                let outcome = self.coordinator.lock().apply(actions)?;
                Ok(match outcome {
                    NavigationOutcome::Applied => HandleOutcome::Navigated,
                    NavigationOutcome::Blocked(requirement) => HandleOutcome::Blocked { route: None, requirement },
                })
            }
            DeepLinkPlan::StartFlow { flow, step } => {
                let state = match step {
                    Some(step) => self.flows.start_flow_at(&flow, &step).await?,
                    None => self.flows.start_flow(&flow).await?,
                };
                Ok(HandleOutcome::FlowStarted(state))
            }
        }
    }

    /// Deep link for what the active tab shows
    pub fn current_deep_link(&self) -> Result<String> {
        let tree = self.tree();
        Ok(self.resolver.to_url(&tree)?)
    }

    /// Start a flow
    pub async fn start_flow(&self, name: &str) -> Result<FlowState> {
        Ok(self.flows.start_flow(name).await?)
    }

    /// Advance a flow, merging `data`
    pub async fn advance_flow(&self, name: &str, data: DataBag) -> Result<FlowState> {
        Ok(self.flows.advance(name, data).await?)
    }

    /// Go back one step in a flow
    pub async fn back_flow(&self, name: &str) -> Result<FlowState> {
        Ok(self.flows.back(name).await?)
    }

    /// Finish a flow at its final step
    pub async fn complete_flow(&self, name: &str) -> Result<DataBag> {
        Ok(self.flows.complete(name).await?)
    }

    /// Cancel a flow
    pub async fn cancel_flow(&self, name: &str) -> Result<bool> {
        Ok(self.flows.cancel(name).await?)
    }
}
