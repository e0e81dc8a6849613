//! Deep link resolver
//!
//! Turns a URL into a plan the coordinator or flow engine can apply, and
//! turns the visible navigation state back into a URL.

use crate::codec::{render_query, DeepLinkCodec, EncodeError};
use crate::link::{DeepLinkError, DeepLinkUrl, Result, FLOW_SEGMENT, STEP_SEGMENT};
use navigation::{BlockedNavigation, NavigationAction, NavigationTree};
use route_model::{EntitlementStore, PresentationStyle, Route, RouteRegistry, TabId, RESERVED_PARAM};
use serde::{Deserialize, Serialize};
use url::Url;

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Accepted URL scheme
    pub scheme: String,
    /// Accepted host (`None` accepts any)
    pub host: Option<String>,
    /// Clear the target tab before replaying a route URL
    pub reset_tab: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            scheme: "app".to_string(),
            host: None,
            reset_tab: true,
        }
    }
}

impl ResolverConfig {
    /// Create a configuration for a scheme
    pub fn new(scheme: impl Into<String>) -> Self {
        Self { scheme: scheme.into(), ..Default::default() }
    }

    /// Restrict to a host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Enable or disable clearing the target tab
    pub fn reset_tab(mut self, reset: bool) -> Self {
        self.reset_tab = reset;
        self
    }
}

/// What a deep link asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLinkPlan {
    /// Apply these actions as one compound transition
    Navigate {
        /// Target tab
        tab: TabId,
        /// Actions in order
        actions: Vec<NavigationAction>,
    },
    /// Start a flow, optionally at a step
    StartFlow {
        /// Flow name
        flow: String,
        /// Step to start at
        step: Option<String>,
    },
}

/// Outcome of resolving a deep link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every action is allowed
    Success(DeepLinkPlan),
    /// The first denied route and its requirement; nothing should be applied
    Blocked(BlockedNavigation),
}

/// Resolves deep links against a route registry
#[derive(Debug, Clone)]
pub struct DeepLinkResolver {
    codec: DeepLinkCodec,
    config: ResolverConfig,
}

impl DeepLinkResolver {
    /// Create a resolver
    pub fn new(registry: RouteRegistry, config: ResolverConfig) -> Self {
        Self { codec: DeepLinkCodec::new(registry), config }
    }

    /// The underlying codec
    pub fn codec(&self) -> &DeepLinkCodec {
        &self.codec
    }

    /// The resolver configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn registry(&self) -> &RouteRegistry {
        self.codec.registry()
    }

    /// Parse a URL, checking scheme and host
    pub fn parse(&self, input: &str) -> Result<DeepLinkUrl> {
        let url = Url::parse(input).map_err(|e| DeepLinkError::InvalidUrl(format!("{}: {}", input, e)))?;

        if url.scheme() != self.config.scheme {
            return Err(DeepLinkError::InvalidUrl(format!("unexpected scheme in {}", input)));
        }
        if let Some(host) = &self.config.host {
            if url.host_str() != Some(host.as_str()) {
                return Err(DeepLinkError::InvalidUrl(format!("unexpected host in {}", input)));
            }
        }

        DeepLinkUrl::from_url(&url)
    }

    /// Build the plan for a parsed link, without entitlement checks
    pub fn plan(&self, link: &DeepLinkUrl) -> Result<DeepLinkPlan> {
        let (segments, query, present) = match link {
            DeepLinkUrl::Flow { flow, step } => {
                return Ok(DeepLinkPlan::StartFlow { flow: flow.clone(), step: step.clone() });
            }
            DeepLinkUrl::Route { segments, query, present } => (segments, query, present),
        };

        let path = segments.join("/");
        let (tab_segment, rest) = segments
            .split_first()
            .ok_or_else(|| DeepLinkError::AmbiguousRoute(path.clone()))?;
        let tab = self
            .registry()
            .tab_by_name(tab_segment)
            .ok_or_else(|| DeepLinkError::AmbiguousRoute(path.clone()))?;
        let family = self
            .registry()
            .family(&tab.family)
            .ok_or_else(|| DeepLinkError::AmbiguousRoute(path.clone()))?;

        let routes = if rest.is_empty() {
            if !query.is_empty() || present.is_some() {
                return Err(DeepLinkError::InvalidUrl(format!("{}: query without a route", path)));
            }
            Vec::new()
        } else {
            let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
            self.codec.decode_chain(family, &rest, query)?
        };

        let mut actions = vec![NavigationAction::SwitchTab { tab: tab.id }];
        if self.config.reset_tab {
            actions.push(NavigationAction::ResetTab);
        }

        let last = routes.len().saturating_sub(1);
        for (index, route) in routes.into_iter().enumerate() {
            let style = match present {
                Some(style) if index == last => style.clone(),
                _ => self.registry().resolve_style(&route),
            };
            actions.push(NavigationAction::Navigate { route, style });
        }

        Ok(DeepLinkPlan::Navigate { tab: tab.id, actions })
    }

    /// Parse, plan and entitlement-check a deep link
    ///
    /// Navigate actions are checked in order; the first denial is returned
    /// as [`Resolution::Blocked`] and nothing else is considered.
    pub fn resolve(&self, input: &str, entitlements: &dyn EntitlementStore) -> Result<Resolution> {
        let link = match self.parse(input) {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!(url = %input, error = %e, "Rejected deep link");
                return Err(e);
            }
        };

        let plan = match self.plan(&link) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(url = %input, error = %e, "Rejected deep link");
                return Err(e);
            }
        };

        if let DeepLinkPlan::Navigate { actions, .. } = &plan {
            for action in actions {
                let NavigationAction::Navigate { route, .. } = action else {
                    continue;
                };
                let requirement = self.registry().resolve_entitlement(route);
                if !requirement.is_satisfied_by(entitlements) {
                    tracing::warn!(url = %input, route = %route, "Deep link blocked by entitlement");
                    return Ok(Resolution::Blocked(BlockedNavigation { route: route.clone(), requirement }));
                }
            }
        }

        tracing::info!(url = %input, "Resolved deep link");
        Ok(Resolution::Success(plan))
    }

    fn base(&self) -> String {
        format!("{}://{}", self.config.scheme, self.config.host.as_deref().unwrap_or_default())
    }

    /// URL for a chain of routes in a tab, with an optional override for the last route
    pub fn route_url(
        &self,
        tab: TabId,
        routes: &[Route],
        present: Option<&PresentationStyle>,
    ) -> std::result::Result<String, EncodeError> {
        let tab_decl = self
            .registry()
            .tab(tab)
            .ok_or_else(|| EncodeError::Unrepresentable(format!("unknown {}", tab)))?;
        let family = self
            .registry()
            .family(&tab_decl.family)
            .ok_or_else(|| EncodeError::Unrepresentable(format!("unknown family {}", tab_decl.family)))?;

        let mut url = format!("{}/{}", self.base(), tab_decl.name);
        if routes.is_empty() {
            return match present {
                Some(_) => Err(EncodeError::Unrepresentable("override without a route".to_string())),
                None => Ok(url),
            };
        }

        let mut encoded = self.codec.encode_chain(family, routes)?;
        if let Some(style) = present {
            encoded.query.push((RESERVED_PARAM.to_string(), style.to_string()));
        }

        url.push('/');
        url.push_str(&encoded.segments.join("/"));
        if !encoded.query.is_empty() {
            url.push('?');
            url.push_str(&render_query(&encoded.query));
        }
        Ok(url)
    }

    /// URL that starts a flow
    pub fn flow_url(&self, flow: &str, step: Option<&str>) -> String {
        let mut url = format!("{}/{}/{}", self.base(), FLOW_SEGMENT, urlencoding::encode(flow));
        if let Some(step) = step {
            url.push_str(&format!("/{}/{}", STEP_SEGMENT, urlencoding::encode(step)));
        }
        url
    }

    /// URL that rebuilds the active tab of `tree`
    ///
    /// Pushed entries must resolve to `push` and overlays to their
    /// presented style; only the last route may differ, via `present`.
    pub fn to_url(&self, tree: &NavigationTree) -> std::result::Result<String, EncodeError> {
        let mut chain: Vec<(Route, PresentationStyle)> = Vec::new();
        let mut frame = tree.active();
        loop {
            chain.extend(frame.stack().iter().map(|e| (e.route.clone(), PresentationStyle::Push)));
            match frame.overlay() {
                Some(node) => {
                    chain.push((node.route.clone(), node.style.clone()));
                    frame = &node.frame;
                }
                None => break,
            }
        }

        let last = chain.len().saturating_sub(1);
        let mut present = None;
        for (index, (route, style)) in chain.iter().enumerate() {
            if self.registry().resolve_style(route) == *style {
                continue;
            }
            if index != last {
                return Err(EncodeError::Unrepresentable(format!("{} is shown as {}", route, style)));
            }
            present = Some(style);
        }

        let routes: Vec<Route> = chain.iter().map(|(route, _)| route.clone()).collect();
        self.route_url(tree.active_tab(), &routes, present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use navigation::{CoordinatorConfig, NavigationCoordinator};
    use route_model::{
        Capability, CaseDecl, Detent, EntitlementRequirement, ParamKind, ParamValue, RouteFamily,
    };
    use std::sync::Arc;

    mock! {
        Entitlements {}
        impl EntitlementStore for Entitlements {
            fn has_entitlement(&self, capability: &Capability) -> bool;
        }
    }

    fn registry() -> RouteRegistry {
        RouteRegistry::builder()
            .tab(
                RouteFamily::new("Tasks", "tasks")
                    .case(CaseDecl::new("root"))
                    .case(CaseDecl::new("detail").param("id", ParamKind::Int))
                    .case(CaseDecl::new("tagged").param("tag", ParamKind::Str))
                    .case(CaseDecl::new("edit").style(PresentationStyle::sheet([Detent::Large])))
                    .case(
                        CaseDecl::new("export")
                            .style(PresentationStyle::FullScreen)
                            .entitlement(EntitlementRequirement::single(Capability::new("pro"))),
                    ),
            )
            .tab(RouteFamily::new("Settings", "settings").case(CaseDecl::new("root")))
            .build()
            .unwrap()
    }

    fn resolver() -> DeepLinkResolver {
        DeepLinkResolver::new(registry(), ResolverConfig::new("app").host("x"))
    }

    fn allow_all() -> MockEntitlements {
        let mut store = MockEntitlements::new();
        store.expect_has_entitlement().return_const(true);
        store
    }

    fn deny_all() -> MockEntitlements {
        let mut store = MockEntitlements::new();
        store.expect_has_entitlement().return_const(false);
        store
    }

    #[test]
    fn test_simple_push_plan() {
        let resolver = resolver();
        let resolution = resolver.resolve("app://x/tasks/root", &allow_all()).unwrap();
        let root = resolver.registry().route("Tasks", "root", vec![]).unwrap();
        assert_eq!(
            resolution,
            Resolution::Success(DeepLinkPlan::Navigate {
                tab: TabId(0),
                actions: vec![
                    NavigationAction::SwitchTab { tab: TabId(0) },
                    NavigationAction::ResetTab,
                    NavigationAction::Navigate { route: root, style: PresentationStyle::Push },
                ],
            })
        );
    }

    #[test]
    fn test_present_overrides_last_route_only() {
        let resolver = resolver();
        let Resolution::Success(DeepLinkPlan::Navigate { actions, .. }) = resolver
            .resolve("app://x/tasks/detail/123/edit?present=popover", &allow_all())
            .unwrap()
        else {
            panic!("expected a navigation plan");
        };

        let styles: Vec<&PresentationStyle> = actions
            .iter()
            .filter_map(|a| match a {
                NavigationAction::Navigate { style, .. } => Some(style),
                _ => None,
            })
            .collect();
        assert_eq!(styles, vec![&PresentationStyle::Push, &PresentationStyle::Popover]);
    }

    #[test]
    fn test_tab_segment_is_mandatory() {
        let resolver = resolver();
        for input in ["app://x/", "app://x", "app://x/detail/123", "app://x/root"] {
            assert!(
                matches!(resolver.resolve(input, &allow_all()), Err(DeepLinkError::AmbiguousRoute(_))),
                "{}",
                input
            );
        }
    }

    #[test]
    fn test_scheme_and_host_checked() {
        let resolver = resolver();
        assert!(matches!(resolver.parse("other://x/tasks/root"), Err(DeepLinkError::InvalidUrl(_))));
        assert!(matches!(resolver.parse("app://y/tasks/root"), Err(DeepLinkError::InvalidUrl(_))));
    }

    #[test]
    fn test_unknown_case_is_no_match() {
        let resolver = resolver();
        assert!(matches!(
            resolver.resolve("app://x/tasks/nowhere", &allow_all()),
            Err(DeepLinkError::Decode(crate::DecodeError::NoMatch(_)))
        ));
    }

    #[test]
    fn test_blocked_route_reported() {
        let resolver = resolver();
        let resolution = resolver.resolve("app://x/tasks/detail/1/export", &deny_all()).unwrap();
        let Resolution::Blocked(blocked) = resolution else {
            panic!("expected a blocked resolution");
        };
        assert_eq!(blocked.route.case(), "export");
        assert_eq!(blocked.requirement, EntitlementRequirement::single(Capability::new("pro")));
    }

    #[test]
    fn test_flow_plan() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve("app://x/flow/onboarding/step/profile", &deny_all()).unwrap(),
            Resolution::Success(DeepLinkPlan::StartFlow {
                flow: "onboarding".to_string(),
                step: Some("profile".to_string()),
            })
        );
        assert_eq!(resolver.flow_url("onboarding", Some("profile")), "app://x/flow/onboarding/step/profile");
    }

    #[test]
    fn test_tree_to_url_and_back() {
        let resolver = resolver();
        let registry = registry();
        let mut coordinator =
            NavigationCoordinator::new(registry.clone(), Arc::new(allow_all()), CoordinatorConfig::default());

        let detail = registry.route("Tasks", "detail", vec![ParamValue::Int(42)]).unwrap();
        let edit = registry.route("Tasks", "edit", vec![]).unwrap();
        coordinator.navigate_resolved(detail).unwrap();
        coordinator.navigate(edit, PresentationStyle::Popover).unwrap();

        let url = resolver.to_url(coordinator.tree()).unwrap();
        assert_eq!(url, "app://x/tasks/detail/42/edit?present=popover");

        let Resolution::Success(DeepLinkPlan::Navigate { actions, .. }) =
            resolver.resolve(&url, &allow_all()).unwrap()
        else {
            panic!("expected a navigation plan");
        };
        let mut rebuilt =
            NavigationCoordinator::new(registry.clone(), Arc::new(allow_all()), CoordinatorConfig::default());
        rebuilt.apply(actions).unwrap();

        assert_eq!(rebuilt.tree().active().routes(), coordinator.tree().active().routes());
        let original = coordinator.tree().active().overlay().unwrap();
        let restored = rebuilt.tree().active().overlay().unwrap();
        assert_eq!(restored.route, original.route);
        assert_eq!(restored.style, original.style);
    }

    #[test]
    fn test_dotted_tags_round_trip_through_url() {
        let resolver = resolver();
        let registry = registry();

        for tag in ["a.b", "...", ".hidden", "a/b"] {
            let mut coordinator =
                NavigationCoordinator::new(registry.clone(), Arc::new(allow_all()), CoordinatorConfig::default());
            let root = registry.route("Tasks", "root", vec![]).unwrap();
            let tagged = registry.route("Tasks", "tagged", vec![tag.into()]).unwrap();
            coordinator.navigate_resolved(root).unwrap();
            coordinator.navigate_resolved(tagged.clone()).unwrap();

            let url = resolver.to_url(coordinator.tree()).unwrap();
            let Resolution::Success(DeepLinkPlan::Navigate { actions, .. }) =
                resolver.resolve(&url, &allow_all()).unwrap()
            else {
                panic!("expected a navigation plan for {}", url);
            };
            assert_eq!(
                actions.last(),
                Some(&NavigationAction::Navigate { route: tagged, style: PresentationStyle::Push }),
                "{}",
                url
            );
        }
    }

    #[test]
    fn test_dot_segment_tags_have_no_url() {
        let resolver = resolver();
        let registry = registry();
        for tag in [".", ".."] {
            assert!(registry.route("Tasks", "tagged", vec![tag.into()]).is_err());
        }

        // A route restored from storage bypasses the registry checks
        let dots: Route = serde_json::from_str(r#"{"family":"Tasks","case":"tagged","params":[".."]}"#).unwrap();
        let mut coordinator =
            NavigationCoordinator::new(registry.clone(), Arc::new(allow_all()), CoordinatorConfig::default());
        coordinator.navigate_resolved(registry.route("Tasks", "root", vec![]).unwrap()).unwrap();
        coordinator.navigate(dots, PresentationStyle::Push).unwrap();

        assert!(matches!(resolver.to_url(coordinator.tree()), Err(EncodeError::Unrepresentable(_))));
    }

    #[test]
    fn test_empty_tab_url() {
        let resolver = resolver();
        let tree = NavigationTree::new(2);
        assert_eq!(resolver.to_url(&tree).unwrap(), "app://x/tasks");
    }

    #[test]
    fn test_mid_chain_style_mismatch_is_unrepresentable() {
        let resolver = resolver();
        let registry = registry();
        let mut coordinator =
            NavigationCoordinator::new(registry.clone(), Arc::new(allow_all()), CoordinatorConfig::default());

        let edit = registry.route("Tasks", "edit", vec![]).unwrap();
        let root = registry.route("Tasks", "root", vec![]).unwrap();
        coordinator.navigate(edit, PresentationStyle::Push).unwrap();
        coordinator.navigate(root, PresentationStyle::Push).unwrap();

        assert!(matches!(resolver.to_url(coordinator.tree()), Err(EncodeError::Unrepresentable(_))));
    }
}
