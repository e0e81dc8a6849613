//! Deep link scenarios
//!
//! End-to-end tests driving the navigator with URLs and checking the
//! resulting presentation tree.

use std::collections::HashSet;
use std::sync::Arc;
use waypoint::deep_link::DeepLinkError;
use waypoint::{
    Capability, CaseDecl, ConditionSet, DataBag, EntitlementRequirement, FlowDefinition, HandleOutcome,
    Navigator, NavigatorConfig, ParamKind, ParamValue, PresentationStyle, Route, RouteFamily,
    RouteRegistry, TabId, WaypointError,
};

fn registry() -> RouteRegistry {
    RouteRegistry::builder()
        .tab(
            RouteFamily::new("TasksRoute", "tasks")
                .case(CaseDecl::new("root"))
                .case(CaseDecl::new("detail").param("id", ParamKind::Int))
                .case(CaseDecl::new("edit"))
                .case(
                    CaseDecl::new("insights")
                        .style(PresentationStyle::FullScreen)
                        .entitlement(EntitlementRequirement::single(Capability::new("premium"))),
                )
                .case(
                    CaseDecl::new("search")
                        .param("query", ParamKind::Str)
                        .param("page", ParamKind::Int),
                ),
        )
        .tab(
            RouteFamily::new("SettingsRoute", "settings")
                .case(CaseDecl::new("root"))
                .case(CaseDecl::new("account").style(PresentationStyle::Sheet(Default::default()))),
        )
        .build()
        .unwrap()
}

fn navigator_with(grants: &[&str]) -> Navigator {
    let grants: HashSet<Capability> = grants.iter().map(|g| Capability::new(*g)).collect();
    Navigator::builder(registry())
        .entitlements(Arc::new(grants))
        .config(NavigatorConfig::new("app").host("x"))
        .build()
        .unwrap()
}

fn route(navigator: &Navigator, family: &str, case: &str, params: Vec<ParamValue>) -> Route {
    navigator.registry().route(family, case, params).unwrap()
}

#[tokio::test]
async fn test_simple_push() {
    let navigator = navigator_with(&[]);
    let outcome = navigator.handle("app://x/tasks/root").await.unwrap();

    assert_eq!(outcome, HandleOutcome::Navigated);
    assert_eq!(navigator.active_tab(), TabId(0));
    let stack: Vec<Route> = navigator.tab_stack(TabId(0)).into_iter().map(|e| e.route).collect();
    assert_eq!(stack, vec![route(&navigator, "TasksRoute", "root", vec![])]);
    assert_eq!(navigator.overlay_depth(), 0);
}

#[tokio::test]
async fn test_nested_sheet_deep_link() {
    let navigator = navigator_with(&[]);
    navigator.handle("app://x/tasks/detail/123/edit?present=sheet").await.unwrap();

    let stack: Vec<Route> = navigator.tab_stack(TabId(0)).into_iter().map(|e| e.route).collect();
    assert_eq!(stack, vec![route(&navigator, "TasksRoute", "detail", vec![ParamValue::Int(123)])]);

    let tree = navigator.tree();
    let overlay = tree.active().overlay().unwrap();
    assert_eq!(overlay.route, route(&navigator, "TasksRoute", "edit", vec![]));
    assert_eq!(overlay.style, PresentationStyle::Sheet(Default::default()));
    assert!(overlay.frame.overlay().is_none());
}

#[tokio::test]
async fn test_entitlement_short_circuit_leaves_tree_unchanged() {
    let navigator = navigator_with(&[]);
    navigator.handle("app://x/settings/root").await.unwrap();
    navigator.handle("app://x/tasks/detail/1").await.unwrap();
    let before = navigator.tree();

    let outcome = navigator.handle("app://x/tasks/detail/2/insights").await.unwrap();
    let HandleOutcome::Blocked { route: Some(blocked), requirement } = outcome else {
        panic!("expected the link to be blocked");
    };
    assert_eq!(blocked.case(), "insights");
    assert_eq!(requirement, EntitlementRequirement::single(Capability::new("premium")));
    assert_eq!(navigator.tree(), before);
}

#[tokio::test]
async fn test_granted_entitlement_applies() {
    let navigator = navigator_with(&["premium"]);
    navigator.handle("app://x/tasks/detail/2/insights").await.unwrap();
    assert_eq!(navigator.overlay_depth(), 1);
    assert_eq!(navigator.current_route().unwrap().case(), "insights");
}

#[tokio::test]
async fn test_over_dismiss_clamps() {
    let navigator = navigator_with(&[]);
    navigator.handle("app://x/tasks/root").await.unwrap();

    let account = route(&navigator, "SettingsRoute", "account", vec![]);
    let edit = route(&navigator, "TasksRoute", "edit", vec![]);
    navigator.navigate(account, PresentationStyle::Sheet(Default::default())).unwrap();
    navigator.navigate(edit, PresentationStyle::FullScreen).unwrap();
    assert_eq!(navigator.overlay_depth(), 2);

    assert_eq!(navigator.dismiss(5), 2);
    assert_eq!(navigator.overlay_depth(), 0);
    assert_eq!(navigator.tab_stack(TabId(0)).len(), 1);
}

#[tokio::test]
async fn test_missing_tab_is_ambiguous() {
    let navigator = navigator_with(&[]);
    for url in ["app://x/", "app://x/root", "app://x/detail/123", "app://x/account"] {
        let result = navigator.handle(url).await;
        assert!(
            matches!(result, Err(WaypointError::DeepLink(DeepLinkError::AmbiguousRoute(_)))),
            "{} should be ambiguous",
            url
        );
    }
    assert!(navigator.tree().is_empty());
}

#[tokio::test]
async fn test_unknown_route_is_no_match() {
    let navigator = navigator_with(&[]);
    let result = navigator.handle("app://x/tasks/nowhere").await;
    assert!(matches!(
        result,
        Err(WaypointError::DeepLink(DeepLinkError::Decode(waypoint::deep_link::DecodeError::NoMatch(_))))
    ));
}

#[tokio::test]
async fn test_deep_link_replaces_target_tab() {
    let navigator = navigator_with(&[]);
    navigator.handle("app://x/tasks/detail/1/edit?present=sheet").await.unwrap();
    navigator.handle("app://x/tasks/root").await.unwrap();

    assert_eq!(navigator.tab_stack(TabId(0)).len(), 1);
    assert_eq!(navigator.overlay_depth(), 0);
}

#[tokio::test]
async fn test_multi_param_route_with_override() {
    let navigator = navigator_with(&[]);
    navigator
        .handle("app://x/tasks/search?query=red%20shoes&page=2&present=popover")
        .await
        .unwrap();

    let current = navigator.current_route().unwrap();
    assert_eq!(current.params(), &[ParamValue::Str("red shoes".into()), ParamValue::Int(2)]);
    assert_eq!(navigator.tree().active().overlay().unwrap().style, PresentationStyle::Popover);
}

#[tokio::test]
async fn test_tree_round_trips_through_url() {
    let navigator = navigator_with(&["premium"]);
    navigator.handle("app://x/tasks/detail/9/edit?present=sheet:medium,large").await.unwrap();

    let url = navigator.current_deep_link().unwrap();
    let replay = navigator_with(&["premium"]);
    replay.handle(&url).await.unwrap();

    assert_eq!(replay.current_deep_link().unwrap(), url);
    let original = navigator.tree();
    let rebuilt = replay.tree();
    assert_eq!(rebuilt.active().routes(), original.active().routes());
    assert_eq!(
        rebuilt.active().overlay().map(|o| (&o.route, &o.style)),
        original.active().overlay().map(|o| (&o.route, &o.style))
    );
}

#[tokio::test]
async fn test_flow_link_with_skip() {
    let navigator = Navigator::builder(registry())
        .config(NavigatorConfig::new("app").host("x"))
        .flow(FlowDefinition::new("setup", ["a", "b", "c"]).skip("b", "flag"))
        .conditions(Arc::new(ConditionSet::new().with("flag", true)))
        .build()
        .unwrap();

    let HandleOutcome::FlowStarted(state) = navigator.handle("app://x/flow/setup").await.unwrap() else {
        panic!("expected a flow to start");
    };
    assert_eq!(state.current_step(), "a");

    let state = navigator.advance_flow("setup", DataBag::new()).await.unwrap();
    assert_eq!(state.current_step(), "c");
    assert!(state.is_at_final_step());
    assert!(navigator.tree().is_empty());
}
