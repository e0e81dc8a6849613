//! Route ⇄ URL path codec
//!
//! Path shapes per case:
//! - no parameters: `case`
//! - one parameter: `case/<value>`
//! - several parameters: `case` with `name=value` query pairs, in
//!   declaration order; such a case must be the last in a chain
//!
//! A single route is prefixed with its family's base path. A chain starts
//! in a given family and switches family by emitting the other family's
//! base path before the case.

use route_model::{CaseDecl, ParamValue, Route, RouteFamily, RouteRegistry, RESERVED_PARAM};
use thiserror::Error;

/// Errors turning a URL path into routes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The path matches no declared route
    #[error("No route matches {0:?}")]
    NoMatch(String),

    /// A parameter value does not fit its declared kind
    #[error("Invalid value {value:?} for parameter {param} of {family}.{case}")]
    InvalidParameter {
        /// Family name
        family: String,
        /// Case name
        case: String,
        /// Parameter name
        param: String,
        /// Raw value from the URL
        value: String,
    },
}

/// Errors turning routes into a URL path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The route is not declared in the codec's registry
    #[error("Route {0} is not declared")]
    UnknownRoute(String),

    /// The state has no URL form
    #[error("Not representable as a deep link: {0}")]
    Unrepresentable(String),
}

/// An encoded path: percent-encoded segments plus raw query pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedPath {
    /// Path segments, already percent-encoded
    pub segments: Vec<String>,
    /// Query pairs, not yet encoded
    pub query: Vec<(String, String)>,
}

impl EncodedPath {
    /// Render as `seg/seg?k=v&k=v`
    pub fn render(&self) -> String {
        let mut out = self.segments.join("/");
        if !self.query.is_empty() {
            out.push('?');
            out.push_str(&render_query(&self.query));
        }
        out
    }
}

/// Render query pairs with percent-encoded values
pub fn render_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn raw_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Int(n) => n.to_string(),
        ParamValue::Str(s) => s.clone(),
    }
}

/// Bidirectional mapping between routes and URL paths
#[derive(Debug, Clone)]
pub struct DeepLinkCodec {
    registry: RouteRegistry,
}

impl DeepLinkCodec {
    /// Create a codec over a registry
    pub fn new(registry: RouteRegistry) -> Self {
        Self { registry }
    }

    /// The registry routes are looked up in
    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    fn family_of(&self, route: &Route) -> Result<&RouteFamily, EncodeError> {
        self.registry
            .family(route.family())
            .ok_or_else(|| EncodeError::UnknownRoute(route.to_string()))
    }

    /// Encode one route as `basePath/case[/value][?query]`
    pub fn encode(&self, route: &Route) -> Result<String, EncodeError> {
        let family = self.family_of(route)?;
        let mut out = EncodedPath { segments: vec![family.base_path.clone()], query: Vec::new() };
        self.encode_case(route, true, &mut out)?;
        Ok(out.render())
    }

    /// Decode `basePath/case[/value][?query]` into exactly one route
    ///
    /// Only paths in the form [`encode`](Self::encode) produces are
    /// accepted: no leading or trailing slash, no `present` key, query
    /// pairs in declaration order, and canonically encoded values.
    pub fn decode(&self, path: &str) -> Result<Route, DecodeError> {
        let no_match = || DecodeError::NoMatch(path.to_string());
        let (path_part, query) = match path.split_once('?') {
            Some((path_part, raw)) => (path_part, parse_query(raw).ok_or_else(no_match)?),
            None => (path, Vec::new()),
        };
        if path_part.starts_with('/') || path_part.ends_with('/') {
            return Err(no_match());
        }
        if query.iter().any(|(key, _)| key == RESERVED_PARAM) {
            return Err(no_match());
        }

        let segments = split_segments(path_part);
        let (first, rest) = segments.split_first().ok_or_else(no_match)?;
        let family = self.registry.family_by_base_path(first).ok_or_else(no_match)?;

        let mut routes = self.decode_chain(family, rest, &query)?;
        match routes.pop() {
            Some(route) if routes.is_empty() => Ok(route),
            _ => Err(no_match()),
        }
    }

    /// Encode a chain of routes starting in `family`
    pub fn encode_chain(&self, family: &RouteFamily, routes: &[Route]) -> Result<EncodedPath, EncodeError> {
        let mut current = family;
        let mut out = EncodedPath::default();

        for (index, route) in routes.iter().enumerate() {
            if route.family() != current.name {
                let next = self.family_of(route)?;
                if current.cases.iter().any(|c| c.name == next.base_path) {
                    return Err(EncodeError::Unrepresentable(format!(
                        "{} collides with a case of {}",
                        next.base_path, current.name
                    )));
                }
                out.segments.push(next.base_path.clone());
                current = next;
            }
            self.encode_case(route, index + 1 == routes.len(), &mut out)?;
        }

        Ok(out)
    }

    fn encode_case(&self, route: &Route, is_last: bool, out: &mut EncodedPath) -> Result<(), EncodeError> {
        let case = self
            .registry
            .case_decl(route)
            .ok_or_else(|| EncodeError::UnknownRoute(route.to_string()))?;
        if !route.params().iter().all(ParamValue::is_well_formed) {
            return Err(EncodeError::Unrepresentable(format!("{} has a parameter with no path form", route)));
        }
        out.segments.push(case.name.clone());

        match route.params() {
            [] => {}
            [value] => out.segments.push(urlencoding::encode(&raw_value(value)).into_owned()),
            values => {
                if !is_last {
                    return Err(EncodeError::Unrepresentable(format!(
                        "{} takes several parameters and must end the path",
                        route
                    )));
                }
                out.query.extend(
                    case.params
                        .iter()
                        .zip(values)
                        .map(|(decl, value)| (decl.name.clone(), raw_value(value))),
                );
            }
        }
        Ok(())
    }

    /// Decode path segments (still percent-encoded) into routes, starting in `family`
    ///
    /// `query` holds decoded pairs; the reserved `present` key is ignored.
    /// The remaining pairs must be exactly the parameters of a final
    /// multi-parameter case, in declaration order.
    pub fn decode_chain(
        &self,
        family: &RouteFamily,
        segments: &[&str],
        query: &[(String, String)],
    ) -> Result<Vec<Route>, DecodeError> {
        let no_match = || DecodeError::NoMatch(segments.join("/"));
        let pairs: Vec<&(String, String)> = query.iter().filter(|(key, _)| key != RESERVED_PARAM).collect();
        let mut query_used = false;
        let mut current = family;
        let mut routes = Vec::new();
        let mut index = 0;

        while index < segments.len() {
            let segment = segments[index];
            index += 1;

            let case = match current.cases.iter().find(|c| c.name == segment) {
                Some(case) => case,
                None => match self.registry.family_by_base_path(segment) {
                    Some(next) if index < segments.len() => {
                        current = next;
                        continue;
                    }
                    _ => return Err(no_match()),
                },
            };

            let values = match case.params.len() {
                0 => Vec::new(),
                1 => {
                    let raw = segments.get(index).ok_or_else(no_match)?;
                    index += 1;
                    let text = urlencoding::decode(raw).map_err(|_| invalid(current, case, 0, raw))?;
                    if urlencoding::encode(&text) != *raw {
                        return Err(invalid(current, case, 0, raw));
                    }
                    vec![parse_value(current, case, 0, &text)?]
                }
                _ => {
                    let in_order = pairs.len() == case.params.len()
                        && pairs.iter().zip(&case.params).all(|((key, _), decl)| *key == decl.name);
                    if index != segments.len() || !in_order {
                        return Err(no_match());
                    }
                    query_used = true;
                    pairs
                        .iter()
                        .enumerate()
                        .map(|(i, (_, value))| parse_value(current, case, i, value))
                        .collect::<Result<Vec<_>, _>>()?
                }
            };

            let route = self
                .registry
                .route(&current.name, &case.name, values)
                .map_err(|_| no_match())?;
            routes.push(route);
        }

        if (!query_used && !pairs.is_empty()) || routes.is_empty() {
            return Err(no_match());
        }

        Ok(routes)
    }
}

fn invalid(family: &RouteFamily, case: &CaseDecl, param: usize, value: &str) -> DecodeError {
    DecodeError::InvalidParameter {
        family: family.name.clone(),
        case: case.name.clone(),
        param: case.params[param].name.clone(),
        value: value.to_string(),
    }
}

fn parse_value(family: &RouteFamily, case: &CaseDecl, param: usize, text: &str) -> Result<ParamValue, DecodeError> {
    case.params[param]
        .kind
        .parse(text)
        .ok_or_else(|| invalid(family, case, param, text))
}

/// Parse `k=v&k=v` keeping order; `None` unless every value is canonically encoded
fn parse_query(raw: &str) -> Option<Vec<(String, String)>> {
    raw.split('&')
        .map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let decoded = urlencoding::decode(value).ok()?;
            if key.is_empty() || urlencoding::encode(&decoded) != value {
                return None;
            }
            Some((key.to_string(), decoded.into_owned()))
        })
        .collect()
}

/// Split a path into segments, ignoring a leading and a trailing slash
pub fn split_segments(path: &str) -> Vec<&str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_model::{CaseDecl, ParamKind, PresentationStyle};

    fn registry() -> RouteRegistry {
        RouteRegistry::builder()
            .tab(
                RouteFamily::new("Tasks", "tasks")
                    .case(CaseDecl::new("root"))
                    .case(CaseDecl::new("detail").param("id", ParamKind::Int))
                    .case(CaseDecl::new("tagged").param("tag", ParamKind::Str))
                    .case(CaseDecl::new("edit").style(PresentationStyle::Sheet(Default::default())))
                    .case(
                        CaseDecl::new("range")
                            .param("from", ParamKind::Int)
                            .param("to", ParamKind::Int),
                    ),
            )
            .family(
                RouteFamily::new("Share", "share")
                    .case(CaseDecl::new("compose").param("text", ParamKind::Str)),
            )
            .build()
            .unwrap()
    }

    fn codec() -> DeepLinkCodec {
        DeepLinkCodec::new(registry())
    }

    #[test]
    fn test_encode_shapes() {
        let codec = codec();
        let r = codec.registry().clone();

        let root = r.route("Tasks", "root", vec![]).unwrap();
        assert_eq!(codec.encode(&root).unwrap(), "tasks/root");

        let detail = r.route("Tasks", "detail", vec![ParamValue::Int(123)]).unwrap();
        assert_eq!(codec.encode(&detail).unwrap(), "tasks/detail/123");

        let range = r.route("Tasks", "range", vec![ParamValue::Int(1), ParamValue::Int(9)]).unwrap();
        assert_eq!(codec.encode(&range).unwrap(), "tasks/range?from=1&to=9");
    }

    #[test]
    fn test_round_trip_every_case() {
        let codec = codec();
        let r = codec.registry().clone();
        let routes = vec![
            r.route("Tasks", "root", vec![]).unwrap(),
            r.route("Tasks", "detail", vec![ParamValue::Int(-7)]).unwrap(),
            r.route("Tasks", "tagged", vec!["a b/c?d&e=f%".into()]).unwrap(),
            r.route("Tasks", "edit", vec![]).unwrap(),
            r.route("Tasks", "range", vec![ParamValue::Int(3), ParamValue::Int(4)]).unwrap(),
            r.route("Share", "compose", vec!["héllo wörld".into()]).unwrap(),
        ];

        for route in routes {
            let encoded = codec.encode(&route).unwrap();
            let decoded = codec.decode(&encoded).unwrap();
            assert_eq!(decoded, route, "round trip of {}", encoded);
            assert_eq!(codec.encode(&decoded).unwrap(), encoded);
        }
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        let codec = codec();
        assert!(matches!(codec.decode("nope/root"), Err(DecodeError::NoMatch(_))));
        assert!(matches!(codec.decode("tasks/missing"), Err(DecodeError::NoMatch(_))));
        assert!(matches!(codec.decode("tasks/detail"), Err(DecodeError::NoMatch(_))));
        assert!(matches!(codec.decode("tasks/root/extra"), Err(DecodeError::NoMatch(_))));
        assert!(matches!(codec.decode("tasks/range?from=1"), Err(DecodeError::NoMatch(_))));
        assert!(matches!(codec.decode("tasks/range?from=1&to=2&x=3"), Err(DecodeError::NoMatch(_))));
        assert!(matches!(codec.decode(""), Err(DecodeError::NoMatch(_))));
        assert!(matches!(
            codec.decode("tasks/detail/abc"),
            Err(DecodeError::InvalidParameter { ref param, .. }) if param == "id"
        ));
        assert!(matches!(codec.decode("tasks/tagged/%FF"), Err(DecodeError::InvalidParameter { .. })));
    }

    #[test]
    fn test_decode_rejects_non_canonical_integers() {
        let codec = codec();
        for path in ["tasks/detail/+5", "tasks/detail/005", "tasks/detail/%35", "tasks/detail/-0"] {
            assert!(
                matches!(codec.decode(path), Err(DecodeError::InvalidParameter { .. })),
                "{}",
                path
            );
        }
        assert!(matches!(codec.decode("tasks/range?from=01&to=2"), Err(DecodeError::InvalidParameter { .. })));
    }

    #[test]
    fn test_decode_rejects_non_canonical_text() {
        let codec = codec();
        assert!(matches!(codec.decode("tasks/tagged/%61bc"), Err(DecodeError::InvalidParameter { .. })));
        assert!(matches!(codec.decode("tasks/tagged/a%2fb"), Err(DecodeError::InvalidParameter { .. })));
        assert!(matches!(codec.decode("tasks/tagged/%2e%2e"), Err(DecodeError::InvalidParameter { .. })));
        assert!(matches!(codec.decode("tasks/tagged/.."), Err(DecodeError::InvalidParameter { .. })));
        assert!(matches!(codec.decode("share/compose?text=a+b"), Err(DecodeError::NoMatch(_))));
    }

    #[test]
    fn test_decode_requires_query_in_declaration_order() {
        let codec = codec();
        assert!(codec.decode("tasks/range?from=1&to=2").is_ok());
        assert!(matches!(codec.decode("tasks/range?to=2&from=1"), Err(DecodeError::NoMatch(_))));
        assert!(matches!(codec.decode("tasks/range?from=1&from=1&to=2"), Err(DecodeError::NoMatch(_))));
        assert!(matches!(codec.decode("tasks/range?"), Err(DecodeError::NoMatch(_))));

        let tasks = codec.registry().family("Tasks").unwrap().clone();
        let reversed = vec![("to".to_string(), "2".to_string()), ("from".to_string(), "1".to_string())];
        assert!(matches!(codec.decode_chain(&tasks, &["range"], &reversed), Err(DecodeError::NoMatch(_))));
    }

    #[test]
    fn test_decode_rejects_present_and_stray_slashes() {
        let codec = codec();
        assert!(matches!(codec.decode("tasks/root?present=sheet"), Err(DecodeError::NoMatch(_))));
        for path in ["/tasks/root", "tasks/root/", "/tasks/root/", "tasks//root"] {
            assert!(matches!(codec.decode(path), Err(DecodeError::NoMatch(_))), "{}", path);
        }
    }

    #[test]
    fn test_encode_refuses_dot_segment_values() {
        let codec = codec();
        let dots: Route = serde_json::from_str(r#"{"family":"Tasks","case":"tagged","params":[".."]}"#).unwrap();
        assert!(matches!(codec.encode(&dots), Err(EncodeError::Unrepresentable(_))));
    }

    #[test]
    fn test_chain_round_trip() {
        let codec = codec();
        let r = codec.registry().clone();
        let tasks = r.family("Tasks").unwrap().clone();
        let chain = vec![
            r.route("Tasks", "detail", vec![ParamValue::Int(123)]).unwrap(),
            r.route("Tasks", "edit", vec![]).unwrap(),
            r.route("Share", "compose", vec!["hi".into()]).unwrap(),
        ];

        let encoded = codec.encode_chain(&tasks, &chain).unwrap();
        assert_eq!(encoded.render(), "detail/123/edit/share/compose/hi");

        let segments: Vec<&str> = encoded.segments.iter().map(String::as_str).collect();
        let decoded = codec.decode_chain(&tasks, &segments, &encoded.query).unwrap();
        assert_eq!(decoded, chain);
    }

    #[test]
    fn test_multi_param_case_must_be_last() {
        let codec = codec();
        let r = codec.registry().clone();
        let tasks = r.family("Tasks").unwrap().clone();
        let chain = vec![
            r.route("Tasks", "range", vec![ParamValue::Int(1), ParamValue::Int(2)]).unwrap(),
            r.route("Tasks", "edit", vec![]).unwrap(),
        ];
        assert!(matches!(codec.encode_chain(&tasks, &chain), Err(EncodeError::Unrepresentable(_))));

        let query = vec![("from".to_string(), "1".to_string()), ("to".to_string(), "2".to_string())];
        assert!(codec.decode_chain(&tasks, &["range", "edit"], &query).is_err());
    }

    #[test]
    fn test_present_key_is_not_a_parameter() {
        let codec = codec();
        let tasks = codec.registry().family("Tasks").unwrap().clone();
        let query = vec![("present".to_string(), "sheet".to_string())];
        let routes = codec.decode_chain(&tasks, &["root"], &query).unwrap();
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn test_split_segments() {
        assert_eq!(split_segments("/a/b/"), vec!["a", "b"]);
        assert_eq!(split_segments("a"), vec!["a"]);
        assert!(split_segments("/").is_empty());
        assert!(split_segments("").is_empty());
    }
}
