//! Parsed deep link URLs
//!
//! ```text
//! route-url = scheme "://" host "/" tab "/" route-path [ "?" query ]
//! flow-url  = scheme "://" host "/flow/" flow-name [ "/step/" step-name ]
//! ```

use crate::codec::{split_segments, DecodeError};
use route_model::{PresentationStyle, StyleParseError, RESERVED_PARAM};
use thiserror::Error;
use url::Url;

/// Path segment that introduces a flow URL
pub const FLOW_SEGMENT: &str = "flow";

/// Path segment that introduces a flow step
pub const STEP_SEGMENT: &str = "step";

/// Errors handling a deep link
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeepLinkError {
    /// Not a well-formed deep link URL
    #[error("Invalid deep link: {0}")]
    InvalidUrl(String),

    /// A route URL without a known tab segment
    #[error("Deep link has no tab segment: {0}")]
    AmbiguousRoute(String),

    /// The `present` override is not a valid style token
    #[error("Invalid presentation override: {0}")]
    InvalidStyle(#[from] StyleParseError),

    /// The route path does not decode
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Result type for deep link operations
pub type Result<T> = std::result::Result<T, DeepLinkError>;

/// A deep link split into its grammar parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLinkUrl {
    /// `/<tab>/<route-path>[?query]`
    Route {
        /// Path segments, still percent-encoded; the first should name a tab
        segments: Vec<String>,
        /// Decoded query pairs other than `present`
        query: Vec<(String, String)>,
        /// Presentation override for the last route
        present: Option<PresentationStyle>,
    },
    /// `/flow/<name>[/step/<step>]`
    Flow {
        /// Flow name
        flow: String,
        /// Optional step to start at
        step: Option<String>,
    },
}

impl DeepLinkUrl {
    /// Parse a URL string without checking scheme or host
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| DeepLinkError::InvalidUrl(format!("{}: {}", input, e)))?;
        Self::from_url(&url)
    }

    /// Split an already parsed URL
    pub fn from_url(url: &Url) -> Result<Self> {
        if url.cannot_be_a_base() {
            return Err(DeepLinkError::InvalidUrl(url.to_string()));
        }

        let segments: Vec<String> = split_segments(url.path()).into_iter().map(str::to_string).collect();

        if segments.first().map(String::as_str) == Some(FLOW_SEGMENT) {
            return Self::flow_from_segments(url, &segments[1..]);
        }

        let mut present = None;
        let mut query = Vec::new();
        for (key, value) in url.query_pairs() {
            if key == RESERVED_PARAM {
                if present.is_some() {
                    return Err(DeepLinkError::InvalidUrl(format!("{}: repeated present", url)));
                }
                present = Some(value.parse::<PresentationStyle>()?);
            } else {
                query.push((key.into_owned(), value.into_owned()));
            }
        }

        Ok(DeepLinkUrl::Route { segments, query, present })
    }

    fn flow_from_segments(url: &Url, rest: &[String]) -> Result<Self> {
        let decode = |raw: &str| {
            urlencoding::decode(raw)
                .map(|s| s.into_owned())
                .map_err(|_| DeepLinkError::InvalidUrl(url.to_string()))
        };

        match rest {
            [flow] if !flow.is_empty() => Ok(DeepLinkUrl::Flow { flow: decode(flow.as_str())?, step: None }),
            [flow, marker, step] if !flow.is_empty() && marker == STEP_SEGMENT && !step.is_empty() => {
                Ok(DeepLinkUrl::Flow { flow: decode(flow.as_str())?, step: Some(decode(step.as_str())?) })
            }
            _ => Err(DeepLinkError::InvalidUrl(url.to_string())),
        }
    }

    /// The tab segment of a route URL
    pub fn tab_segment(&self) -> Option<&str> {
        match self {
            DeepLinkUrl::Route { segments, .. } => segments.first().map(String::as_str),
            DeepLinkUrl::Flow { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_model::Detent;

    #[test]
    fn test_parse_route_url() {
        let link = DeepLinkUrl::parse("app://x/tasks/detail/123/edit?present=sheet:large").unwrap();
        assert_eq!(
            link,
            DeepLinkUrl::Route {
                segments: vec!["tasks".into(), "detail".into(), "123".into(), "edit".into()],
                query: vec![],
                present: Some(PresentationStyle::sheet([Detent::Large])),
            }
        );
        assert_eq!(link.tab_segment(), Some("tasks"));
    }

    #[test]
    fn test_parse_keeps_other_query_pairs() {
        let link = DeepLinkUrl::parse("app://x/tasks/range?from=1&to=2").unwrap();
        let DeepLinkUrl::Route { query, present, .. } = link else {
            panic!("expected a route url");
        };
        assert_eq!(query, vec![("from".to_string(), "1".to_string()), ("to".to_string(), "2".to_string())]);
        assert!(present.is_none());
    }

    #[test]
    fn test_parse_flow_url() {
        assert_eq!(
            DeepLinkUrl::parse("app://x/flow/onboarding").unwrap(),
            DeepLinkUrl::Flow { flow: "onboarding".into(), step: None }
        );
        assert_eq!(
            DeepLinkUrl::parse("app://x/flow/onboarding/step/profile").unwrap(),
            DeepLinkUrl::Flow { flow: "onboarding".into(), step: Some("profile".into()) }
        );
    }

    #[test]
    fn test_malformed_flow_urls() {
        for input in [
            "app://x/flow",
            "app://x/flow/onboarding/profile",
            "app://x/flow/onboarding/step",
            "app://x/flow/onboarding/step/a/b",
        ] {
            assert!(matches!(DeepLinkUrl::parse(input), Err(DeepLinkError::InvalidUrl(_))), "{}", input);
        }
    }

    #[test]
    fn test_bad_present_and_bad_url() {
        assert!(matches!(
            DeepLinkUrl::parse("app://x/tasks/root?present=wobble"),
            Err(DeepLinkError::InvalidStyle(StyleParseError::UnknownStyle(_)))
        ));
        assert!(matches!(
            DeepLinkUrl::parse("app://x/tasks/root?present=push&present=sheet"),
            Err(DeepLinkError::InvalidUrl(_))
        ));
        assert!(matches!(DeepLinkUrl::parse("not a url"), Err(DeepLinkError::InvalidUrl(_))));
        assert!(matches!(DeepLinkUrl::parse("mailto:someone"), Err(DeepLinkError::InvalidUrl(_))));
    }

    #[test]
    fn test_empty_path_has_no_tab() {
        let link = DeepLinkUrl::parse("app://x/").unwrap();
        assert_eq!(link.tab_segment(), None);
    }
}
