//! Route declarations and lookup tables
//!
//! Route families are declared once through [`RegistryBuilder`]. Building
//! validates the declarations and freezes them into a [`RouteRegistry`],
//! which answers the pure lookups (style, entitlement, dismiss lock, title)
//! and is the only place [`Route`] values are minted.

use crate::entitlement::EntitlementRequirement;
use crate::route::{ParamKind, ParamValue, Route};
use crate::style::PresentationStyle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Query key reserved for the presentation override in deep links
pub const RESERVED_PARAM: &str = "present";

/// Route declaration and construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Two families share a name
    #[error("Duplicate route family: {0}")]
    DuplicateFamily(String),

    /// Two families share a base path
    #[error("Duplicate base path: {0}")]
    DuplicateBasePath(String),

    /// Two cases in one family share a name
    #[error("Duplicate case {case} in family {family}")]
    DuplicateCase {
        /// Family name
        family: String,
        /// Case name
        case: String,
    },

    /// Two parameters in one case share a name
    #[error("Duplicate parameter {param} in {family}.{case}")]
    DuplicateParam {
        /// Family name
        family: String,
        /// Case name
        case: String,
        /// Parameter name
        param: String,
    },

    /// A parameter uses the reserved `present` key
    #[error("Parameter name 'present' is reserved ({family}.{case})")]
    ReservedParam {
        /// Family name
        family: String,
        /// Case name
        case: String,
    },

    /// A path segment is empty or contains URL delimiters
    #[error("Invalid path segment: {0:?}")]
    InvalidSegment(String),

    /// Family not declared
    #[error("Unknown route family: {0}")]
    UnknownFamily(String),

    /// Case not declared in the family
    #[error("Unknown case {case} in family {family}")]
    UnknownCase {
        /// Family name
        family: String,
        /// Case name
        case: String,
    },

    /// Wrong number of parameters
    #[error("{family}.{case} expects {expected} parameters, got {found}")]
    Arity {
        /// Family name
        family: String,
        /// Case name
        case: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied parameter count
        found: usize,
    },

    /// Parameter has the wrong kind, or a string value that is empty, `.` or `..`
    #[error("Invalid value for parameter {param} of {family}.{case}")]
    InvalidParam {
        /// Family name
        family: String,
        /// Case name
        case: String,
        /// Parameter name
        param: String,
    },
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RouteError>;

/// A declared route parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDecl {
    /// Parameter name (used as the query key for multi-parameter cases)
    pub name: String,
    /// Parameter type
    pub kind: ParamKind,
}

/// A declared route case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDecl {
    /// Case name, also its URL segment
    pub name: String,
    /// Ordered parameters
    pub params: Vec<ParamDecl>,
    /// Presentation style annotation
    pub style: Option<PresentationStyle>,
    /// Case-level entitlement requirement
    pub entitlement: Option<EntitlementRequirement>,
    /// Whether interactive dismissal is disabled while presented
    pub dismiss_locked: bool,
    /// Display title
    pub title: Option<String>,
}

impl CaseDecl {
    /// Declare a case with no parameters and no annotations
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            style: None,
            entitlement: None,
            dismiss_locked: false,
            title: None,
        }
    }

    /// Add a parameter
    pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(ParamDecl { name: name.into(), kind });
        self
    }

    /// Annotate with a presentation style
    pub fn style(mut self, style: PresentationStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Annotate with an entitlement requirement
    pub fn entitlement(mut self, requirement: EntitlementRequirement) -> Self {
        self.entitlement = Some(requirement);
        self
    }

    /// Lock interactive dismissal
    pub fn dismiss_locked(mut self, locked: bool) -> Self {
        self.dismiss_locked = locked;
        self
    }

    /// Set the display title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A declared route family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFamily {
    /// Family name
    pub name: String,
    /// Base path segment
    pub base_path: String,
    /// Family-level entitlement requirement (fallback for cases)
    pub entitlement: Option<EntitlementRequirement>,
    /// Declared cases
    pub cases: Vec<CaseDecl>,
}

impl RouteFamily {
    /// Declare a family
    pub fn new(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            entitlement: None,
            cases: Vec::new(),
        }
    }

    /// Add a case
    pub fn case(mut self, case: CaseDecl) -> Self {
        self.cases.push(case);
        self
    }

    /// Set the family-level entitlement requirement
    pub fn entitlement(mut self, requirement: EntitlementRequirement) -> Self {
        self.entitlement = Some(requirement);
        self
    }
}

/// Index of a tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub usize);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// A declared tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabDecl {
    /// Tab index
    pub id: TabId,
    /// URL segment (the bound family's base path)
    pub name: String,
    /// Bound family name
    pub family: String,
}

#[derive(Debug)]
struct Tables {
    families: Vec<RouteFamily>,
    by_name: HashMap<String, usize>,
    by_base_path: HashMap<String, usize>,
    tabs: Vec<TabDecl>,
}

/// Builder for [`RouteRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    families: Vec<RouteFamily>,
    tab_families: Vec<String>,
}

impl RegistryBuilder {
    /// Declare a family bound to the next tab
    pub fn tab(mut self, family: RouteFamily) -> Self {
        self.tab_families.push(family.name.clone());
        self.families.push(family);
        self
    }

    /// Declare a family not bound to any tab
    pub fn family(mut self, family: RouteFamily) -> Self {
        self.families.push(family);
        self
    }

    /// Validate declarations and freeze them
    pub fn build(self) -> Result<RouteRegistry> {
        let mut by_name = HashMap::new();
        let mut by_base_path = HashMap::new();

        for (index, family) in self.families.iter().enumerate() {
            check_segment(&family.base_path)?;
            if by_name.insert(family.name.clone(), index).is_some() {
                return Err(RouteError::DuplicateFamily(family.name.clone()));
            }
            if by_base_path.insert(family.base_path.clone(), index).is_some() {
                return Err(RouteError::DuplicateBasePath(family.base_path.clone()));
            }

            let mut seen_cases = Vec::with_capacity(family.cases.len());
            for case in &family.cases {
                check_segment(&case.name)?;
                if seen_cases.contains(&case.name.as_str()) {
                    return Err(RouteError::DuplicateCase {
                        family: family.name.clone(),
                        case: case.name.clone(),
                    });
                }
                seen_cases.push(case.name.as_str());

                let mut seen_params: Vec<&str> = Vec::with_capacity(case.params.len());
                for param in &case.params {
                    if param.name == RESERVED_PARAM {
                        return Err(RouteError::ReservedParam {
                            family: family.name.clone(),
                            case: case.name.clone(),
                        });
                    }
                    check_segment(&param.name)?;
                    if seen_params.contains(&param.name.as_str()) {
                        return Err(RouteError::DuplicateParam {
                            family: family.name.clone(),
                            case: case.name.clone(),
                            param: param.name.clone(),
                        });
                    }
                    seen_params.push(param.name.as_str());
                }
            }
        }

        let tabs = self
            .tab_families
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let family = &self.families[by_name[name]];
                TabDecl {
                    id: TabId(index),
                    name: family.base_path.clone(),
                    family: family.name.clone(),
                }
            })
            .collect();

        Ok(RouteRegistry {
            inner: Arc::new(Tables { families: self.families, by_name, by_base_path, tabs }),
        })
    }
}

fn check_segment(segment: &str) -> Result<()> {
    let bad = segment.is_empty()
        || segment
            .chars()
            .any(|c| matches!(c, '/' | '?' | '&' | '=' | '#' | '%') || c.is_whitespace());
    if bad {
        Err(RouteError::InvalidSegment(segment.to_string()))
    } else {
        Ok(())
    }
}

/// Immutable route lookup tables
///
/// Cloning is cheap; all clones share the same tables.
#[derive(Debug, Clone)]
pub struct RouteRegistry {
    inner: Arc<Tables>,
}

impl RouteRegistry {
    /// Start declaring routes
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Construct a route value, validating it against its declaration
    pub fn route(
        &self,
        family: &str,
        case: &str,
        params: Vec<ParamValue>,
    ) -> Result<Route> {
        let family_decl = self
            .family(family)
            .ok_or_else(|| RouteError::UnknownFamily(family.to_string()))?;
        let case_decl = family_decl.cases.iter().find(|c| c.name == case).ok_or_else(|| {
            RouteError::UnknownCase { family: family.to_string(), case: case.to_string() }
        })?;

        if case_decl.params.len() != params.len() {
            return Err(RouteError::Arity {
                family: family.to_string(),
                case: case.to_string(),
                expected: case_decl.params.len(),
                found: params.len(),
            });
        }

        for (decl, value) in case_decl.params.iter().zip(&params) {
            if decl.kind != value.kind() || !value.is_well_formed() {
                return Err(RouteError::InvalidParam {
                    family: family.to_string(),
                    case: case.to_string(),
                    param: decl.name.clone(),
                });
            }
        }

        Ok(Route::new(family.to_string(), case.to_string(), params))
    }

    /// Resolve how a route is presented; unannotated cases push
    pub fn resolve_style(&self, route: &Route) -> PresentationStyle {
        self.case_decl(route).and_then(|c| c.style.clone()).unwrap_or_default()
    }

    /// Resolve the entitlement requirement; case overrides family, default none
    pub fn resolve_entitlement(&self, route: &Route) -> EntitlementRequirement {
        let Some(family) = self.family(route.family()) else {
            return EntitlementRequirement::none();
        };
        family
            .cases
            .iter()
            .find(|c| c.name == route.case())
            .and_then(|c| c.entitlement.clone())
            .or_else(|| family.entitlement.clone())
            .unwrap_or_default()
    }

    /// Whether interactive dismissal is locked for this route
    pub fn is_dismiss_locked(&self, route: &Route) -> bool {
        self.case_decl(route).map(|c| c.dismiss_locked).unwrap_or(false)
    }

    /// Display title for a route (falls back to the case name)
    pub fn title(&self, route: &Route) -> String {
        self.case_decl(route)
            .and_then(|c| c.title.clone())
            .unwrap_or_else(|| route.case().to_string())
    }

    /// Look up the case declaration for a route
    pub fn case_decl(&self, route: &Route) -> Option<&CaseDecl> {
        self.find_case(route.family(), route.case())
    }

    /// Look up a case declaration by family and case name
    pub fn find_case(&self, family: &str, case: &str) -> Option<&CaseDecl> {
        self.family(family)?.cases.iter().find(|c| c.name == case)
    }

    /// Look up a family by name
    pub fn family(&self, name: &str) -> Option<&RouteFamily> {
        self.inner.by_name.get(name).map(|&i| &self.inner.families[i])
    }

    /// Look up a family by base path
    pub fn family_by_base_path(&self, base_path: &str) -> Option<&RouteFamily> {
        self.inner.by_base_path.get(base_path).map(|&i| &self.inner.families[i])
    }

    /// All declared families
    pub fn families(&self) -> &[RouteFamily] {
        &self.inner.families
    }

    /// Declared tabs in order
    pub fn tabs(&self) -> &[TabDecl] {
        &self.inner.tabs
    }

    /// Look up a tab by index
    pub fn tab(&self, id: TabId) -> Option<&TabDecl> {
        self.inner.tabs.get(id.0)
    }

    /// Look up a tab by its URL segment
    pub fn tab_by_name(&self, name: &str) -> Option<&TabDecl> {
        self.inner.tabs.iter().find(|t| t.name == name)
    }

    /// Whether any family declares a case with this name
    pub fn is_case_name(&self, case: &str) -> bool {
        self.inner.families.iter().any(|f| f.cases.iter().any(|c| c.name == case))
    }
}
