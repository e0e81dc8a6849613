//! Route values
//!
//! A [`Route`] is a tagged value: the `(family, case)` pair names the
//! variant and the ordered parameter list carries its payload. Values are
//! only minted by [`crate::RouteRegistry::route`], which checks them against
//! the declared case, so every `Route` in circulation is well-formed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a declared route parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Free-form text
    Str,
    /// Signed 64-bit integer
    Int,
}

/// Path segments that URL parsers resolve away
const DOT_SEGMENTS: [&str; 2] = [".", ".."];

fn is_valid_text(text: &str) -> bool {
    !text.is_empty() && !DOT_SEGMENTS.contains(&text)
}

impl ParamKind {
    /// Parse decoded URL text into a value of this kind
    ///
    /// Only the canonical form is accepted: integers in plain decimal
    /// (`5`, not `+5` or `05`) and non-empty text other than `.` or `..`.
    pub fn parse(&self, raw: &str) -> Option<ParamValue> {
        match self {
            ParamKind::Str if is_valid_text(raw) => Some(ParamValue::Str(raw.to_string())),
            ParamKind::Str => None,
            ParamKind::Int => raw
                .parse::<i64>()
                .ok()
                .filter(|n| n.to_string() == raw)
                .map(ParamValue::Int),
        }
    }
}

/// A concrete route parameter value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer parameter
    Int(i64),
    /// String parameter
    Str(String),
}

impl ParamValue {
    /// The kind of this value
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Str(_) => ParamKind::Str,
            ParamValue::Int(_) => ParamKind::Int,
        }
    }

    /// Get the string payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            ParamValue::Int(_) => None,
        }
    }

    /// Whether the value survives a trip through a URL path
    pub fn is_well_formed(&self) -> bool {
        match self {
            ParamValue::Str(s) => is_valid_text(s),
            ParamValue::Int(_) => true,
        }
    }

    /// Get the integer payload, if any
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            ParamValue::Str(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

/// A navigation target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    family: String,
    case: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    params: Vec<ParamValue>,
}

impl Route {
    pub(crate) fn new(family: String, case: String, params: Vec<ParamValue>) -> Self {
        Self { family, case, params }
    }

    /// Name of the route family this value belongs to
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Case name within the family
    pub fn case(&self) -> &str {
        &self.case
    }

    /// Ordered parameter values
    pub fn params(&self) -> &[ParamValue] {
        &self.params
    }

    /// Get a parameter by position
    pub fn param(&self, index: usize) -> Option<&ParamValue> {
        self.params.get(index)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.family, self.case)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
            write!(f, "({})", params.join(", "))?;
        }
        Ok(())
    }
}
