//! Presentation styles
//!
//! How a route's content is shown once navigated to. Styles also have a
//! compact textual token form used by deep links (`present=sheet:medium`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Sheet detent (resting height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detent {
    /// Small detent
    Small,
    /// Medium detent (half height)
    Medium,
    /// Large detent (full height)
    Large,
}

impl Detent {
    fn token(&self) -> &'static str {
        match self {
            Detent::Small => "small",
            Detent::Medium => "medium",
            Detent::Large => "large",
        }
    }
}

/// How a route is presented
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "style", content = "value", rename_all = "camelCase")]
pub enum PresentationStyle {
    /// Push onto the current stack
    #[default]
    Push,
    /// Replace the top of the current stack
    Replace,
    /// Modal sheet with the given detents (empty means platform default)
    Sheet(BTreeSet<Detent>),
    /// Full-screen cover
    FullScreen,
    /// Popover anchored to the presenting surface
    Popover,
    /// Separate window with an identifier
    Window(String),
    /// Switch to the tab at the given index
    Tab(usize),
    /// Immersive scene with an identifier
    Immersive(String),
    /// Settings pane
    SettingsPane,
    /// Inspector column
    Inspector,
}

impl PresentationStyle {
    /// A sheet with the given detents
    pub fn sheet(detents: impl IntoIterator<Item = Detent>) -> Self {
        PresentationStyle::Sheet(detents.into_iter().collect())
    }

    /// Whether this style opens a new overlay subtree
    pub fn is_overlay(&self) -> bool {
        !matches!(
            self,
            PresentationStyle::Push | PresentationStyle::Replace | PresentationStyle::Tab(_)
        )
    }

    /// Short name of the variant, ignoring associated values
    pub fn name(&self) -> &'static str {
        match self {
            PresentationStyle::Push => "push",
            PresentationStyle::Replace => "replace",
            PresentationStyle::Sheet(_) => "sheet",
            PresentationStyle::FullScreen => "fullScreen",
            PresentationStyle::Popover => "popover",
            PresentationStyle::Window(_) => "window",
            PresentationStyle::Tab(_) => "tab",
            PresentationStyle::Immersive(_) => "immersive",
            PresentationStyle::SettingsPane => "settingsPane",
            PresentationStyle::Inspector => "inspector",
        }
    }
}

/// Error parsing a presentation style token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StyleParseError {
    /// Unknown style name
    #[error("Unknown presentation style: {0}")]
    UnknownStyle(String),

    /// Style requires an argument that was not given or is malformed
    #[error("Invalid argument for presentation style {style}: {argument:?}")]
    InvalidArgument {
        /// Style name
        style: String,
        /// Offending argument
        argument: Option<String>,
    },
}

impl fmt::Display for PresentationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            PresentationStyle::Sheet(detents) if !detents.is_empty() => {
                let tokens: Vec<&str> = detents.iter().map(Detent::token).collect();
                write!(f, ":{}", tokens.join(","))
            }
            PresentationStyle::Window(id) | PresentationStyle::Immersive(id) => {
                write!(f, ":{}", id)
            }
            PresentationStyle::Tab(index) => write!(f, ":{}", index),
            _ => Ok(()),
        }
    }
}

impl FromStr for PresentationStyle {
    type Err = StyleParseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (name, argument) = match token.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (token, None),
        };

        let invalid = || StyleParseError::InvalidArgument {
            style: name.to_string(),
            argument: argument.map(str::to_string),
        };

        let style = match (name, argument) {
            ("push", None) => PresentationStyle::Push,
            ("replace", None) => PresentationStyle::Replace,
            ("sheet", None) => PresentationStyle::Sheet(BTreeSet::new()),
            ("sheet", Some(list)) => {
                let mut detents = BTreeSet::new();
                for part in list.split(',') {
                    let detent = match part {
                        "small" => Detent::Small,
                        "medium" => Detent::Medium,
                        "large" => Detent::Large,
                        _ => return Err(invalid()),
                    };
                    detents.insert(detent);
                }
                PresentationStyle::Sheet(detents)
            }
            ("fullScreen", None) => PresentationStyle::FullScreen,
            ("popover", None) => PresentationStyle::Popover,
            ("window", Some(id)) if !id.is_empty() => PresentationStyle::Window(id.to_string()),
            ("tab", Some(index)) => {
                PresentationStyle::Tab(index.parse::<usize>().map_err(|_| invalid())?)
            }
            ("immersive", Some(id)) if !id.is_empty() => {
                PresentationStyle::Immersive(id.to_string())
            }
            ("settingsPane", None) => PresentationStyle::SettingsPane,
            ("inspector", None) => PresentationStyle::Inspector,
            (
                "push" | "replace" | "fullScreen" | "popover" | "window" | "tab" | "immersive"
                | "settingsPane" | "inspector",
                _,
            ) => return Err(invalid()),
            _ => return Err(StyleParseError::UnknownStyle(name.to_string())),
        };

        Ok(style)
    }
}
