//! Deep links for Waypoint
//!
//! - [`codec`] - route values to and from URL paths
//! - [`link`] - the URL grammar (route URLs and flow URLs)
//! - [`resolver`] - URL to navigation plan, with entitlement checks, and
//!   navigation tree back to URL

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod link;
pub mod resolver;

pub use codec::{DecodeError, DeepLinkCodec, EncodeError, EncodedPath};
pub use link::{DeepLinkError, DeepLinkUrl, Result};
pub use resolver::{DeepLinkPlan, DeepLinkResolver, Resolution, ResolverConfig};
