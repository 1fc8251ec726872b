//! Resource identifiers for catalog entities.
//!
//! Every addressable resource (dataset, branch, transaction, ...) is named by
//! a resource identifier of the form `ri.<service>.<instance>.<type>.<locator>`.
//! Parsing is total: input either matches the canonical pattern in full or is
//! rejected, never partially consumed.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ClientError, Result};

const RID_PATTERN: &str = concat!(
    "^ri",
    r"\.(?P<service>[a-z][a-z0-9\-]*)",
    r"\.(?P<instance>[a-z0-9][a-z0-9\-]*)?",
    r"\.(?P<type>[a-z][a-z0-9\-]*)",
    r"\.(?P<locator>[a-zA-Z0-9_\-.]+)$",
);

fn rid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(RID_PATTERN).expect("rid pattern is valid"))
}

/// A parsed resource identifier.
///
/// Round-trips losslessly through its canonical string form:
/// `ResourceIdentifier::parse(rid.to_string())` reproduces `rid` for every
/// valid identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentifier {
    service: String,
    instance: String,
    resource_type: String,
    locator: String,
}

impl ResourceIdentifier {
    /// Parse a canonical resource identifier string.
    ///
    /// Returns [`ClientError::ParseRid`] when the input does not match the
    /// canonical form. The caller decides the fallback (for example, treating
    /// the input as a catalog path instead).
    pub fn parse(value: &str) -> Result<Self> {
        let captures = rid_pattern()
            .captures(value)
            .ok_or_else(|| ClientError::ParseRid(value.to_string()))?;
        let group = |name: &str| {
            captures
                .name(name)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };
        Ok(Self {
            service: group("service"),
            instance: group("instance"),
            resource_type: group("type"),
            locator: group("locator"),
        })
    }

    /// Non-failing variant of [`parse`](Self::parse).
    pub fn try_parse(value: &str) -> Option<Self> {
        Self::parse(value).ok()
    }

    /// The service that owns the resource (e.g. `foundry`).
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The service instance. May be empty.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// The resource type (e.g. `dataset`, `transaction`).
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The opaque locator distinguishing this resource within its type.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Whether this identifier names a dataset.
    pub fn is_dataset(&self) -> bool {
        self.resource_type == "dataset"
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ri.{}.{}.{}.{}",
            self.service, self.instance, self.resource_type, self.locator
        )
    }
}

impl fmt::Debug for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for ResourceIdentifier {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
