//! Route entries: the rules that map an event payload to a target function.
//!
//! Route definitions live in the store as hash records with the fields
//! `name`, `pattern` and `lambda`. [`RouteEntry::from_fields`] is the single
//! validation boundary between those untyped records and the routing table.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::types::FieldMap;

/// Pattern token that matches every payload.
pub const WILDCARD: &str = "*";

/// A single routing rule.
///
/// Entries are immutable once created. `pattern` is either [`WILDCARD`] or a
/// literal prefix compared against the event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Rule name. Not unique: the table keeps every entry loaded under a name.
    pub name: String,
    /// `*` or a literal payload prefix.
    pub pattern: String,
    /// Identifier of the external function to invoke.
    #[serde(rename = "lambda")]
    pub target: String,
}

/// Wire shape of a route-definition record before validation.
#[derive(Debug, Deserialize)]
struct RawRouteRecord {
    name: Option<String>,
    pattern: Option<String>,
    lambda: Option<String>,
}

impl RouteEntry {
    /// Creates an entry from its parts without validation.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            target: target.into(),
        }
    }

    /// Decodes a route-definition record fetched from the store.
    ///
    /// The field map goes through JSON, the same shape the record has on the
    /// wire, and every field must be present and non-empty. An empty pattern
    /// would otherwise prefix-match every payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingField`] or [`DecodeError::EmptyField`]
    /// for partially populated records, [`DecodeError::Json`] if the map
    /// cannot be converted.
    pub fn from_fields(fields: &FieldMap) -> Result<Self, DecodeError> {
        let json = serde_json::to_value(fields)?;
        let raw: RawRouteRecord = serde_json::from_value(json)?;

        Ok(Self {
            name: require("name", raw.name)?,
            pattern: require("pattern", raw.pattern)?,
            target: require("lambda", raw.lambda)?,
        })
    }

    /// Returns `true` if this entry's pattern is the wildcard token.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.pattern == WILDCARD
    }

    /// Wildcard matches everything; otherwise a case-sensitive literal prefix test.
    #[must_use]
    pub fn matches(&self, payload: &str) -> bool {
        self.is_wildcard() || payload.starts_with(self.pattern.as_str())
    }
}

fn require(field: &'static str, value: Option<String>) -> Result<String, DecodeError> {
    match value {
        None => Err(DecodeError::MissingField { field }),
        Some(v) if v.is_empty() => Err(DecodeError::EmptyField { field }),
        Some(v) => Ok(v),
    }
}
