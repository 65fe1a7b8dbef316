//! Content-derived identifiers for graph records.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node or edge.
///
/// A `Guid` is never random: it is the URL-safe base64 encoding (with
/// padding) of the record's canonical name, so rescanning the same file
/// yields the same identifier and stores can upsert instead of duplicating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    /// Derive the identifier for a canonical name
    pub fn derive(canonical_name: &str) -> Self {
        Self(URL_SAFE.encode(canonical_name.as_bytes()))
    }

    /// Derive the identifier of an edge from its endpoints and type name
    pub fn for_edge(end1: &Guid, type_name: &str, end2: &Guid) -> Self {
        Self::derive(&format!("{}::{}::{}", end1.0, type_name, end2.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the canonical name this identifier was derived from
    pub fn canonical_name(&self) -> Option<String> {
        URL_SAFE
            .decode(self.0.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Parse from a string, checking that it is valid URL-safe base64
    pub fn parse(s: &str) -> Result<Self, base64::DecodeError> {
        URL_SAFE.decode(s.as_bytes())?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Guid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Guid> for String {
    fn from(guid: Guid) -> Self {
        guid.0
    }
}

impl std::str::FromStr for Guid {
    type Err = base64::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
