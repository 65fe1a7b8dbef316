//! Query parameters for embedded store reads.

use dirgraph_core::error::{StoreError, StoreResult};
use dirgraph_core::types::{Edge, Node, Properties};
use serde::{Deserialize, Serialize};

/// Pagination parameters for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Pagination {
    /// Create new pagination parameters
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    /// Get default pagination (first 20 items)
    pub fn default_page() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }

    /// The page following this one
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.limit == 0 {
            return Err(StoreError::invalid_parameter(
                "limit",
                "page size must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Apply this page to an already ordered sequence
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::default_page()
    }
}

/// Node search: optional type, exact property matches, one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeQuery {
    pub type_id: Option<String>,
    pub properties: Properties,
    pub page: Pagination,
}

impl NodeQuery {
    /// Nodes of the given type
    pub fn of_type(type_id: impl Into<String>) -> Self {
        Self {
            type_id: Some(type_id.into()),
            ..Self::default()
        }
    }

    /// Require an exact property value
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_page(mut self, page: Pagination) -> Self {
        self.page = page;
        self
    }

    pub fn matches(&self, node: &Node) -> bool {
        if let Some(type_id) = &self.type_id {
            if &node.type_id != type_id {
                return false;
            }
        }
        self.properties
            .iter()
            .all(|(k, v)| node.properties.get(k) == Some(v))
    }
}

/// Edge search: optional type, one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeQuery {
    pub type_id: Option<String>,
    pub page: Pagination,
}

impl EdgeQuery {
    pub fn of_type(type_id: impl Into<String>) -> Self {
        Self {
            type_id: Some(type_id.into()),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, page: Pagination) -> Self {
        self.page = page;
        self
    }

    pub fn matches(&self, edge: &Edge) -> bool {
        self.type_id
            .as_ref()
            .is_none_or(|type_id| &edge.type_id == type_id)
    }
}

/// Substring search over every property value of a node
pub fn property_value_matches(node: &Node, type_id: Option<&str>, search: &str) -> bool {
    if let Some(type_id) = type_id {
        if node.type_id != type_id {
            return false;
        }
    }
    node.properties.values().any(|v| v.contains(search))
}
