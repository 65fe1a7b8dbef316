//! Graph data model shared by the synthesizer, the stores and the emitter.

use crate::id::Guid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered string properties of a node.
pub type Properties = BTreeMap<String, String>;

/// Whether a record is owned by the collection that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Authored by the home collection of the synchronizer
    Local,
    /// Mirrored from another collection
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Active,
}

/// A resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub id: String,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// A typed graph vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub guid: Guid,
    pub type_name: String,
    pub type_id: String,
    pub properties: Properties,
    pub provenance: Provenance,
    pub status: InstanceStatus,
    pub version: u64,
    /// Home collection of this record
    pub metadata_collection_id: String,
}

impl Node {
    /// Lightweight reference to this node for use as an edge endpoint
    pub fn endpoint_ref(&self) -> EndpointRef {
        EndpointRef {
            guid: self.guid.clone(),
            type_name: self.type_name.clone(),
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Non-owning reference to an edge endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointRef {
    pub guid: Guid,
    pub type_name: String,
}

/// A typed directed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub guid: Guid,
    pub type_name: String,
    pub type_id: String,
    pub end1: EndpointRef,
    pub end2: EndpointRef,
    pub provenance: Provenance,
    pub status: InstanceStatus,
    pub version: u64,
    pub metadata_collection_id: String,
}

impl Edge {
    /// Check whether either endpoint is the given node
    pub fn touches(&self, guid: &Guid) -> bool {
        &self.end1.guid == guid || &self.end2.guid == guid
    }
}

/// Nodes and edges published together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl InstanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// The first node of the given type, if any
    pub fn node_of_type(&self, type_name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.type_name == type_name)
    }

    /// The first edge of the given type, if any
    pub fn edge_of_type(&self, type_name: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.type_name == type_name)
    }
}

/// Envelope handed to an event sink: one asset subgraph plus the identity
/// of the publishing server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEvent {
    pub source_name: String,
    pub source_collection_id: String,
    pub server_name: String,
    pub server_type: String,
    pub organization_name: String,
    pub graph: InstanceGraph,
}

/// Identity of a metadata collection: the façade's outer identity or the
/// embedded store's own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionIdentity {
    pub id: String,
    pub name: String,
}

impl CollectionIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Identity of the store embedded under this one
    pub fn embedded(&self) -> Self {
        Self {
            id: format!("{}-embedded", self.id),
            name: format!("{}-embedded", self.name),
        }
    }
}
