//! The embedded store interface and reference-copy rules shared by backends.

use crate::query::{EdgeQuery, NodeQuery, Pagination};
use async_trait::async_trait;
use dirgraph_core::error::{StoreError, StoreResult};
use dirgraph_core::id::Guid;
use dirgraph_core::types::{CollectionIdentity, Edge, EndpointRef, Node};

/// A graph store that accepts reference copies and answers queries.
///
/// Every backend orders multi-record results by GUID so paging is stable.
#[async_trait]
pub trait EmbeddedStore: Send + Sync {
    /// Identity of the collection held by this store
    fn identity(&self) -> &CollectionIdentity;

    /// Get a node, failing with `NodeNotKnown` if absent
    async fn get_node(&self, guid: &Guid) -> StoreResult<Node>;

    /// Get a node if present
    async fn is_node_known(&self, guid: &Guid) -> StoreResult<Option<Node>>;

    async fn find_nodes(&self, query: &NodeQuery) -> StoreResult<Vec<Node>>;

    /// Nodes having any property value containing `search`
    async fn find_nodes_by_property_value(
        &self,
        type_id: Option<&str>,
        search: &str,
        page: &Pagination,
    ) -> StoreResult<Vec<Node>>;

    /// Get an edge, failing with `EdgeNotKnown` if absent
    async fn get_edge(&self, guid: &Guid) -> StoreResult<Edge>;

    async fn is_edge_known(&self, guid: &Guid) -> StoreResult<Option<Edge>>;

    async fn find_edges(&self, query: &EdgeQuery) -> StoreResult<Vec<Edge>>;

    /// Edges with the node at either end, optionally of one edge type
    async fn get_edges_for_node(
        &self,
        guid: &Guid,
        edge_type_id: Option<&str>,
    ) -> StoreResult<Vec<Edge>>;

    /// Save a node as a reference copy
    async fn upsert_node(&self, node: &Node) -> StoreResult<()>;

    /// Save an edge as a reference copy; both endpoints must be known and of
    /// the type the edge names
    async fn upsert_edge(&self, edge: &Edge) -> StoreResult<()>;
}

/// What a backend should do with an incoming reference copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Insert,
    Replace,
    /// The stored copy is newer; keep it
    Keep,
}

fn check_common(
    identity: &CollectionIdentity,
    guid: &Guid,
    type_name: &str,
    type_id: &str,
    home: &str,
) -> StoreResult<()> {
    if guid.as_str().is_empty() {
        return Err(StoreError::invalid_parameter("guid", "must not be empty"));
    }
    if type_name.is_empty() || type_id.is_empty() {
        return Err(StoreError::TypeError(format!(
            "record {} has no resolved type",
            guid
        )));
    }
    if home.is_empty() {
        return Err(StoreError::invalid_parameter(
            "metadata_collection_id",
            format!("record {} has no home collection", guid),
        ));
    }
    if home == identity.id {
        return Err(StoreError::HomeCollection {
            guid: guid.to_string(),
            collection_id: home.to_string(),
        });
    }
    Ok(())
}

fn decide(
    guid: &Guid,
    existing: Option<(&str, &str, u64)>,
    incoming: (&str, &str, u64),
) -> StoreResult<UpsertAction> {
    let Some((type_name, home, version)) = existing else {
        return Ok(UpsertAction::Insert);
    };
    if type_name != incoming.0 {
        return Err(StoreError::conflict(
            guid.as_str(),
            format!("stored as {}, received as {}", type_name, incoming.0),
        ));
    }
    if home != incoming.1 {
        return Err(StoreError::conflict(
            guid.as_str(),
            format!("homed in {}, received from {}", home, incoming.1),
        ));
    }
    if version > incoming.2 {
        return Ok(UpsertAction::Keep);
    }
    Ok(UpsertAction::Replace)
}

/// Check one end of an incoming edge against the node stored under its guid
pub fn check_edge_end(end: &EndpointRef, stored: Option<&Node>) -> StoreResult<()> {
    let Some(stored) = stored else {
        return Err(StoreError::NodeNotKnown(end.guid.to_string()));
    };
    if stored.type_name != end.type_name {
        return Err(StoreError::TypeError(format!(
            "edge end {} is stored as {}, not {}",
            end.guid, stored.type_name, end.type_name
        )));
    }
    Ok(())
}

/// Decide how to apply a node reference copy
pub fn check_node_copy(
    identity: &CollectionIdentity,
    existing: Option<&Node>,
    incoming: &Node,
) -> StoreResult<UpsertAction> {
    check_common(
        identity,
        &incoming.guid,
        &incoming.type_name,
        &incoming.type_id,
        &incoming.metadata_collection_id,
    )?;
    decide(
        &incoming.guid,
        existing.map(|n| (n.type_name.as_str(), n.metadata_collection_id.as_str(), n.version)),
        (
            &incoming.type_name,
            &incoming.metadata_collection_id,
            incoming.version,
        ),
    )
}

/// Decide how to apply an edge reference copy
pub fn check_edge_copy(
    identity: &CollectionIdentity,
    existing: Option<&Edge>,
    incoming: &Edge,
) -> StoreResult<UpsertAction> {
    check_common(
        identity,
        &incoming.guid,
        &incoming.type_name,
        &incoming.type_id,
        &incoming.metadata_collection_id,
    )?;
    decide(
        &incoming.guid,
        existing.map(|e| (e.type_name.as_str(), e.metadata_collection_id.as_str(), e.version)),
        (
            &incoming.type_name,
            &incoming.metadata_collection_id,
            incoming.version,
        ),
    )
}
