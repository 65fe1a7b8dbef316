//! Embedded store backed by SurrealDB's in-memory engine.

use crate::query::{property_value_matches, EdgeQuery, NodeQuery, Pagination};
use crate::store::{check_edge_copy, check_edge_end, check_node_copy, EmbeddedStore, UpsertAction};
use async_trait::async_trait;
use dirgraph_core::error::{StoreError, StoreResult};
use dirgraph_core::id::Guid;
use dirgraph_core::types::{CollectionIdentity, Edge, Node};
use surrealdb::engine::local::{Db, Mem};
use surrealdb::Surreal;
use tracing::{debug, info};

const NODES: &str = "nodes";
const EDGES: &str = "edges";

/// Storage implementation using SurrealDB
pub struct SurrealStore {
    db: Surreal<Db>,
    identity: CollectionIdentity,
}

impl SurrealStore {
    /// Open a fresh in-memory database in the given namespace and database
    pub async fn open(
        identity: CollectionIdentity,
        namespace: &str,
        database: &str,
    ) -> StoreResult<Self> {
        info!(
            "Opening embedded SurrealDB store {} ({}/{})",
            identity.id, namespace, database
        );

        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| StoreError::Unreachable(format!("Failed to create in-memory DB: {}", e)))?;

        db.use_ns(namespace).use_db(database).await.map_err(|e| {
            StoreError::Unreachable(format!("Failed to set namespace/database: {}", e))
        })?;

        Ok(Self { db, identity })
    }

    async fn select_node(&self, guid: &Guid) -> StoreResult<Option<Node>> {
        self.db
            .select((NODES, guid.to_string()))
            .await
            .map_err(|e| StoreError::backend(format!("Failed to get node {}: {}", guid, e)))
    }

    async fn select_edge(&self, guid: &Guid) -> StoreResult<Option<Edge>> {
        self.db
            .select((EDGES, guid.to_string()))
            .await
            .map_err(|e| StoreError::backend(format!("Failed to get edge {}: {}", guid, e)))
    }

    async fn nodes_of_type(&self, type_id: Option<&str>) -> StoreResult<Vec<Node>> {
        let mut result = match type_id {
            Some(type_id) => self
                .db
                .query("SELECT * FROM nodes WHERE type_id = $type_id ORDER BY guid")
                .bind(("type_id", type_id.to_string()))
                .await,
            None => self.db.query("SELECT * FROM nodes ORDER BY guid").await,
        }
        .map_err(|e| StoreError::backend(format!("Failed to query nodes: {}", e)))?;

        result
            .take(0)
            .map_err(|e| StoreError::backend(format!("Failed to parse nodes: {}", e)))
    }

    async fn edges_of_type(&self, type_id: Option<&str>) -> StoreResult<Vec<Edge>> {
        let mut result = match type_id {
            Some(type_id) => self
                .db
                .query("SELECT * FROM edges WHERE type_id = $type_id ORDER BY guid")
                .bind(("type_id", type_id.to_string()))
                .await,
            None => self.db.query("SELECT * FROM edges ORDER BY guid").await,
        }
        .map_err(|e| StoreError::backend(format!("Failed to query edges: {}", e)))?;

        result
            .take(0)
            .map_err(|e| StoreError::backend(format!("Failed to parse edges: {}", e)))
    }
}

#[async_trait]
impl EmbeddedStore for SurrealStore {
    fn identity(&self) -> &CollectionIdentity {
        &self.identity
    }

    async fn get_node(&self, guid: &Guid) -> StoreResult<Node> {
        self.select_node(guid)
            .await?
            .ok_or_else(|| StoreError::NodeNotKnown(guid.to_string()))
    }

    async fn is_node_known(&self, guid: &Guid) -> StoreResult<Option<Node>> {
        self.select_node(guid).await
    }

    async fn find_nodes(&self, query: &NodeQuery) -> StoreResult<Vec<Node>> {
        query.page.validate()?;
        let nodes = self.nodes_of_type(query.type_id.as_deref()).await?;
        Ok(query
            .page
            .apply(nodes.into_iter().filter(|n| query.matches(n))))
    }

    async fn find_nodes_by_property_value(
        &self,
        type_id: Option<&str>,
        search: &str,
        page: &Pagination,
    ) -> StoreResult<Vec<Node>> {
        page.validate()?;
        if search.is_empty() {
            return Err(StoreError::invalid_parameter("search", "must not be empty"));
        }
        let nodes = self.nodes_of_type(type_id).await?;
        Ok(page.apply(
            nodes
                .into_iter()
                .filter(|n| property_value_matches(n, type_id, search)),
        ))
    }

    async fn get_edge(&self, guid: &Guid) -> StoreResult<Edge> {
        self.select_edge(guid)
            .await?
            .ok_or_else(|| StoreError::EdgeNotKnown(guid.to_string()))
    }

    async fn is_edge_known(&self, guid: &Guid) -> StoreResult<Option<Edge>> {
        self.select_edge(guid).await
    }

    async fn find_edges(&self, query: &EdgeQuery) -> StoreResult<Vec<Edge>> {
        query.page.validate()?;
        let edges = self.edges_of_type(query.type_id.as_deref()).await?;
        Ok(query.page.apply(edges))
    }

    async fn get_edges_for_node(
        &self,
        guid: &Guid,
        edge_type_id: Option<&str>,
    ) -> StoreResult<Vec<Edge>> {
        if self.select_node(guid).await?.is_none() {
            return Err(StoreError::NodeNotKnown(guid.to_string()));
        }

        let mut result = self
            .db
            .query("SELECT * FROM edges WHERE end1.guid = $guid OR end2.guid = $guid ORDER BY guid")
            .bind(("guid", guid.to_string()))
            .await
            .map_err(|e| StoreError::backend(format!("Failed to query edges of {}: {}", guid, e)))?;

        let edges: Vec<Edge> = result
            .take(0)
            .map_err(|e| StoreError::backend(format!("Failed to parse edges: {}", e)))?;

        Ok(edges
            .into_iter()
            .filter(|e| edge_type_id.is_none_or(|t| e.type_id == t))
            .collect())
    }

    async fn upsert_node(&self, node: &Node) -> StoreResult<()> {
        let existing = self.select_node(&node.guid).await?;
        if check_node_copy(&self.identity, existing.as_ref(), node)? == UpsertAction::Keep {
            debug!("Keeping newer stored copy of node {}", node.guid);
            return Ok(());
        }

        let _: Option<Node> = self
            .db
            .upsert((NODES, node.guid.to_string()))
            .content(node.clone())
            .await
            .map_err(|e| StoreError::backend(format!("Failed to store node {}: {}", node.guid, e)))?;

        Ok(())
    }

    async fn upsert_edge(&self, edge: &Edge) -> StoreResult<()> {
        for end in [&edge.end1, &edge.end2] {
            check_edge_end(end, self.select_node(&end.guid).await?.as_ref())?;
        }

        let existing = self.select_edge(&edge.guid).await?;
        if check_edge_copy(&self.identity, existing.as_ref(), edge)? == UpsertAction::Keep {
            debug!("Keeping newer stored copy of edge {}", edge.guid);
            return Ok(());
        }

        let _: Option<Edge> = self
            .db
            .upsert((EDGES, edge.guid.to_string()))
            .content(edge.clone())
            .await
            .map_err(|e| StoreError::backend(format!("Failed to store edge {}: {}", edge.guid, e)))?;

        Ok(())
    }
}
