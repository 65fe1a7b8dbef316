//! In-process embedded store backed by ordered maps.

use crate::query::{property_value_matches, EdgeQuery, NodeQuery, Pagination};
use crate::store::{check_edge_copy, check_edge_end, check_node_copy, EmbeddedStore, UpsertAction};
use async_trait::async_trait;
use dirgraph_core::error::{StoreError, StoreResult};
use dirgraph_core::id::Guid;
use dirgraph_core::types::{CollectionIdentity, Edge, Node};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Default)]
struct Graph {
    nodes: BTreeMap<Guid, Node>,
    edges: BTreeMap<Guid, Edge>,
}

/// Embedded store holding its collection in memory
pub struct MemoryStore {
    identity: CollectionIdentity,
    graph: RwLock<Graph>,
}

impl MemoryStore {
    pub fn new(identity: CollectionIdentity) -> Self {
        Self {
            identity,
            graph: RwLock::new(Graph::default()),
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.read().edges.len()
    }
}

#[async_trait]
impl EmbeddedStore for MemoryStore {
    fn identity(&self) -> &CollectionIdentity {
        &self.identity
    }

    async fn get_node(&self, guid: &Guid) -> StoreResult<Node> {
        self.graph
            .read()
            .nodes
            .get(guid)
            .cloned()
            .ok_or_else(|| StoreError::NodeNotKnown(guid.to_string()))
    }

    async fn is_node_known(&self, guid: &Guid) -> StoreResult<Option<Node>> {
        Ok(self.graph.read().nodes.get(guid).cloned())
    }

    async fn find_nodes(&self, query: &NodeQuery) -> StoreResult<Vec<Node>> {
        query.page.validate()?;
        let graph = self.graph.read();
        Ok(query
            .page
            .apply(graph.nodes.values().filter(|n| query.matches(n)).cloned()))
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
        let graph = self.graph.read();
        Ok(page.apply(
            graph
                .nodes
                .values()
                .filter(|n| property_value_matches(n, type_id, search))
                .cloned(),
        ))
    }

    async fn get_edge(&self, guid: &Guid) -> StoreResult<Edge> {
        self.graph
            .read()
            .edges
            .get(guid)
            .cloned()
            .ok_or_else(|| StoreError::EdgeNotKnown(guid.to_string()))
    }

    async fn is_edge_known(&self, guid: &Guid) -> StoreResult<Option<Edge>> {
        Ok(self.graph.read().edges.get(guid).cloned())
    }

    async fn find_edges(&self, query: &EdgeQuery) -> StoreResult<Vec<Edge>> {
        query.page.validate()?;
        let graph = self.graph.read();
        Ok(query
            .page
            .apply(graph.edges.values().filter(|e| query.matches(e)).cloned()))
    }

    async fn get_edges_for_node(
        &self,
        guid: &Guid,
        edge_type_id: Option<&str>,
    ) -> StoreResult<Vec<Edge>> {
        let graph = self.graph.read();
        if !graph.nodes.contains_key(guid) {
            return Err(StoreError::NodeNotKnown(guid.to_string()));
        }
        Ok(graph
            .edges
            .values()
            .filter(|e| e.touches(guid))
            .filter(|e| edge_type_id.is_none_or(|t| e.type_id == t))
            .cloned()
            .collect())
    }

    async fn upsert_node(&self, node: &Node) -> StoreResult<()> {
        let mut graph = self.graph.write();
        match check_node_copy(&self.identity, graph.nodes.get(&node.guid), node)? {
            UpsertAction::Keep => {
                debug!("Keeping newer stored copy of node {}", node.guid);
            }
            UpsertAction::Insert | UpsertAction::Replace => {
                graph.nodes.insert(node.guid.clone(), node.clone());
            }
        }
        Ok(())
    }

    async fn upsert_edge(&self, edge: &Edge) -> StoreResult<()> {
        let mut graph = self.graph.write();
        for end in [&edge.end1, &edge.end2] {
            check_edge_end(end, graph.nodes.get(&end.guid))?;
        }
        match check_edge_copy(&self.identity, graph.edges.get(&edge.guid), edge)? {
            UpsertAction::Keep => {
                debug!("Keeping newer stored copy of edge {}", edge.guid);
            }
            UpsertAction::Insert | UpsertAction::Replace => {
                graph.edges.insert(edge.guid.clone(), edge.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirgraph_core::types::{EndpointRef, InstanceStatus, Properties, Provenance};

    fn store() -> MemoryStore {
        MemoryStore::new(CollectionIdentity::new("outer-embedded", "files-embedded"))
    }

    fn node(name: &str, type_name: &str, version: u64) -> Node {
        let mut properties = Properties::new();
        properties.insert("name".to_string(), name.to_string());
        Node {
            guid: Guid::derive(name),
            type_name: type_name.to_string(),
            type_id: format!("t-{}", type_name),
            properties,
            provenance: Provenance::Local,
            status: InstanceStatus::Active,
            version,
            metadata_collection_id: "outer".to_string(),
        }
    }

    fn edge(type_name: &str, end1: &Node, end2: &Node) -> Edge {
        Edge {
            guid: Guid::for_edge(&end1.guid, type_name, &end2.guid),
            type_name: type_name.to_string(),
            type_id: format!("t-{}", type_name),
            end1: EndpointRef {
                guid: end1.guid.clone(),
                type_name: end1.type_name.clone(),
            },
            end2: EndpointRef {
                guid: end2.guid.clone(),
                type_name: end2.type_name.clone(),
            },
            provenance: Provenance::Local,
            status: InstanceStatus::Active,
            version: 1,
            metadata_collection_id: "outer".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = store();
        let n = node("/d/a.csv", "DataFile", 1);
        store.upsert_node(&n).await.unwrap();
        store.upsert_node(&n).await.unwrap();
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.get_node(&n.guid).await.unwrap(), n);
    }

    #[tokio::test]
    async fn test_older_copy_is_kept_out() {
        let store = store();
        store.upsert_node(&node("/d/a.csv", "DataFile", 7)).await.unwrap();
        store.upsert_node(&node("/d/a.csv", "DataFile", 3)).await.unwrap();
        let stored = store.get_node(&Guid::derive("/d/a.csv")).await.unwrap();
        assert_eq!(stored.version, 7);
    }

    #[tokio::test]
    async fn test_edge_requires_known_ends() {
        let store = store();
        let a = node("/d/a.csv-connection", "Connection", 1);
        let b = node("/d/a.csv", "DataFile", 1);
        store.upsert_node(&a).await.unwrap();

        let e = edge("ConnectionToAsset", &a, &b);
        assert!(matches!(
            store.upsert_edge(&e).await,
            Err(StoreError::NodeNotKnown(_))
        ));

        store.upsert_node(&b).await.unwrap();
        store.upsert_edge(&e).await.unwrap();
        let edges = store.get_edges_for_node(&b.guid, None).await.unwrap();
        assert_eq!(edges, vec![e.clone()]);
        let edges = store
            .get_edges_for_node(&a.guid, Some("t-ConnectionEndpoint"))
            .await
            .unwrap();
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn test_edge_rejects_retyped_end() {
        let store = store();
        let connection = node("/d/a.csv-connection", "Connection", 1);
        let squatter = node("/d/a.csv-endpoint", "Other", 1);
        store.upsert_node(&connection).await.unwrap();
        store.upsert_node(&squatter).await.unwrap();

        let mut e = edge("ConnectionEndpoint", &connection, &squatter);
        e.end2.type_name = "Endpoint".to_string();
        assert!(matches!(
            store.upsert_edge(&e).await,
            Err(StoreError::TypeError(_))
        ));
        assert_eq!(store.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_records() {
        let store = store();
        let guid = Guid::derive("/nowhere");
        assert!(matches!(
            store.get_node(&guid).await,
            Err(StoreError::NodeNotKnown(_))
        ));
        assert!(matches!(
            store.get_edge(&guid).await,
            Err(StoreError::EdgeNotKnown(_))
        ));
        assert_eq!(store.is_node_known(&guid).await.unwrap(), None);
        assert!(store.get_edges_for_node(&guid, None).await.is_err());
    }

    #[tokio::test]
    async fn test_find_nodes_paged_and_filtered() {
        let store = store();
        for i in 0..5 {
            store
                .upsert_node(&node(&format!("/d/f{}.csv", i), "DataFile", 1))
                .await
                .unwrap();
        }
        store
            .upsert_node(&node("/d/f0.csv-endpoint", "Endpoint", 1))
            .await
            .unwrap();

        let all = store
            .find_nodes(&NodeQuery::of_type("t-DataFile").with_page(Pagination::new(0, 10)))
            .await
            .unwrap();
        assert_eq!(all.len(), 5);

        let second = store
            .find_nodes(&NodeQuery::of_type("t-DataFile").with_page(Pagination::new(2, 2)))
            .await
            .unwrap();
        assert_eq!(second, all[2..4].to_vec());

        let exact = store
            .find_nodes(&NodeQuery::default().with_property("name", "/d/f3.csv"))
            .await
            .unwrap();
        assert_eq!(exact.len(), 1);

        let found = store
            .find_nodes_by_property_value(None, "f0", &Pagination::default_page())
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }
}
