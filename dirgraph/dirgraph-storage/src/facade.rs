//! The dual-tier store façade.
//!
//! `DualTierStore` presents one outer collection identity to callers and
//! forwards every read and every reference-copy write to exactly one embedded
//! store. Records are returned exactly as the embedded store holds them;
//! synthesized records already carry the outer identity as their home
//! collection, so no identity rewriting happens here.

use crate::connection::open_embedded_store;
use crate::query::{EdgeQuery, NodeQuery, Pagination};
use crate::store::EmbeddedStore;
use async_trait::async_trait;
use dirgraph_core::config::EmbeddedStoreConfig;
use dirgraph_core::error::{DirGraphError, Result, StoreResult};
use dirgraph_core::id::Guid;
use dirgraph_core::types::{CollectionIdentity, Edge, Node};
use std::sync::Arc;
use tracing::{debug, info};

/// Façade owning the outer identity and delegating to one embedded store
pub struct DualTierStore {
    outer: CollectionIdentity,
    embedded: Arc<dyn EmbeddedStore>,
}

/// Builder collecting the embedded stores attached to a façade
pub struct DualTierStoreBuilder {
    outer: CollectionIdentity,
    attached: Vec<Arc<dyn EmbeddedStore>>,
}

impl DualTierStoreBuilder {
    /// Attach an embedded store
    pub fn attach(mut self, store: Arc<dyn EmbeddedStore>) -> Self {
        self.attached.push(store);
        self
    }

    /// Build the façade
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless exactly one store is attached and
    /// its identity differs from the outer identity
    pub fn build(mut self) -> Result<DualTierStore> {
        if self.attached.len() != 1 {
            return Err(DirGraphError::config(format!(
                "{} embedded stores attached to {}, exactly one is required",
                self.attached.len(),
                self.outer.id
            )));
        }
        let embedded = self.attached.remove(0);
        if embedded.identity().id == self.outer.id {
            return Err(DirGraphError::config(format!(
                "Embedded store shares the outer collection id {}",
                self.outer.id
            )));
        }

        info!(
            "Dual-tier store {} delegating to embedded collection {}",
            self.outer.id,
            embedded.identity().id
        );
        Ok(DualTierStore {
            outer: self.outer,
            embedded,
        })
    }
}

impl DualTierStore {
    pub fn builder(outer: CollectionIdentity) -> DualTierStoreBuilder {
        DualTierStoreBuilder {
            outer,
            attached: Vec::new(),
        }
    }

    /// Open every configured embedded store and build the façade over them
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless exactly one entry is configured
    pub async fn open(outer: CollectionIdentity, configs: &[EmbeddedStoreConfig]) -> Result<Self> {
        let mut builder = Self::builder(outer);
        for config in configs {
            let store = open_embedded_store(config, &builder.outer).await?;
            builder = builder.attach(store);
        }
        builder.build()
    }

    pub fn outer_identity(&self) -> &CollectionIdentity {
        &self.outer
    }

    pub fn embedded_identity(&self) -> &CollectionIdentity {
        self.embedded.identity()
    }
}

#[async_trait]
impl EmbeddedStore for DualTierStore {
    fn identity(&self) -> &CollectionIdentity {
        &self.outer
    }

    async fn get_node(&self, guid: &Guid) -> StoreResult<Node> {
        self.embedded.get_node(guid).await
    }

    async fn is_node_known(&self, guid: &Guid) -> StoreResult<Option<Node>> {
        self.embedded.is_node_known(guid).await
    }

    async fn find_nodes(&self, query: &NodeQuery) -> StoreResult<Vec<Node>> {
        self.embedded.find_nodes(query).await
    }

    async fn find_nodes_by_property_value(
        &self,
        type_id: Option<&str>,
        search: &str,
        page: &Pagination,
    ) -> StoreResult<Vec<Node>> {
        self.embedded
            .find_nodes_by_property_value(type_id, search, page)
            .await
    }

    async fn get_edge(&self, guid: &Guid) -> StoreResult<Edge> {
        self.embedded.get_edge(guid).await
    }

    async fn is_edge_known(&self, guid: &Guid) -> StoreResult<Option<Edge>> {
        self.embedded.is_edge_known(guid).await
    }

    async fn find_edges(&self, query: &EdgeQuery) -> StoreResult<Vec<Edge>> {
        self.embedded.find_edges(query).await
    }

    async fn get_edges_for_node(
        &self,
        guid: &Guid,
        edge_type_id: Option<&str>,
    ) -> StoreResult<Vec<Edge>> {
        self.embedded.get_edges_for_node(guid, edge_type_id).await
    }

    async fn upsert_node(&self, node: &Node) -> StoreResult<()> {
        debug!("Saving reference copy of {} {}", node.type_name, node.guid);
        self.embedded.upsert_node(node).await
    }

    async fn upsert_edge(&self, edge: &Edge) -> StoreResult<()> {
        debug!("Saving reference copy of {} {}", edge.type_name, edge.guid);
        self.embedded.upsert_edge(edge).await
    }
}
