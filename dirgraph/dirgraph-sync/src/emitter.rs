//! Reconstructing per-asset subgraphs and publishing them as batch events.

use crate::catalog::TypeSnapshot;
use crate::schema::{CONNECTION_CONNECTOR_TYPE, CONNECTION_ENDPOINT, CONNECTION_TO_ASSET, DATA_FILE};
use dirgraph_core::error::{DirGraphError, Result, StoreResult};
use dirgraph_core::id::Guid;
use dirgraph_core::traits::EventSink;
use dirgraph_core::types::{BatchEvent, InstanceGraph, Node};
use dirgraph_storage::query::{NodeQuery, Pagination};
use dirgraph_storage::store::EmbeddedStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Source name stamped on every published batch
pub const EVENT_SOURCE_NAME: &str = "DirectoryGraphEventMapper";

const LISTING_PAGE_SIZE: usize = 100;

/// Identity of the server publishing batches
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOrigin {
    pub server_name: String,
    pub server_type: String,
    pub organization_name: String,
}

/// An asset whose batch could not be built or published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionFailure {
    pub asset: Guid,
    pub reason: String,
}

/// Outcome of one `emit_all` pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmissionReport {
    pub published: usize,
    pub failures: Vec<EmissionFailure>,
}

/// Rebuilds each asset's subgraph from the store and hands it to a sink.
pub struct BatchEventEmitter {
    store: Arc<dyn EmbeddedStore>,
    sink: Arc<dyn EventSink>,
    origin: BatchOrigin,
}

impl BatchEventEmitter {
    pub fn new(store: Arc<dyn EmbeddedStore>, sink: Arc<dyn EventSink>, origin: BatchOrigin) -> Self {
        Self { store, sink, origin }
    }

    /// Publish one batch for every stored DataFile in `assets`
    ///
    /// Failures for individual assets are recorded in the report and never
    /// stop the remaining assets.
    ///
    /// # Errors
    ///
    /// Returns `EmissionFailed` if the DataFile nodes cannot be listed
    pub async fn emit_all(
        &self,
        types: &TypeSnapshot,
        assets: &BTreeSet<Guid>,
    ) -> Result<EmissionReport> {
        let data_files = self.list_data_files(types).await?;
        let mut report = EmissionReport::default();

        for asset in data_files.into_iter().filter(|n| assets.contains(&n.guid)) {
            let guid = asset.guid.clone();
            let outcome = match self.build_subgraph(types, asset).await {
                Ok(graph) => {
                    let event = self.event(graph);
                    self.sink
                        .publish_batch(&event)
                        .await
                        .map_err(|e| format!("sink rejected batch: {}", e))
                }
                Err(e) => Err(format!("subgraph unavailable: {}", e)),
            };

            match outcome {
                Ok(()) => report.published += 1,
                Err(reason) => {
                    warn!("Failed to emit batch for asset {}: {}", guid, reason);
                    report.failures.push(EmissionFailure {
                        asset: guid,
                        reason,
                    });
                }
            }
        }

        debug!(
            "Published {} batches, {} failed",
            report.published,
            report.failures.len()
        );
        Ok(report)
    }

    /// Collect an asset and the synthesized nodes around it
    ///
    /// Follows the ConnectionToAsset edge back to the asset's connection,
    /// then the connection's ConnectorType and Endpoint edges forward. Any
    /// hop that is absent, or whose target is not of the type the edge
    /// names, leaves the graph smaller.
    pub async fn build_subgraph(&self, types: &TypeSnapshot, asset: Node) -> Result<InstanceGraph> {
        let to_asset = types.get(CONNECTION_TO_ASSET)?;
        let connector_type = types.get(CONNECTION_CONNECTOR_TYPE)?;
        let endpoint = types.get(CONNECTION_ENDPOINT)?;

        let asset_guid = asset.guid.clone();
        let mut graph = InstanceGraph::new();
        graph.nodes.push(asset);

        let link = self
            .store
            .get_edges_for_node(&asset_guid, Some(to_asset.id.as_str()))
            .await
            .map_err(|e| DirGraphError::store("get_edges_for_node", e))?
            .into_iter()
            .find(|e| e.end2.guid == asset_guid);
        let Some(link) = link else {
            return Ok(graph);
        };

        let connection = self
            .store
            .get_node(&link.end1.guid)
            .await
            .map_err(|e| DirGraphError::store("get_node", e))?;
        if connection.type_name != link.end1.type_name {
            warn!(
                "Edge {} expects a {} at {}, found {}",
                link.guid, link.end1.type_name, connection.guid, connection.type_name
            );
            return Ok(graph);
        }
        let connection_guid = connection.guid.clone();
        graph.nodes.push(connection);
        graph.edges.push(link);

        for edge_type in [connector_type, endpoint] {
            let hop = self
                .store
                .get_edges_for_node(&connection_guid, Some(edge_type.id.as_str()))
                .await
                .map_err(|e| DirGraphError::store("get_edges_for_node", e))?
                .into_iter()
                .find(|e| e.end1.guid == connection_guid);
            if let Some(hop) = hop {
                let target = self
                    .store
                    .get_node(&hop.end2.guid)
                    .await
                    .map_err(|e| DirGraphError::store("get_node", e))?;
                if target.type_name != hop.end2.type_name {
                    warn!(
                        "Edge {} expects a {} at {}, found {}",
                        hop.guid, hop.end2.type_name, target.guid, target.type_name
                    );
                    continue;
                }
                graph.nodes.push(target);
                graph.edges.push(hop);
            }
        }

        Ok(graph)
    }

    async fn list_data_files(&self, types: &TypeSnapshot) -> Result<Vec<Node>> {
        let data_file = types.get(DATA_FILE)?;
        let mut page = Pagination::new(0, LISTING_PAGE_SIZE);
        let mut nodes = Vec::new();
        loop {
            let batch = self
                .find_page(&data_file.id, page)
                .await
                .map_err(|e| {
                    DirGraphError::emission(format!("Failed to list {} nodes: {}", DATA_FILE, e))
                        .with_source(e)
                })?;
            let done = batch.len() < page.limit;
            nodes.extend(batch);
            if done {
                return Ok(nodes);
            }
            page = page.next();
        }
    }

    async fn find_page(&self, type_id: &str, page: Pagination) -> StoreResult<Vec<Node>> {
        self.store
            .find_nodes(&NodeQuery::of_type(type_id).with_page(page))
            .await
    }

    fn event(&self, graph: InstanceGraph) -> BatchEvent {
        BatchEvent {
            source_name: EVENT_SOURCE_NAME.to_string(),
            source_collection_id: self.store.identity().id.clone(),
            server_name: self.origin.server_name.clone(),
            server_type: self.origin.server_type.clone(),
            organization_name: self.origin.organization_name.clone(),
            graph,
        }
    }
}
