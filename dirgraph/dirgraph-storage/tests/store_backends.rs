//! Behaviour shared by every embedded store backend, exercised through the
//! dual-tier façade.

use dirgraph_core::config::EmbeddedStoreConfig;
use dirgraph_core::types::{
    CollectionIdentity, Edge, EndpointRef, InstanceStatus, Node, Properties, Provenance,
};
use dirgraph_core::{Guid, StoreError};
use dirgraph_storage::{DualTierStore, EdgeQuery, EmbeddedStore, NodeQuery, Pagination};

fn outer() -> CollectionIdentity {
    CollectionIdentity::new("c-1", "files")
}

fn node(canonical: &str, type_name: &str) -> Node {
    let mut properties = Properties::new();
    properties.insert("qualifiedName".to_string(), canonical.to_string());
    Node {
        guid: Guid::derive(canonical),
        type_name: type_name.to_string(),
        type_id: format!("t-{}", type_name),
        properties,
        provenance: Provenance::Local,
        status: InstanceStatus::Active,
        version: 10,
        metadata_collection_id: "c-1".to_string(),
    }
}

fn edge(type_name: &str, end1: &Node, end2: &Node) -> Edge {
    Edge {
        guid: Guid::for_edge(&end1.guid, type_name, &end2.guid),
        type_name: type_name.to_string(),
        type_id: format!("t-{}", type_name),
        end1: end1.endpoint_ref(),
        end2: EndpointRef {
            guid: end2.guid.clone(),
            type_name: end2.type_name.clone(),
        },
        provenance: Provenance::Local,
        status: InstanceStatus::Active,
        version: 10,
        metadata_collection_id: "c-1".to_string(),
    }
}

async fn exercise(store: DualTierStore) {
    let asset = node("/in/a.csv", "DataFile");
    let connection = node("/in/a.csv-connection", "Connection");
    let endpoint = node("/in/a.csv-endpoint", "Endpoint");
    for n in [&asset, &connection, &endpoint] {
        store.upsert_node(n).await.unwrap();
    }
    let to_asset = edge("ConnectionToAsset", &connection, &asset);
    let to_endpoint = edge("ConnectionEndpoint", &connection, &endpoint);
    store.upsert_edge(&to_asset).await.unwrap();
    store.upsert_edge(&to_endpoint).await.unwrap();

    // Rescanning the same content upserts in place
    store.upsert_node(&asset).await.unwrap();
    store.upsert_edge(&to_asset).await.unwrap();

    // Records come back verbatim, homed in the outer collection
    let stored = store.get_node(&asset.guid).await.unwrap();
    assert_eq!(stored, asset);
    assert_eq!(stored.metadata_collection_id, store.identity().id);
    assert_eq!(store.get_edge(&to_asset.guid).await.unwrap(), to_asset);

    let files = store
        .find_nodes(&NodeQuery::of_type("t-DataFile"))
        .await
        .unwrap();
    assert_eq!(files, vec![asset.clone()]);

    let all = store
        .find_nodes(&NodeQuery::default().with_page(Pagination::new(0, 100)))
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    let mut sorted = all.clone();
    sorted.sort_by(|a, b| a.guid.cmp(&b.guid));
    assert_eq!(all, sorted);

    let by_value = store
        .find_nodes_by_property_value(Some("t-Endpoint"), "a.csv", &Pagination::default())
        .await
        .unwrap();
    assert_eq!(by_value, vec![endpoint.clone()]);

    let edges = store
        .find_edges(&EdgeQuery::of_type("t-ConnectionEndpoint"))
        .await
        .unwrap();
    assert_eq!(edges, vec![to_endpoint.clone()]);

    let around = store
        .get_edges_for_node(&connection.guid, None)
        .await
        .unwrap();
    assert_eq!(around.len(), 2);
    let backward = store
        .get_edges_for_node(&asset.guid, Some("t-ConnectionToAsset"))
        .await
        .unwrap();
    assert_eq!(backward, vec![to_asset.clone()]);

    // Errors are the embedded store's own
    let missing = Guid::derive("/in/missing");
    assert_eq!(
        store.get_node(&missing).await.unwrap_err(),
        StoreError::NodeNotKnown(missing.to_string())
    );
    assert!(store.is_edge_known(&missing).await.unwrap().is_none());
    let dangling = edge("ConnectionToAsset", &connection, &node("/in/missing", "DataFile"));
    assert!(matches!(
        store.upsert_edge(&dangling).await,
        Err(StoreError::NodeNotKnown(_))
    ));

    // An edge naming the wrong type for a stored end is refused
    let mut mistyped = edge("ConnectionEndpoint", &connection, &asset);
    mistyped.end2.type_name = "Endpoint".to_string();
    assert!(matches!(
        store.upsert_edge(&mistyped).await,
        Err(StoreError::TypeError(_))
    ));
    assert!(store.is_edge_known(&mistyped.guid).await.unwrap().is_none());

    let mut retyped = asset.clone();
    retyped.type_name = "Endpoint".to_string();
    assert!(matches!(
        store.upsert_node(&retyped).await,
        Err(StoreError::Conflict { .. })
    ));

    let mut homed_inside = node("/in/b.csv", "DataFile");
    homed_inside.metadata_collection_id = store.embedded_identity().id.clone();
    assert!(matches!(
        store.upsert_node(&homed_inside).await,
        Err(StoreError::HomeCollection { .. })
    ));
}

#[tokio::test]
async fn test_memory_backend() {
    let store = DualTierStore::open(outer(), &[EmbeddedStoreConfig::memory()])
        .await
        .unwrap();
    exercise(store).await;
}

#[tokio::test]
async fn test_surreal_backend() {
    let store = DualTierStore::open(
        outer(),
        &[EmbeddedStoreConfig::surreal().with_namespace("test_ns").with_database("test_db")],
    )
    .await
    .unwrap();
    exercise(store).await;
}
