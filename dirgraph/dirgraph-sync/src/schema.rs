//! Type names used by synthesized graphs and an in-process schema provider.

use dashmap::DashMap;
use dirgraph_core::traits::SchemaProvider;
use dirgraph_core::types::TypeDescriptor;
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use uuid::Uuid;

pub const OPEN_METADATA_ROOT: &str = "OpenMetadataRoot";
pub const REFERENCEABLE: &str = "Referenceable";
pub const ASSET: &str = "Asset";
pub const DATA_STORE: &str = "DataStore";
pub const DATA_FILE: &str = "DataFile";
pub const CONNECTION: &str = "Connection";
pub const CONNECTOR_TYPE: &str = "ConnectorType";
pub const ENDPOINT: &str = "Endpoint";

pub const CONNECTION_TO_ASSET: &str = "ConnectionToAsset";
pub const CONNECTION_CONNECTOR_TYPE: &str = "ConnectionConnectorType";
pub const CONNECTION_ENDPOINT: &str = "ConnectionEndpoint";

static REQUIRED_TYPES: Lazy<BTreeSet<String>> = Lazy::new(|| {
    [
        OPEN_METADATA_ROOT,
        REFERENCEABLE,
        ASSET,
        DATA_STORE,
        DATA_FILE,
        CONNECTION,
        CONNECTOR_TYPE,
        ENDPOINT,
        CONNECTION_TO_ASSET,
        CONNECTION_CONNECTOR_TYPE,
        CONNECTION_ENDPOINT,
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

/// Every type a synchronization cycle needs before it may synthesize
pub fn required_types() -> &'static BTreeSet<String> {
    &REQUIRED_TYPES
}

/// Schema provider holding a registry of known types in memory.
///
/// Type ids are UUIDv5 values derived from the type name, so two providers
/// registering the same names agree on ids.
#[derive(Debug, Default)]
pub struct StaticSchemaProvider {
    types: DashMap<String, TypeDescriptor>,
}

impl StaticSchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that already knows every required type
    pub fn with_open_metadata_types() -> Self {
        let provider = Self::new();
        for name in required_types() {
            provider.register(name);
        }
        provider
    }

    /// Register a type by name and return its descriptor
    pub fn register(&self, name: &str) -> TypeDescriptor {
        let descriptor = TypeDescriptor::new(
            name,
            Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string(),
        );
        self.types.insert(name.to_string(), descriptor.clone());
        descriptor
    }

    pub fn unregister(&self, name: &str) -> Option<TypeDescriptor> {
        self.types.remove(name).map(|(_, d)| d)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn resolve_type_by_name(&self, name: &str) -> Option<TypeDescriptor> {
        self.types.get(name).map(|entry| entry.value().clone())
    }
}
