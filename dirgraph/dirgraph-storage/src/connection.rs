//! Opening the configured embedded store.

use crate::memory::MemoryStore;
use crate::store::EmbeddedStore;
use crate::surreal::SurrealStore;
use dirgraph_core::config::{EmbeddedStoreConfig, StoreBackend};
use dirgraph_core::error::{DirGraphError, Result};
use dirgraph_core::types::CollectionIdentity;
use std::sync::Arc;
use tracing::info;

/// Open the embedded store described by `config` beneath `outer`
///
/// # Errors
///
/// Returns a configuration error if the entry is invalid, or a store error
/// if the backend cannot be opened
pub async fn open_embedded_store(
    config: &EmbeddedStoreConfig,
    outer: &CollectionIdentity,
) -> Result<Arc<dyn EmbeddedStore>> {
    config.validate()?;
    let identity = config.identity(outer);

    let store: Arc<dyn EmbeddedStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new(identity)),
        StoreBackend::Surreal => Arc::new(
            SurrealStore::open(identity, &config.namespace, &config.database)
                .await
                .map_err(|e| DirGraphError::store("open_embedded_store", e))?,
        ),
    };

    info!(
        "Embedded store {} opened with {:?} backend",
        store.identity().id,
        config.backend
    );
    Ok(store)
}
