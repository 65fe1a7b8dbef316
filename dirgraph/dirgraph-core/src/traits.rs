//! Interfaces of the collaborators the synchronizer talks to.

use crate::error::SinkError;
use crate::types::{BatchEvent, TypeDescriptor};
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves type names against a schema repository.
///
/// Lookups never block waiting for a type to appear; an unknown name is
/// `None` and the caller decides whether to retry.
pub trait SchemaProvider: Send + Sync {
    fn resolve_type_by_name(&self, name: &str) -> Option<TypeDescriptor>;
}

impl<T: SchemaProvider + ?Sized> SchemaProvider for Arc<T> {
    fn resolve_type_by_name(&self, name: &str) -> Option<TypeDescriptor> {
        (**self).resolve_type_by_name(name)
    }
}

/// Downstream consumer of batch events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish one finished batch
    async fn publish_batch(&self, event: &BatchEvent) -> Result<(), SinkError>;
}
