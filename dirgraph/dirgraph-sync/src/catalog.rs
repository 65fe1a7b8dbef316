//! Bounded-retry resolution of the types a cycle needs.

use dirgraph_core::error::{DirGraphError, Result};
use dirgraph_core::traits::SchemaProvider;
use dirgraph_core::types::TypeDescriptor;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Every required type, resolved in one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSnapshot {
    types: BTreeMap<String, TypeDescriptor>,
}

impl TypeSnapshot {
    /// Descriptor for a type name
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` if the name was not part of the resolved set
    pub fn get(&self, name: &str) -> Result<&TypeDescriptor> {
        self.types
            .get(name)
            .ok_or_else(|| DirGraphError::type_error("lookup_type", name))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }
}

/// Resolves symbolic type names through a [`SchemaProvider`].
pub struct TypeCatalog {
    provider: Arc<dyn SchemaProvider>,
    retry_limit: u32,
    backoff: Duration,
}

impl TypeCatalog {
    pub fn new(provider: Arc<dyn SchemaProvider>) -> Self {
        Self {
            provider,
            retry_limit: 10,
            backoff: Duration::from_secs(1),
        }
    }

    /// Set the number of attempts made before giving up
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit.max(1);
        self
    }

    /// Set the pause between attempts
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Make one resolution attempt
    ///
    /// Returns the complete snapshot, or the names that did not resolve.
    pub fn try_resolve(
        &self,
        required: &BTreeSet<String>,
    ) -> std::result::Result<TypeSnapshot, Vec<String>> {
        let mut types = BTreeMap::new();
        let mut missing = Vec::new();
        for name in required {
            match self.provider.resolve_type_by_name(name) {
                Some(descriptor) => {
                    types.insert(name.clone(), descriptor);
                }
                None => missing.push(name.clone()),
            }
        }
        if missing.is_empty() {
            Ok(TypeSnapshot { types })
        } else {
            Err(missing)
        }
    }

    /// Resolve every required type, retrying with a fixed backoff
    ///
    /// A snapshot is only returned once every name resolved in the same
    /// attempt.
    ///
    /// # Errors
    ///
    /// Returns `TypesUnavailable` once the retry limit is reached, or
    /// `Cancelled` if `cancel` fires during a backoff
    pub async fn resolve_all(
        &self,
        required: &BTreeSet<String>,
        cancel: &CancellationToken,
    ) -> Result<Arc<TypeSnapshot>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let missing = match self.try_resolve(required) {
                Ok(snapshot) => {
                    info!(
                        "Acquired all {} required types (attempt {}/{})",
                        snapshot.len(),
                        attempt,
                        self.retry_limit
                    );
                    return Ok(Arc::new(snapshot));
                }
                Err(missing) => missing,
            };

            debug!("Types not yet known: {}", missing.join(", "));

            if attempt >= self.retry_limit {
                return Err(DirGraphError::types_unavailable(format!(
                    "{} of {} required types still unresolved after {} attempts: {}",
                    missing.len(),
                    required.len(),
                    attempt,
                    missing.join(", ")
                )));
            }

            warn!(
                "Acquired {}/{} required types (attempt {}/{}), retrying in {:?}",
                required.len() - missing.len(),
                required.len(),
                attempt,
                self.retry_limit,
                self.backoff
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(DirGraphError::cancelled("resolve_all"));
                }
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }
}
