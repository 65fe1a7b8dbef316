//! Turning one directory snapshot into typed nodes and edges.
//!
//! Each regular file yields a DataFile asset, a Connection, a ConnectorType
//! and an Endpoint node, linked by three edges:
//!
//! ```text
//!   Connection --ConnectionToAsset-------> DataFile
//!   Connection --ConnectionConnectorType-> ConnectorType
//!   Connection --ConnectionEndpoint------> Endpoint
//! ```
//!
//! Identifiers derive from the canonical path and versions from the file's
//! modification time, so an unchanged directory always produces identical
//! graphs.

use crate::catalog::TypeSnapshot;
use crate::schema::{
    CONNECTION, CONNECTION_CONNECTOR_TYPE, CONNECTION_ENDPOINT, CONNECTION_TO_ASSET,
    CONNECTOR_TYPE, DATA_FILE, ENDPOINT,
};
use dirgraph_core::error::{DirGraphError, ErrorKind, Result};
use dirgraph_core::id::Guid;
use dirgraph_core::metadata::{
    file_type_of, PropertiesBuilder, FILE_PROTOCOL, PROP_FILE_TYPE, PROP_NAME,
    PROP_NETWORK_ADDRESS, PROP_PROTOCOL, PROP_QUALIFIED_NAME,
};
use dirgraph_core::types::{Edge, InstanceGraph, InstanceStatus, Node, Provenance};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

const CONNECTION_SUFFIX: &str = "-connection";
const CONNECTOR_TYPE_SUFFIX: &str = "-connectortype";
const ENDPOINT_SUFFIX: &str = "-endpoint";

/// A regular file found by a scan, before synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub base_name: String,
    pub canonical_path: String,
    /// Last modification time in epoch milliseconds
    pub modified_ms: u64,
}

/// Builds the graph of every regular file directly inside a directory.
#[derive(Debug, Clone)]
pub struct GraphSynthesizer {
    home_collection_id: String,
    qualified_name_prefix: String,
}

impl GraphSynthesizer {
    pub fn new(home_collection_id: impl Into<String>, qualified_name_prefix: impl Into<String>) -> Self {
        Self {
            home_collection_id: home_collection_id.into(),
            qualified_name_prefix: qualified_name_prefix.into(),
        }
    }

    /// Scan the direct children of `directory`, one graph per regular file
    ///
    /// # Errors
    ///
    /// Returns `DirectoryNotFound`, `NotADirectory` or `AccessDenied` for a
    /// bad directory, `Io` if listing fails part way, and `TypeError` if a
    /// needed type is missing from `types`
    pub async fn scan(&self, directory: &Path, types: &TypeSnapshot) -> Result<Vec<InstanceGraph>> {
        let entries = list_files(directory).await?;
        debug!(
            "Synthesizing {} files from {}",
            entries.len(),
            directory.display()
        );
        entries
            .iter()
            .map(|entry| self.synthesize(entry, types))
            .collect()
    }

    /// Build the four nodes and three edges of one file
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` if any needed type is missing from `types`
    pub fn synthesize(&self, entry: &FileEntry, types: &TypeSnapshot) -> Result<InstanceGraph> {
        let path = &entry.canonical_path;
        let version = entry.modified_ms;

        let asset = self.node(
            types,
            DATA_FILE,
            path,
            PropertiesBuilder::new()
                .add(PROP_NAME, entry.base_name.as_str())
                .add(PROP_QUALIFIED_NAME, self.qualified(path))
                .add_option(PROP_FILE_TYPE, file_type_of(&entry.base_name)),
            version,
        )?;
        let connection = self.derived_node(types, CONNECTION, entry, CONNECTION_SUFFIX)?;
        let connector_type = self.derived_node(types, CONNECTOR_TYPE, entry, CONNECTOR_TYPE_SUFFIX)?;

        let endpoint_name = format!("{}{}", path, ENDPOINT_SUFFIX);
        let endpoint = self.node(
            types,
            ENDPOINT,
            &endpoint_name,
            PropertiesBuilder::new()
                .add(PROP_NAME, format!("{}{}", entry.base_name, ENDPOINT_SUFFIX))
                .add(PROP_QUALIFIED_NAME, self.qualified(&endpoint_name))
                .add(PROP_PROTOCOL, FILE_PROTOCOL)
                .add(PROP_NETWORK_ADDRESS, path.as_str()),
            version,
        )?;

        let edges = vec![
            self.edge(types, CONNECTION_TO_ASSET, &connection, &asset, version)?,
            self.edge(types, CONNECTION_CONNECTOR_TYPE, &connection, &connector_type, version)?,
            self.edge(types, CONNECTION_ENDPOINT, &connection, &endpoint, version)?,
        ];

        Ok(InstanceGraph {
            nodes: vec![asset, connection, connector_type, endpoint],
            edges,
        })
    }

    fn qualified(&self, canonical_name: &str) -> String {
        format!("{}{}", self.qualified_name_prefix, canonical_name)
    }

    fn derived_node(
        &self,
        types: &TypeSnapshot,
        type_name: &str,
        entry: &FileEntry,
        suffix: &str,
    ) -> Result<Node> {
        let canonical_name = format!("{}{}", entry.canonical_path, suffix);
        self.node(
            types,
            type_name,
            &canonical_name,
            PropertiesBuilder::new()
                .add(PROP_NAME, format!("{}{}", entry.base_name, suffix))
                .add(PROP_QUALIFIED_NAME, self.qualified(&canonical_name)),
            entry.modified_ms,
        )
    }

    fn node(
        &self,
        types: &TypeSnapshot,
        type_name: &str,
        canonical_name: &str,
        properties: PropertiesBuilder,
        version: u64,
    ) -> Result<Node> {
        let descriptor = types.get(type_name)?;
        Ok(Node {
            guid: Guid::derive(canonical_name),
            type_name: descriptor.name.clone(),
            type_id: descriptor.id.clone(),
            properties: properties.build(),
            provenance: Provenance::Local,
            status: InstanceStatus::Active,
            version,
            metadata_collection_id: self.home_collection_id.clone(),
        })
    }

    fn edge(
        &self,
        types: &TypeSnapshot,
        type_name: &str,
        end1: &Node,
        end2: &Node,
        version: u64,
    ) -> Result<Edge> {
        let descriptor = types.get(type_name)?;
        Ok(Edge {
            guid: Guid::for_edge(&end1.guid, &descriptor.name, &end2.guid),
            type_name: descriptor.name.clone(),
            type_id: descriptor.id.clone(),
            end1: end1.endpoint_ref(),
            end2: end2.endpoint_ref(),
            provenance: Provenance::Local,
            status: InstanceStatus::Active,
            version,
            metadata_collection_id: self.home_collection_id.clone(),
        })
    }
}

/// List the regular files directly inside `directory`, ordered by name
///
/// Subdirectories are skipped, as are entries that vanish mid-scan and
/// entries whose names are not valid UTF-8.
///
/// # Errors
///
/// See [`GraphSynthesizer::scan`]
pub async fn list_files(directory: &Path) -> Result<Vec<FileEntry>> {
    let metadata = tokio::fs::metadata(directory)
        .await
        .map_err(|e| DirGraphError::filesystem("scan", directory, e))?;
    if !metadata.is_dir() {
        return Err(DirGraphError::new(
            ErrorKind::NotADirectory,
            "scan",
            format!("{} is not a directory", directory.display()),
        ));
    }

    let mut read_dir = tokio::fs::read_dir(directory)
        .await
        .map_err(|e| DirGraphError::filesystem("scan", directory, e))?;

    let mut candidates: Vec<(String, PathBuf)> = Vec::new();
    loop {
        let entry = match read_dir.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return Err(entry_error(directory, e)),
        };
        match entry.file_name().into_string() {
            Ok(name) => candidates.push((name, entry.path())),
            Err(raw) => warn!(
                "Skipping entry with non UTF-8 name {:?} in {}",
                raw,
                directory.display()
            ),
        }
    }
    candidates.sort();

    let mut files = Vec::with_capacity(candidates.len());
    for (base_name, path) in candidates {
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} disappeared during scan", path.display());
                continue;
            }
            Err(e) => return Err(entry_error(&path, e)),
        };
        if metadata.is_dir() {
            debug!("Skipping subdirectory {}", path.display());
            continue;
        }

        let canonical = match tokio::fs::canonicalize(&path).await {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} disappeared during scan", path.display());
                continue;
            }
            Err(e) => return Err(entry_error(&path, e)),
        };
        let Some(canonical_path) = canonical.to_str().map(str::to_string) else {
            warn!("Skipping {} with non UTF-8 canonical path", path.display());
            continue;
        };

        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        files.push(FileEntry {
            base_name,
            canonical_path,
            modified_ms,
        });
    }

    Ok(files)
}

/// Failure on an individual entry: permission problems keep their kind,
/// anything else is a plain io failure of the cycle
fn entry_error(path: &Path, err: io::Error) -> DirGraphError {
    let kind = match err.kind() {
        io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
        _ => ErrorKind::Io,
    };
    DirGraphError::new(kind, "scan", format!("{}: {}", path.display(), err)).with_source(err)
}
