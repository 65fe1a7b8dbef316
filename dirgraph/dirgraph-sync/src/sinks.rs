//! Event sinks shipped with dirgraph.

use async_trait::async_trait;
use dirgraph_core::config::{SinkConfig, SinkKind};
use dirgraph_core::error::{DirGraphError, Result, SinkError};
use dirgraph_core::traits::EventSink;
use dirgraph_core::types::BatchEvent;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

/// Forwards every batch into a tokio channel
pub struct ChannelEventSink {
    tx: mpsc::Sender<BatchEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiver its batches arrive on
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BatchEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn publish_batch(&self, event: &BatchEvent) -> std::result::Result<(), SinkError> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// Writes one structured log line per batch
#[derive(Debug, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish_batch(&self, event: &BatchEvent) -> std::result::Result<(), SinkError> {
        let asset = event
            .graph
            .nodes
            .first()
            .map(|n| n.guid.to_string())
            .unwrap_or_default();
        info!(
            source = %event.source_name,
            collection = %event.source_collection_id,
            server = %event.server_name,
            asset = %asset,
            nodes = event.graph.nodes.len(),
            edges = event.graph.edges.len(),
            "Published batch event"
        );
        Ok(())
    }
}

/// Appends each batch as one JSON document per line
pub struct JsonLinesEventSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesEventSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventSink for JsonLinesEventSink {
    async fn publish_batch(&self, event: &BatchEvent) -> std::result::Result<(), SinkError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Build the sink described by the configuration
///
/// # Errors
///
/// Returns a configuration error if the jsonl sink has no path
pub fn sink_from_config(config: &SinkConfig) -> Result<Arc<dyn EventSink>> {
    match config.kind {
        SinkKind::Log => Ok(Arc::new(TracingEventSink)),
        SinkKind::Jsonl => {
            let path = config
                .path
                .clone()
                .ok_or_else(|| DirGraphError::config("A path must be provided for the jsonl sink"))?;
            Ok(Arc::new(JsonLinesEventSink::new(path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirgraph_core::types::InstanceGraph;
    use tempfile::TempDir;

    fn event(server: &str) -> BatchEvent {
        BatchEvent {
            source_name: "test".to_string(),
            source_collection_id: "c-1".to_string(),
            server_name: server.to_string(),
            server_type: "dirgraph".to_string(),
            organization_name: "acme".to_string(),
            graph: InstanceGraph::default(),
        }
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut rx) = ChannelEventSink::new(4);
        sink.publish_batch(&event("a")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().server_name, "a");

        drop(rx);
        assert!(matches!(
            sink.publish_batch(&event("b")).await,
            Err(SinkError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends() {
        let temp_dir = TempDir::new().unwrap();
        let sink = JsonLinesEventSink::new(temp_dir.path().join("batches.jsonl"));

        sink.publish_batch(&event("a")).await.unwrap();
        sink.publish_batch(&event("b")).await.unwrap();

        let content = tokio::fs::read_to_string(sink.path()).await.unwrap();
        let servers: Vec<String> = content
            .lines()
            .map(|l| serde_json::from_str::<BatchEvent>(l).unwrap().server_name)
            .collect();
        assert_eq!(servers, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_jsonl_sink_reports_io_errors() {
        let temp_dir = TempDir::new().unwrap();
        let sink = JsonLinesEventSink::new(temp_dir.path().join("missing").join("batches.jsonl"));
        assert!(matches!(
            sink.publish_batch(&event("a")).await,
            Err(SinkError::Io(_))
        ));
    }

    #[test]
    fn test_sink_from_config() {
        let config = SinkConfig {
            kind: SinkKind::Jsonl,
            path: None,
        };
        assert!(sink_from_config(&config).is_err());
        assert!(sink_from_config(&SinkConfig::default()).is_ok());
    }
}
