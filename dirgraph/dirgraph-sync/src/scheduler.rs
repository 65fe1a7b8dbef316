//! The polling scheduler driving resolve, scan, upsert and emit cycles.
//!
//! Lifecycle transitions happen under a single async mutex guarding the
//! state, the cancellation token, the worker handle and the lazily opened
//! store:
//!
//! ```text
//! Stopped --start()--> Starting --worker spawned--> Running
//! Running --stop()---> Stopping --worker joined---> Stopped
//! Running --fatal error in worker-----------------> Stopped
//! Stopped --run_once()--> Running --cycle ends----> Stopped
//! ```

use crate::catalog::TypeCatalog;
use crate::emitter::{BatchEventEmitter, BatchOrigin, EmissionReport};
use crate::schema::{required_types, DATA_FILE};
use crate::synthesizer::GraphSynthesizer;
use chrono::{DateTime, Utc};
use dirgraph_core::config::DirGraphConfig;
use dirgraph_core::error::{DirGraphError, ErrorKind, Result};
use dirgraph_core::id::Guid;
use dirgraph_core::traits::{EventSink, SchemaProvider};
use dirgraph_core::types::InstanceGraph;
use dirgraph_storage::facade::DualTierStore;
use dirgraph_storage::store::EmbeddedStore;
use parking_lot::Mutex as StatsLock;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub files: usize,
    pub nodes_upserted: usize,
    pub edges_upserted: usize,
    pub upsert_failures: usize,
    pub batches_published: usize,
    pub batch_failures: usize,
}

/// Snapshot of the scheduler for callers
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// Set once identical failures reach the configured threshold
    pub persistent_failure: bool,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct CycleStats {
    cycles_completed: u64,
    cycles_failed: u64,
    consecutive_failures: u32,
    last_failure: Option<(ErrorKind, String)>,
    last_error: Option<String>,
    persistent_failure: bool,
    last_cycle_at: Option<DateTime<Utc>>,
}

impl CycleStats {
    fn record_success(&mut self) {
        self.cycles_completed += 1;
        self.consecutive_failures = 0;
        self.last_failure = None;
        self.persistent_failure = false;
        self.last_cycle_at = Some(Utc::now());
    }

    /// Returns true when this failure first crosses the threshold
    fn record_failure(&mut self, err: &DirGraphError, threshold: u32) -> bool {
        let fingerprint = err.fingerprint();
        if self.last_failure.as_ref() == Some(&fingerprint) {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 1;
            self.last_failure = Some(fingerprint);
            self.persistent_failure = false;
        }
        self.cycles_failed += 1;
        self.last_error = Some(err.to_string());
        self.last_cycle_at = Some(Utc::now());

        if self.consecutive_failures == threshold {
            self.persistent_failure = true;
            return true;
        }
        false
    }
}

struct Control {
    state: SchedulerState,
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<()>>,
    store: Option<Arc<DualTierStore>>,
}

/// Everything one cycle needs, shared with the worker task
struct CycleRunner {
    directory: PathBuf,
    interval: Duration,
    failure_threshold: u32,
    catalog: TypeCatalog,
    synthesizer: GraphSynthesizer,
    store: Arc<DualTierStore>,
    emitter: BatchEventEmitter,
    stats: Arc<StatsLock<CycleStats>>,
}

/// Drives synchronization cycles on a fixed interval.
pub struct PollingScheduler {
    config: Arc<DirGraphConfig>,
    schema: Arc<dyn SchemaProvider>,
    sink: Arc<dyn EventSink>,
    control: Arc<Mutex<Control>>,
    stats: Arc<StatsLock<CycleStats>>,
}

impl PollingScheduler {
    pub fn new(
        config: DirGraphConfig,
        schema: Arc<dyn SchemaProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            schema,
            sink,
            control: Arc::new(Mutex::new(Control {
                state: SchedulerState::Stopped,
                cancel: None,
                worker: None,
                store: None,
            })),
            stats: Arc::new(StatsLock::new(CycleStats::default())),
        }
    }

    pub fn config(&self) -> &DirGraphConfig {
        &self.config
    }

    /// Start polling in a background task
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the scheduler is stopped, and a
    /// configuration error if the directory or store configuration is
    /// unusable; the scheduler then stays stopped
    pub async fn start(&self) -> Result<()> {
        let mut control = self.control.lock().await;
        if control.state != SchedulerState::Stopped {
            return Err(DirGraphError::invalid_state(
                "start",
                format!("scheduler is {}", control.state),
            ));
        }

        info!("Directory synchronizer starting");
        control.state = SchedulerState::Starting;
        let runner = match self.prepare(&mut control).await {
            Ok(runner) => runner,
            Err(e) => {
                control.state = SchedulerState::Stopped;
                error!("Directory synchronizer failed to start: {}", e);
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(poll_loop(
            runner,
            cancel.clone(),
            Arc::clone(&self.control),
        ));

        control.cancel = Some(cancel);
        control.worker = Some(worker);
        control.state = SchedulerState::Running;
        Ok(())
    }

    /// Stop polling and wait for the worker to finish
    ///
    /// Stopping an already stopped scheduler is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if another stop is already in progress
    pub async fn stop(&self) -> Result<()> {
        let (cancel, worker) = {
            let mut control = self.control.lock().await;
            match control.state {
                SchedulerState::Stopped => {
                    info!("Directory synchronizer already stopped");
                    return Ok(());
                }
                SchedulerState::Running => {
                    control.state = SchedulerState::Stopping;
                    (control.cancel.take(), control.worker.take())
                }
                state => {
                    return Err(DirGraphError::invalid_state(
                        "stop",
                        format!("scheduler is {}", state),
                    ));
                }
            }
        };

        info!("Directory synchronizer shutting down");
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Polling worker ended abnormally: {}", e);
            }
        }

        self.control.lock().await.state = SchedulerState::Stopped;
        info!("Directory synchronizer stopped");
        Ok(())
    }

    /// Run exactly one cycle on the calling task
    ///
    /// The scheduler reports `Running` while the cycle executes, and `stop()`
    /// cancels a pending type-resolution backoff.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the scheduler is stopped, or the error
    /// that abandoned the cycle
    pub async fn run_once(&self) -> Result<CycleReport> {
        let (runner, cancel) = {
            let mut control = self.control.lock().await;
            if control.state != SchedulerState::Stopped {
                return Err(DirGraphError::invalid_state(
                    "run_once",
                    format!("scheduler is {}", control.state),
                ));
            }
            let runner = self.prepare(&mut control).await?;
            let cancel = CancellationToken::new();
            control.cancel = Some(cancel.clone());
            control.state = SchedulerState::Running;
            (runner, cancel)
        };

        let result = runner.run_recorded(&cancel).await;

        let mut control = self.control.lock().await;
        if control.state == SchedulerState::Running && control.worker.is_none() {
            control.state = SchedulerState::Stopped;
            control.cancel = None;
        }
        result
    }

    pub async fn state(&self) -> SchedulerState {
        self.control.lock().await.state
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state().await;
        let stats = self.stats.lock();
        SchedulerStatus {
            state,
            cycles_completed: stats.cycles_completed,
            cycles_failed: stats.cycles_failed,
            consecutive_failures: stats.consecutive_failures,
            last_error: stats.last_error.clone(),
            persistent_failure: stats.persistent_failure,
            last_cycle_at: stats.last_cycle_at,
        }
    }

    /// The store façade, once a start or a single run has opened it
    pub async fn store(&self) -> Option<Arc<DualTierStore>> {
        self.control.lock().await.store.clone()
    }

    async fn prepare(&self, control: &mut Control) -> Result<CycleRunner> {
        let directory = validate_directory(self.config.connector.directory.as_deref()).await?;

        let store = match &control.store {
            Some(store) => Arc::clone(store),
            None => {
                let store = Arc::new(
                    DualTierStore::open(
                        self.config.server.collection_identity(),
                        &self.config.embedded_stores,
                    )
                    .await?,
                );
                control.store = Some(Arc::clone(&store));
                store
            }
        };

        let connector = &self.config.connector;
        let server = &self.config.server;
        let catalog = TypeCatalog::new(Arc::clone(&self.schema))
            .with_retry_limit(connector.type_retry_limit)
            .with_backoff(connector.type_retry_backoff());
        let synthesizer = GraphSynthesizer::new(
            store.identity().id.clone(),
            connector.qualified_name_prefix.clone(),
        );
        let emitter = BatchEventEmitter::new(
            Arc::clone(&store) as Arc<dyn EmbeddedStore>,
            Arc::clone(&self.sink),
            BatchOrigin {
                server_name: server.name.clone(),
                server_type: server.server_type.clone(),
                organization_name: server.organization.clone(),
            },
        );

        Ok(CycleRunner {
            directory,
            interval: connector.poll_interval(),
            failure_threshold: connector.persistent_failure_threshold,
            catalog,
            synthesizer,
            store,
            emitter,
            stats: Arc::clone(&self.stats),
        })
    }
}

async fn validate_directory(directory: Option<&Path>) -> Result<PathBuf> {
    let directory = directory
        .ok_or_else(|| DirGraphError::config("No directory supplied in the connector configuration"))?;

    match tokio::fs::metadata(directory).await {
        Ok(metadata) if metadata.is_dir() => Ok(directory.to_path_buf()),
        Ok(_) => Err(DirGraphError::config(format!(
            "{} is not a directory",
            directory.display()
        ))),
        Err(e) => Err(DirGraphError::config(format!(
            "Directory {} cannot be accessed: {}",
            directory.display(),
            e
        ))
        .with_source(e)),
    }
}

async fn poll_loop(runner: CycleRunner, cancel: CancellationToken, control: Arc<Mutex<Control>>) {
    info!(
        "Polling {} every {:?}",
        runner.directory.display(),
        runner.interval
    );

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if let Err(e) = runner.run_recorded(&cancel).await {
            if e.is_cancelled() {
                break;
            }
            if e.is_fatal() {
                error!("Stopping directory synchronizer after fatal error: {}", e);
                let mut guard = control.lock().await;
                if guard.state == SchedulerState::Running {
                    guard.state = SchedulerState::Stopped;
                    guard.cancel = None;
                    guard.worker = None;
                }
                return;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(runner.interval) => {}
        }
    }

    info!("Polling loop for {} exited", runner.directory.display());
}

impl CycleRunner {
    /// Run one cycle and fold its outcome into the shared statistics
    async fn run_recorded(&self, cancel: &CancellationToken) -> Result<CycleReport> {
        match self.run_cycle(cancel).await {
            Ok(report) => {
                self.stats.lock().record_success();
                Ok(report)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                error!("Synchronization cycle abandoned: {}", e);
                let crossed = self.stats.lock().record_failure(&e, self.failure_threshold);
                if crossed {
                    error!(
                        "Persistent failure: {} consecutive cycles failed in {} with {} errors",
                        self.failure_threshold,
                        e.operation(),
                        e.kind()
                    );
                }
                Err(e)
            }
        }
    }

    #[instrument(skip_all, fields(directory = %self.directory.display()))]
    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport> {
        let types = self.catalog.resolve_all(required_types(), cancel).await?;
        let graphs = self.synthesizer.scan(&self.directory, &types).await?;

        let mut report = CycleReport {
            files: graphs.len(),
            ..CycleReport::default()
        };
        self.upsert_all(&graphs, &mut report).await?;

        let assets: BTreeSet<Guid> = graphs
            .iter()
            .filter_map(|g| g.node_of_type(DATA_FILE))
            .map(|n| n.guid.clone())
            .collect();
        let emission: EmissionReport = self.emitter.emit_all(&types, &assets).await?;
        report.batches_published = emission.published;
        report.batch_failures = emission.failures.len();

        info!(
            "Cycle complete: {} files, {} nodes and {} edges saved, {} upserts failed, {} batches published",
            report.files,
            report.nodes_upserted,
            report.edges_upserted,
            report.upsert_failures,
            report.batches_published
        );
        Ok(report)
    }

    /// Upsert every node, then every edge
    ///
    /// A failed record is logged and skipped; an unreachable store ends the
    /// cycle.
    async fn upsert_all(&self, graphs: &[InstanceGraph], report: &mut CycleReport) -> Result<()> {
        for node in graphs.iter().flat_map(|g| &g.nodes) {
            match self.store.upsert_node(node).await {
                Ok(()) => report.nodes_upserted += 1,
                Err(e) if e.is_unreachable() => {
                    return Err(DirGraphError::store("upsert_node", e));
                }
                Err(e) => {
                    warn!("Failed to save {} {}: {}", node.type_name, node.guid, e);
                    report.upsert_failures += 1;
                }
            }
        }

        for edge in graphs.iter().flat_map(|g| &g.edges) {
            match self.store.upsert_edge(edge).await {
                Ok(()) => report.edges_upserted += 1,
                Err(e) if e.is_unreachable() => {
                    return Err(DirGraphError::store("upsert_edge", e));
                }
                Err(e) => {
                    warn!("Failed to save {} {}: {}", edge.type_name, edge.guid, e);
                    report.upsert_failures += 1;
                }
            }
        }

        debug!(
            "Saved {} nodes and {} edges",
            report.nodes_upserted, report.edges_upserted
        );
        Ok(())
    }
}
