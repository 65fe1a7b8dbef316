//! Directory synchronization for dirgraph.
//!
//! A cycle resolves the required metadata types, turns every regular file
//! in the watched directory into a four-node graph, saves that graph through
//! the dual-tier store and publishes one batch event per file. The
//! [`PollingScheduler`] repeats cycles on a fixed interval.

pub mod catalog;
pub mod emitter;
pub mod scheduler;
pub mod schema;
pub mod sinks;
pub mod synthesizer;

pub use catalog::{TypeCatalog, TypeSnapshot};
pub use emitter::{BatchEventEmitter, BatchOrigin, EmissionFailure, EmissionReport, EVENT_SOURCE_NAME};
pub use scheduler::{CycleReport, PollingScheduler, SchedulerState, SchedulerStatus};
pub use schema::{required_types, StaticSchemaProvider};
pub use sinks::{sink_from_config, ChannelEventSink, JsonLinesEventSink, TracingEventSink};
pub use synthesizer::{list_files, FileEntry, GraphSynthesizer};
