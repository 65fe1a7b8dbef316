//! Core types and abstractions for the dirgraph directory synchronizer.
//!
//! This crate provides the graph data model, content-derived identifiers,
//! collaborator traits, configuration and error handling used across all
//! dirgraph components.

pub mod config;
pub mod error;
pub mod id;
pub mod metadata;
pub mod traits;
pub mod types;

pub use config::DirGraphConfig;
pub use error::{DirGraphError, ErrorKind, Result, SinkError, StoreError, StoreResult};
pub use id::Guid;
pub use traits::*;
pub use types::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::DirGraphConfig;
    pub use crate::error::{DirGraphError, ErrorKind, Result, SinkError, StoreError, StoreResult};
    pub use crate::id::Guid;
    pub use crate::traits::*;
    pub use crate::types::*;
}
