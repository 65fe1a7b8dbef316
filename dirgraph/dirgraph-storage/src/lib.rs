//! Storage layer for dirgraph.
//!
//! This crate provides the dual-tier store façade, the embedded store
//! interface and its backends (in-process maps and embedded SurrealDB), and
//! the query types used to read synthesized graphs back.

pub mod connection;
pub mod facade;
pub mod memory;
pub mod query;
pub mod store;
pub mod surreal;

pub use connection::open_embedded_store;
pub use facade::{DualTierStore, DualTierStoreBuilder};
pub use memory::MemoryStore;
pub use query::{EdgeQuery, NodeQuery, Pagination};
pub use store::EmbeddedStore;
pub use surreal::SurrealStore;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::facade::DualTierStore;
    pub use crate::memory::MemoryStore;
    pub use crate::query::{EdgeQuery, NodeQuery, Pagination};
    pub use crate::store::EmbeddedStore;
    pub use crate::surreal::SurrealStore;
}
