//! # pike
//!
//! A schema-driven, near-real-time document indexing and search engine.
//!
//! ## Features
//!
//! - Declarative schemas compiled into per-field indexing strategies
//! - Writes searchable as soon as they return
//! - BM25 ranking, field sorting, facets and min/max aggregation in one scan
//! - Pluggable analyzers and result collectors, looked up by name
//! - Federated search over several indexes with globally consistent scores
//! - Point-in-time replication sessions

pub mod analysis;
pub mod cli;
pub mod collector;
pub mod config;
pub mod document;
pub mod error;
pub mod federation;
pub mod index;
pub mod manager;
pub mod query;
pub mod schema;
pub mod storage;

pub mod prelude {
    pub use crate::config::{EngineConfig, ManagerConfig};
    pub use crate::document::document::Document;
    pub use crate::error::{PikeError, Result};
    pub use crate::federation::FederationCoordinator;
    pub use crate::index::{IndexEngine, IndexStatus, Searcher};
    pub use crate::manager::IndexManager;
    pub use crate::query::{Query, QueryDefinition, ResultDefinition, SortField};
    pub use crate::schema::{FieldDeclaration, FieldTemplate};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
