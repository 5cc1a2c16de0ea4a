//! Index storage, the single writer and near-real-time snapshots.
//!
//! An index is a list of immutable segments recorded by a
//! [`manifest::CommitManifest`]. Every commit writes new segment, deletion and
//! value-overlay files, then atomically replaces the manifest. Readers see
//! commits through [`snapshot::SnapshotManager`].

pub mod engine;
pub mod file_format;
pub mod manifest;
pub mod replication;
pub mod segment;
pub mod snapshot;
pub mod status;
pub mod writer;

pub use engine::{IndexEngine, Searcher};
pub use status::IndexStatus;
