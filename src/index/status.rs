use serde::{Deserialize, Serialize};

use crate::analysis::catalog::AnalyzerCatalog;
use crate::schema::FieldDeclaration;

/// Point-in-time description of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub name: String,
    pub index_uuid: String,

    /// Commit generation of the current snapshot.
    pub version: u64,

    pub num_docs: u64,
    pub num_deleted_docs: u64,
    pub segments: usize,

    /// Declarations of the current schema.
    pub field_map: Vec<FieldDeclaration>,

    /// Custom analyzer definitions.
    #[serde(default, skip_serializing_if = "AnalyzerCatalog::is_empty")]
    pub analyzers: AnalyzerCatalog,
}
