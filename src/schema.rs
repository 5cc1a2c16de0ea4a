//! Schema declarations and their compiled form.
//!
//! A schema is a list of [`FieldDeclaration`]s. [`compile`] turns it into a
//! [`FieldMap`]: one [`FieldTypeInstance`] per concrete field, the generic
//! name groups, and the index and query analyzer bindings. Compilation is pure;
//! it never touches storage.
//!
//! # Examples
//!
//! ```
//! use pike::analysis::catalog::AnalyzerCatalog;
//! use pike::schema::{self, FieldDeclaration, FieldTemplate};
//!
//! let field_map = schema::compile(
//!     vec![
//!         FieldDeclaration::new("title", FieldTemplate::Text).stored(true).generic("title"),
//!         FieldDeclaration::new("title_exact", FieldTemplate::String).generic("title"),
//!         FieldDeclaration::new("price", FieldTemplate::LongValue),
//!     ],
//!     &AnalyzerCatalog::new(),
//! )
//! .unwrap();
//!
//! assert_eq!(
//!     field_map.resolve_concrete_fields(Some("title"), None).unwrap(),
//!     vec!["title", "title_exact"]
//! );
//! ```

pub mod declaration;
pub mod field_map;
pub mod field_type;

pub use declaration::{CustomOptions, FieldDeclaration, FieldTemplate, NumericKind, ValueKind};
pub use field_map::FieldMap;
pub use field_type::FieldTypeInstance;

use crate::analysis::catalog::AnalyzerCatalog;
use crate::error::Result;

/// Compile declarations into a [`FieldMap`].
pub fn compile(declarations: Vec<FieldDeclaration>, catalog: &AnalyzerCatalog) -> Result<FieldMap> {
    FieldMap::compile(declarations, catalog.clone())
}
