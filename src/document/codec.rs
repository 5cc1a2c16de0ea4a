//! Converts documents into indexable field sets.
//!
//! # Examples
//!
//! ```
//! use pike::analysis::catalog::AnalyzerCatalog;
//! use pike::document::codec::{DocumentCodec, EncodeMode, WriteInstruction};
//! use pike::document::document::Document;
//! use pike::schema::{self, FieldDeclaration, FieldTemplate};
//!
//! let field_map = schema::compile(
//!     vec![FieldDeclaration::new("title", FieldTemplate::Text).stored(true)],
//!     &AnalyzerCatalog::new(),
//! )
//! .unwrap();
//! let codec = DocumentCodec::new();
//!
//! let encoded = codec
//!     .encode(&Document::with_id("1").field("title", "Hello"), &field_map, EncodeMode::Full)
//!     .unwrap();
//! assert_eq!(encoded.instruction, WriteInstruction::Update);
//! assert_eq!(encoded.identity, "1");
//!
//! let unknown = Document::new().field("color", "red");
//! assert!(codec.encode(&unknown, &field_map, EncodeMode::Full).is_err());
//! ```

use ahash::AHashSet;

use crate::document::document::{Document, ID_FIELD};
use crate::document::facets::FacetsConfig;
use crate::document::identity::IdentityGenerator;
use crate::document::indexable::IndexableField;
use crate::error::{PikeError, Result};
use crate::schema::FieldMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeMode {
    /// Every field: text, exact terms, points, columns, stored values, facets.
    Full,
    /// Column values, plus the stored copy of each updated column, for
    /// value-only updates of existing documents.
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteInstruction {
    /// A new document with a generated identity.
    Insert,
    /// Replace (full) or patch (partial) the document with this identity.
    Update,
}

/// The output of [`DocumentCodec::encode`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDocument {
    pub identity: String,
    pub instruction: WriteInstruction,
    pub fields: Vec<IndexableField>,
}

#[derive(Debug, Default)]
pub struct DocumentCodec {
    identities: IdentityGenerator,
    facets_config: FacetsConfig,
}

impl DocumentCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode one document. Any field missing from `field_map` rejects the
    /// whole document.
    pub fn encode(
        &self,
        document: &Document,
        field_map: &FieldMap,
        mode: EncodeMode,
    ) -> Result<EncodedDocument> {
        let supplied = document.identity()?;
        if mode == EncodeMode::Partial && supplied.is_none() {
            return Err(PikeError::document(
                "A value update needs the identity of the document",
            ));
        }

        let mut fields = Vec::new();
        for (name, value) in document.fields() {
            if name == ID_FIELD {
                continue;
            }
            let instance = field_map.get(name).ok_or_else(|| {
                PikeError::document(format!("No field definition for the field: {name}"))
            })?;
            for scalar in value.values() {
                instance.encode(scalar, &mut fields)?;
            }
        }

        let mut columns = AHashSet::new();
        for field in fields.iter().filter(|f| f.is_doc_value()) {
            if !columns.insert(field.field_name().to_string()) {
                return Err(PikeError::document(format!(
                    "The field {} takes a single value",
                    field.field_name()
                )));
            }
        }

        let fields = match mode {
            EncodeMode::Full => self.facets_config.build(fields)?,
            EncodeMode::Partial => fields
                .into_iter()
                .filter(|f| {
                    f.is_doc_value()
                        || (matches!(f, IndexableField::Stored { .. })
                            && columns.contains(f.field_name()))
                })
                .collect(),
        };

        let (identity, instruction) = match supplied {
            Some(identity) => (identity, WriteInstruction::Update),
            None => (self.identities.next_identity(), WriteInstruction::Insert),
        };

        Ok(EncodedDocument {
            identity,
            instruction,
            fields,
        })
    }

    /// A fresh time-ordered identity.
    pub fn next_identity(&self) -> String {
        self.identities.next_identity()
    }
}
