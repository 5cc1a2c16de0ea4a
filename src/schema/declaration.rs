//! Field declarations, as written by users and persisted in `fields.json`.

use serde::{Deserialize, Serialize};

/// The type tag of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTemplate {
    /// Analyzed full text, scored with BM25.
    Text,
    /// One exact, unanalyzed term.
    String,
    /// Exact term plus a sortable byte column.
    SortedString,
    /// Signed 64-bit point, for exact and range matching.
    LongPoint,
    /// Double point, for exact and range matching.
    DoublePoint,
    /// Signed 64-bit column, for sorting and aggregation.
    LongValue,
    /// Double column, for sorting and aggregation.
    DoubleValue,
    /// Facet labels only.
    Facet,
    /// Stored only, never indexed.
    Stored,
    /// Capabilities picked by [`CustomOptions`].
    Custom,
}

impl FieldTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            FieldTemplate::Text => "text",
            FieldTemplate::String => "string",
            FieldTemplate::SortedString => "sorted_string",
            FieldTemplate::LongPoint => "long_point",
            FieldTemplate::DoublePoint => "double_point",
            FieldTemplate::LongValue => "long_value",
            FieldTemplate::DoubleValue => "double_value",
            FieldTemplate::Facet => "facet",
            FieldTemplate::Stored => "stored",
            FieldTemplate::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericKind {
    Long,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Long,
    Double,
    Bytes,
}

/// Options of a [`FieldTemplate::Custom`] field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomOptions {
    /// Analyze the value into scored terms.
    pub tokenized: bool,

    /// Index the value as one exact term.
    pub indexed: bool,

    /// Numeric point for range matching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<NumericKind>,

    /// Column value for sorting and aggregation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_values: Option<ValueKind>,
}

/// Declaration of one concrete field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// Concrete field name, unique within a schema.
    pub name: String,

    /// Generic name shared by a group of concrete fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<String>,

    pub template: FieldTemplate,

    #[serde(default)]
    pub stored: bool,

    /// Index analyzer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,

    /// Query analyzer. Defaults to the index analyzer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_analyzer: Option<String>,

    /// Count values of this field as facet labels.
    #[serde(default)]
    pub facet: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomOptions>,
}

impl FieldDeclaration {
    pub fn new<S: Into<String>>(name: S, template: FieldTemplate) -> Self {
        FieldDeclaration {
            name: name.into(),
            generic: None,
            template,
            stored: false,
            analyzer: None,
            query_analyzer: None,
            facet: false,
            custom: None,
        }
    }

    pub fn stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    pub fn generic<S: Into<String>>(mut self, generic: S) -> Self {
        self.generic = Some(generic.into());
        self
    }

    pub fn analyzer<S: Into<String>>(mut self, analyzer: S) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn query_analyzer<S: Into<String>>(mut self, analyzer: S) -> Self {
        self.query_analyzer = Some(analyzer.into());
        self
    }

    pub fn facet(mut self, facet: bool) -> Self {
        self.facet = facet;
        self
    }

    pub fn custom(mut self, options: CustomOptions) -> Self {
        self.template = FieldTemplate::Custom;
        self.custom = Some(options);
        self
    }
}
