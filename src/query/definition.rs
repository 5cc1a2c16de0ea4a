//! The request side of a search.
//!
//! # Examples
//!
//! ```
//! use pike::query::{FunctionKind, Query, QueryDefinition, SortField};
//!
//! let json = r#"{
//!     "start": 0,
//!     "rows": 5,
//!     "query": {"match": {"field": "title", "text": "red wine"}},
//!     "sort": [{"field": "price", "direction": "desc"}],
//!     "facets": {"color": {"top": 3}},
//!     "functions": [{"field": "price", "function": "max"}]
//! }"#;
//! let definition: QueryDefinition = serde_json::from_str(json).unwrap();
//!
//! let built = QueryDefinition::new()
//!     .with_query(Query::matches("title", "red wine"))
//!     .rows(5)
//!     .sort(SortField::desc("price"))
//!     .facet("color", 3)
//!     .function("price", FunctionKind::Max);
//! assert_eq!(definition, built);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::predicate::Query;

/// Name of the pseudo field that sorts by relevance score.
pub const SCORE_FIELD: &str = "$score";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Or,
    And,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,

    /// Ascending for fields and descending for `$score` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,
}

impl SortField {
    pub fn asc<S: Into<String>>(field: S) -> Self {
        SortField {
            field: field.into(),
            direction: Some(SortDirection::Asc),
        }
    }

    pub fn desc<S: Into<String>>(field: S) -> Self {
        SortField {
            field: field.into(),
            direction: Some(SortDirection::Desc),
        }
    }

    pub fn score() -> Self {
        SortField {
            field: SCORE_FIELD.to_string(),
            direction: None,
        }
    }

    pub fn is_score(&self) -> bool {
        self.field == SCORE_FIELD
    }

    pub fn effective_direction(&self) -> SortDirection {
        match (self.direction, self.is_score()) {
            (Some(direction), _) => direction,
            (None, true) => SortDirection::Desc,
            (None, false) => SortDirection::Asc,
        }
    }
}

fn default_top() -> usize {
    10
}

/// Label counts requested for one facet dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetRequest {
    /// Labels returned, by count descending then label.
    #[serde(default = "default_top")]
    pub top: usize,

    /// Explicit candidate queries, label to query. When present, each label
    /// counts the hits matching both the main query and its candidate query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queries: Option<BTreeMap<String, Query>>,
}

impl FacetRequest {
    pub fn top(top: usize) -> Self {
        FacetRequest { top, queries: None }
    }

    pub fn is_restricted(&self) -> bool {
        self.queries.is_some()
    }
}

impl Default for FacetRequest {
    fn default() -> Self {
        FacetRequest::top(default_top())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Min,
    Max,
}

impl FunctionKind {
    pub fn name(&self) -> &'static str {
        match self {
            FunctionKind::Min => "min",
            FunctionKind::Max => "max",
        }
    }
}

/// A min/max aggregate over one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRequest {
    pub field: String,
    pub function: FunctionKind,
}

/// A pluggable collector, by registry name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorRequest {
    pub collector: String,

    #[serde(default)]
    pub params: Value,
}

impl CollectorRequest {
    pub fn new<S: Into<String>>(collector: S) -> Self {
        CollectorRequest {
            collector: collector.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// A search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefinition {
    pub start: usize,

    /// Row count, the engine default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Query>,

    /// Free text analyzed with each target field's query analyzer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_field: Option<String>,

    /// Field (or generic field) to boost, for `query_string`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub multi_field: BTreeMap<String, f32>,

    pub default_operator: Operator,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortField>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, FacetRequest>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionRequest>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub collectors: BTreeMap<String, CollectorRequest>,

    /// Stored fields to return, every stored field when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returned_fields: Option<Vec<String>>,
}

impl QueryDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn query_string<S: Into<String>, F: Into<String>>(mut self, text: S, default_field: F) -> Self {
        self.query_string = Some(text.into());
        self.default_field = Some(default_field.into());
        self
    }

    pub fn multi_field<S: Into<String>>(mut self, text: S, boosts: BTreeMap<String, f32>) -> Self {
        self.query_string = Some(text.into());
        self.multi_field = boosts;
        self
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.default_operator = operator;
        self
    }

    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn sort(mut self, field: SortField) -> Self {
        self.sort.push(field);
        self
    }

    pub fn facet<S: Into<String>>(mut self, dim: S, top: usize) -> Self {
        self.facets.insert(dim.into(), FacetRequest::top(top));
        self
    }

    pub fn facet_queries<S: Into<String>>(mut self, dim: S, queries: BTreeMap<String, Query>) -> Self {
        self.facets.insert(
            dim.into(),
            FacetRequest {
                top: default_top(),
                queries: Some(queries),
            },
        );
        self
    }

    pub fn function<S: Into<String>>(mut self, field: S, function: FunctionKind) -> Self {
        self.functions.push(FunctionRequest {
            field: field.into(),
            function,
        });
        self
    }

    pub fn collector<S: Into<String>>(mut self, name: S, request: CollectorRequest) -> Self {
        self.collectors.insert(name.into(), request);
        self
    }

    pub fn returned_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returned_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Rows to return, falling back to `default_rows`.
    pub fn effective_rows(&self, default_rows: usize) -> usize {
        self.rows.unwrap_or(default_rows)
    }

    /// Ranked documents a search keeps before cutting the page: none when no
    /// rows are asked for, whatever the start.
    pub fn window(&self, default_rows: usize) -> usize {
        match self.effective_rows(default_rows) {
            0 => 0,
            rows => self.start.saturating_add(rows),
        }
    }
}
