//! The response side of a search.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::indexable::{SortValue, compare_missing_last};
use crate::query::definition::{FunctionKind, QueryDefinition, SortDirection};

/// One component of a ranking key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortKey {
    Score(f32),
    Value(Option<SortValue>),
}

/// Ranking order of two keys: `Less` when `a` ranks first. Missing values
/// rank last in both directions.
pub fn compare_keys(a: &[SortKey], b: &[SortKey], directions: &[SortDirection]) -> Ordering {
    for ((a, b), direction) in a.iter().zip(b).zip(directions) {
        let ordering = match (a, b) {
            (SortKey::Score(a), SortKey::Score(b)) => match direction {
                SortDirection::Asc => a.total_cmp(b),
                SortDirection::Desc => b.total_cmp(a),
            },
            (SortKey::Value(Some(a)), SortKey::Value(Some(b))) => match direction {
                SortDirection::Asc => a.cmp(b),
                SortDirection::Desc => b.cmp(a),
            },
            (SortKey::Value(a), SortKey::Value(b)) => compare_missing_last(a.as_ref(), b.as_ref()),
            _ => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// Engine-local document number.
    pub doc_id: u64,

    pub identity: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,

    /// Source engine, for federated results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    pub fields: BTreeMap<String, Value>,

    /// Ranking key the document was ordered by.
    #[serde(skip)]
    pub sort_keys: Vec<SortKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub label: String,
    pub count: u64,
}

/// Sort by count descending then label, keep `top`.
pub fn top_facets(counts: &BTreeMap<String, u64>, top: usize) -> Vec<FacetCount> {
    let mut entries: Vec<FacetCount> = counts
        .iter()
        .map(|(label, count)| FacetCount {
            label: label.clone(),
            count: *count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries.truncate(top);
    entries
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    pub field: String,
    pub function: FunctionKind,

    /// Display value of the document holding the extreme, `None` when no
    /// matching document has a value.
    pub value: Option<Value>,

    /// Comparison key of the extreme.
    #[serde(skip)]
    pub key: Option<SortValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultDefinition {
    pub total_hits: u64,

    pub documents: Vec<ResultDocument>,

    /// dim -> label counts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, Vec<FacetCount>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionResult>,

    /// Outputs of pluggable collectors, by request name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub collectors: BTreeMap<String, Value>,

    /// Phase name to elapsed milliseconds.
    #[serde(default)]
    pub timer: BTreeMap<String, u64>,
}

impl ResultDefinition {
    /// Cut the `[start, start + rows)` window out of the collected ranking
    /// and apply each facet's `top`.
    pub fn finalize(mut self, definition: &QueryDefinition, rows: usize) -> Self {
        self.documents = self
            .documents
            .into_iter()
            .skip(definition.start)
            .take(rows)
            .collect();
        for (dim, labels) in self.facets.iter_mut() {
            let top = definition.facets.get(dim).map(|r| r.top).unwrap_or(usize::MAX);
            let counts = labels.iter().map(|f| (f.label.clone(), f.count)).collect();
            *labels = top_facets(&counts, top);
        }
        self
    }

    /// Facet counts of one dimension as a map.
    pub fn facet_counts(&self, dim: &str) -> BTreeMap<String, u64> {
        self.facets
            .get(dim)
            .map(|labels| labels.iter().map(|f| (f.label.clone(), f.count)).collect())
            .unwrap_or_default()
    }

    pub fn identities(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.identity.as_str()).collect()
    }

    pub fn function(&self, field: &str, function: FunctionKind) -> Option<&FunctionResult> {
        self.functions
            .iter()
            .find(|f| f.field == field && f.function == function)
    }
}
