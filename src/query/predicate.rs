//! Query predicates as they appear in a [`QueryDefinition`](super::QueryDefinition).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::definition::Operator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    MatchAll,
    Term(TermQuery),
    Match(MatchQuery),
    MultiField(MultiFieldQuery),
    Bool(BoolQuery),
    LongRange(LongRangeQuery),
    DoubleRange(DoubleRangeQuery),
    ExactDouble(ExactDoubleQuery),
    Facet(FacetQuery),
}

/// Exact match of one value, on a field or on every field of a generic group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_field: Option<String>,

    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

/// Analyzed text against one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub field: String,
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

/// Analyzed text against several boosted fields or generic groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiFieldQuery {
    pub text: String,
    pub fields: BTreeMap<String, f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoolQuery {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<Query>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<Query>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<Query>,

    /// Required, without contributing to the score.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<Query>,

    /// Defaults to 1 when there is no `must` or `filter` clause, 0 otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }
}

impl From<BoolQuery> for Query {
    fn from(query: BoolQuery) -> Self {
        Query::Bool(query)
    }
}

/// Inclusive range over a long point field. Missing bounds are open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRangeQuery {
    pub field: String,

    #[serde(default)]
    pub min: Option<i64>,

    #[serde(default)]
    pub max: Option<i64>,
}

/// Inclusive range over a double point field. Missing bounds are open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleRangeQuery {
    pub field: String,

    #[serde(default)]
    pub min: Option<f64>,

    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExactDoubleQuery {
    pub field: String,
    pub value: f64,
}

/// Facet drill-down: documents carrying `label` in dimension `dim`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetQuery {
    pub dim: String,
    pub label: String,
}

impl Query {
    pub fn term<S: Into<String>, V: Into<Value>>(field: S, value: V) -> Self {
        Query::Term(TermQuery {
            field: Some(field.into()),
            generic_field: None,
            value: value.into(),
            boost: None,
        })
    }

    pub fn generic_term<S: Into<String>, V: Into<Value>>(generic_field: S, value: V) -> Self {
        Query::Term(TermQuery {
            field: None,
            generic_field: Some(generic_field.into()),
            value: value.into(),
            boost: None,
        })
    }

    pub fn matches<S: Into<String>, T: Into<String>>(field: S, text: T) -> Self {
        Query::Match(MatchQuery {
            field: field.into(),
            text: text.into(),
            operator: None,
            boost: None,
        })
    }

    pub fn long_range<S: Into<String>>(field: S, min: Option<i64>, max: Option<i64>) -> Self {
        Query::LongRange(LongRangeQuery {
            field: field.into(),
            min,
            max,
        })
    }

    pub fn double_range<S: Into<String>>(field: S, min: Option<f64>, max: Option<f64>) -> Self {
        Query::DoubleRange(DoubleRangeQuery {
            field: field.into(),
            min,
            max,
        })
    }

    pub fn facet<S: Into<String>, L: Into<String>>(dim: S, label: L) -> Self {
        Query::Facet(FacetQuery {
            dim: dim.into(),
            label: label.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shapes() {
        let query: Query = serde_json::from_str(
            r#"{"bool": {
                "must": [{"term": {"field": "color", "value": "red"}}],
                "should": ["match_all"],
                "must_not": [{"long_range": {"field": "year", "min": 2000}}]
            }}"#,
        )
        .unwrap();

        let expected: Query = BoolQuery::new()
            .must(Query::term("color", "red"))
            .should(Query::MatchAll)
            .must_not(Query::long_range("year", Some(2000), None))
            .into();
        assert_eq!(query, expected);
    }
}
