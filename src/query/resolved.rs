//! Predicates resolved against a [`FieldMap`].
//!
//! Resolution turns field names into concrete fields, analyzes text with the
//! fields' query analyzers and converts values through the term providers.
//! Every unknown field or unsupported combination fails here, before any
//! segment is read.

use std::collections::BTreeMap;

use crate::analysis::analyzer::analyze_terms;
use crate::document::document::ID_FIELD;
use crate::document::facets::drilldown_term;
use crate::document::field_value::FieldValue;
use crate::document::indexable::{FACET_DRILLDOWN_FIELD, double_to_sortable_long};
use crate::error::{PikeError, Result};
use crate::query::definition::{Operator, QueryDefinition};
use crate::query::predicate::{BoolQuery, Query, TermQuery};
use crate::schema::{FieldMap, NumericKind};

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedQuery {
    MatchAll {
        boost: f32,
    },
    MatchNone,
    /// `scored` terms use BM25, the others score `boost`.
    Term {
        field: String,
        term: Vec<u8>,
        boost: f32,
        scored: bool,
    },
    /// Inclusive range over point keys.
    Range {
        field: String,
        min: i64,
        max: i64,
        boost: f32,
    },
    Bool {
        must: Vec<ResolvedQuery>,
        should: Vec<ResolvedQuery>,
        must_not: Vec<ResolvedQuery>,
        filter: Vec<ResolvedQuery>,
        minimum_should_match: usize,
        boost: f32,
    },
}

impl ResolvedQuery {
    fn all(clauses: Vec<ResolvedQuery>) -> Self {
        ResolvedQuery::Bool {
            must: clauses,
            should: Vec::new(),
            must_not: Vec::new(),
            filter: Vec::new(),
            minimum_should_match: 0,
            boost: 1.0,
        }
    }

    fn any(clauses: Vec<ResolvedQuery>) -> Self {
        ResolvedQuery::Bool {
            must: Vec::new(),
            should: clauses,
            must_not: Vec::new(),
            filter: Vec::new(),
            minimum_should_match: 1,
            boost: 1.0,
        }
    }

    fn combine(mut clauses: Vec<ResolvedQuery>, operator: Operator) -> Self {
        match (clauses.len(), operator) {
            (0, _) => ResolvedQuery::MatchNone,
            (1, _) => clauses.remove(0),
            (_, Operator::Or) => ResolvedQuery::any(clauses),
            (_, Operator::And) => ResolvedQuery::all(clauses),
        }
    }

    /// Both `self` and `other` must match; only `self` scores.
    pub fn filtered_by(self, other: ResolvedQuery) -> Self {
        ResolvedQuery::Bool {
            must: vec![self],
            should: Vec::new(),
            must_not: Vec::new(),
            filter: vec![other],
            minimum_should_match: 0,
            boost: 1.0,
        }
    }

    /// Scored (field, term) pairs, for collection statistics.
    pub fn scored_terms(&self, out: &mut Vec<(String, Vec<u8>)>) {
        match self {
            ResolvedQuery::Term {
                field,
                term,
                scored: true,
                ..
            } => out.push((field.clone(), term.clone())),
            ResolvedQuery::Bool {
                must,
                should,
                must_not,
                filter,
                ..
            } => {
                for clause in must.iter().chain(should).chain(must_not).chain(filter) {
                    clause.scored_terms(out);
                }
            }
            _ => {}
        }
    }
}

/// Resolves predicates against one compiled schema.
#[derive(Debug, Clone, Copy)]
pub struct QueryResolver<'a> {
    field_map: &'a FieldMap,
}

impl<'a> QueryResolver<'a> {
    pub fn new(field_map: &'a FieldMap) -> Self {
        QueryResolver { field_map }
    }

    /// The predicate of a whole definition: `query` and `query_string`
    /// combined, match-all when both are absent.
    pub fn resolve_definition(&self, definition: &QueryDefinition) -> Result<ResolvedQuery> {
        let mut parts = Vec::new();
        if let Some(query) = &definition.query {
            parts.push(self.resolve(query)?);
        }
        if let Some(text) = &definition.query_string {
            let operator = definition.default_operator;
            if !definition.multi_field.is_empty() {
                parts.push(self.multi_field(text, &definition.multi_field, operator)?);
            } else if let Some(field) = &definition.default_field {
                parts.push(self.match_text(field, text, operator, 1.0)?);
            } else {
                return Err(PikeError::query(
                    "A query string needs a default field or multi-field boosts",
                ));
            }
        }
        Ok(match parts.len() {
            0 => ResolvedQuery::MatchAll { boost: 1.0 },
            1 => parts.remove(0),
            _ => ResolvedQuery::all(parts),
        })
    }

    pub fn resolve(&self, query: &Query) -> Result<ResolvedQuery> {
        match query {
            Query::MatchAll => Ok(ResolvedQuery::MatchAll { boost: 1.0 }),
            Query::Term(term) => self.term(term),
            Query::Match(m) => self.match_text(
                &m.field,
                &m.text,
                m.operator.unwrap_or_default(),
                m.boost.unwrap_or(1.0),
            ),
            Query::MultiField(m) => {
                self.multi_field(&m.text, &m.fields, m.operator.unwrap_or_default())
            }
            Query::Bool(b) => self.bool(b),
            Query::LongRange(range) => {
                self.require_point(&range.field, NumericKind::Long)?;
                Ok(ResolvedQuery::Range {
                    field: range.field.clone(),
                    min: range.min.unwrap_or(i64::MIN),
                    max: range.max.unwrap_or(i64::MAX),
                    boost: 1.0,
                })
            }
            Query::DoubleRange(range) => {
                self.require_point(&range.field, NumericKind::Double)?;
                Ok(ResolvedQuery::Range {
                    field: range.field.clone(),
                    min: double_to_sortable_long(range.min.unwrap_or(f64::NEG_INFINITY)),
                    max: double_to_sortable_long(range.max.unwrap_or(f64::INFINITY)),
                    boost: 1.0,
                })
            }
            Query::ExactDouble(exact) => {
                self.require_point(&exact.field, NumericKind::Double)?;
                let key = double_to_sortable_long(exact.value);
                Ok(ResolvedQuery::Range {
                    field: exact.field.clone(),
                    min: key,
                    max: key,
                    boost: 1.0,
                })
            }
            Query::Facet(facet) => {
                let instance = self.field_map.require(&facet.dim)?;
                if !instance.is_facet() {
                    return Err(PikeError::query(format!(
                        "The field {} is not a facet",
                        facet.dim
                    )));
                }
                Ok(ResolvedQuery::Term {
                    field: FACET_DRILLDOWN_FIELD.to_string(),
                    term: drilldown_term(&facet.dim, &facet.label),
                    boost: 1.0,
                    scored: false,
                })
            }
        }
    }

    fn require_point(&self, field: &str, kind: NumericKind) -> Result<()> {
        let instance = self.field_map.require(field)?;
        if instance.point_kind() != Some(kind) {
            return Err(PikeError::query(format!(
                "The field {field} is not a {} point",
                match kind {
                    NumericKind::Long => "long",
                    NumericKind::Double => "double",
                }
            )));
        }
        Ok(())
    }

    fn term(&self, query: &TermQuery) -> Result<ResolvedQuery> {
        let fields = self
            .field_map
            .resolve_concrete_fields(query.generic_field.as_deref(), query.field.as_deref())?;
        let value = FieldValue::from_json(&query.value).map_err(|e| PikeError::query(e.to_string()))?;
        let boost = query.boost.unwrap_or(1.0);

        let clauses = fields
            .iter()
            .map(|field| self.exact_term(field, &value, boost))
            .collect::<Result<Vec<_>>>()?;
        Ok(ResolvedQuery::combine(clauses, Operator::Or))
    }

    fn exact_term(&self, field: &str, value: &FieldValue, boost: f32) -> Result<ResolvedQuery> {
        let text = || {
            value
                .as_term_string()
                .ok_or_else(|| PikeError::query(format!("{value:?} is not a term value")))
        };
        if field == ID_FIELD {
            return Ok(ResolvedQuery::Term {
                field: ID_FIELD.to_string(),
                term: text()?.into_bytes(),
                boost,
                scored: false,
            });
        }

        let instance = self.field_map.require(field)?;
        if let Some(term) = instance.term(value) {
            return Ok(ResolvedQuery::Term {
                field: field.to_string(),
                term: term?,
                boost,
                scored: false,
            });
        }
        if instance.is_tokenized() {
            return Ok(ResolvedQuery::Term {
                field: field.to_string(),
                term: text()?.into_bytes(),
                boost,
                scored: true,
            });
        }
        Err(PikeError::query(format!(
            "The field {field} cannot be searched by term"
        )))
    }

    /// Terms of `text` for one field: analyzed for text fields, the whole
    /// text as one exact term for string fields.
    fn text_terms(&self, field: &str, text: &str, boost: f32) -> Result<Vec<ResolvedQuery>> {
        let instance = self.field_map.require(field)?;
        if instance.is_tokenized() {
            let analyzer = self.field_map.query_analyzer(field).ok_or_else(|| {
                PikeError::query(format!("No query analyzer for the field {field}"))
            })?;
            return Ok(analyze_terms(analyzer.as_ref(), text)?
                .into_iter()
                .map(|term| ResolvedQuery::Term {
                    field: field.to_string(),
                    term: term.into_bytes(),
                    boost,
                    scored: true,
                })
                .collect());
        }
        if instance.has_terms() && instance.point_kind().is_none() {
            return Ok(vec![self.exact_term(field, &FieldValue::Text(text.to_string()), boost)?]);
        }
        Err(PikeError::query(format!(
            "The field {field} cannot be searched with text"
        )))
    }

    fn match_text(&self, field: &str, text: &str, operator: Operator, boost: f32) -> Result<ResolvedQuery> {
        let clauses = self.text_terms(field, text, boost)?;
        Ok(ResolvedQuery::combine(clauses, operator))
    }

    /// With `Or` any term in any field matches. With `And` every term
    /// position must match in at least one field.
    fn multi_field(
        &self,
        text: &str,
        boosts: &BTreeMap<String, f32>,
        operator: Operator,
    ) -> Result<ResolvedQuery> {
        let fields = self.field_map.resolve_boosted_fields(boosts)?;
        let per_field = fields
            .iter()
            .map(|(field, boost)| self.text_terms(field, text, *boost))
            .collect::<Result<Vec<_>>>()?;

        match operator {
            Operator::Or => Ok(ResolvedQuery::combine(
                per_field.into_iter().flatten().collect(),
                Operator::Or,
            )),
            Operator::And => {
                let positions = per_field.iter().map(Vec::len).max().unwrap_or(0);
                let mut columns: Vec<Vec<ResolvedQuery>> = vec![Vec::new(); positions];
                for terms in per_field {
                    for (position, term) in terms.into_iter().enumerate() {
                        columns[position].push(term);
                    }
                }
                let clauses = columns
                    .into_iter()
                    .map(|alternatives| ResolvedQuery::combine(alternatives, Operator::Or))
                    .collect();
                Ok(ResolvedQuery::combine(clauses, Operator::And))
            }
        }
    }

    fn bool(&self, query: &BoolQuery) -> Result<ResolvedQuery> {
        let resolve_all = |clauses: &[Query]| -> Result<Vec<ResolvedQuery>> {
            clauses.iter().map(|q| self.resolve(q)).collect()
        };
        let must = resolve_all(&query.must)?;
        let should = resolve_all(&query.should)?;
        let must_not = resolve_all(&query.must_not)?;
        let filter = resolve_all(&query.filter)?;

        let default_minimum = usize::from(must.is_empty() && filter.is_empty() && !should.is_empty());
        Ok(ResolvedQuery::Bool {
            minimum_should_match: query.minimum_should_match.unwrap_or(default_minimum),
            boost: query.boost.unwrap_or(1.0),
            must,
            should,
            must_not,
            filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::catalog::AnalyzerCatalog;
    use crate::document::indexable::long_to_term;
    use crate::schema::{FieldDeclaration, FieldTemplate};

    fn field_map() -> FieldMap {
        FieldMap::compile(
            vec![
                FieldDeclaration::new("title", FieldTemplate::Text).generic("name"),
                FieldDeclaration::new("code", FieldTemplate::String).generic("name"),
                FieldDeclaration::new("year", FieldTemplate::LongPoint),
                FieldDeclaration::new("weight", FieldTemplate::DoublePoint),
                FieldDeclaration::new("color", FieldTemplate::String).facet(true),
            ],
            AnalyzerCatalog::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_generic_term() {
        let map = field_map();
        let resolved = QueryResolver::new(&map)
            .resolve(&Query::generic_term("name", "Abc"))
            .unwrap();

        let ResolvedQuery::Bool { should, .. } = resolved else {
            panic!("expected a bool query");
        };
        assert_eq!(
            should,
            vec![
                ResolvedQuery::Term { field: "title".into(), term: b"Abc".to_vec(), boost: 1.0, scored: true },
                ResolvedQuery::Term { field: "code".into(), term: b"Abc".to_vec(), boost: 1.0, scored: false },
            ]
        );
    }

    #[test]
    fn test_point_terms_and_ranges() {
        let map = field_map();
        let resolver = QueryResolver::new(&map);

        assert_eq!(
            resolver.resolve(&Query::term("year", 2020)).unwrap(),
            ResolvedQuery::Term { field: "year".into(), term: long_to_term(2020), boost: 1.0, scored: false }
        );
        assert!(matches!(
            resolver.resolve(&Query::long_range("weight", Some(1), None)),
            Err(PikeError::Query(_))
        ));
        assert!(resolver.resolve(&Query::double_range("weight", Some(0.5), None)).is_ok());
    }

    #[test]
    fn test_match_and_operator() {
        let map = field_map();
        let resolver = QueryResolver::new(&map);
        let definition = QueryDefinition::new()
            .query_string("The red wine", "title")
            .operator(Operator::And);

        let ResolvedQuery::Bool { must, .. } = resolver.resolve_definition(&definition).unwrap() else {
            panic!("expected a bool query");
        };
        // "the" is a stop word
        assert_eq!(must.len(), 2);

        let only_stop_words = Query::matches("title", "the");
        assert_eq!(resolver.resolve(&only_stop_words).unwrap(), ResolvedQuery::MatchNone);
    }

    #[test]
    fn test_unknown_fields_fail() {
        let map = field_map();
        let resolver = QueryResolver::new(&map);

        assert!(matches!(resolver.resolve(&Query::term("nope", "x")), Err(PikeError::Query(_))));
        assert!(resolver.resolve(&Query::facet("year", "x")).is_err());
        assert!(resolver.resolve(&Query::matches("year", "2020")).is_err());
        let no_field = QueryDefinition {
            query_string: Some("x".into()),
            ..QueryDefinition::default()
        };
        assert!(resolver.resolve_definition(&no_field).is_err());
    }

    #[test]
    fn test_multi_field_and() {
        let map = field_map();
        let boosts = BTreeMap::from([("title".to_string(), 2.0), ("code".to_string(), 1.0)]);
        let resolved = QueryResolver::new(&map)
            .multi_field("red wine", &boosts, Operator::And)
            .unwrap();

        let ResolvedQuery::Bool { must, .. } = resolved else {
            panic!("expected a bool query");
        };
        // position 0 has "red" in title or "red wine" in code
        assert_eq!(must.len(), 2);
    }
}
