//! Facet configuration step of the document codec.

use ahash::AHashSet;

use crate::document::indexable::{FACET_DRILLDOWN_FIELD, IndexableField};
use crate::error::{PikeError, Result};

/// Separates dimension and label in drill-down terms.
pub const DRILLDOWN_SEPARATOR: char = '\u{1f}';

/// Drill-down term of a facet label.
pub fn drilldown_term(dim: &str, label: &str) -> Vec<u8> {
    format!("{dim}{DRILLDOWN_SEPARATOR}{label}").into_bytes()
}

/// Turns raw facet labels into facet fields plus drill-down terms.
#[derive(Debug, Clone, Default)]
pub struct FacetsConfig;

impl FacetsConfig {
    pub fn new() -> Self {
        FacetsConfig
    }

    /// Expand every [`IndexableField::FacetLabel`] of a document. Labels are
    /// deduplicated per dimension, keeping first-seen order; empty labels are
    /// rejected. Other fields pass through unchanged.
    pub fn build(&self, fields: Vec<IndexableField>) -> Result<Vec<IndexableField>> {
        let mut seen: AHashSet<(String, String)> = AHashSet::new();
        let mut out = Vec::with_capacity(fields.len());
        let mut facets = Vec::new();

        for field in fields {
            match field {
                IndexableField::FacetLabel { dim, label } => {
                    if label.is_empty() {
                        return Err(PikeError::document(format!(
                            "Empty facet label for the dimension {dim}"
                        )));
                    }
                    if label.contains(DRILLDOWN_SEPARATOR) {
                        return Err(PikeError::document(format!(
                            "Invalid character in the facet label {label:?}"
                        )));
                    }
                    if seen.insert((dim.clone(), label.clone())) {
                        facets.push(IndexableField::Term {
                            field: FACET_DRILLDOWN_FIELD.to_string(),
                            term: drilldown_term(&dim, &label),
                        });
                        facets.push(IndexableField::Facet { dim, label });
                    }
                }
                other => out.push(other),
            }
        }

        out.extend(facets);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(dim: &str, label: &str) -> IndexableField {
        IndexableField::FacetLabel {
            dim: dim.into(),
            label: label.into(),
        }
    }

    #[test]
    fn test_dedup_and_drilldown() {
        let fields = vec![
            label("color", "red"),
            IndexableField::Point {
                field: "year".into(),
                value: 1,
            },
            label("color", "red"),
            label("color", "blue"),
        ];

        let built = FacetsConfig::new().build(fields).unwrap();
        let facets: Vec<_> = built
            .iter()
            .filter_map(|f| match f {
                IndexableField::Facet { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(facets, vec!["red", "blue"]);
        assert!(built.contains(&IndexableField::Term {
            field: FACET_DRILLDOWN_FIELD.into(),
            term: drilldown_term("color", "blue"),
        }));
        assert!(matches!(built[0], IndexableField::Point { .. }));
    }

    #[test]
    fn test_empty_label_rejected() {
        assert!(FacetsConfig::new().build(vec![label("color", "")]).is_err());
    }
}
