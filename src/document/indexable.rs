//! The indexable representation produced by the document codec.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::document::field_value::FieldValue;

/// Field that carries the facet drill-down terms (`dim` + `\u{1f}` + `label`).
pub const FACET_DRILLDOWN_FIELD: &str = "$facets$";

/// A per-document column value used for sorting, faceting and aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocValue {
    Long(i64),
    Double(f64),
    Bytes(Vec<u8>),
}

impl DocValue {
    /// Default display conversion.
    pub fn to_field_value(&self) -> FieldValue {
        match self {
            DocValue::Long(v) => FieldValue::Integer(*v),
            DocValue::Double(v) => FieldValue::Float(*v),
            DocValue::Bytes(b) => FieldValue::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

/// A comparison key. Numeric keys compare as signed 64-bit integers, byte
/// keys lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SortValue {
    Long(i64),
    Bytes(Vec<u8>),
}

/// Map a double onto an i64 whose signed ordering matches the double's.
pub fn double_to_sortable_long(value: f64) -> i64 {
    let bits = value.to_bits() as i64;
    bits ^ ((bits >> 63) & 0x7fff_ffff_ffff_ffff)
}

pub fn sortable_long_to_double(value: i64) -> f64 {
    f64::from_bits((value ^ ((value >> 63) & 0x7fff_ffff_ffff_ffff)) as u64)
}

/// Big-endian encoding of a sortable long with the sign bit flipped, so byte
/// order equals numeric order. Used for exact numeric terms.
pub fn long_to_term(value: i64) -> Vec<u8> {
    ((value as u64) ^ (1 << 63)).to_be_bytes().to_vec()
}

/// Compare two optional keys, missing values last.
pub fn compare_missing_last(a: Option<&SortValue>, b: Option<&SortValue>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// One unit of indexed data for one field of one document.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexableField {
    /// Analyzed terms of a text value, in order. Contributes to the field length.
    Tokens { field: String, terms: Vec<String> },

    /// A single exact term.
    Term { field: String, term: Vec<u8> },

    /// A numeric point for range matching.
    Point { field: String, value: i64 },

    /// The column value of a single-valued field.
    DocValue { field: String, value: DocValue },

    /// A stored value returned on retrieval.
    Stored { field: String, value: FieldValue },

    /// A raw facet label, before the facet-config step.
    FacetLabel { dim: String, label: String },

    /// A facet label after the facet-config step.
    Facet { dim: String, label: String },
}

impl IndexableField {
    pub fn field_name(&self) -> &str {
        match self {
            IndexableField::Tokens { field, .. }
            | IndexableField::Term { field, .. }
            | IndexableField::Point { field, .. }
            | IndexableField::DocValue { field, .. }
            | IndexableField::Stored { field, .. } => field,
            IndexableField::FacetLabel { dim, .. } | IndexableField::Facet { dim, .. } => dim,
        }
    }

    pub fn is_doc_value(&self) -> bool {
        matches!(self, IndexableField::DocValue { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sortable_double_order() {
        let values = [-1e300, -2.5, -0.0, 0.0, 1.0, 3.25, f64::INFINITY];
        let keys: Vec<i64> = values.iter().map(|v| double_to_sortable_long(*v)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        for v in values {
            assert_eq!(sortable_long_to_double(double_to_sortable_long(v)), v);
        }
    }

    #[test]
    fn test_long_term_byte_order() {
        assert!(long_to_term(-5) < long_to_term(-1));
        assert!(long_to_term(-1) < long_to_term(0));
        assert!(long_to_term(0) < long_to_term(i64::MAX));
    }

    #[test]
    fn test_missing_sorts_last() {
        let a = SortValue::Long(1);
        assert_eq!(compare_missing_last(Some(&a), None), Ordering::Less);
        assert_eq!(compare_missing_last(None, None), Ordering::Equal);
    }
}
