//! Compiled per-field strategies.
//!
//! A [`FieldTypeInstance`] is built once per concrete field from its
//! declaration. It carries four independent capabilities as closures:
//!
//! - an encoder, value to indexable fields (stored or unstored variant)
//! - an optional sort-key provider, column value to comparison key
//! - an optional exact-term provider, query value to indexed term bytes
//! - a value converter, column value to display value

use std::sync::Arc;

use crate::analysis::analyzer::{Analyzer, analyze_terms};
use crate::document::field_value::FieldValue;
use crate::document::indexable::{
    DocValue, IndexableField, SortValue, double_to_sortable_long, long_to_term,
};
use crate::error::{PikeError, Result};
use crate::schema::declaration::{FieldDeclaration, FieldTemplate, NumericKind, ValueKind};

pub type Encoder = Arc<dyn Fn(&FieldValue, &mut Vec<IndexableField>) -> Result<()> + Send + Sync>;
pub type SortKeyProvider = Arc<dyn Fn(&DocValue) -> SortValue + Send + Sync>;
pub type TermProvider = Arc<dyn Fn(&FieldValue) -> Result<Vec<u8>> + Send + Sync>;
pub type Converter = Arc<dyn Fn(&DocValue) -> FieldValue + Send + Sync>;

/// What a template indexes, independent of the stored flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Recipe {
    tokenized: bool,
    exact: bool,
    point: Option<NumericKind>,
    doc_values: Option<ValueKind>,
    facet_capable: bool,
    always_stored: bool,
    always_facet: bool,
}

impl Recipe {
    fn for_declaration(declaration: &FieldDeclaration) -> Result<Self> {
        let recipe = match declaration.template {
            FieldTemplate::Text => Recipe {
                tokenized: true,
                ..Recipe::default()
            },
            FieldTemplate::String => Recipe {
                exact: true,
                facet_capable: true,
                ..Recipe::default()
            },
            FieldTemplate::SortedString => Recipe {
                exact: true,
                doc_values: Some(ValueKind::Bytes),
                facet_capable: true,
                ..Recipe::default()
            },
            FieldTemplate::LongPoint => Recipe {
                point: Some(NumericKind::Long),
                ..Recipe::default()
            },
            FieldTemplate::DoublePoint => Recipe {
                point: Some(NumericKind::Double),
                ..Recipe::default()
            },
            FieldTemplate::LongValue => Recipe {
                doc_values: Some(ValueKind::Long),
                ..Recipe::default()
            },
            FieldTemplate::DoubleValue => Recipe {
                doc_values: Some(ValueKind::Double),
                ..Recipe::default()
            },
            FieldTemplate::Facet => Recipe {
                facet_capable: true,
                always_facet: true,
                ..Recipe::default()
            },
            FieldTemplate::Stored => Recipe {
                always_stored: true,
                ..Recipe::default()
            },
            FieldTemplate::Custom => {
                let options = declaration.custom.as_ref().ok_or_else(|| {
                    PikeError::schema(format!(
                        "Unsupported template for {}: custom fields need options",
                        declaration.name
                    ))
                })?;
                if options.indexed && options.point.is_some() {
                    return Err(PikeError::schema(format!(
                        "Unsupported template for {}: a field is either an exact term or a point",
                        declaration.name
                    )));
                }
                let recipe = Recipe {
                    tokenized: options.tokenized,
                    exact: options.indexed,
                    point: options.point,
                    doc_values: options.doc_values,
                    facet_capable: options.indexed || options.doc_values == Some(ValueKind::Bytes),
                    ..Recipe::default()
                };
                if !recipe.tokenized
                    && !recipe.exact
                    && recipe.point.is_none()
                    && recipe.doc_values.is_none()
                    && !declaration.stored
                    && !declaration.facet
                {
                    return Err(PikeError::schema(format!(
                        "Unsupported template for {}: the custom field neither indexes nor stores",
                        declaration.name
                    )));
                }
                recipe
            }
        };

        if declaration.facet && !recipe.facet_capable {
            return Err(PikeError::schema(format!(
                "Unsupported template for {}: {} fields cannot be facets",
                declaration.name,
                declaration.template.name()
            )));
        }
        if (declaration.analyzer.is_some() || declaration.query_analyzer.is_some())
            && !recipe.tokenized
        {
            return Err(PikeError::schema(format!(
                "Unsupported template for {}: {} fields are not analyzed",
                declaration.name,
                declaration.template.name()
            )));
        }
        Ok(recipe)
    }
}

fn numeric_key(kind: NumericKind, field: &str, value: &FieldValue) -> Result<i64> {
    match kind {
        NumericKind::Long => value.as_i64().ok_or_else(|| {
            PikeError::document(format!("Field {field}: {value:?} is not a long"))
        }),
        NumericKind::Double => value.as_f64().map(double_to_sortable_long).ok_or_else(|| {
            PikeError::document(format!("Field {field}: {value:?} is not a double"))
        }),
    }
}

fn doc_value(kind: ValueKind, field: &str, value: &FieldValue) -> Result<DocValue> {
    match kind {
        ValueKind::Long => value.as_i64().map(DocValue::Long).ok_or_else(|| {
            PikeError::document(format!("Field {field}: {value:?} is not a long"))
        }),
        ValueKind::Double => value.as_f64().map(DocValue::Double).ok_or_else(|| {
            PikeError::document(format!("Field {field}: {value:?} is not a double"))
        }),
        ValueKind::Bytes => term_string(field, value).map(|s| DocValue::Bytes(s.into_bytes())),
    }
}

fn term_string(field: &str, value: &FieldValue) -> Result<String> {
    value.as_term_string().ok_or_else(|| {
        PikeError::document(format!("Field {field}: {value:?} is not a scalar value"))
    })
}

/// The stored form of a value: numbers coerced to the field's numeric kind.
fn stored_value(recipe: &Recipe, value: &FieldValue) -> FieldValue {
    let numeric = match (recipe.point, recipe.doc_values) {
        (Some(NumericKind::Long), _) | (_, Some(ValueKind::Long)) => Some(NumericKind::Long),
        (Some(NumericKind::Double), _) | (_, Some(ValueKind::Double)) => Some(NumericKind::Double),
        _ => None,
    };
    match numeric {
        Some(NumericKind::Long) => value.as_i64().map(FieldValue::Integer),
        Some(NumericKind::Double) => value.as_f64().map(FieldValue::Float),
        None => None,
    }
    .unwrap_or_else(|| value.clone())
}

/// The compiled strategy for one concrete field.
#[derive(Clone)]
pub struct FieldTypeInstance {
    declaration: FieldDeclaration,
    recipe: Recipe,
    encoder: Encoder,
    sort_key: Option<SortKeyProvider>,
    term: Option<TermProvider>,
    converter: Converter,
}

impl FieldTypeInstance {
    /// Build the instance for a declaration. `analyzer` is the resolved index
    /// analyzer of a tokenized field.
    pub fn build(
        declaration: FieldDeclaration,
        analyzer: Option<Arc<dyn Analyzer>>,
    ) -> Result<Self> {
        let recipe = Recipe::for_declaration(&declaration)?;
        if recipe.tokenized && analyzer.is_none() {
            return Err(PikeError::schema(format!(
                "No analyzer bound to the text field {}",
                declaration.name
            )));
        }

        let name = declaration.name.clone();
        let stored = declaration.stored || recipe.always_stored;
        let facet = declaration.facet || recipe.always_facet;

        let encoder: Encoder = {
            let name = name.clone();
            Arc::new(move |value: &FieldValue, out: &mut Vec<IndexableField>| -> Result<()> {
                if recipe.tokenized {
                    if let Some(analyzer) = &analyzer {
                        let text = term_string(&name, value)?;
                        let terms = analyze_terms(analyzer.as_ref(), &text)?;
                        out.push(IndexableField::Tokens {
                            field: name.clone(),
                            terms,
                        });
                    }
                }
                if recipe.exact {
                    out.push(IndexableField::Term {
                        field: name.clone(),
                        term: term_string(&name, value)?.into_bytes(),
                    });
                }
                if let Some(kind) = recipe.point {
                    let key = numeric_key(kind, &name, value)?;
                    out.push(IndexableField::Point {
                        field: name.clone(),
                        value: key,
                    });
                    out.push(IndexableField::Term {
                        field: name.clone(),
                        term: long_to_term(key),
                    });
                }
                if let Some(kind) = recipe.doc_values {
                    out.push(IndexableField::DocValue {
                        field: name.clone(),
                        value: doc_value(kind, &name, value)?,
                    });
                }
                if facet {
                    out.push(IndexableField::FacetLabel {
                        dim: name.clone(),
                        label: term_string(&name, value)?,
                    });
                }
                if stored {
                    out.push(IndexableField::Stored {
                        field: name.clone(),
                        value: stored_value(&recipe, value),
                    });
                }
                Ok(())
            })
        };

        let sort_key: Option<SortKeyProvider> = recipe.doc_values.map(|_| {
            Arc::new(|value: &DocValue| match value {
                DocValue::Long(v) => SortValue::Long(*v),
                DocValue::Double(v) => SortValue::Long(double_to_sortable_long(*v)),
                DocValue::Bytes(b) => SortValue::Bytes(b.clone()),
            }) as SortKeyProvider
        });

        let term: Option<TermProvider> = if let Some(kind) = recipe.point {
            let name = name.clone();
            Some(Arc::new(move |value: &FieldValue| {
                numeric_key(kind, &name, value)
                    .map(long_to_term)
                    .map_err(|e| PikeError::query(e.to_string()))
            }))
        } else if recipe.exact {
            let name = name.clone();
            Some(Arc::new(move |value: &FieldValue| {
                term_string(&name, value)
                    .map(String::into_bytes)
                    .map_err(|e| PikeError::query(e.to_string()))
            }))
        } else {
            None
        };

        let converter: Converter = match recipe.doc_values {
            Some(ValueKind::Bytes) => Arc::new(|value: &DocValue| match value {
                DocValue::Bytes(b) => FieldValue::Text(String::from_utf8_lossy(b).into_owned()),
                other => other.to_field_value(),
            }),
            _ => Arc::new(|value: &DocValue| value.to_field_value()),
        };

        Ok(FieldTypeInstance {
            declaration,
            recipe,
            encoder,
            sort_key,
            term,
            converter,
        })
    }

    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    pub fn declaration(&self) -> &FieldDeclaration {
        &self.declaration
    }

    /// Encode one scalar value.
    pub fn encode(&self, value: &FieldValue, out: &mut Vec<IndexableField>) -> Result<()> {
        (self.encoder)(value, out)
    }

    /// Comparison key of a column value, when the field is sortable.
    pub fn sort_key(&self, value: &DocValue) -> Option<SortValue> {
        self.sort_key.as_ref().map(|provider| provider(value))
    }

    /// Indexed term bytes for an exact match on `value`, when supported.
    pub fn term(&self, value: &FieldValue) -> Option<Result<Vec<u8>>> {
        self.term.as_ref().map(|provider| provider(value))
    }

    /// Display value of a column value.
    pub fn convert(&self, value: &DocValue) -> FieldValue {
        (self.converter)(value)
    }

    pub fn is_sortable(&self) -> bool {
        self.sort_key.is_some()
    }

    pub fn has_terms(&self) -> bool {
        self.term.is_some()
    }

    pub fn is_tokenized(&self) -> bool {
        self.recipe.tokenized
    }

    pub fn point_kind(&self) -> Option<NumericKind> {
        self.recipe.point
    }

    pub fn doc_value_kind(&self) -> Option<ValueKind> {
        self.recipe.doc_values
    }

    pub fn is_facet(&self) -> bool {
        self.declaration.facet || self.recipe.always_facet
    }

    /// Numeric point key of a query value.
    pub fn point_key(&self, value: &FieldValue) -> Result<i64> {
        let kind = self.recipe.point.ok_or_else(|| {
            PikeError::query(format!("The field {} is not a numeric point", self.name()))
        })?;
        numeric_key(kind, self.name(), value).map_err(|e| PikeError::query(e.to_string()))
    }
}

impl std::fmt::Debug for FieldTypeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldTypeInstance")
            .field("declaration", &self.declaration)
            .field("sortable", &self.is_sortable())
            .field("terms", &self.has_terms())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::catalog::AnalyzerCatalog;
    use crate::schema::declaration::CustomOptions;

    fn encode(instance: &FieldTypeInstance, value: FieldValue) -> Vec<IndexableField> {
        let mut out = Vec::new();
        instance.encode(&value, &mut out).unwrap();
        out
    }

    #[test]
    fn test_text_encoding() {
        let analyzer = AnalyzerCatalog::new().resolve("standard").unwrap();
        let instance = FieldTypeInstance::build(
            FieldDeclaration::new("title", FieldTemplate::Text).stored(true),
            Some(analyzer),
        )
        .unwrap();

        let fields = encode(&instance, "The Red Wine".into());
        assert_eq!(
            fields,
            vec![
                IndexableField::Tokens {
                    field: "title".into(),
                    terms: vec!["red".into(), "wine".into()]
                },
                IndexableField::Stored {
                    field: "title".into(),
                    value: "The Red Wine".into()
                },
            ]
        );
        assert!(!instance.has_terms());
        assert!(!instance.is_sortable());
    }

    #[test]
    fn test_double_value_sort_key_and_display() {
        let instance =
            FieldTypeInstance::build(FieldDeclaration::new("price", FieldTemplate::DoubleValue), None)
                .unwrap();

        let fields = encode(&instance, FieldValue::Integer(3));
        assert_eq!(
            fields,
            vec![IndexableField::DocValue {
                field: "price".into(),
                value: DocValue::Double(3.0)
            }]
        );

        let low = instance.sort_key(&DocValue::Double(-1.5)).unwrap();
        let high = instance.sort_key(&DocValue::Double(2.0)).unwrap();
        assert!(low < high);
        assert_eq!(instance.convert(&DocValue::Double(2.0)), FieldValue::Float(2.0));
    }

    #[test]
    fn test_point_terms_match_encoding() {
        let instance =
            FieldTypeInstance::build(FieldDeclaration::new("year", FieldTemplate::LongPoint), None)
                .unwrap();

        let fields = encode(&instance, FieldValue::Text("2020".into()));
        let term = instance.term(&FieldValue::Integer(2020)).unwrap().unwrap();
        assert!(fields.contains(&IndexableField::Term {
            field: "year".into(),
            term
        }));
        assert!(fields.contains(&IndexableField::Point {
            field: "year".into(),
            value: 2020
        }));

        let mut out = Vec::new();
        assert!(matches!(
            instance.encode(&FieldValue::Text("soon".into()), &mut out),
            Err(PikeError::Document(_))
        ));
    }

    #[test]
    fn test_facet_string() {
        let instance = FieldTypeInstance::build(
            FieldDeclaration::new("category", FieldTemplate::SortedString).facet(true),
            None,
        )
        .unwrap();

        let fields = encode(&instance, "wine".into());
        assert!(fields.contains(&IndexableField::FacetLabel {
            dim: "category".into(),
            label: "wine".into()
        }));
        assert_eq!(
            instance.sort_key(&DocValue::Bytes(b"wine".to_vec())),
            Some(SortValue::Bytes(b"wine".to_vec()))
        );
    }

    #[test]
    fn test_unsupported_combinations() {
        let facet_on_long = FieldDeclaration::new("n", FieldTemplate::LongValue).facet(true);
        assert!(matches!(
            FieldTypeInstance::build(facet_on_long, None),
            Err(PikeError::Schema(_))
        ));

        let empty_custom = FieldDeclaration::new("c", FieldTemplate::Custom);
        assert!(FieldTypeInstance::build(empty_custom, None).is_err());

        let useless = FieldDeclaration::new("c", FieldTemplate::Custom).custom(CustomOptions::default());
        assert!(FieldTypeInstance::build(useless, None).is_err());

        let analyzed_string = FieldDeclaration::new("s", FieldTemplate::String).analyzer("standard");
        assert!(FieldTypeInstance::build(analyzed_string, None).is_err());
    }

    #[test]
    fn test_custom_long_column_with_point() {
        let instance = FieldTypeInstance::build(
            FieldDeclaration::new("rank", FieldTemplate::Custom).custom(CustomOptions {
                point: Some(NumericKind::Long),
                doc_values: Some(ValueKind::Long),
                ..CustomOptions::default()
            }),
            None,
        )
        .unwrap();

        assert!(instance.is_sortable());
        assert_eq!(instance.point_kind(), Some(NumericKind::Long));
        assert_eq!(encode(&instance, FieldValue::Integer(5)).len(), 3);
    }
}
