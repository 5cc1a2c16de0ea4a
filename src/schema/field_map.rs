//! The compiled schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::analyzer::Analyzer;
use crate::analysis::catalog::AnalyzerCatalog;
use crate::document::document::ID_FIELD;
use crate::error::{PikeError, Result};
use crate::schema::declaration::{FieldDeclaration, FieldTemplate};
use crate::schema::field_type::FieldTypeInstance;

/// Analyzer used by text fields that do not name one.
pub const DEFAULT_ANALYZER: &str = "standard";

/// Concrete field name to [`FieldTypeInstance`], generic name to concrete
/// names, and the index and query analyzer maps.
///
/// A `FieldMap` is never mutated. A schema update compiles a new one.
#[derive(Clone, Default)]
pub struct FieldMap {
    declarations: Vec<FieldDeclaration>,
    catalog: AnalyzerCatalog,
    fields: AHashMap<String, Arc<FieldTypeInstance>>,
    generic_fields: BTreeMap<String, Vec<String>>,
    index_analyzers: AHashMap<String, Arc<dyn Analyzer>>,
    query_analyzers: AHashMap<String, Arc<dyn Analyzer>>,
}

impl FieldMap {
    /// A schema without fields. Only identity-keyed documents are accepted.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn compile(declarations: Vec<FieldDeclaration>, catalog: AnalyzerCatalog) -> Result<Self> {
        let mut analyzer_cache: AHashMap<String, Arc<dyn Analyzer>> = AHashMap::new();
        let mut resolve = |name: &str| -> Result<Arc<dyn Analyzer>> {
            if let Some(analyzer) = analyzer_cache.get(name) {
                return Ok(Arc::clone(analyzer));
            }
            let analyzer = catalog.resolve(name)?;
            analyzer_cache.insert(name.to_string(), Arc::clone(&analyzer));
            Ok(analyzer)
        };

        let mut fields = AHashMap::new();
        let mut generic_fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut index_analyzers = AHashMap::new();
        let mut query_analyzers = AHashMap::new();

        for declaration in &declarations {
            let name = declaration.name.as_str();
            if name.is_empty() || name.starts_with('$') {
                return Err(PikeError::schema(format!("Invalid field name: {name:?}")));
            }
            if fields.contains_key(name) {
                return Err(PikeError::schema(format!("Duplicate field name: {name}")));
            }

            let tokenized = declaration.template == FieldTemplate::Text
                || (declaration.template == FieldTemplate::Custom
                    && declaration.custom.as_ref().is_some_and(|c| c.tokenized));

            let index_analyzer = if tokenized {
                let analyzer_name = declaration.analyzer.as_deref().unwrap_or(DEFAULT_ANALYZER);
                let index_analyzer = resolve(analyzer_name)?;
                let query_analyzer = match declaration.query_analyzer.as_deref() {
                    Some(query_name) => resolve(query_name)?,
                    None => Arc::clone(&index_analyzer),
                };
                index_analyzers.insert(name.to_string(), Arc::clone(&index_analyzer));
                query_analyzers.insert(name.to_string(), query_analyzer);
                Some(index_analyzer)
            } else {
                None
            };

            let instance = FieldTypeInstance::build(declaration.clone(), index_analyzer)?;
            fields.insert(name.to_string(), Arc::new(instance));

            if let Some(generic) = &declaration.generic {
                generic_fields
                    .entry(generic.clone())
                    .or_default()
                    .push(name.to_string());
            }
        }

        log::debug!(
            "compiled schema: {} fields, {} generic groups",
            fields.len(),
            generic_fields.len()
        );

        Ok(FieldMap {
            declarations,
            catalog,
            fields,
            generic_fields,
            index_analyzers,
            query_analyzers,
        })
    }

    pub fn declarations(&self) -> &[FieldDeclaration] {
        &self.declarations
    }

    pub fn catalog(&self) -> &AnalyzerCatalog {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FieldTypeInstance>> {
        self.fields.get(name)
    }

    /// Look a field up for a query. Unknown names are query errors.
    pub fn require(&self, name: &str) -> Result<&Arc<FieldTypeInstance>> {
        self.fields
            .get(name)
            .ok_or_else(|| PikeError::query(format!("No field definition for the field: {name}")))
    }

    pub fn index_analyzer(&self, name: &str) -> Option<&Arc<dyn Analyzer>> {
        self.index_analyzers.get(name)
    }

    pub fn query_analyzer(&self, name: &str) -> Option<&Arc<dyn Analyzer>> {
        self.query_analyzers.get(name)
    }

    /// Concrete fields sharing a generic name, in declaration order.
    pub fn generic_fields(&self, generic: &str) -> Option<&[String]> {
        self.generic_fields.get(generic).map(Vec::as_slice)
    }

    /// Resolve the concrete fields a query addresses. An explicit field name
    /// wins and must exist; otherwise the generic name expands to its group.
    /// The identity field is always addressable.
    pub fn resolve_concrete_fields(
        &self,
        generic: Option<&str>,
        explicit: Option<&str>,
    ) -> Result<Vec<String>> {
        match (explicit, generic) {
            (Some(ID_FIELD), _) => Ok(vec![ID_FIELD.to_string()]),
            (Some(name), _) => self.require(name).map(|_| vec![name.to_string()]),
            (None, Some(generic)) => self
                .generic_fields
                .get(generic)
                .cloned()
                .ok_or_else(|| PikeError::query(format!("No field group named: {generic}"))),
            (None, None) => Err(PikeError::query("Neither a field nor a generic field is given")),
        }
    }

    /// Expand a boost table whose keys are concrete or generic names. A
    /// generic name lends its boost to each member; a boost given for the
    /// concrete name itself takes precedence. Output is sorted by field name.
    pub fn resolve_boosted_fields(&self, boosts: &BTreeMap<String, f32>) -> Result<Vec<(String, f32)>> {
        let mut resolved: BTreeMap<String, f32> = BTreeMap::new();

        for (name, boost) in boosts {
            let group = self.generic_fields.get(name);
            if group.is_none() && !self.fields.contains_key(name) {
                return Err(PikeError::query(format!(
                    "No field definition for the field: {name}"
                )));
            }
            for concrete in group.into_iter().flatten() {
                resolved.entry(concrete.clone()).or_insert(*boost);
            }
        }
        for (name, boost) in boosts {
            if self.fields.contains_key(name) {
                resolved.insert(name.clone(), *boost);
            }
        }

        Ok(resolved.into_iter().collect())
    }
}

impl std::fmt::Debug for FieldMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldMap")
            .field("declarations", &self.declarations)
            .field("generic_fields", &self.generic_fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::analyze_terms;

    fn declarations() -> Vec<FieldDeclaration> {
        vec![
            FieldDeclaration::new("title", FieldTemplate::Text)
                .generic("title")
                .analyzer("standard")
                .query_analyzer("keyword"),
            FieldDeclaration::new("title_raw", FieldTemplate::String).generic("title"),
            FieldDeclaration::new("body", FieldTemplate::Text),
            FieldDeclaration::new("price", FieldTemplate::LongValue),
        ]
    }

    #[test]
    fn test_analyzer_maps() {
        let map = FieldMap::compile(declarations(), AnalyzerCatalog::new()).unwrap();

        assert_eq!(map.len(), 4);
        assert_eq!(map.index_analyzer("title").unwrap().name(), "standard");
        assert_eq!(map.query_analyzer("title").unwrap().name(), "keyword");
        // query analyzer defaults to the index analyzer
        assert_eq!(map.query_analyzer("body").unwrap().name(), "standard");
        assert!(map.index_analyzer("price").is_none());

        let terms = analyze_terms(map.query_analyzer("title").unwrap().as_ref(), "Red Wine").unwrap();
        assert_eq!(terms, vec!["Red Wine"]);
    }

    #[test]
    fn test_compile_errors() {
        let mut dup = declarations();
        dup.push(FieldDeclaration::new("price", FieldTemplate::LongPoint));
        assert!(matches!(
            FieldMap::compile(dup, AnalyzerCatalog::new()),
            Err(PikeError::Schema(_))
        ));

        let unknown = vec![FieldDeclaration::new("t", FieldTemplate::Text).analyzer("klingon")];
        assert!(matches!(
            FieldMap::compile(unknown, AnalyzerCatalog::new()),
            Err(PikeError::Schema(_))
        ));

        let reserved = vec![FieldDeclaration::new("$id$", FieldTemplate::String)];
        assert!(FieldMap::compile(reserved, AnalyzerCatalog::new()).is_err());
    }

    #[test]
    fn test_resolve_concrete_fields() {
        let map = FieldMap::compile(declarations(), AnalyzerCatalog::new()).unwrap();

        assert_eq!(
            map.resolve_concrete_fields(Some("title"), None).unwrap(),
            vec!["title", "title_raw"]
        );
        assert_eq!(
            map.resolve_concrete_fields(Some("title"), Some("body")).unwrap(),
            vec!["body"]
        );
        assert_eq!(
            map.resolve_concrete_fields(None, Some("$id$")).unwrap(),
            vec!["$id$"]
        );
        assert!(matches!(
            map.resolve_concrete_fields(None, Some("nope")),
            Err(PikeError::Query(_))
        ));
        assert!(map.resolve_concrete_fields(Some("nope"), None).is_err());
        assert!(map.resolve_concrete_fields(None, None).is_err());
    }

    #[test]
    fn test_generic_boost_expands() {
        let map = FieldMap::compile(declarations(), AnalyzerCatalog::new()).unwrap();
        let boosts = BTreeMap::from([("title".to_string(), 3.0)]);

        assert_eq!(
            map.resolve_boosted_fields(&boosts).unwrap(),
            vec![("title".to_string(), 3.0), ("title_raw".to_string(), 3.0)]
        );
    }

    #[test]
    fn test_resolve_boosted_fields() {
        let map = FieldMap::compile(declarations(), AnalyzerCatalog::new()).unwrap();
        let boosts = BTreeMap::from([
            ("title".to_string(), 2.0),
            ("title_raw".to_string(), 5.0),
            ("body".to_string(), 1.0),
        ]);

        // "title" is also a group name; title_raw keeps its own boost
        let resolved = map.resolve_boosted_fields(&boosts).unwrap();
        assert_eq!(
            resolved,
            vec![
                ("body".to_string(), 1.0),
                ("title".to_string(), 2.0),
                ("title_raw".to_string(), 5.0),
            ]
        );

        let unknown = BTreeMap::from([("nope".to_string(), 1.0)]);
        assert!(map.resolve_boosted_fields(&unknown).is_err());
    }
}
