//! Named analyzer resolution.
//!
//! A name is looked up first among the custom [`AnalyzerDefinition`]s of the
//! catalog, then in the builtin registry. Builtins are registered under
//! qualified names (`pike.analysis.standard`), and a bare name is tried under
//! each of [`NAMESPACE_PREFIXES`] in order, so `standard` and
//! `pike.analysis.standard` resolve to the same analyzer.
//!
//! # Examples
//!
//! ```
//! use pike::analysis::catalog::{AnalyzerCatalog, AnalyzerDefinition, FilterDefinition, TokenizerDefinition};
//!
//! let mut catalog = AnalyzerCatalog::new();
//! catalog.insert(
//!     "lower_ws",
//!     AnalyzerDefinition {
//!         tokenizer: TokenizerDefinition::Whitespace,
//!         filters: vec![FilterDefinition::Lowercase],
//!     },
//! );
//!
//! assert!(catalog.resolve("lower_ws").is_ok());
//! assert!(catalog.resolve("standard").is_ok());
//! assert!(catalog.resolve("pike.analysis.keyword").is_ok());
//! assert!(catalog.resolve("nope").is_err());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::{Analyzer, PipelineAnalyzer};
use crate::analysis::token_filter::Filter;
use crate::analysis::token_filter::lowercase::LowercaseFilter;
use crate::analysis::token_filter::stop::StopFilter;
use crate::analysis::tokenizer::regex::RegexTokenizer;
use crate::analysis::tokenizer::unicode_word::UnicodeWordTokenizer;
use crate::analysis::tokenizer::whitespace::WhitespaceTokenizer;
use crate::analysis::tokenizer::{KeywordTokenizer, Tokenizer};
use crate::error::{PikeError, Result};

/// Prefixes tried, in order, when looking up a builtin analyzer.
pub const NAMESPACE_PREFIXES: &[&str] = &["", "pike.analysis."];

/// Builtin analyzers: qualified name, short name, definition.
const BUILTIN_ANALYZERS: &[(&str, &str, fn() -> AnalyzerDefinition)] = &[
    ("pike.analysis.standard", "standard", standard),
    ("pike.analysis.keyword", "keyword", keyword),
    ("pike.analysis.simple", "simple", simple),
    ("pike.analysis.whitespace", "whitespace", whitespace),
    ("pike.analysis.unicode", "unicode", unicode),
];

/// Regex words, lowercased, English stop words.
fn standard() -> AnalyzerDefinition {
    AnalyzerDefinition {
        tokenizer: TokenizerDefinition::Regex { pattern: None },
        filters: vec![FilterDefinition::Lowercase, FilterDefinition::Stop { words: None }],
    }
}

fn keyword() -> AnalyzerDefinition {
    AnalyzerDefinition {
        tokenizer: TokenizerDefinition::Keyword,
        filters: Vec::new(),
    }
}

fn simple() -> AnalyzerDefinition {
    AnalyzerDefinition {
        tokenizer: TokenizerDefinition::Regex { pattern: None },
        filters: Vec::new(),
    }
}

fn whitespace() -> AnalyzerDefinition {
    AnalyzerDefinition {
        tokenizer: TokenizerDefinition::Whitespace,
        filters: Vec::new(),
    }
}

fn unicode() -> AnalyzerDefinition {
    AnalyzerDefinition {
        tokenizer: TokenizerDefinition::UnicodeWord,
        filters: vec![FilterDefinition::Lowercase],
    }
}

/// Tokenizer of a custom analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenizerDefinition {
    Regex {
        #[serde(default)]
        pattern: Option<String>,
    },
    Whitespace,
    UnicodeWord,
    Keyword,
}

/// Token filter of a custom analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterDefinition {
    Lowercase,
    Stop {
        #[serde(default)]
        words: Option<Vec<String>>,
    },
}

/// A custom analyzer: one tokenizer followed by filters, applied in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    pub tokenizer: TokenizerDefinition,

    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
}

impl AnalyzerDefinition {
    fn build(&self, name: &str) -> Result<Arc<dyn Analyzer>> {
        let tokenizer: Arc<dyn Tokenizer> = match &self.tokenizer {
            TokenizerDefinition::Regex { pattern: Some(p) } => {
                Arc::new(RegexTokenizer::with_pattern(p)?)
            }
            TokenizerDefinition::Regex { pattern: None } => Arc::new(RegexTokenizer::new()?),
            TokenizerDefinition::Whitespace => Arc::new(WhitespaceTokenizer::new()),
            TokenizerDefinition::UnicodeWord => Arc::new(UnicodeWordTokenizer::new()),
            TokenizerDefinition::Keyword => Arc::new(KeywordTokenizer::new()),
        };

        let mut analyzer = PipelineAnalyzer::new(name, tokenizer);
        for filter in &self.filters {
            let filter: Arc<dyn Filter> = match filter {
                FilterDefinition::Lowercase => Arc::new(LowercaseFilter::new()),
                FilterDefinition::Stop { words: Some(words) } => {
                    Arc::new(StopFilter::from_words(words.iter().cloned()))
                }
                FilterDefinition::Stop { words: None } => Arc::new(StopFilter::new()),
            };
            analyzer = analyzer.add_filter(filter);
        }
        Ok(Arc::new(analyzer))
    }
}

/// Custom analyzer definitions plus the builtin registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalyzerCatalog {
    definitions: BTreeMap<String, AnalyzerDefinition>,
}

impl AnalyzerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: BTreeMap<String, AnalyzerDefinition>) -> Self {
        AnalyzerCatalog { definitions }
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, definition: AnalyzerDefinition) {
        self.definitions.insert(name.into(), definition);
    }

    pub fn definitions(&self) -> &BTreeMap<String, AnalyzerDefinition> {
        &self.definitions
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Resolve an analyzer by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Analyzer>> {
        if let Some(definition) = self.definitions.get(name) {
            return definition
                .build(name)
                .map_err(|e| PikeError::schema(format!("Invalid analyzer {name}: {e}")));
        }

        for prefix in NAMESPACE_PREFIXES {
            let qualified = format!("{prefix}{name}");
            if let Some((_, short, definition)) =
                BUILTIN_ANALYZERS.iter().find(|(n, _, _)| *n == qualified)
            {
                return definition().build(short);
            }
        }

        Err(PikeError::schema(format!("Unknown analyzer: {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::analyze_terms;

    #[test]
    fn test_custom_definition_shadows_builtin() {
        let mut catalog = AnalyzerCatalog::new();
        catalog.insert(
            "standard",
            AnalyzerDefinition {
                tokenizer: TokenizerDefinition::Keyword,
                filters: vec![],
            },
        );

        let analyzer = catalog.resolve("standard").unwrap();
        assert_eq!(analyze_terms(analyzer.as_ref(), "A B").unwrap(), vec!["A B"]);

        // the qualified name still reaches the builtin
        let builtin = catalog.resolve("pike.analysis.standard").unwrap();
        assert_eq!(builtin.name(), "standard");
    }

    #[test]
    fn test_custom_stop_words() {
        let mut catalog = AnalyzerCatalog::new();
        catalog.insert(
            "no_foo",
            AnalyzerDefinition {
                tokenizer: TokenizerDefinition::Regex { pattern: None },
                filters: vec![
                    FilterDefinition::Lowercase,
                    FilterDefinition::Stop {
                        words: Some(vec!["foo".to_string()]),
                    },
                ],
            },
        );

        let analyzer = catalog.resolve("no_foo").unwrap();
        assert_eq!(
            analyze_terms(analyzer.as_ref(), "Foo bar The").unwrap(),
            vec!["bar", "the"]
        );
    }

    #[test]
    fn test_invalid_definition_is_schema_error() {
        let mut catalog = AnalyzerCatalog::new();
        catalog.insert(
            "broken",
            AnalyzerDefinition {
                tokenizer: TokenizerDefinition::Regex {
                    pattern: Some("(".to_string()),
                },
                filters: vec![],
            },
        );

        assert!(matches!(catalog.resolve("broken"), Err(PikeError::Schema(_))));
        assert!(matches!(catalog.resolve("missing"), Err(PikeError::Schema(_))));
    }

    #[test]
    fn test_catalog_json_shape() {
        let json = r#"{"ws": {"tokenizer": {"type": "whitespace"}, "filters": [{"type": "lowercase"}]}}"#;
        let catalog: AnalyzerCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.definitions().len(), 1);
        assert!(catalog.resolve("ws").is_ok());
    }
}
