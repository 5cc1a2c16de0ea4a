//! Analyzers: one tokenizer followed by a chain of filters.
//!
//! ```text
//! text -> Tokenizer -> Filter 1 -> ... -> Filter N -> terms
//! ```
//!
//! Every analyzer, builtin or custom, is a [`PipelineAnalyzer`] carrying the
//! name it was resolved under.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use pike::analysis::analyzer::{Analyzer, PipelineAnalyzer, analyze_terms};
//! use pike::analysis::token_filter::lowercase::LowercaseFilter;
//! use pike::analysis::token_filter::stop::StopFilter;
//! use pike::analysis::tokenizer::regex::RegexTokenizer;
//!
//! let analyzer = PipelineAnalyzer::new("english", Arc::new(RegexTokenizer::new().unwrap()))
//!     .add_filter(Arc::new(LowercaseFilter::new()))
//!     .add_filter(Arc::new(StopFilter::new()));
//!
//! assert_eq!(analyzer.name(), "english");
//! assert_eq!(analyze_terms(&analyzer, "The Red WINE").unwrap(), vec!["red", "wine"]);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

pub trait Analyzer: Send + Sync + fmt::Debug {
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Name the analyzer was registered or defined under.
    fn name(&self) -> &str;
}

/// Analyze `text` and keep the terms of the tokens that were not stopped.
pub fn analyze_terms(analyzer: &dyn Analyzer, text: &str) -> Result<Vec<String>> {
    Ok(analyzer
        .analyze(text)?
        .filter(|token| !token.is_stopped())
        .map(|token| token.text)
        .collect())
}

#[derive(Clone)]
pub struct PipelineAnalyzer {
    name: String,
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn Filter>>,
}

impl PipelineAnalyzer {
    pub fn new<S: Into<String>>(name: S, tokenizer: Arc<dyn Tokenizer>) -> Self {
        PipelineAnalyzer {
            name: name.into(),
            tokenizer,
            filters: Vec::new(),
        }
    }

    /// Append a filter; filters run in the order they were added.
    pub fn add_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }
}

impl Analyzer for PipelineAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.filters
            .iter()
            .try_fold(self.tokenizer.tokenize(text)?, |tokens, filter| filter.filter(tokens))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for PipelineAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineAnalyzer")
            .field("name", &self.name)
            .field("tokenizer", &self.tokenizer.name())
            .field(
                "filters",
                &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
