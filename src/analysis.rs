//! Text analysis for pike.
//!
//! Analysis turns a field value into the terms that are indexed or searched:
//! a [`tokenizer::Tokenizer`] splits the text, then a chain of
//! [`token_filter::Filter`]s rewrites the token stream. Named analyzers are
//! resolved through the [`catalog::AnalyzerCatalog`].

pub mod analyzer;
pub mod catalog;
pub mod token;
pub mod token_filter;
pub mod tokenizer;
