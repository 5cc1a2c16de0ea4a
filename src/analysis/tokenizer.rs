//! Tokenizers split raw text into positioned tokens.
//!
//! - [`regex::RegexTokenizer`] - every match of a pattern, `\w+` by default
//! - [`whitespace::WhitespaceTokenizer`] - runs of non-whitespace
//! - [`unicode_word::UnicodeWordTokenizer`] - UAX #29 words
//! - [`KeywordTokenizer`] - the whole value as one token

use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<TokenStream>;

    fn name(&self) -> &'static str;
}

pub mod regex;
pub mod unicode_word;
pub mod whitespace;

/// Emits the whole value as a single token; an empty value yields none.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordTokenizer;

impl KeywordTokenizer {
    pub fn new() -> Self {
        KeywordTokenizer
    }
}

impl Tokenizer for KeywordTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        let token = (!text.is_empty()).then(|| Token::with_offsets(text, 0, 0, text.len()));
        Ok(Box::new(token.into_iter()))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_tokenizer() {
        let tokens: Vec<Token> = KeywordTokenizer::new().tokenize("Red Wine").unwrap().collect();
        assert_eq!(tokens, vec![Token::with_offsets("Red Wine", 0, 0, 8)]);
        assert_eq!(KeywordTokenizer::new().tokenize("").unwrap().count(), 0);
    }
}
