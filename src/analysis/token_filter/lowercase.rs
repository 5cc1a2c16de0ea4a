//! Case folding, so `Rust`, `RUST` and `rust` index the same term.

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::{Filter, map_indexed};
use crate::error::Result;

/// Lowercases indexed tokens with full Unicode case mapping. Offsets keep
/// pointing at the original text even when the lowercase form has another
/// byte length.
#[derive(Clone, Copy, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl Filter for LowercaseFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        Ok(map_indexed(tokens, str::to_lowercase))
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;

    fn lowercase(tokens: Vec<Token>) -> Vec<Token> {
        LowercaseFilter::new()
            .filter(Box::new(tokens.into_iter()))
            .unwrap()
            .collect()
    }

    #[test]
    fn test_folds_unicode_and_keeps_offsets() {
        let tokens = lowercase(vec![
            Token::with_offsets("ÉCOLE", 0, 0, 6),
            Token::with_offsets("Straße", 1, 7, 14),
        ]);
        assert_eq!(tokens[0], Token::with_offsets("école", 0, 0, 6));
        assert_eq!(tokens[1].text, "straße");
        assert_eq!(tokens[1].end_offset, 14);
    }

    #[test]
    fn test_stopped_token_keeps_case() {
        let tokens = lowercase(vec![Token::new("The", 0).stop(), Token::new("Sea", 1)]);
        assert_eq!(tokens[0].text, "The");
        assert_eq!(tokens[1].text, "sea");
    }
}
