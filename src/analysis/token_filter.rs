//! Token filters: the steps an analyzer runs after its tokenizer.
//!
//! Custom analyzers list their filters by type (`{"type": "lowercase"}`,
//! `{"type": "stop", "words": [...]}`) and the catalog builds one [`Filter`]
//! per entry. Filters run in list order, so a stop filter placed before the
//! lowercase filter only sees the original casing:
//!
//! ```
//! use pike::analysis::token::Token;
//! use pike::analysis::token_filter::Filter;
//! use pike::analysis::token_filter::lowercase::LowercaseFilter;
//! use pike::analysis::token_filter::stop::StopFilter;
//!
//! let tokens = vec![Token::new("The", 0), Token::new("Harbour", 1)];
//! let stopped = StopFilter::new().filter(Box::new(tokens.into_iter())).unwrap();
//! let lowered: Vec<Token> = LowercaseFilter::new().filter(stopped).unwrap().collect();
//!
//! assert_eq!(lowered[0].text, "the");
//! assert!(!lowered[0].is_stopped());
//! assert_eq!(lowered[1].position, 1);
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// One step of an analyzer after tokenization.
///
/// A filter rewrites or marks tokens but never removes one, so every token
/// keeps the position the tokenizer gave it.
pub trait Filter: Send + Sync {
    /// Wrap `tokens`; the work happens as the stream is consumed.
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream>;

    /// The `type` of the filter in analyzer definitions.
    fn name(&self) -> &'static str;
}

/// Rewrite the text of every token that is still indexed. Stopped tokens
/// pass through with their original text.
pub fn map_indexed<F>(tokens: TokenStream, rewrite: F) -> TokenStream
where
    F: Fn(&str) -> String + Send + 'static,
{
    Box::new(tokens.map(move |token| {
        if token.is_stopped() {
            return token;
        }
        let text = rewrite(&token.text);
        token.with_text(text)
    }))
}

pub mod lowercase;
pub mod stop;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;

    #[test]
    fn test_map_indexed_skips_stopped_tokens() {
        let tokens = vec![Token::with_offsets("ab", 0, 0, 2), Token::new("cd", 1).stop()];
        let mapped: Vec<Token> =
            map_indexed(Box::new(tokens.into_iter()), |text| text.repeat(2)).collect();

        assert_eq!(mapped[0], Token::with_offsets("abab", 0, 0, 2));
        assert_eq!(mapped[1].text, "cd");
        assert!(mapped[1].is_stopped());
    }
}
