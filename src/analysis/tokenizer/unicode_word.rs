//! Words by the Unicode segmentation rules (UAX #29).
//!
//! Unlike the default `\w+` pattern, a word here may contain inner
//! punctuation, so `can't` and `32.3` stay whole.

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

/// Backs the builtin `unicode` analyzer and the `unicode_word` tokenizer
/// type of custom analyzers.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnicodeWordTokenizer;

impl UnicodeWordTokenizer {
    pub fn new() -> Self {
        UnicodeWordTokenizer
    }
}

impl Tokenizer for UnicodeWordTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        let tokens: Vec<Token> = text
            .unicode_word_indices()
            .zip(0..)
            .map(|((start, word), position)| {
                Token::with_offsets(word, position, start, start + word.len())
            })
            .collect();
        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "unicode_word"
    }
}
