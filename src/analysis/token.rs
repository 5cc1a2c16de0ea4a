//! Token types for text analysis.
//!
//! # Examples
//!
//! ```
//! use pike::analysis::token::Token;
//!
//! let token = Token::with_offsets("world", 1, 6, 11);
//! assert_eq!(token.text, "world");
//! assert_eq!(token.start_offset, 6);
//! assert_eq!(token.end_offset, 11);
//! ```

use serde::{Deserialize, Serialize};

/// A single analyzed token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The term text.
    pub text: String,

    /// Position of the token in the stream.
    pub position: usize,

    /// Byte offset where the token starts in the source text.
    pub start_offset: usize,

    /// Byte offset where the token ends in the source text.
    pub end_offset: usize,

    /// Marked by a stop filter; stopped tokens are not indexed.
    pub stopped: bool,
}

/// A stream of tokens flowing through the analysis pipeline.
pub type TokenStream = Box<dyn Iterator<Item = Token> + Send>;

impl Token {
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset: 0,
            end_offset: 0,
            stopped: false,
        }
    }

    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
            stopped: false,
        }
    }

    /// Replace the token text, keeping position and offsets.
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    /// Mark the token as stopped.
    pub fn stop(mut self) -> Self {
        self.stopped = true;
        self
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_builders() {
        let token = Token::new("Hello", 3).with_text("hello");
        assert_eq!(token.text, "hello");
        assert_eq!(token.position, 3);
        assert!(!token.is_stopped());
        assert!(token.stop().is_stopped());
    }
}
