//! Token types for configuration file lexing
//!
//! The configuration format is a restricted XML dialect: nested elements
//! with attributes, comments, and a prolog. There is no mixed text content,
//! so the token set is markup-only.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Token produced by the lexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The source text of this token (entity references already decoded
    /// for attribute values)
    pub lexeme: String,
    /// Source location
    pub span: Span,
}

impl Token {
    /// Create a new token
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }
}

/// Classification of token types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// `<` opening an element start tag
    OpenStart,
    /// `</` opening an element end tag
    OpenEnd,
    /// `>` closing a tag
    Close,
    /// `/>` closing a self-contained element
    SelfClose,
    /// Element or attribute name (may contain `.`, `:`, `-`, `_`)
    Name,
    /// `=` between an attribute name and its value
    Equal,
    /// Quoted attribute value
    Value,
    /// End of input
    Eof,
}
