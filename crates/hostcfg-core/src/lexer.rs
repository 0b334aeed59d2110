//! Lexical analysis for configuration file text
//!
//! The lexer converts configuration file text into markup tokens with
//! accurate span information. Comments, the XML prolog, and DOCTYPE blocks
//! are consumed here; the parser only ever sees element markup.

use crate::span::Span;
use crate::token::{Token, TokenKind};

/// A lexing or parsing fault, not yet bound to a file name
///
/// [`crate::document`] wraps this into [`crate::error::ConfigError::Parse`]
/// once the owning file path is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// Human-readable description
    pub message: String,
    /// Line number (1-based)
    pub line: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Lexer state for tokenizing configuration file text
pub struct Lexer {
    /// Characters of source text
    chars: Vec<char>,
    /// Current position in chars
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Start position of current token
    start_pos: usize,
    /// Start line of current token
    start_line: usize,
    /// Start column of current token
    start_column: usize,
    /// Whether the lexer is inside a `<...>` tag
    in_tag: bool,
}

impl Lexer {
    /// Create a new lexer for the given source text
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            current: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
            in_tag: false,
        }
    }

    /// Tokenize the source text
    ///
    /// Fails fast on the first malformed construct; a partially lexed file
    /// is never returned.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Scan the next token
    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        if self.in_tag {
            self.skip_whitespace();
        } else {
            self.skip_between_tags()?;
        }

        // Mark start of token
        self.start_pos = self.current;
        self.start_line = self.line;
        self.start_column = self.column;

        if self.is_at_end() {
            return Ok(self.make_token(TokenKind::Eof, ""));
        }

        let c = self.advance();

        if self.in_tag {
            match c {
                '>' => {
                    self.in_tag = false;
                    Ok(self.make_token(TokenKind::Close, ">"))
                }
                '/' => {
                    if self.match_char('>') {
                        self.in_tag = false;
                        Ok(self.make_token(TokenKind::SelfClose, "/>"))
                    } else {
                        Err(self.error("Unexpected character '/'"))
                    }
                }
                '=' => Ok(self.make_token(TokenKind::Equal, "=")),
                '"' | '\'' => self.value(c),
                c if is_name_start(c) => Ok(self.name()),
                _ => Err(self.error(format!("Unexpected character '{}'", c))),
            }
        } else {
            match c {
                '<' => {
                    self.in_tag = true;
                    if self.match_char('/') {
                        Ok(self.make_token(TokenKind::OpenEnd, "</"))
                    } else {
                        Ok(self.make_token(TokenKind::OpenStart, "<"))
                    }
                }
                _ => Err(self.error(format!("Unexpected character '{}'", c))),
            }
        }
    }

    /// Skip whitespace, comments, the prolog, and DOCTYPE blocks between tags
    fn skip_between_tags(&mut self) -> Result<(), SyntaxError> {
        loop {
            self.skip_whitespace();
            if self.peek() != Some('<') {
                return Ok(());
            }
            match self.peek_at(1) {
                Some('!') => {
                    if self.peek_at(2) == Some('-') && self.peek_at(3) == Some('-') {
                        self.skip_comment()?;
                    } else {
                        // DOCTYPE or other declaration block
                        self.skip_until('>', "Unterminated markup declaration")?;
                    }
                }
                Some('?') => {
                    // <?xml ... ?> prolog / processing instruction
                    self.skip_until('>', "Unterminated processing instruction")?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Skip a `<!-- ... -->` comment
    fn skip_comment(&mut self) -> Result<(), SyntaxError> {
        let line = self.line;
        // consume "<!--"
        for _ in 0..4 {
            self.advance();
        }
        while !self.is_at_end() {
            if self.peek() == Some('-') && self.peek_at(1) == Some('-') && self.peek_at(2) == Some('>')
            {
                self.advance();
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(SyntaxError::new("Unterminated comment", line))
    }

    /// Skip up to and including the given closing character
    fn skip_until(&mut self, close: char, message: &str) -> Result<(), SyntaxError> {
        let line = self.line;
        while !self.is_at_end() {
            if self.advance() == close {
                return Ok(());
            }
        }
        Err(SyntaxError::new(message, line))
    }

    /// Scan an element or attribute name
    fn name(&mut self) -> Token {
        while let Some(c) = self.peek() {
            if is_name_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        let lexeme: String = self.chars[self.start_pos..self.current].iter().collect();
        self.make_token(TokenKind::Name, lexeme)
    }

    /// Scan a quoted attribute value, decoding entity references
    fn value(&mut self, quote: char) -> Result<Token, SyntaxError> {
        let mut text = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::new("Unterminated attribute value", self.start_line));
            };
            self.advance();
            if c == quote {
                break;
            }
            if c == '&' {
                text.push(self.entity()?);
            } else {
                text.push(c);
            }
        }
        Ok(self.make_token(TokenKind::Value, text))
    }

    /// Decode one entity reference; the leading `&` is already consumed
    fn entity(&mut self) -> Result<char, SyntaxError> {
        let line = self.line;
        let mut name = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::new("Unterminated entity reference", line));
            };
            self.advance();
            if c == ';' {
                break;
            }
            name.push(c);
            if name.len() > 8 {
                return Err(SyntaxError::new(
                    format!("Unrecognized entity reference '&{}'", name),
                    line,
                ));
            }
        }
        match name.as_str() {
            "amp" => Ok('&'),
            "lt" => Ok('<'),
            "gt" => Ok('>'),
            "quot" => Ok('"'),
            "apos" => Ok('\''),
            _ => {
                let code = if let Some(hex) = name.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = name.strip_prefix('#') {
                    dec.parse().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32).ok_or_else(|| {
                    SyntaxError::new(format!("Unrecognized entity reference '&{};'", name), line)
                })
            }
        }
    }

    // === Character helpers ===

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.current + offset).copied()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_token(&self, kind: TokenKind, lexeme: impl Into<String>) -> Token {
        Token::new(
            kind,
            lexeme,
            Span::new(self.start_pos, self.current, self.start_line, self.start_column),
        )
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.start_line)
    }
}

/// Whether `c` may start an element or attribute name
fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Whether `c` may continue an element or attribute name
fn is_name_continue(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_empty_element() {
        assert_eq!(
            kinds("<configuration/>"),
            vec![
                TokenKind::OpenStart,
                TokenKind::Name,
                TokenKind::SelfClose,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_element_with_attribute() {
        let tokens = Lexer::new(r#"<add value="home1.html"/>"#).tokenize().unwrap();
        assert_eq!(tokens[1].lexeme, "add");
        assert_eq!(tokens[2].kind, TokenKind::Name);
        assert_eq!(tokens[2].lexeme, "value");
        assert_eq!(tokens[3].kind, TokenKind::Equal);
        assert_eq!(tokens[4].kind, TokenKind::Value);
        assert_eq!(tokens[4].lexeme, "home1.html");
    }

    #[test]
    fn test_prolog_and_comment_skipped() {
        let source = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- server file -->\n<configuration></configuration>";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::OpenStart,
                TokenKind::Name,
                TokenKind::Close,
                TokenKind::OpenEnd,
                TokenKind::Name,
                TokenKind::Close,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_line_tracking() {
        let source = "<configuration>\n  <system.webServer>\n    <defaultDocument/>\n  </system.webServer>\n</configuration>";
        let tokens = Lexer::new(source).tokenize().unwrap();
        let default_document = tokens
            .iter()
            .find(|t| t.lexeme == "defaultDocument")
            .unwrap();
        assert_eq!(default_document.span.line, 3);
    }

    #[test]
    fn test_entity_decoding() {
        let tokens = Lexer::new(r#"<add path="a&amp;b &lt;c&gt; &#65;"/>"#)
            .tokenize()
            .unwrap();
        assert_eq!(tokens[4].lexeme, "a&b <c> A");
    }

    #[test]
    fn test_dotted_and_namespaced_names() {
        let tokens = Lexer::new(r#"<system.webServer xmlns:asm="urn:x"/>"#)
            .tokenize()
            .unwrap();
        assert_eq!(tokens[1].lexeme, "system.webServer");
        assert_eq!(tokens[2].lexeme, "xmlns:asm");
    }

    #[test]
    fn test_unterminated_value_fails() {
        let error = Lexer::new("<add value=\"oops>").tokenize().unwrap_err();
        assert_eq!(error.message, "Unterminated attribute value");
    }

    #[test]
    fn test_stray_text_fails() {
        let error = Lexer::new("<a>text</a>").tokenize().unwrap_err();
        assert!(error.message.starts_with("Unexpected character"));
    }
}
