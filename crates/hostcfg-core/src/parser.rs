//! Parsing (tokens to element tree)
//!
//! Recursive descent over the markup tokens produced by the lexer. The
//! result is the root element of a configuration file. Parsing is
//! fail-fast: the first malformed construct aborts the load of that file.

use crate::element::{Attribute, Element};
use crate::lexer::{Lexer, SyntaxError};
use crate::token::{Token, TokenKind};

/// Parser state for building an element tree from tokens
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

/// Parse configuration file text into its root element
pub fn parse_text(source: &str) -> Result<Element, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

impl Parser {
    /// Create a new parser for the given tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parse tokens into the root element
    pub fn parse(&mut self) -> Result<Element, SyntaxError> {
        if self.check(TokenKind::Eof) {
            return Err(SyntaxError::new("Missing root element", 1));
        }
        let root = self.parse_element()?;
        if !self.check(TokenKind::Eof) {
            return Err(self.error_here("Content after the root element"));
        }
        Ok(root)
    }

    /// Parse one element, including its attributes and children
    fn parse_element(&mut self) -> Result<Element, SyntaxError> {
        let open = self.consume(TokenKind::OpenStart, "Expected '<'")?;
        let open_span = open.span;
        let name = self.consume(TokenKind::Name, "Expected element name")?;
        let mut element = Element::new(name.lexeme.clone(), open_span);

        // Attributes
        while self.check(TokenKind::Name) {
            let attr_name = self.advance().clone();
            self.consume(TokenKind::Equal, "Expected '=' after attribute name")?;
            let value = self.consume(TokenKind::Value, "Expected attribute value")?;
            if element.attr(&attr_name.lexeme).is_some() {
                return Err(SyntaxError::new(
                    format!("Duplicate attribute '{}'", attr_name.lexeme),
                    attr_name.span.line,
                ));
            }
            element.attributes.push(Attribute {
                name: attr_name.lexeme,
                value: value.lexeme.clone(),
                span: attr_name.span,
            });
        }

        if self.check(TokenKind::SelfClose) {
            self.advance();
            return Ok(element);
        }
        self.consume(TokenKind::Close, "Expected '>' or '/>'")?;

        // Children until the matching end tag
        loop {
            if self.check(TokenKind::OpenEnd) {
                self.advance();
                let end_name = self.consume(TokenKind::Name, "Expected element name")?;
                if end_name.lexeme != element.name {
                    return Err(SyntaxError::new(
                        format!(
                            "Mismatched end tag '</{}>', expected '</{}>'",
                            end_name.lexeme, element.name
                        ),
                        end_name.span.line,
                    ));
                }
                self.consume(TokenKind::Close, "Expected '>'")?;
                return Ok(element);
            }
            if self.check(TokenKind::Eof) {
                return Err(SyntaxError::new(
                    format!("Unexpected end of file inside '{}'", element.name),
                    element.span.line,
                ));
            }
            element.children.push(self.parse_element()?);
        }
    }

    // === Token helpers ===

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.current];
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            Err(self.error_here(message))
        }
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        SyntaxError::new(message, self.peek().span.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements() {
        let root = parse_text(
            "<configuration>\n  <system.webServer>\n    <defaultDocument enabled=\"true\">\n      <files>\n        <add value=\"index.html\"/>\n      </files>\n    </defaultDocument>\n  </system.webServer>\n</configuration>",
        )
        .unwrap();
        assert_eq!(root.name, "configuration");
        let section = root
            .child("system.webServer")
            .and_then(|s| s.child("defaultDocument"))
            .unwrap();
        assert_eq!(section.attr("enabled"), Some("true"));
        assert_eq!(section.line(), 3);
        let add = section.child("files").and_then(|f| f.child("add")).unwrap();
        assert_eq!(add.attr("value"), Some("index.html"));
        assert_eq!(add.line(), 5);
    }

    #[test]
    fn test_mismatched_end_tag() {
        let error = parse_text("<configuration><a></b></configuration>").unwrap_err();
        assert_eq!(error.message, "Mismatched end tag '</b>', expected '</a>'");
    }

    #[test]
    fn test_duplicate_attribute() {
        let error = parse_text(r#"<a value="1" value="2"/>"#).unwrap_err();
        assert_eq!(error.message, "Duplicate attribute 'value'");
    }

    #[test]
    fn test_unclosed_element() {
        let error = parse_text("<configuration><a/>").unwrap_err();
        assert_eq!(error.message, "Unexpected end of file inside 'configuration'");
    }

    #[test]
    fn test_trailing_content_rejected() {
        let error = parse_text("<a/><b/>").unwrap_err();
        assert_eq!(error.message, "Content after the root element");
    }

    #[test]
    fn test_prolog_comment_and_self_close() {
        let root = parse_text("<?xml version=\"1.0\"?><!-- note --><configuration/>").unwrap();
        assert!(root.children.is_empty());
    }
}
