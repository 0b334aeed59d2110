//! Element tree for configuration files
//!
//! A configuration file is an ordered tree of named elements with named
//! attribute values. Elements only exist in a tree when they are physically
//! present in the owning file's text, so presence in a tree is what the
//! resolution layer reports as "locally stored".

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// A named attribute with its raw text value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub span: Span,
}

/// A named node with attributes and ordered child elements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
    /// Position of the start tag in the owning file
    pub span: Span,
}

// Equality is structural: two trees are equal when they carry the same
// names, attribute values, and child order. Spans are excluded so a
// serialized-then-reparsed tree compares equal to its source tree.
impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

impl Eq for Attribute {}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes == other.attributes
            && self.children == other.children
    }
}

impl Eq for Element {}

impl Element {
    /// Create an element with no attributes or children
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            span,
        }
    }

    /// Line number of the start tag (1-based)
    pub fn line(&self) -> usize {
        self.span.line
    }

    /// Raw text of the named attribute, if present
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing value or appending a new one
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
                span: Span::dummy(),
            }),
        }
    }

    /// Remove an attribute; returns whether it was present
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|a| a.name != name);
        self.attributes.len() != before
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Mutable access to the first child element with the given name
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// All child elements with the given name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Find or append a child element with the given name
    pub fn ensure_child(&mut self, name: &str) -> &mut Element {
        if let Some(index) = self.children.iter().position(|c| c.name == name) {
            &mut self.children[index]
        } else {
            self.children.push(Element::new(name, Span::dummy()));
            self.children.last_mut().expect("child just appended")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_lookup_and_set() {
        let mut element = Element::new("defaultDocument", Span::dummy());
        assert_eq!(element.attr("enabled"), None);
        element.set_attr("enabled", "true");
        assert_eq!(element.attr("enabled"), Some("true"));
        element.set_attr("enabled", "false");
        assert_eq!(element.attr("enabled"), Some("false"));
        assert_eq!(element.attributes.len(), 1);
    }

    #[test]
    fn test_remove_attr() {
        let mut element = Element::new("add", Span::dummy());
        element.set_attr("value", "home1.html");
        assert!(element.remove_attr("value"));
        assert!(!element.remove_attr("value"));
    }

    #[test]
    fn test_ensure_child_is_idempotent() {
        let mut element = Element::new("defaultDocument", Span::dummy());
        element.ensure_child("files").set_attr("marker", "1");
        element.ensure_child("files");
        assert_eq!(element.children.len(), 1);
        assert_eq!(element.child("files").unwrap().attr("marker"), Some("1"));
    }
}
