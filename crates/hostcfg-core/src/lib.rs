//! Hostcfg core - hierarchical web-server configuration engine
//!
//! This library provides the configuration resolution engine including:
//! - Lexing and parsing of the XML-subset configuration format
//! - A declaration registry built from configSections blocks
//! - Hierarchy resolution with locking, override, and merge semantics
//! - Read/write section views with staged mutations
//! - A per-file atomic commit pipeline

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod binding;
pub mod commit;
pub mod document;
pub mod element;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod schema;
pub mod section;
pub mod serializer;
pub mod session;
pub mod sites;
pub mod span;
pub mod token;
pub mod value;

// Re-export commonly used types
pub use binding::{Binding, CertificateInfo, CertificateStore, SniStore};
pub use commit::{ChangeKind, ChangeRecord, ChangeSet};
pub use document::{ConfigurationFile, FileArena, FileHandle, FileLevel};
pub use element::{Attribute, Element};
pub use error::{ConfigError, ConfigResult, OobHint, LOCKED_SECTION_MESSAGE};
pub use lexer::{Lexer, SyntaxError};
pub use parser::{parse_text, Parser};
pub use resolver::{resolve, Level, ResolvedLevel, ResolvedSection};
pub use schema::{
    known_schema, oob_hint, AllowDefinition, OverrideMode, SectionDefinition, SectionGroup,
    SectionRegistry,
};
pub use section::{CollectionItem, CollectionView, SectionView};
pub use serializer::serialize_document;
pub use session::{CommitListener, FileLayout, ServerSession};
pub use sites::{expand_environment, Application, Site, VirtualDirectory};
pub use span::Span;
pub use token::{Token, TokenKind};
pub use value::{AttributeType, AttributeValue};
