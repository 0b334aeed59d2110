//! Error classification for the configuration engine
//!
//! Structural faults map to one typed variant each. Every variant that
//! originates from a specific file renders with that file's path and the
//! 1-based line number of the offending node, in the diagnostic format
//! existing tooling parses:
//!
//! ```text
//! Filename: {path}\r\nLine number: {line}\r\nError: {message}\r\n\r\n
//! ```
//!
//! The message strings are load-bearing: callers assert on them literally.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagnostic text for a section locked at a parent level.
///
/// Kept as a named constant so tests and tooling can compose the full
/// rendered message without duplicating the literal.
pub const LOCKED_SECTION_MESSAGE: &str = "This configuration section cannot be used at this path. This happens when the section is locked at a parent level. Locking is either by default (overrideModeDefault=\"Deny\"), or set explicitly by a location tag with overrideMode=\"Deny\" or the legacy allowOverride=\"false\".";

/// Friendly hint attached to errors caused by an out-of-band module section
/// that is present in a file but not installed/declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OobHint {
    /// Human-readable module name, e.g.
    /// `Application Request Routing Module (system.webServer/webFarms/)`
    pub module: String,
    /// Documentation link for installing/configuring the module
    pub link: String,
}

/// Errors raised by the configuration engine
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed file text; aborts the load of that file only
    #[error("Filename: {filename}\r\nLine number: {line}\r\nError: {message}\r\n\r\n")]
    Parse {
        filename: String,
        line: usize,
        message: String,
    },

    /// Attribute type mismatch or missing required attribute
    #[error("Filename: {filename}\r\nLine number: {line}\r\nError: {message}\r\n\r\n")]
    Schema {
        filename: String,
        line: usize,
        message: String,
    },

    /// The requested section path has no declaration anywhere in the chain
    #[error("The configuration section '{path}' cannot be read because it is missing a section declaration")]
    UnknownSection {
        path: String,
        /// Set when the path belongs to a known out-of-band module
        oob: Option<OobHint>,
    },

    /// A file contains an element with no matching section declaration
    #[error("Filename: {filename}\r\nLine number: {line}\r\nError: Unrecognized element '{name}'\r\n\r\n")]
    UnrecognizedElement {
        filename: String,
        line: usize,
        name: String,
        /// Set when the undeclared ancestor group belongs to a known
        /// out-of-band module
        oob: Option<OobHint>,
    },

    /// A file below a lock level defines the locked section
    #[error("Filename: {filename}\r\nLine number: {line}\r\nError: This configuration section cannot be used at this path. This happens when the section is locked at a parent level. Locking is either by default (overrideModeDefault=\"Deny\"), or set explicitly by a location tag with overrideMode=\"Deny\" or the legacy allowOverride=\"false\".\r\n\r\n")]
    LockedSection { filename: String, line: usize },

    /// A file defines a section at a level its declaration scope forbids
    #[error("Filename: {filename}\r\nLine number: {line}\r\nError: It is an error to use a section registered as allowDefinition='{scope}' at this path.\r\n\r\n")]
    DefinitionNotAllowed {
        filename: String,
        line: usize,
        scope: String,
    },

    /// A section path declared twice with conflicting metadata
    #[error("Filename: {filename}\r\nLine number: {line}\r\nError: Config section '{name}' already defined. Sections must only appear once per config file.\r\n\r\n")]
    DuplicateSection {
        filename: String,
        line: usize,
        name: String,
    },

    /// A location path names a site the sites section does not contain
    #[error("The site '{name}' does not exist")]
    UnknownSite { name: String },

    /// A writeback failed; names the failing file, files already written stay written
    #[error("Filename: {filename}\r\nError: {message}\r\n\r\n")]
    Commit { filename: String, message: String },
}

impl ConfigError {
    /// The out-of-band module hint, if this error carries one
    pub fn oob(&self) -> Option<&OobHint> {
        match self {
            ConfigError::UnknownSection { oob, .. }
            | ConfigError::UnrecognizedElement { oob, .. } => oob.as_ref(),
            _ => None,
        }
    }

    /// The file path this error is scoped to, if any
    pub fn filename(&self) -> Option<&str> {
        match self {
            ConfigError::Parse { filename, .. }
            | ConfigError::Schema { filename, .. }
            | ConfigError::UnrecognizedElement { filename, .. }
            | ConfigError::LockedSection { filename, .. }
            | ConfigError::DefinitionNotAllowed { filename, .. }
            | ConfigError::DuplicateSection { filename, .. }
            | ConfigError::Commit { filename, .. } => Some(filename),
            _ => None,
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_section_message_format() {
        let error = ConfigError::LockedSection {
            filename: "/tmp/web.config".to_string(),
            line: 11,
        };
        let rendered = error.to_string();
        assert_eq!(
            rendered,
            format!(
                "Filename: /tmp/web.config\r\nLine number: 11\r\nError: {}\r\n\r\n",
                LOCKED_SECTION_MESSAGE
            )
        );
    }

    #[test]
    fn test_unrecognized_element_message_format() {
        let error = ConfigError::UnrecognizedElement {
            filename: "/tmp/web.config".to_string(),
            line: 10,
            name: "test".to_string(),
            oob: None,
        };
        assert_eq!(
            error.to_string(),
            "Filename: /tmp/web.config\r\nLine number: 10\r\nError: Unrecognized element 'test'\r\n\r\n"
        );
    }

    #[test]
    fn test_oob_accessor() {
        let hint = OobHint {
            module: "Application Request Routing Module (system.webServer/webFarms/)".to_string(),
            link: "https://example.invalid/arr".to_string(),
        };
        let error = ConfigError::UnrecognizedElement {
            filename: "f".to_string(),
            line: 1,
            name: "test".to_string(),
            oob: Some(hint.clone()),
        };
        assert_eq!(error.oob(), Some(&hint));
        assert!(ConfigError::LockedSection {
            filename: "f".to_string(),
            line: 1
        }
        .oob()
        .is_none());
    }
}
