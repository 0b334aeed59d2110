//! Document store
//!
//! Loads and indexes one configuration file as an addressable element tree.
//! Files form a chain from most specific (a site or application web.config)
//! to least specific (machine defaults); the chain is held in an arena and
//! addressed by stable handles so parent links never form ownership cycles.

use crate::element::Element;
use crate::error::{ConfigError, ConfigResult};
use crate::parser::parse_text;
use crate::schema::SectionGroup;
use crate::serializer::serialize_document;
use crate::span::Span;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Stable handle to a [`ConfigurationFile`] in a [`FileArena`]
pub type FileHandle = usize;

/// Which hierarchy level a configuration file sits at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileLevel {
    /// Machine-wide defaults (machine.config)
    Machine,
    /// Server-wide web defaults (root web.config)
    RootWeb,
    /// The server-level file with per-site location blocks
    ApplicationHost,
    /// A site or application web.config
    Web,
}

/// One loaded configuration file
#[derive(Debug, Clone)]
pub struct ConfigurationFile {
    path: PathBuf,
    root: Element,
    level: FileLevel,
    parent: Option<FileHandle>,
    /// Modification time observed at load, used to detect concurrent edits
    mtime: Option<SystemTime>,
    /// False for files synthesized for a location that has no file on disk yet
    exists: bool,
    /// Section declarations made in this file's own configSections block
    section_group: SectionGroup,
}

impl ConfigurationFile {
    /// Load a file from disk
    pub fn load(
        path: impl Into<PathBuf>,
        level: FileLevel,
        parent: Option<FileHandle>,
    ) -> ConfigResult<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path)?;
        let root = parse_text(&text).map_err(|e| ConfigError::Parse {
            filename: path.display().to_string(),
            line: e.line,
            message: e.message,
        })?;
        let mtime = fs::metadata(&path).and_then(|m| m.modified()).ok();
        Ok(Self {
            path,
            root,
            level,
            parent,
            mtime,
            exists: true,
            section_group: SectionGroup::root(),
        })
    }

    /// Create an empty in-memory file for a path with no file on disk yet
    ///
    /// The file is only written out if a commit touches it.
    pub fn empty(path: impl Into<PathBuf>, level: FileLevel, parent: Option<FileHandle>) -> Self {
        Self {
            path: path.into(),
            root: Element::new("configuration", Span::dummy()),
            level,
            parent,
            mtime: None,
            exists: false,
            section_group: SectionGroup::root(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The path rendered for diagnostics
    pub fn filename(&self) -> String {
        self.path.display().to_string()
    }

    pub fn level(&self) -> FileLevel {
        self.level
    }

    /// The next-less-specific file in the chain, or none for the root
    pub fn parent(&self) -> Option<FileHandle> {
        self.parent
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Whether the file existed on disk when the session loaded it
    pub fn exists_on_disk(&self) -> bool {
        self.exists
    }

    /// Declarations made in this file's own configSections block
    pub fn root_section_group(&self) -> &SectionGroup {
        &self.section_group
    }

    pub(crate) fn set_section_group(&mut self, group: SectionGroup) {
        self.section_group = group;
    }

    /// Write the file back to disk atomically (write-temp, then replace)
    ///
    /// Fails with a commit error if the on-disk file changed since load;
    /// a crash mid-write never corrupts the original.
    pub fn save(&mut self) -> ConfigResult<()> {
        if self.exists {
            let on_disk = fs::metadata(&self.path).and_then(|m| m.modified()).ok();
            if on_disk != self.mtime {
                return Err(ConfigError::Commit {
                    filename: self.filename(),
                    message: "The file has been changed on disk since it was loaded".to_string(),
                });
            }
        }
        let text = serialize_document(&self.root);
        let temp = self.path.with_extension("config.tmp");
        fs::write(&temp, &text).map_err(|e| ConfigError::Commit {
            filename: self.filename(),
            message: e.to_string(),
        })?;
        fs::rename(&temp, &self.path).map_err(|e| ConfigError::Commit {
            filename: self.filename(),
            message: e.to_string(),
        })?;
        self.mtime = fs::metadata(&self.path).and_then(|m| m.modified()).ok();
        self.exists = true;
        Ok(())
    }
}

/// Arena of configuration files addressed by stable handles
#[derive(Debug, Default)]
pub struct FileArena {
    files: Vec<ConfigurationFile>,
}

impl FileArena {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Add a file, returning its handle
    pub fn add(&mut self, file: ConfigurationFile) -> FileHandle {
        self.files.push(file);
        self.files.len() - 1
    }

    pub fn get(&self, handle: FileHandle) -> &ConfigurationFile {
        &self.files[handle]
    }

    pub fn get_mut(&mut self, handle: FileHandle) -> &mut ConfigurationFile {
        &mut self.files[handle]
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileHandle, &ConfigurationFile)> {
        self.files.iter().enumerate()
    }
}
