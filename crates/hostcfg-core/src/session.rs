//! Server session
//!
//! The explicit session object the management layer works against. A
//! session owns its file arena, its declaration registry, and its staged
//! change set; independent sessions never share state, so concurrent
//! sessions over the same files are safe to create in tests and tools.

use crate::commit::{commit, ChangeSet};
use crate::document::{ConfigurationFile, FileArena, FileHandle, FileLevel};
use crate::error::{ConfigError, ConfigResult};
use crate::resolver::{resolve, Level};
use crate::schema::{SectionDefinition, SectionGroup, SectionRegistry};
use crate::section::SectionView;
use crate::sites::{parse_sites, Site};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// The files making up one hierarchy, least specific first
///
/// Machine and root-web levels are optional; a layout without them simply
/// has a shorter chain.
#[derive(Debug, Clone)]
pub struct FileLayout {
    pub machine_config: Option<PathBuf>,
    pub root_web_config: Option<PathBuf>,
    pub application_host: PathBuf,
}

impl FileLayout {
    /// A layout with only the server-level file
    pub fn new(application_host: impl Into<PathBuf>) -> Self {
        Self {
            machine_config: None,
            root_web_config: None,
            application_host: application_host.into(),
        }
    }

    pub fn with_machine_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.machine_config = Some(path.into());
        self
    }

    pub fn with_root_web_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_web_config = Some(path.into());
        self
    }
}

/// Notified after a commit writes a file back
pub trait CommitListener {
    fn settings_saved(&self, file: &Path);
}

/// One management session over a configuration hierarchy
pub struct ServerSession {
    arena: FileArena,
    registry: SectionRegistry,
    machine: Option<FileHandle>,
    root_web: Option<FileHandle>,
    app_host: FileHandle,
    sites: Vec<Site>,
    /// Lazily loaded site/application web.config files, by physical path
    web_files: HashMap<PathBuf, FileHandle>,
    changes: Rc<RefCell<ChangeSet>>,
    listener: Option<Box<dyn CommitListener>>,
}

impl ServerSession {
    /// Open a session over the given layout
    ///
    /// Loads the fixed levels, builds the declaration registry least
    /// specific first, and reads the sites model. A declaration fault
    /// fails the whole session since every later resolution depends on
    /// the registry.
    pub fn open(layout: FileLayout) -> ConfigResult<Self> {
        let mut arena = FileArena::new();
        let mut registry = SectionRegistry::new();

        let mut parent = None;
        let machine = match &layout.machine_config {
            Some(path) => {
                let handle = arena.add(ConfigurationFile::load(path, FileLevel::Machine, None)?);
                parent = Some(handle);
                Some(handle)
            }
            None => None,
        };
        let root_web = match &layout.root_web_config {
            Some(path) => {
                let handle =
                    arena.add(ConfigurationFile::load(path, FileLevel::RootWeb, parent)?);
                parent = Some(handle);
                Some(handle)
            }
            None => None,
        };
        let app_host = arena.add(ConfigurationFile::load(
            &layout.application_host,
            FileLevel::ApplicationHost,
            parent,
        )?);

        for handle in machine.iter().chain(&root_web).chain(&[app_host]).copied() {
            let group = registry.register_file(
                arena.get(handle).root(),
                &arena.get(handle).filename(),
                handle,
            )?;
            arena.get_mut(handle).set_section_group(group);
        }

        let sites = parse_sites(arena.get(app_host).root());

        Ok(Self {
            arena,
            registry,
            machine,
            root_web,
            app_host,
            sites,
            web_files: HashMap::new(),
            changes: Rc::new(RefCell::new(ChangeSet::new())),
            listener: None,
        })
    }

    /// Resolve a section server-wide
    pub fn get_section(&mut self, section_path: &str) -> ConfigResult<SectionView> {
        self.get(section_path, None)
    }

    /// Resolve a section at a location (`SiteName` or `SiteName/app`)
    pub fn get_section_at(
        &mut self,
        section_path: &str,
        location: &str,
    ) -> ConfigResult<SectionView> {
        self.get(section_path, Some(location))
    }

    fn get(&mut self, section_path: &str, location: Option<&str>) -> ConfigResult<SectionView> {
        let chain = self.chain_for(location)?;
        let resolved = resolve(&self.arena, &self.registry, &chain, section_path, location)?;
        Ok(SectionView::new(resolved, Rc::clone(&self.changes)))
    }

    /// Write every staged mutation back to the owning files
    ///
    /// Commit is all-or-nothing per file; a failure names the failing file
    /// and leaves files already written in place.
    pub fn commit_changes(&mut self) -> ConfigResult<()> {
        let records = self.changes.borrow_mut().take();
        if records.is_empty() {
            return Ok(());
        }
        let written = commit(&mut self.arena, &self.registry, records)?;
        if let Some(listener) = &self.listener {
            for handle in &written {
                listener.settings_saved(self.arena.get(*handle).path());
            }
        }
        Ok(())
    }

    /// Whether any view has staged an uncommitted mutation
    pub fn has_staged_changes(&self) -> bool {
        !self.changes.borrow().is_empty()
    }

    /// Receive a callback after each file a commit writes
    pub fn set_commit_listener(&mut self, listener: Box<dyn CommitListener>) {
        self.listener = Some(listener);
    }

    /// The union declaration tree across every registered file
    pub fn root_section_group(&self) -> &SectionGroup {
        self.registry.root()
    }

    /// The full flattened declaration catalog
    pub fn get_all_definitions(&self) -> Vec<SectionDefinition> {
        self.registry.get_all_definitions()
    }

    /// Sites parsed from the server file
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn file(&self, handle: FileHandle) -> &ConfigurationFile {
        self.arena.get(handle)
    }

    pub fn application_host(&self) -> FileHandle {
        self.app_host
    }

    pub fn machine_config(&self) -> Option<FileHandle> {
        self.machine
    }

    pub fn root_web_config(&self) -> Option<FileHandle> {
        self.root_web
    }

    /// Validate every file a location's chain observes
    ///
    /// Loads the site files for the location and runs the strict content
    /// check against the registry, without resolving any section.
    pub fn check_location(&mut self, location: Option<&str>) -> ConfigResult<()> {
        let chain = self.chain_for(location)?;
        let mut checked = Vec::new();
        for level in &chain {
            if !checked.contains(&level.file) {
                crate::resolver::validate_file_content(
                    self.arena.get(level.file).root(),
                    self.arena.get(level.file),
                    &self.registry,
                )?;
                checked.push(level.file);
            }
        }
        Ok(())
    }

    // === Chain construction ===

    /// Build the ordered chain of levels for a query, least to most
    /// specific: fixed files, then the server file's location scopes for
    /// each prefix of the query path, then the site/application files.
    fn chain_for(&mut self, location: Option<&str>) -> ConfigResult<Vec<Level>> {
        let mut chain = Vec::new();
        if let Some(handle) = self.machine {
            chain.push(Level {
                file: handle,
                location: None,
            });
        }
        if let Some(handle) = self.root_web {
            chain.push(Level {
                file: handle,
                location: None,
            });
        }
        chain.push(Level {
            file: self.app_host,
            location: None,
        });
        if let Some(location) = location {
            chain.push(Level {
                file: self.app_host,
                location: Some(String::new()),
            });
            for prefix in location_prefixes(location) {
                chain.push(Level {
                    file: self.app_host,
                    location: Some(prefix),
                });
            }
            for handle in self.web_files_for(location)? {
                chain.push(Level {
                    file: handle,
                    location: None,
                });
            }
        }
        Ok(chain)
    }

    /// The web.config files backing a location, site root first
    fn web_files_for(&mut self, location: &str) -> ConfigResult<Vec<FileHandle>> {
        let (site_name, app_path) = match location.split_once('/') {
            Some((site, rest)) => (site, format!("/{}", rest)),
            None => (location, String::new()),
        };
        let site = self
            .sites
            .iter()
            .find(|s| s.name == site_name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownSite {
                name: site_name.to_string(),
            })?;

        let mut handles = Vec::new();
        let root_physical = site
            .application("/")
            .and_then(|a| a.physical_path())
            .ok_or_else(|| ConfigError::UnknownSite {
                name: site_name.to_string(),
            })?;
        let site_file = self.load_web_file(root_physical.join("web.config"), self.app_host)?;
        handles.push(site_file);

        if !app_path.is_empty() {
            if let Some(physical) = site.application(&app_path).and_then(|a| a.physical_path()) {
                handles.push(self.load_web_file(physical.join("web.config"), site_file)?);
            }
        }
        Ok(handles)
    }

    /// Load (or synthesize) one web.config, caching by physical path
    ///
    /// A location with no file on disk still gets an in-memory level; the
    /// file is only created if a commit touches it.
    fn load_web_file(&mut self, path: PathBuf, parent: FileHandle) -> ConfigResult<FileHandle> {
        if let Some(handle) = self.web_files.get(&path) {
            return Ok(*handle);
        }
        let file = if path.exists() {
            ConfigurationFile::load(&path, FileLevel::Web, Some(parent))?
        } else {
            ConfigurationFile::empty(&path, FileLevel::Web, Some(parent))
        };
        let handle = self.arena.add(file);
        let group = self.registry.register_file(
            self.arena.get(handle).root(),
            &self.arena.get(handle).filename(),
            handle,
        )?;
        self.arena.get_mut(handle).set_section_group(group);
        self.web_files.insert(path, handle);
        Ok(handle)
    }
}

/// Every prefix of a location path, least specific first:
/// `WebSite1/app` yields `WebSite1`, then `WebSite1/app`
fn location_prefixes(location: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = String::new();
    for segment in location.split('/') {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        prefixes.push(current.clone());
    }
    prefixes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_prefixes() {
        assert_eq!(location_prefixes("WebSite1"), vec!["WebSite1"]);
        assert_eq!(
            location_prefixes("WebSite1/app"),
            vec!["WebSite1", "WebSite1/app"]
        );
    }
}
