//! Hierarchy resolver
//!
//! Walks the ordered chain of configuration files for a location, applying
//! declaration, locking, and override rules, and produces the per-level
//! section snapshots that a [`crate::section::SectionView`] merges.
//!
//! The resolver only reads; staged writes live in the section layer and
//! are materialized by the commit pipeline.

use crate::document::{FileArena, FileHandle, FileLevel};
use crate::element::Element;
use crate::error::{ConfigError, ConfigResult};
use crate::schema::{oob_hint, AllowDefinition, OverrideMode, SectionDefinition, SectionRegistry};

/// Policy for a location tag carrying both lock vocabularies:
/// `overrideMode` is the newer, more specific control and wins over the
/// legacy `allowOverride` boolean when the two disagree.
pub const OVERRIDE_MODE_WINS_OVER_ALLOW_OVERRIDE: bool = true;

/// One step in the file chain, least to most specific
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub file: FileHandle,
    /// `None` for a file's global scope; `Some(path)` for the matching
    /// `<location path="...">` blocks inside that file
    pub location: Option<String>,
}

/// A level's contribution to one resolved section
#[derive(Debug, Clone)]
pub struct ResolvedLevel {
    pub file: FileHandle,
    pub filename: String,
    pub file_level: FileLevel,
    pub location: Option<String>,
    /// Snapshot of the section element at this level; duplicate location
    /// blocks for the same path are already merged, most recently
    /// declared first
    pub element: Option<Element>,
    /// Override mode in force when entering this level from outside
    pub effective_mode: OverrideMode,
    /// Whether a write targeting this query may materialize the section here
    pub may_define: bool,
}

/// The outcome of resolving a section at a location
#[derive(Debug, Clone)]
pub struct ResolvedSection {
    pub section_path: String,
    pub definition: SectionDefinition,
    /// Levels from the declaring file inward, least to most specific
    pub levels: Vec<ResolvedLevel>,
    /// The query's location path
    pub location: Option<String>,
}

/// Resolve a section path along a prepared file chain
///
/// `chain` is ordered least to most specific and includes every level the
/// query can observe. Fails with the typed error for unknown sections,
/// unrecognized file content, or a lock violated below its owner level.
pub fn resolve(
    arena: &FileArena,
    registry: &SectionRegistry,
    chain: &[Level],
    section_path: &str,
    query_location: Option<&str>,
) -> ConfigResult<ResolvedSection> {
    let definition = registry
        .lookup(section_path)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownSection {
            path: section_path.to_string(),
            oob: oob_hint(section_path),
        })?;

    // Strict content check: every file in the chain must only contain
    // declared elements.
    let mut checked = Vec::new();
    for level in chain {
        if !checked.contains(&level.file) {
            validate_file_content(arena.get(level.file).root(), arena.get(level.file), registry)?;
            checked.push(level.file);
        }
    }

    // Levels in files less specific than the declaring file cannot
    // observe the section; drop them.
    let start = chain
        .iter()
        .position(|l| l.file == definition.declared_in)
        .unwrap_or(0);

    let mut levels = Vec::new();
    let mut effective = definition.override_mode_default;
    for level in &chain[start..] {
        let file = arena.get(level.file);
        let (element, explicit_mode) = match &level.location {
            None => (
                find_section_element(file.root(), section_path).cloned(),
                None,
            ),
            Some(path) => merge_location_blocks(file.root(), path, section_path),
        };

        let owner_level = level.file == definition.declared_in;
        if let Some(element) = &element {
            if effective == OverrideMode::Deny && !owner_level {
                return Err(ConfigError::LockedSection {
                    filename: file.filename(),
                    line: element.line(),
                });
            }
            check_allow_definition(&definition, file, element)?;
        }

        let may_define = definition_permitted(&definition, file.level())
            && (owner_level || effective == OverrideMode::Allow);

        levels.push(ResolvedLevel {
            file: level.file,
            filename: file.filename(),
            file_level: file.level(),
            location: level.location.clone(),
            element,
            effective_mode: effective,
            may_define,
        });

        // A grant or lock on this level's location tag governs everything
        // more specific than it.
        if let Some(mode) = explicit_mode {
            effective = mode;
        }
    }

    Ok(ResolvedSection {
        section_path: section_path.to_string(),
        definition,
        levels,
        location: query_location.map(str::to_string),
    })
}

/// Locate a section element under a scope root by its slash-qualified path
pub fn find_section_element<'a>(scope: &'a Element, section_path: &str) -> Option<&'a Element> {
    let mut current = scope;
    for segment in section_path.split('/') {
        current = current.child(segment)?;
    }
    Some(current)
}

/// Merge every `<location path="...">` block matching `location` into one
/// section snapshot, most recently declared first
///
/// Returns the merged element (if any block contains the section) and the
/// explicit override mode of the last containing block that declares one.
/// A location tag's lock control only governs the sections written inside
/// that tag; a block without the section contributes nothing here.
fn merge_location_blocks(
    root: &Element,
    location: &str,
    section_path: &str,
) -> (Option<Element>, Option<OverrideMode>) {
    let mut merged: Option<Element> = None;
    let mut explicit_mode = None;
    for block in root
        .children_named("location")
        .filter(|b| b.attr("path").unwrap_or("") == location)
    {
        let Some(element) = find_section_element(block, section_path) else {
            continue;
        };
        if let Some(mode) = location_override_mode(block) {
            explicit_mode = Some(mode);
        }
        match &mut merged {
            None => merged = Some(element.clone()),
            Some(base) => {
                // Concatenated semantics: later blocks win on attributes
                // and append their items.
                for attribute in &element.attributes {
                    base.set_attr(&attribute.name, attribute.value.clone());
                }
                base.children.extend(element.children.iter().cloned());
            }
        }
    }
    (merged, explicit_mode)
}

/// Explicit lock control on a location tag
///
/// `overrideMode` wins over the legacy `allowOverride` boolean when both
/// appear (see [`OVERRIDE_MODE_WINS_OVER_ALLOW_OVERRIDE`]).
fn location_override_mode(block: &Element) -> Option<OverrideMode> {
    if let Some(raw) = block.attr("overrideMode") {
        if let Some(mode) = OverrideMode::parse(raw) {
            return Some(mode);
        }
    }
    match block.attr("allowOverride") {
        Some("true") => Some(OverrideMode::Allow),
        Some("false") => Some(OverrideMode::Deny),
        _ => None,
    }
}

/// Whether a section may be defined at a file level at all
fn definition_permitted(definition: &SectionDefinition, level: FileLevel) -> bool {
    match definition.allow_definition {
        AllowDefinition::Everywhere => true,
        AllowDefinition::MachineOnly => level == FileLevel::Machine,
        AllowDefinition::MachineToWebRoot => level <= FileLevel::RootWeb,
        AllowDefinition::MachineToApplication => true,
        AllowDefinition::AppHostOnly => level <= FileLevel::ApplicationHost,
    }
}

fn check_allow_definition(
    definition: &SectionDefinition,
    file: &crate::document::ConfigurationFile,
    element: &Element,
) -> ConfigResult<()> {
    if definition_permitted(definition, file.level()) {
        Ok(())
    } else {
        Err(ConfigError::DefinitionNotAllowed {
            filename: file.filename(),
            line: element.line(),
            scope: definition.allow_definition.as_str().to_string(),
        })
    }
}

/// Strict content validation for one file
///
/// Every element outside configSections must resolve to a declared section
/// or group. An undeclared element with child elements and no attributes
/// is treated as an implicit group and recursed into; any other undeclared
/// element is the unrecognized leaf the diagnostic names.
pub fn validate_file_content(
    root: &Element,
    file: &crate::document::ConfigurationFile,
    registry: &SectionRegistry,
) -> ConfigResult<()> {
    for child in &root.children {
        match child.name.as_str() {
            "configSections" => continue,
            "location" => {
                for nested in &child.children {
                    validate_element(nested, &nested.name, file, registry)?;
                }
            }
            _ => validate_element(child, &child.name, file, registry)?,
        }
    }
    Ok(())
}

fn validate_element(
    element: &Element,
    path: &str,
    file: &crate::document::ConfigurationFile,
    registry: &SectionRegistry,
) -> ConfigResult<()> {
    if registry.lookup(path).is_some() {
        // Section content is schema-tolerant; unknown attributes stay
        // readable as raw text.
        return Ok(());
    }
    if registry.is_group(path) {
        for child in &element.children {
            validate_element(child, &format!("{}/{}", path, child.name), file, registry)?;
        }
        return Ok(());
    }
    if element.attributes.is_empty() && !element.children.is_empty() {
        // Possibly a group the registry never saw; keep walking so the
        // diagnostic names the innermost offending leaf.
        for child in &element.children {
            validate_element(child, &format!("{}/{}", path, child.name), file, registry)?;
        }
        return Ok(());
    }
    Err(ConfigError::UnrecognizedElement {
        filename: file.filename(),
        line: element.line(),
        name: element.name.clone(),
        oob: oob_hint(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ConfigurationFile;

    fn arena_with(sources: &[(&str, FileLevel, &str)]) -> (FileArena, SectionRegistry) {
        let mut arena = FileArena::new();
        let mut registry = SectionRegistry::new();
        let mut parent = None;
        for (name, level, source) in sources {
            let root = crate::parser::parse_text(source).unwrap();
            let mut file = ConfigurationFile::empty(name, *level, parent);
            *file.root_mut() = root;
            let handle = arena.add(file);
            let group = registry
                .register_file(arena.get(handle).root(), name, handle)
                .unwrap();
            arena.get_mut(handle).set_section_group(group);
            parent = Some(handle);
        }
        (arena, registry)
    }

    const SERVER: &str = r#"<configuration>
  <configSections>
    <sectionGroup name="system.webServer">
      <section name="defaultDocument" overrideModeDefault="Allow" />
      <sectionGroup name="security">
        <sectionGroup name="authentication">
          <section name="windowsAuthentication" overrideModeDefault="Deny" />
        </sectionGroup>
      </sectionGroup>
    </sectionGroup>
  </configSections>
  <system.webServer>
    <defaultDocument enabled="true">
      <files>
        <add value="index.html" />
      </files>
    </defaultDocument>
  </system.webServer>
</configuration>"#;

    #[test]
    fn test_resolve_server_wide_section() {
        let (arena, registry) = arena_with(&[("applicationHost.config", FileLevel::ApplicationHost, SERVER)]);
        let chain = [Level { file: 0, location: None }];
        let resolved = resolve(
            &arena,
            &registry,
            &chain,
            "system.webServer/defaultDocument",
            None,
        )
        .unwrap();
        assert_eq!(resolved.levels.len(), 1);
        let element = resolved.levels[0].element.as_ref().unwrap();
        assert_eq!(element.attr("enabled"), Some("true"));
    }

    #[test]
    fn test_unknown_section_error() {
        let (arena, registry) = arena_with(&[("applicationHost.config", FileLevel::ApplicationHost, SERVER)]);
        let chain = [Level { file: 0, location: None }];
        let error = resolve(&arena, &registry, &chain, "system.webServer/serverRuntime", None)
            .unwrap_err();
        assert!(matches!(error, ConfigError::UnknownSection { .. }));
    }

    #[test]
    fn test_locked_section_below_owner() {
        let site = r#"<configuration>
  <system.webServer>
    <security>
      <authentication>
        <windowsAuthentication enabled="true" />
      </authentication>
    </security>
  </system.webServer>
</configuration>"#;
        let (arena, registry) = arena_with(&[
            ("applicationHost.config", FileLevel::ApplicationHost, SERVER),
            ("web.config", FileLevel::Web, site),
        ]);
        let chain = [
            Level { file: 0, location: None },
            Level { file: 0, location: Some("WebSite1".to_string()) },
            Level { file: 1, location: None },
        ];
        let error = resolve(
            &arena,
            &registry,
            &chain,
            "system.webServer/security/authentication/windowsAuthentication",
            Some("WebSite1"),
        )
        .unwrap_err();
        match error {
            ConfigError::LockedSection { filename, line } => {
                assert_eq!(filename, "web.config");
                assert_eq!(line, 5);
            }
            other => panic!("expected locked section, got {:?}", other),
        }
    }

    #[test]
    fn test_location_grant_unlocks_descendant() {
        let server = SERVER.replace(
            "</configuration>",
            "  <location path=\"WebSite1\" overrideMode=\"Allow\">\n    <system.webServer>\n      <security>\n        <authentication>\n          <windowsAuthentication />\n        </authentication>\n      </security>\n    </system.webServer>\n  </location>\n</configuration>",
        );
        let site = r#"<configuration>
  <system.webServer>
    <security>
      <authentication>
        <windowsAuthentication enabled="true" />
      </authentication>
    </security>
  </system.webServer>
</configuration>"#;
        let (arena, registry) = arena_with(&[
            ("applicationHost.config", FileLevel::ApplicationHost, &server),
            ("web.config", FileLevel::Web, site),
        ]);
        let chain = [
            Level { file: 0, location: None },
            Level { file: 0, location: Some("WebSite1".to_string()) },
            Level { file: 1, location: None },
        ];
        let resolved = resolve(
            &arena,
            &registry,
            &chain,
            "system.webServer/security/authentication/windowsAuthentication",
            Some("WebSite1"),
        )
        .unwrap();
        let site_level = resolved.levels.last().unwrap();
        assert_eq!(site_level.effective_mode, OverrideMode::Allow);
        assert_eq!(
            site_level.element.as_ref().unwrap().attr("enabled"),
            Some("true")
        );
    }

    #[test]
    fn test_legacy_allow_override_honored_when_alone() {
        let server = SERVER.replace(
            "</configuration>",
            "  <location path=\"WebSite1\" allowOverride=\"true\">\n    <system.webServer>\n      <security>\n        <authentication>\n          <windowsAuthentication />\n        </authentication>\n      </security>\n    </system.webServer>\n  </location>\n</configuration>",
        );
        let site = "<configuration>\n  <system.webServer>\n    <security>\n      <authentication>\n        <windowsAuthentication enabled=\"true\" />\n      </authentication>\n    </security>\n  </system.webServer>\n</configuration>";
        let (arena, registry) = arena_with(&[
            ("applicationHost.config", FileLevel::ApplicationHost, &server),
            ("web.config", FileLevel::Web, site),
        ]);
        let chain = [
            Level { file: 0, location: None },
            Level { file: 0, location: Some("WebSite1".to_string()) },
            Level { file: 1, location: None },
        ];
        assert!(resolve(
            &arena,
            &registry,
            &chain,
            "system.webServer/security/authentication/windowsAuthentication",
            Some("WebSite1"),
        )
        .is_ok());
    }

    #[test]
    fn test_override_mode_wins_over_legacy_attribute() {
        // The newer control locks even though the legacy one grants.
        let server = SERVER.replace(
            "</configuration>",
            "  <location path=\"WebSite1\" overrideMode=\"Deny\" allowOverride=\"true\">\n    <system.webServer>\n      <defaultDocument />\n    </system.webServer>\n  </location>\n</configuration>",
        );
        let site = "<configuration>\n  <system.webServer>\n    <defaultDocument enabled=\"false\" />\n  </system.webServer>\n</configuration>";
        let (arena, registry) = arena_with(&[
            ("applicationHost.config", FileLevel::ApplicationHost, &server),
            ("web.config", FileLevel::Web, site),
        ]);
        let chain = [
            Level { file: 0, location: None },
            Level { file: 0, location: Some("WebSite1".to_string()) },
            Level { file: 1, location: None },
        ];
        let error = resolve(
            &arena,
            &registry,
            &chain,
            "system.webServer/defaultDocument",
            Some("WebSite1"),
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::LockedSection { .. }));
    }

    #[test]
    fn test_unrecognized_element_in_chain_file() {
        let site = r#"<configuration>
  <system.webServer>
    <unknown>
      <test test="test" />
    </unknown>
  </system.webServer>
</configuration>"#;
        let (arena, registry) = arena_with(&[
            ("applicationHost.config", FileLevel::ApplicationHost, SERVER),
            ("web.config", FileLevel::Web, site),
        ]);
        let chain = [
            Level { file: 0, location: None },
            Level { file: 1, location: None },
        ];
        let error = resolve(
            &arena,
            &registry,
            &chain,
            "system.webServer/defaultDocument",
            Some("WebSite1"),
        )
        .unwrap_err();
        match error {
            ConfigError::UnrecognizedElement { filename, line, name, oob } => {
                assert_eq!(filename, "web.config");
                assert_eq!(line, 4);
                assert_eq!(name, "test");
                assert!(oob.is_none());
            }
            other => panic!("expected unrecognized element, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_section_group_tolerated() {
        let site = "<configuration>\n  <system.webServer />\n</configuration>";
        let (arena, registry) = arena_with(&[
            ("applicationHost.config", FileLevel::ApplicationHost, SERVER),
            ("web.config", FileLevel::Web, site),
        ]);
        let chain = [
            Level { file: 0, location: None },
            Level { file: 1, location: None },
        ];
        assert!(resolve(
            &arena,
            &registry,
            &chain,
            "system.webServer/security/authentication/windowsAuthentication",
            None,
        )
        .is_ok());
    }
}
