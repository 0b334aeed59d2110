//! Section definition registry
//!
//! The catalog of known section paths, populated by parsing configSections
//! declaration blocks from each file in the hierarchy, least specific
//! first. Resolution is declaration-driven: an element with no matching
//! declaration is an error rather than silently accepted.
//!
//! The registry is an explicit value owned by each session; there is no
//! process-wide declaration state, so independent sessions never interfere.

use crate::document::FileHandle;
use crate::element::Element;
use crate::error::{ConfigError, ConfigResult, OobHint};
use crate::value::AttributeType;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Locking default declared for a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideMode {
    Allow,
    Deny,
}

impl OverrideMode {
    /// Parse the file vocabulary (`"Allow"` / `"Deny"`)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Allow" => Some(OverrideMode::Allow),
            "Deny" => Some(OverrideMode::Deny),
            _ => None,
        }
    }
}

/// Where a section may be defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowDefinition {
    Everywhere,
    MachineOnly,
    MachineToWebRoot,
    MachineToApplication,
    AppHostOnly,
}

impl AllowDefinition {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Everywhere" => Some(AllowDefinition::Everywhere),
            "MachineOnly" => Some(AllowDefinition::MachineOnly),
            "MachineToWebRoot" => Some(AllowDefinition::MachineToWebRoot),
            "MachineToApplication" => Some(AllowDefinition::MachineToApplication),
            "AppHostOnly" => Some(AllowDefinition::AppHostOnly),
            _ => None,
        }
    }

    /// The file vocabulary spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            AllowDefinition::Everywhere => "Everywhere",
            AllowDefinition::MachineOnly => "MachineOnly",
            AllowDefinition::MachineToWebRoot => "MachineToWebRoot",
            AllowDefinition::MachineToApplication => "MachineToApplication",
            AllowDefinition::AppHostOnly => "AppHostOnly",
        }
    }
}

/// Declaration metadata for one section path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDefinition {
    /// Leaf name, e.g. `defaultDocument`
    pub name: String,
    /// Full slash-qualified path, e.g. `system.webServer/defaultDocument`
    pub path: String,
    pub override_mode_default: OverrideMode,
    pub allow_definition: AllowDefinition,
    pub allow_location: bool,
    /// File whose configSections block declared this section
    pub declared_in: FileHandle,
    /// Line of the declaration element
    pub line: usize,
}

/// A named namespace of section declarations
///
/// Forms a tree rooted at the unnamed group; used for declaration lookup
/// and enumeration, never for resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SectionGroup {
    pub name: String,
    /// Full slash-qualified path; empty for the root group
    pub path: String,
    pub sections: Vec<SectionDefinition>,
    pub groups: Vec<SectionGroup>,
}

impl SectionGroup {
    /// The empty root group
    pub fn root() -> Self {
        Self::default()
    }

    /// Flatten every definition in this group and its descendants into `list`
    pub fn get_all_definitions(&self, list: &mut Vec<SectionDefinition>) {
        list.extend(self.sections.iter().cloned());
        for group in &self.groups {
            group.get_all_definitions(list);
        }
    }

    fn ensure_group(&mut self, name: &str, path: &str) -> &mut SectionGroup {
        if let Some(index) = self.groups.iter().position(|g| g.name == name) {
            &mut self.groups[index]
        } else {
            self.groups.push(SectionGroup {
                name: name.to_string(),
                path: path.to_string(),
                ..SectionGroup::default()
            });
            self.groups.last_mut().expect("group just appended")
        }
    }
}

/// Session-wide registry of section declarations
#[derive(Debug, Clone, Default)]
pub struct SectionRegistry {
    root: SectionGroup,
    by_path: HashMap<String, SectionDefinition>,
    group_paths: HashSet<String>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the declarations from one file's configSections block
    ///
    /// Returns the group tree of declarations made in that file alone.
    /// Files are registered least specific first; redeclaring a section
    /// path that an ancestor already declared is a duplicate-section
    /// fault, which fails the registry build for the whole session.
    /// Re-opening an ancestor's group to declare new sections in it is
    /// allowed.
    pub fn register_file(
        &mut self,
        root: &Element,
        filename: &str,
        handle: FileHandle,
    ) -> ConfigResult<SectionGroup> {
        let mut file_group = SectionGroup::root();
        if let Some(config_sections) = root.child("configSections") {
            build_group(config_sections, "", &mut file_group, filename, handle)?;
        }
        self.merge(&file_group, filename)?;
        Ok(file_group)
    }

    /// Merge one file's declaration tree into the session-wide catalog
    fn merge(&mut self, incoming: &SectionGroup, filename: &str) -> ConfigResult<()> {
        for definition in &incoming.sections {
            if self.by_path.contains_key(&definition.path)
                || self.group_paths.contains(&definition.path)
            {
                return Err(ConfigError::DuplicateSection {
                    filename: filename.to_string(),
                    line: definition.line,
                    name: definition.path.clone(),
                });
            }
            self.by_path
                .insert(definition.path.clone(), definition.clone());
            ensure_group_path(&mut self.root, &incoming.path)
                .sections
                .push(definition.clone());
        }
        for group in &incoming.groups {
            if self.by_path.contains_key(&group.path) {
                // A group opened over an existing section declaration.
                let line = group.sections.first().map(|s| s.line).unwrap_or(1);
                return Err(ConfigError::DuplicateSection {
                    filename: filename.to_string(),
                    line,
                    name: group.path.clone(),
                });
            }
            self.group_paths.insert(group.path.clone());
            self.merge(group, filename)?;
        }
        Ok(())
    }

    /// Declaration for a section path, if any file declared it
    pub fn lookup(&self, path: &str) -> Option<&SectionDefinition> {
        self.by_path.get(path)
    }

    /// Whether the path names a declared section group
    pub fn is_group(&self, path: &str) -> bool {
        self.group_paths.contains(path)
    }

    /// The full declaration tree across all registered files
    pub fn root(&self) -> &SectionGroup {
        &self.root
    }

    /// The full flattened catalog, for enumeration and inspection tooling
    pub fn get_all_definitions(&self) -> Vec<SectionDefinition> {
        let mut list = Vec::new();
        self.root.get_all_definitions(&mut list);
        list
    }
}

fn join_path(group_path: &str, name: &str) -> String {
    if group_path.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", group_path, name)
    }
}

/// Parse one file's configSections block into a standalone group tree
fn build_group(
    container: &Element,
    group_path: &str,
    group: &mut SectionGroup,
    filename: &str,
    handle: FileHandle,
) -> ConfigResult<()> {
    for child in &container.children {
        match child.name.as_str() {
            "sectionGroup" => {
                // A group without a name contributes nothing.
                let Some(name) = child.attr("name") else {
                    continue;
                };
                let path = join_path(group_path, name);
                let nested = group.ensure_group(name, &path);
                build_group(child, &path, nested, filename, handle)?;
            }
            "section" => {
                let Some(name) = child.attr("name") else {
                    continue;
                };
                let path = join_path(group_path, name);
                if group.sections.iter().any(|s| s.path == path) {
                    return Err(ConfigError::DuplicateSection {
                        filename: filename.to_string(),
                        line: child.line(),
                        name: path,
                    });
                }
                group
                    .sections
                    .push(parse_section_declaration(child, name, &path, filename, handle)?);
            }
            // Declarations cannot be removed or cleared; anything else
            // inside configSections contributes nothing.
            _ => continue,
        }
    }
    Ok(())
}

fn ensure_group_path<'a>(root: &'a mut SectionGroup, path: &str) -> &'a mut SectionGroup {
    if path.is_empty() {
        return root;
    }
    let mut current = root;
    let mut walked = String::new();
    for segment in path.split('/') {
        if !walked.is_empty() {
            walked.push('/');
        }
        walked.push_str(segment);
        current = current.ensure_group(segment, &walked);
    }
    current
}

fn parse_section_declaration(
    element: &Element,
    name: &str,
    path: &str,
    filename: &str,
    handle: FileHandle,
) -> ConfigResult<SectionDefinition> {
    let override_mode_default = match element.attr("overrideModeDefault") {
        Some(raw) => OverrideMode::parse(raw).ok_or_else(|| ConfigError::Schema {
            filename: filename.to_string(),
            line: element.line(),
            message: format!("'{}' is not a valid override mode", raw),
        })?,
        None => OverrideMode::Allow,
    };
    let allow_definition = match element.attr("allowDefinition") {
        Some(raw) => AllowDefinition::parse(raw).ok_or_else(|| ConfigError::Schema {
            filename: filename.to_string(),
            line: element.line(),
            message: format!("'{}' is not a valid definition scope", raw),
        })?,
        None => AllowDefinition::Everywhere,
    };
    let allow_location = match element.attr("allowLocation") {
        Some("false") => false,
        _ => true,
    };
    Ok(SectionDefinition {
        name: name.to_string(),
        path: path.to_string(),
        override_mode_default,
        allow_definition,
        allow_location,
        declared_in: handle,
        line: element.line(),
    })
}

// === Known-attribute catalog ===
//
// The closed enumeration of known attribute names per section, with typed
// accessors and declared defaults. Attributes outside the catalog remain
// readable as raw text.

/// Declared metadata for one known attribute
#[derive(Debug)]
pub struct AttributeSchema {
    pub name: &'static str,
    pub ty: AttributeType,
    /// Default raw text used when no file in the chain sets the attribute
    pub default_text: Option<&'static str>,
}

/// Declared metadata for one mergeable collection
#[derive(Debug)]
pub struct CollectionSchema {
    /// Child element holding the items; empty when items sit directly
    /// under the section element
    pub name: &'static str,
    /// Attribute that identifies an item for replace/remove by key
    pub key: &'static str,
}

/// Known attributes and collections of one section path
#[derive(Debug)]
pub struct SectionSchema {
    pub path: &'static str,
    pub attributes: &'static [AttributeSchema],
    pub collections: &'static [CollectionSchema],
}

const KNOWN_SECTIONS: &[SectionSchema] = &[
    SectionSchema {
        path: "system.webServer/defaultDocument",
        attributes: &[AttributeSchema {
            name: "enabled",
            ty: AttributeType::Bool,
            default_text: Some("true"),
        }],
        collections: &[CollectionSchema {
            name: "files",
            key: "value",
        }],
    },
    SectionSchema {
        path: "system.webServer/security/authentication/anonymousAuthentication",
        attributes: &[
            AttributeSchema {
                name: "enabled",
                ty: AttributeType::Bool,
                default_text: Some("true"),
            },
            AttributeSchema {
                name: "userName",
                ty: AttributeType::String,
                default_text: Some("IUSR"),
            },
        ],
        collections: &[],
    },
    SectionSchema {
        path: "system.webServer/security/authentication/basicAuthentication",
        attributes: &[AttributeSchema {
            name: "enabled",
            ty: AttributeType::Bool,
            default_text: Some("false"),
        }],
        collections: &[],
    },
    SectionSchema {
        path: "system.webServer/security/authentication/windowsAuthentication",
        attributes: &[AttributeSchema {
            name: "enabled",
            ty: AttributeType::Bool,
            default_text: Some("false"),
        }],
        collections: &[CollectionSchema {
            name: "providers",
            key: "value",
        }],
    },
    SectionSchema {
        path: "system.webServer/handlers",
        attributes: &[AttributeSchema {
            name: "accessPolicy",
            ty: AttributeType::String,
            default_text: None,
        }],
        collections: &[CollectionSchema {
            name: "",
            key: "name",
        }],
    },
    SectionSchema {
        path: "system.webServer/httpErrors",
        attributes: &[AttributeSchema {
            name: "errorMode",
            ty: AttributeType::Enum(&[
                ("DetailedLocalOnly", 0),
                ("Custom", 1),
                ("Detailed", 2),
            ]),
            default_text: Some("DetailedLocalOnly"),
        }],
        collections: &[CollectionSchema {
            name: "",
            key: "statusCode",
        }],
    },
];

/// Catalog entry for a section path, if it is a known section
pub fn known_schema(path: &str) -> Option<&'static SectionSchema> {
    KNOWN_SECTIONS.iter().find(|s| s.path == path)
}

// === Out-of-band module table ===
//
// Sections shipped by optional server modules. When a file references one
// of these paths without a declaration, the diagnostic carries the module
// name and an installation link instead of a bare unrecognized-element
// message.

struct OobModule {
    prefix: &'static str,
    name: &'static str,
    link: &'static str,
}

const OOB_MODULES: &[OobModule] = &[
    OobModule {
        prefix: "system.webServer/webFarms",
        name: "Application Request Routing Module",
        link: "https://docs.microsoft.com/en-us/iis/extensions/configuring-application-request-routing-arr/define-and-configure-an-application-request-routing-server-farm#prerequisites",
    },
    OobModule {
        prefix: "system.webServer/rewrite",
        name: "URL Rewrite Module",
        link: "https://docs.microsoft.com/en-us/iis/extensions/url-rewrite-module/using-the-url-rewrite-module",
    },
];

/// Out-of-band module hint for a section or group path, if any
pub fn oob_hint(path: &str) -> Option<OobHint> {
    OOB_MODULES
        .iter()
        .find(|m| path == m.prefix || path.starts_with(&format!("{}/", m.prefix)))
        .map(|m| OobHint {
            module: format!("{} ({}/)", m.name, m.prefix),
            link: m.link.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;

    fn registry_from(source: &str) -> ConfigResult<(SectionRegistry, SectionGroup)> {
        let root = parse_text(source).unwrap();
        let mut registry = SectionRegistry::new();
        let file_group = registry.register_file(&root, "applicationHost.config", 0)?;
        Ok((registry, file_group))
    }

    const DECLARATIONS: &str = r#"<configuration>
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
</configuration>"#;

    #[test]
    fn test_register_builds_paths() {
        let (registry, file_group) = registry_from(DECLARATIONS).unwrap();
        let definition = registry
            .lookup("system.webServer/security/authentication/windowsAuthentication")
            .unwrap();
        assert_eq!(definition.override_mode_default, OverrideMode::Deny);
        assert_eq!(definition.name, "windowsAuthentication");
        assert!(registry.is_group("system.webServer/security"));

        assert_eq!(file_group.groups.len(), 1);
        let mut list = Vec::new();
        file_group.get_all_definitions(&mut list);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_lookup_unknown_path() {
        let (registry, _) = registry_from(DECLARATIONS).unwrap();
        assert!(registry.lookup("system.webServer/serverRuntime").is_none());
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let source = r#"<configuration>
  <configSections>
    <sectionGroup name="system.webServer">
      <section name="defaultDocument" />
      <section name="defaultDocument" />
    </sectionGroup>
  </configSections>
</configuration>"#;
        let error = registry_from(source).unwrap_err();
        match error {
            ConfigError::DuplicateSection { name, line, .. } => {
                assert_eq!(name, "system.webServer/defaultDocument");
                assert_eq!(line, 5);
            }
            other => panic!("expected duplicate section, got {:?}", other),
        }
    }

    #[test]
    fn test_redeclaration_across_files_rejected() {
        let (mut registry, _) = registry_from(DECLARATIONS).unwrap();
        let child = parse_text(
            r#"<configuration>
  <configSections>
    <sectionGroup name="system.webServer">
      <section name="defaultDocument" overrideModeDefault="Deny" />
    </sectionGroup>
  </configSections>
</configuration>"#,
        )
        .unwrap();
        let error = registry.register_file(&child, "web.config", 1).unwrap_err();
        match error {
            ConfigError::DuplicateSection { filename, name, .. } => {
                assert_eq!(filename, "web.config");
                assert_eq!(name, "system.webServer/defaultDocument");
            }
            other => panic!("expected duplicate section, got {:?}", other),
        }
    }

    #[test]
    fn test_nameless_group_is_skipped() {
        let source = r#"<configuration>
  <configSections>
    <sectionGroup>
      <section name="orphan" />
    </sectionGroup>
    <sectionGroup name="system.webServer">
      <section name="defaultDocument" />
    </sectionGroup>
  </configSections>
</configuration>"#;
        let (registry, _) = registry_from(source).unwrap();
        assert!(registry.lookup("orphan").is_none());
        assert!(registry.lookup("system.webServer/defaultDocument").is_some());
    }

    #[test]
    fn test_invalid_override_mode_is_schema_error() {
        let source = r#"<configuration>
  <configSections>
    <section name="x" overrideModeDefault="Maybe" />
  </configSections>
</configuration>"#;
        let error = registry_from(source).unwrap_err();
        match error {
            ConfigError::Schema { message, line, .. } => {
                assert_eq!(message, "'Maybe' is not a valid override mode");
                assert_eq!(line, 3);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_oob_hint_matches_prefix() {
        let hint = oob_hint("system.webServer/webFarms/unknownChild").unwrap();
        assert_eq!(
            hint.module,
            "Application Request Routing Module (system.webServer/webFarms/)"
        );
        assert!(oob_hint("system.webServer/defaultDocument").is_none());
    }

    #[test]
    fn test_known_schema_defaults() {
        let schema = known_schema("system.webServer/defaultDocument").unwrap();
        assert_eq!(schema.attributes[0].default_text, Some("true"));
        assert_eq!(schema.collections[0].key, "value");
    }
}
