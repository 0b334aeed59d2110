//! Commit pipeline
//!
//! Section views stage mutations as change records; nothing touches a file
//! tree until commit. At commit time every staged record is applied to the
//! owning file, the file is re-validated against the registry, and written
//! back atomically. Commit is all-or-nothing per file; cross-file
//! atomicity is not guaranteed, and a failure names the failing file
//! without rolling back files already written.

use crate::document::{FileArena, FileHandle};
use crate::element::Element;
use crate::error::{ConfigError, ConfigResult};
use crate::resolver::validate_file_content;
use crate::schema::SectionRegistry;
use crate::span::Span;

/// One staged mutation, routed to the file that owns the affected element
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    /// File the mutation writes to
    pub file: FileHandle,
    /// `<location path="...">` scope inside that file, or the global scope
    pub location: Option<String>,
    /// Slash-qualified section path
    pub section_path: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone)]
pub enum ChangeKind {
    /// Set an attribute on the section element
    ///
    /// `inherited` is the effective value the attribute would have without
    /// a local copy. Writing a value equal to it removes the local copy
    /// instead (write-through elision); the location scope created for the
    /// write is still materialized.
    SetAttribute {
        name: String,
        value: String,
        inherited: Option<String>,
    },
    /// Append or replace-by-key an item in a collection
    AddItem {
        collection: String,
        key_attr: String,
        attrs: Vec<(String, String)>,
    },
    /// Delete an item from the file that introduced it
    RemoveItem {
        collection: String,
        key_attr: String,
        key: String,
    },
    /// Empty a collection and record a clear directive
    ClearItems { collection: String, key_attr: String },
}

/// Mutations staged by every view handed out by one session
#[derive(Debug, Default)]
pub struct ChangeSet {
    records: Vec<ChangeRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn take(&mut self) -> Vec<ChangeRecord> {
        std::mem::take(&mut self.records)
    }
}

/// Apply every staged record and write the touched files back
///
/// Returns the handles of the files written, in first-touched order.
pub fn commit(
    arena: &mut FileArena,
    registry: &SectionRegistry,
    records: Vec<ChangeRecord>,
) -> ConfigResult<Vec<FileHandle>> {
    // Group records per file, preserving both record order and the order
    // files were first touched.
    let mut touched: Vec<(FileHandle, Vec<ChangeRecord>)> = Vec::new();
    for record in records {
        match touched.iter_mut().find(|(file, _)| *file == record.file) {
            Some((_, group)) => group.push(record),
            None => touched.push((record.file, vec![record])),
        }
    }

    let mut written = Vec::new();
    for (handle, group) in touched {
        // Work on a copy so a failed record leaves the session intact.
        let mut root = arena.get(handle).root().clone();
        let filename = arena.get(handle).filename();
        for record in &group {
            apply_record(&mut root, record, &filename)?;
        }
        // No commit may leave a file referencing an undeclared section.
        validate_file_content(&root, arena.get(handle), registry).map_err(|e| {
            ConfigError::Commit {
                filename: filename.clone(),
                message: e.to_string(),
            }
        })?;
        let file = arena.get_mut(handle);
        *file.root_mut() = root;
        file.save()?;
        written.push(handle);
    }
    Ok(written)
}

/// Apply one record to a file tree
fn apply_record(root: &mut Element, record: &ChangeRecord, filename: &str) -> ConfigResult<()> {
    match &record.kind {
        ChangeKind::SetAttribute {
            name,
            value,
            inherited,
        } => {
            let elided = inherited
                .as_deref()
                .is_some_and(|i| i.eq_ignore_ascii_case(value));
            let scope = scope_element(root, record.location.as_deref());
            if elided {
                // Keep the location scope, drop any local copy of the value.
                if let Some(section) = find_section_mut(scope, &record.section_path) {
                    section.remove_attr(name);
                }
            } else {
                section_element(scope, &record.section_path).set_attr(name, value.clone());
            }
            Ok(())
        }
        ChangeKind::AddItem {
            collection,
            key_attr,
            attrs,
        } => {
            let scope = scope_element(root, record.location.as_deref());
            let container = container_element(scope, &record.section_path, collection);
            let key = attrs
                .iter()
                .find(|(name, _)| name == key_attr)
                .map(|(_, value)| value.clone())
                .unwrap_or_default();
            let existing = container
                .children
                .iter_mut()
                .find(|c| c.name == "add" && c.attr(key_attr) == Some(key.as_str()));
            match existing {
                Some(item) => {
                    item.attributes.clear();
                    for (name, value) in attrs {
                        item.set_attr(name, value.clone());
                    }
                }
                None => {
                    let mut item = Element::new("add", Span::dummy());
                    for (name, value) in attrs {
                        item.set_attr(name, value.clone());
                    }
                    container.children.push(item);
                }
            }
            Ok(())
        }
        ChangeKind::RemoveItem {
            collection,
            key_attr,
            key,
        } => {
            let scope = scope_element(root, record.location.as_deref());
            let container = find_section_mut(scope, &record.section_path)
                .and_then(|section| {
                    if collection.is_empty() {
                        Some(section)
                    } else {
                        section.child_mut(collection)
                    }
                })
                .ok_or_else(|| ConfigError::Commit {
                    filename: filename.to_string(),
                    message: format!(
                        "The collection '{}' no longer exists in section '{}'",
                        collection, record.section_path
                    ),
                })?;
            let position = container
                .children
                .iter()
                .position(|c| c.name == "add" && c.attr(key_attr) == Some(key.as_str()))
                .ok_or_else(|| ConfigError::Commit {
                    filename: filename.to_string(),
                    message: format!("The collection item '{}' no longer exists", key),
                })?;
            container.children.remove(position);
            Ok(())
        }
        ChangeKind::ClearItems { collection, .. } => {
            let scope = scope_element(root, record.location.as_deref());
            let container = container_element(scope, &record.section_path, collection);
            container
                .children
                .retain(|c| !matches!(c.name.as_str(), "add" | "remove" | "clear"));
            container.children.insert(0, Element::new("clear", Span::dummy()));
            Ok(())
        }
    }
}

/// The scope root a record writes under, creating the location block if needed
///
/// When a file carries several blocks for the same path, the most recently
/// declared one receives the write.
fn scope_element<'a>(root: &'a mut Element, location: Option<&str>) -> &'a mut Element {
    let Some(path) = location else {
        return root;
    };
    let index = root
        .children
        .iter()
        .rposition(|c| c.name == "location" && c.attr("path").unwrap_or("") == path);
    match index {
        Some(index) => &mut root.children[index],
        None => {
            let mut block = Element::new("location", Span::dummy());
            block.set_attr("path", path);
            root.children.push(block);
            root.children.last_mut().expect("location just appended")
        }
    }
}

/// Find the section element under a scope without creating anything
fn find_section_mut<'a>(scope: &'a mut Element, section_path: &str) -> Option<&'a mut Element> {
    let mut current = scope;
    for segment in section_path.split('/') {
        current = current.child_mut(segment)?;
    }
    Some(current)
}

/// Find or create the section element chain under a scope
fn section_element<'a>(scope: &'a mut Element, section_path: &str) -> &'a mut Element {
    let mut current = scope;
    for segment in section_path.split('/') {
        current = current.ensure_child(segment);
    }
    current
}

/// Find or create a collection container under a section
fn container_element<'a>(
    scope: &'a mut Element,
    section_path: &str,
    collection: &str,
) -> &'a mut Element {
    let section = section_element(scope, section_path);
    if collection.is_empty() {
        section
    } else {
        section.ensure_child(collection)
    }
}
