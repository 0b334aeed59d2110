//! Section views
//!
//! The resolved, read/write projection of one section at one location:
//! flattened attribute values (closest non-inherited value wins) and
//! merged child collections, each item tagged with the file that
//! introduced it. Views are snapshots; mutations are staged against the
//! session's change set and only touch files at commit time, so a
//! discarded session leaves every file byte-for-byte unchanged.

use crate::commit::{ChangeKind, ChangeRecord, ChangeSet};
use crate::document::FileHandle;
use crate::element::Element;
use crate::error::{ConfigError, ConfigResult};
use crate::resolver::{ResolvedLevel, ResolvedSection};
use crate::schema::{known_schema, SectionSchema};
use crate::value::{AttributeType, AttributeValue};
use std::cell::RefCell;
use std::rc::Rc;

/// Read/write projection of one resolved section
#[derive(Debug)]
pub struct SectionView {
    resolved: ResolvedSection,
    /// Number of levels visible to this view; parent views see one fewer
    view_len: usize,
    schema: Option<&'static SectionSchema>,
    changes: Rc<RefCell<ChangeSet>>,
}

/// One merged collection item with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionItem {
    /// Raw attributes of the item element, in declaration order
    pub attributes: Vec<(String, String)>,
    /// File that introduced the item
    pub origin: FileHandle,
    pub origin_filename: String,
    /// Location scope within the origin file, if any
    pub origin_location: Option<String>,
    /// Whether the item originates at this view's own level
    pub is_locally_stored: bool,
}

impl CollectionItem {
    /// Raw text of one attribute
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A merged, mutable collection of one section view
pub struct CollectionView {
    /// Container element name; empty when items sit directly under the
    /// section element
    collection: String,
    key_attr: String,
    items: Vec<CollectionItem>,
    section_path: String,
    edit_file: FileHandle,
    edit_filename: String,
    edit_location: Option<String>,
    changes: Rc<RefCell<ChangeSet>>,
}

impl SectionView {
    pub(crate) fn new(resolved: ResolvedSection, changes: Rc<RefCell<ChangeSet>>) -> Self {
        let schema = known_schema(&resolved.section_path);
        let view_len = resolved.levels.len();
        Self {
            resolved,
            view_len,
            schema,
            changes,
        }
    }

    /// Slash-qualified section path
    pub fn section_path(&self) -> &str {
        &self.resolved.section_path
    }

    /// The location scope this view was resolved for
    ///
    /// The full view reports the query location; parent views report the
    /// location of their own most specific level.
    pub fn location(&self) -> Option<&str> {
        if self.view_len == self.resolved.levels.len() {
            self.resolved.location.as_deref()
        } else {
            self.levels()
                .last()
                .and_then(|l| l.location.as_deref())
        }
    }

    /// The file backing this view: the most specific contributing file,
    /// or the least specific level when nothing contributed
    pub fn file(&self) -> FileHandle {
        self.context_level().file
    }

    /// Diagnostic name of the backing file
    pub fn file_name(&self) -> &str {
        &self.context_level().filename
    }

    /// The next-less-specific view in the chain, or none at the root
    pub fn parent_element(&self) -> Option<SectionView> {
        if self.view_len <= 1 {
            return None;
        }
        Some(SectionView {
            resolved: self.resolved.clone(),
            view_len: self.view_len - 1,
            schema: self.schema,
            changes: Rc::clone(&self.changes),
        })
    }

    // === Typed reads ===

    /// Effective boolean attribute
    pub fn get_bool(&self, name: &str) -> ConfigResult<bool> {
        match self.typed(name, AttributeType::Bool)? {
            AttributeValue::Bool(value) => Ok(value),
            _ => unreachable!("bool parse yields bool"),
        }
    }

    /// Effective integer attribute
    pub fn get_int(&self, name: &str) -> ConfigResult<i64> {
        match self.typed(name, AttributeType::Int)? {
            AttributeValue::Int(value) => Ok(value),
            _ => unreachable!("int parse yields int"),
        }
    }

    /// Effective string attribute
    pub fn get_str(&self, name: &str) -> ConfigResult<String> {
        Ok(self.typed(name, AttributeType::String)?.to_raw())
    }

    /// Raw text of an attribute, with no schema involved
    ///
    /// This is the fallback path for attributes outside the known
    /// catalog, e.g. vendor extensions.
    pub fn raw(&self, name: &str) -> Option<String> {
        self.effective_raw(name).map(|(raw, _)| raw)
    }

    /// Every attribute name set anywhere in the chain, most specific
    /// level first, without duplicates
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for level in self.levels().iter().rev() {
            let Some(element) = &level.element else {
                continue;
            };
            for attribute in &element.attributes {
                if !names.contains(&attribute.name) {
                    names.push(attribute.name.clone());
                }
            }
        }
        names
    }

    /// Whether the effective value of an attribute is stored at this
    /// view's own level rather than inherited
    pub fn is_attribute_local(&self, name: &str) -> bool {
        self.effective_raw(name)
            .map(|(_, level_index)| level_index + 1 == self.view_len)
            .unwrap_or(false)
    }

    // === Staged writes ===

    /// Stage a boolean attribute write
    pub fn set_bool(&mut self, name: &str, value: bool) -> ConfigResult<()> {
        self.set_raw(name, if value { "true" } else { "false" })
    }

    /// Stage an integer attribute write
    pub fn set_int(&mut self, name: &str, value: i64) -> ConfigResult<()> {
        self.set_raw(name, &value.to_string())
    }

    /// Stage a string attribute write
    pub fn set_str(&mut self, name: &str, value: &str) -> ConfigResult<()> {
        self.set_raw(name, value)
    }

    /// Stage an attribute write against the most specific editable level
    ///
    /// A value that was previously purely inherited materializes a local
    /// copy in that level's file; writing the inherited value itself only
    /// materializes the scope.
    pub fn set_raw(&mut self, name: &str, value: &str) -> ConfigResult<()> {
        let edit = self.edit_level()?;
        let inherited = self.inherited_raw(name, edit);
        let record = ChangeRecord {
            file: self.level(edit).file,
            location: self.level(edit).location.clone(),
            section_path: self.resolved.section_path.clone(),
            kind: ChangeKind::SetAttribute {
                name: name.to_string(),
                value: value.to_string(),
                inherited,
            },
        };
        self.changes.borrow_mut().push(record);
        // Keep the snapshot coherent for later reads from this view.
        let section_path = self.resolved.section_path.clone();
        let level = &mut self.resolved.levels[edit];
        let element = level
            .element
            .get_or_insert_with(|| synthesize_section(&section_path));
        element.set_attr(name, value);
        Ok(())
    }

    /// Merged view of a named collection
    pub fn get_collection(&self, name: &str) -> ConfigResult<CollectionView> {
        let key_attr = self
            .schema
            .and_then(|s| s.collections.iter().find(|c| c.name == name))
            .map(|c| c.key)
            .unwrap_or("value")
            .to_string();
        let edit = self.edit_level()?;
        Ok(CollectionView {
            collection: name.to_string(),
            key_attr: key_attr.clone(),
            items: self.merge_collection(name, &key_attr),
            section_path: self.resolved.section_path.clone(),
            edit_file: self.level(edit).file,
            edit_filename: self.level(edit).filename.clone(),
            edit_location: self.level(edit).location.clone(),
            changes: Rc::clone(&self.changes),
        })
    }

    // === Internals ===

    fn levels(&self) -> &[ResolvedLevel] {
        &self.resolved.levels[..self.view_len]
    }

    fn level(&self, index: usize) -> &ResolvedLevel {
        &self.resolved.levels[index]
    }

    /// Most specific level with content, or the least specific level
    fn context_level(&self) -> &ResolvedLevel {
        self.levels()
            .iter()
            .rev()
            .find(|l| l.element.is_some())
            .unwrap_or(&self.resolved.levels[0])
    }

    /// Most specific level a write may materialize the section in
    fn edit_level(&self) -> ConfigResult<usize> {
        self.levels()
            .iter()
            .rposition(|l| l.may_define)
            .ok_or_else(|| {
                let last = self.levels().last().expect("resolved views have levels");
                ConfigError::LockedSection {
                    filename: last.filename.clone(),
                    line: last.element.as_ref().map(|e| e.line()).unwrap_or(1),
                }
            })
    }

    /// Effective raw attribute text and the level that supplies it
    fn effective_raw(&self, name: &str) -> Option<(String, usize)> {
        for (index, level) in self.levels().iter().enumerate().rev() {
            if let Some(raw) = level.element.as_ref().and_then(|e| e.attr(name)) {
                return Some((raw.to_string(), index));
            }
        }
        None
    }

    /// Effective raw value excluding one level's contribution
    fn inherited_raw(&self, name: &str, excluded: usize) -> Option<String> {
        for (index, level) in self.levels().iter().enumerate().rev() {
            if index == excluded {
                continue;
            }
            if let Some(raw) = level.element.as_ref().and_then(|e| e.attr(name)) {
                return Some(raw.to_string());
            }
        }
        self.schema_default(name)
    }

    fn schema_default(&self, name: &str) -> Option<String> {
        self.schema
            .and_then(|s| s.attributes.iter().find(|a| a.name == name))
            .and_then(|a| a.default_text)
            .map(str::to_string)
    }

    fn typed(&self, name: &str, ty: AttributeType) -> ConfigResult<AttributeValue> {
        // The catalog's declared type wins over the accessor's type; a
        // mismatch between the two is a schema fault, not a coercion.
        let declared = self
            .schema
            .and_then(|s| s.attributes.iter().find(|a| a.name == name))
            .map(|a| a.ty)
            .unwrap_or(ty);
        let raw = self
            .effective_raw(name)
            .map(|(raw, _)| raw)
            .or_else(|| self.schema_default(name))
            .ok_or_else(|| ConfigError::Schema {
                filename: self.file_name().to_string(),
                line: self.context_level().element.as_ref().map(|e| e.line()).unwrap_or(1),
                message: format!("Missing required attribute '{}'", name),
            })?;
        let parsed = AttributeValue::parse(&raw, declared).map_err(|message| {
            ConfigError::Schema {
                filename: self.file_name().to_string(),
                line: self.context_level().element.as_ref().map(|e| e.line()).unwrap_or(1),
                message,
            }
        })?;
        // Re-parse under the accessor's type when the catalog is silent.
        if declared == ty {
            Ok(parsed)
        } else {
            AttributeValue::parse(&raw, ty).map_err(|message| ConfigError::Schema {
                filename: self.file_name().to_string(),
                line: self.context_level().element.as_ref().map(|e| e.line()).unwrap_or(1),
                message,
            })
        }
    }

    /// Merge a collection outward-in: each more specific level's clear
    /// empties the accumulated list, removes delete by key, and adds are
    /// presented before inherited items, in declaration order
    fn merge_collection(&self, name: &str, key_attr: &str) -> Vec<CollectionItem> {
        let mut accumulated: Vec<CollectionItem> = Vec::new();
        for (index, level) in self.levels().iter().enumerate() {
            let Some(element) = &level.element else {
                continue;
            };
            // Merged duplicate location blocks can leave several sibling
            // containers at one level; their items concatenate.
            let containers: Vec<&Element> = if name.is_empty() {
                vec![element]
            } else {
                element.children_named(name).collect()
            };
            if containers.is_empty() {
                continue;
            }
            let mut local_block: Vec<CollectionItem> = Vec::new();
            for child in containers.iter().flat_map(|c| &c.children) {
                match child.name.as_str() {
                    "clear" => {
                        accumulated.clear();
                        local_block.clear();
                    }
                    "remove" => {
                        let key = child.attr(key_attr).unwrap_or_default().to_string();
                        accumulated.retain(|item| item.get(key_attr) != Some(key.as_str()));
                        local_block.retain(|item| item.get(key_attr) != Some(key.as_str()));
                    }
                    "add" => {
                        let item = CollectionItem {
                            attributes: child
                                .attributes
                                .iter()
                                .map(|a| (a.name.clone(), a.value.clone()))
                                .collect(),
                            origin: level.file,
                            origin_filename: level.filename.clone(),
                            origin_location: level.location.clone(),
                            is_locally_stored: index + 1 == self.view_len,
                        };
                        let key = child.attr(key_attr);
                        accumulated.retain(|existing| existing.get(key_attr) != key);
                        if let Some(position) = local_block
                            .iter()
                            .position(|existing| existing.get(key_attr) == key)
                        {
                            local_block[position] = item;
                        } else {
                            local_block.push(item);
                        }
                    }
                    _ => {}
                }
            }
            // More specific items are presented first.
            local_block.extend(accumulated);
            accumulated = local_block;
        }
        accumulated
    }
}

impl CollectionView {
    /// Number of merged items
    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item by merged index
    pub fn get(&self, index: usize) -> &CollectionItem {
        &self.items[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionItem> {
        self.items.iter()
    }

    /// Stage an item addition (or replace-by-key) at this view's level
    pub fn add(&mut self, attrs: Vec<(String, String)>) {
        self.changes.borrow_mut().push(ChangeRecord {
            file: self.edit_file,
            location: self.edit_location.clone(),
            section_path: self.section_path.clone(),
            kind: ChangeKind::AddItem {
                collection: self.collection.clone(),
                key_attr: self.key_attr.clone(),
                attrs: attrs.clone(),
            },
        });
        if let Some(key) = attrs
            .iter()
            .find(|(name, _)| *name == self.key_attr)
            .map(|(_, value)| value.clone())
        {
            self.items
                .retain(|item| item.get(&self.key_attr) != Some(key.as_str()));
        }
        let local_count = self.items.iter().filter(|i| i.is_locally_stored).count();
        self.items.insert(
            local_count,
            CollectionItem {
                attributes: attrs,
                origin: self.edit_file,
                origin_filename: self.edit_filename.clone(),
                origin_location: self.edit_location.clone(),
                is_locally_stored: true,
            },
        );
    }

    /// Stage removal of the item at `index`
    ///
    /// The delete is routed to the file that introduced the item, never
    /// to a copy elsewhere in the hierarchy.
    pub fn remove_at(&mut self, index: usize) -> ConfigResult<()> {
        if index >= self.items.len() {
            return Err(ConfigError::Commit {
                filename: String::new(),
                message: format!("Collection index {} is out of range", index),
            });
        }
        let item = self.items.remove(index);
        let key = item
            .get(&self.key_attr)
            .unwrap_or_default()
            .to_string();
        self.changes.borrow_mut().push(ChangeRecord {
            file: item.origin,
            location: item.origin_location.clone(),
            section_path: self.section_path.clone(),
            kind: ChangeKind::RemoveItem {
                collection: self.collection.clone(),
                key_attr: self.key_attr.clone(),
                key,
            },
        });
        Ok(())
    }

    /// Stage a clear directive at this view's level and drop every item
    pub fn clear(&mut self) {
        self.items.clear();
        self.changes.borrow_mut().push(ChangeRecord {
            file: self.edit_file,
            location: self.edit_location.clone(),
            section_path: self.section_path.clone(),
            kind: ChangeKind::ClearItems {
                collection: self.collection.clone(),
                key_attr: self.key_attr.clone(),
            },
        });
    }
}

impl std::ops::Index<usize> for CollectionView {
    type Output = CollectionItem;

    fn index(&self, index: usize) -> &CollectionItem {
        &self.items[index]
    }
}

/// Empty section element snapshot for a freshly staged write
fn synthesize_section(section_path: &str) -> Element {
    let name = section_path.rsplit('/').next().unwrap_or(section_path);
    Element::new(name, crate::span::Span::dummy())
}
