//! Get command - resolve a section and print its effective values

use anyhow::Result;
use colored::Colorize;
use hostcfg_core::{known_schema, SectionView};
use serde_json::json;

/// Resolve one section at a location and print it
pub fn run(config: &str, section_path: &str, location: Option<&str>, json: bool) -> Result<()> {
    let mut session = super::open_session(config)?;
    let section = match location {
        Some(location) => session.get_section_at(section_path, location),
        None => session.get_section(section_path),
    }?;

    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&section))?);
    } else {
        print_human(&section);
    }
    Ok(())
}

fn to_json(section: &SectionView) -> serde_json::Value {
    let attributes: serde_json::Map<String, serde_json::Value> = section
        .attribute_names()
        .into_iter()
        .filter_map(|name| {
            section
                .raw(&name)
                .map(|value| (name, serde_json::Value::String(value)))
        })
        .collect();
    let collections: serde_json::Map<String, serde_json::Value> = known_schema(
        section.section_path(),
    )
    .map(|schema| {
        schema
            .collections
            .iter()
            .filter_map(|collection| {
                let items = section.get_collection(collection.name).ok()?;
                let rendered: Vec<_> = items
                    .iter()
                    .map(|item| {
                        let attributes: serde_json::Map<String, serde_json::Value> = item
                            .attributes
                            .iter()
                            .map(|(name, value)| {
                                (name.clone(), serde_json::Value::String(value.clone()))
                            })
                            .collect();
                        json!({
                            "attributes": attributes,
                            "origin": item.origin_filename,
                            "isLocallyStored": item.is_locally_stored,
                        })
                    })
                    .collect();
                Some((collection.name.to_string(), serde_json::Value::Array(rendered)))
            })
            .collect()
    })
    .unwrap_or_default();

    json!({
        "section": section.section_path(),
        "location": section.location(),
        "file": section.file_name(),
        "attributes": attributes,
        "collections": collections,
    })
}

fn print_human(section: &SectionView) {
    println!("{}", section.section_path().bold());
    match section.location() {
        Some(location) if !location.is_empty() => println!("  location: {}", location),
        Some(_) => println!("  location: (site defaults)"),
        None => println!("  location: (server-wide)"),
    }
    println!("  file: {}", section.file_name());

    for name in section.attribute_names() {
        let Some(value) = section.raw(&name) else {
            continue;
        };
        let marker = if section.is_attribute_local(&name) {
            "local".green()
        } else {
            "inherited".dimmed()
        };
        println!("  {} = {} ({})", name.cyan(), value, marker);
    }

    let Some(schema) = known_schema(section.section_path()) else {
        return;
    };
    for collection in schema.collections {
        let Ok(items) = section.get_collection(collection.name) else {
            continue;
        };
        let label = if collection.name.is_empty() {
            "(items)"
        } else {
            collection.name
        };
        println!("  {} [{}]", label.bold(), items.count());
        for item in items.iter() {
            let key = item.get(collection.key).unwrap_or("?");
            let marker = if item.is_locally_stored {
                "local".green()
            } else {
                "inherited".dimmed()
            };
            println!("    {} ({})", key, marker);
        }
    }
}
