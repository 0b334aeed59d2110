//! Sections command - list every declared section in the hierarchy

use anyhow::Result;
use colored::Colorize;
use hostcfg_core::OverrideMode;

/// Print the flattened declaration catalog
pub fn run(config: &str, json: bool) -> Result<()> {
    let session = super::open_session(config)?;
    let mut definitions = session.get_all_definitions();
    definitions.sort_by(|a, b| a.path.cmp(&b.path));

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    for definition in &definitions {
        let lock = match definition.override_mode_default {
            OverrideMode::Allow => "Allow".green(),
            OverrideMode::Deny => "Deny".red(),
        };
        println!(
            "{}  (overrideModeDefault={}, allowDefinition={})",
            definition.path.cyan(),
            lock,
            definition.allow_definition.as_str()
        );
    }
    println!("{} sections declared", definitions.len());
    Ok(())
}
