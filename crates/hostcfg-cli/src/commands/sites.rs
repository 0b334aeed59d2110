//! Sites command - list the sites in the server file

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

/// Print every site with its applications and bindings
pub fn run(config: &str, json: bool) -> Result<()> {
    let session = super::open_session(config)?;

    if json {
        let rendered: Vec<_> = session
            .sites()
            .iter()
            .map(|site| {
                json!({
                    "name": site.name,
                    "id": site.id,
                    "applications": site
                        .applications
                        .iter()
                        .map(|a| a.path.clone())
                        .collect::<Vec<_>>(),
                    "bindings": site
                        .bindings
                        .iter()
                        .map(|b| b.binding_information.clone())
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        return Ok(());
    }

    for site in session.sites() {
        match site.id {
            Some(id) => println!("{} (id {})", site.name.bold(), id),
            None => println!("{}", site.name.bold()),
        }
        for application in &site.applications {
            println!("  application {}", application.path);
        }
        for binding in &site.bindings {
            if binding.can_browse() {
                println!("  binding {} -> {}", binding.binding_information, binding.to_url());
            } else {
                println!("  binding {} ({})", binding.binding_information, binding.protocol);
            }
        }
    }
    Ok(())
}
