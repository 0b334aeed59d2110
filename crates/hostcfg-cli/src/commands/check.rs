//! Check command - validate the hierarchy's files against declarations

use anyhow::Result;
use colored::Colorize;

/// Validate the server file and every site's web.config
///
/// Prints each fault in the standard diagnostic format and exits
/// non-zero if any file is invalid.
pub fn run(config: &str) -> Result<()> {
    let mut session = super::open_session(config)?;

    let mut faults = 0;
    if let Err(error) = session.check_location(None) {
        eprintln!("{}", error);
        faults += 1;
    }
    let sites: Vec<String> = session.sites().iter().map(|s| s.name.clone()).collect();
    for site in &sites {
        if let Err(error) = session.check_location(Some(site)) {
            eprintln!("{}", error);
            faults += 1;
        }
    }

    if faults > 0 {
        anyhow::bail!("{} invalid configuration scope(s)", faults);
    }
    println!("{}: {}", config, "no errors found".green());
    Ok(())
}
