use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

/// Hierarchical web-server configuration inspector.
///
/// Hostcfg resolves sections across a configuration hierarchy (machine
/// defaults, server file, per-site overrides) with full locking and
/// inheritance semantics, and reports structural faults with file and
/// line information.
///
/// EXAMPLES:
///     hostcfg get applicationHost.config system.webServer/defaultDocument
///     hostcfg get applicationHost.config system.webServer/handlers --location WebSite1
///     hostcfg sections applicationHost.config --json
///     hostcfg check applicationHost.config
///     hostcfg sites applicationHost.config
///
/// ENVIRONMENT VARIABLES:
///     HOSTCFG_JSON   Set to '1' for JSON output by default
///     NO_COLOR       Set to disable colored output
#[derive(Parser)]
#[command(name = "hostcfg")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a section and print its effective values
    ///
    /// Walks the file chain for the location, applies locking and merge
    /// rules, and prints every effective attribute and collection item
    /// with its origin.
    #[command(visible_alias = "g")]
    Get {
        /// Path to the server-level configuration file
        config: String,
        /// Slash-qualified section path
        section: String,
        /// Location to resolve at (site or site/app); server-wide if omitted
        #[arg(long, short = 'l')]
        location: Option<String>,
        /// Output as JSON
        #[arg(long, env = "HOSTCFG_JSON")]
        json: bool,
    },

    /// List every declared section in the hierarchy
    #[command(visible_alias = "s")]
    Sections {
        /// Path to the server-level configuration file
        config: String,
        /// Output as JSON
        #[arg(long, env = "HOSTCFG_JSON")]
        json: bool,
    },

    /// Validate the hierarchy's files against their declarations
    ///
    /// Checks the server file and every site's web.config for
    /// unrecognized elements, duplicate declarations, and malformed
    /// content, printing each fault in the standard diagnostic format.
    #[command(visible_alias = "c")]
    Check {
        /// Path to the server-level configuration file
        config: String,
    },

    /// List the sites in the server file with their bindings
    Sites {
        /// Path to the server-level configuration file
        config: String,
        /// Output as JSON
        #[arg(long, env = "HOSTCFG_JSON")]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Get {
            config,
            section,
            location,
            json,
        } => commands::get::run(&config, &section, location.as_deref(), json),
        Commands::Sections { config, json } => commands::sections::run(&config, json),
        Commands::Check { config } => commands::check::run(&config),
        Commands::Sites { config, json } => commands::sites::run(&config, json),
    }
}
