pub mod check;
pub mod get;
pub mod sections;
pub mod sites;

use anyhow::{Context, Result};
use hostcfg_core::{FileLayout, ServerSession};

/// Open a session over the server file named on the command line
pub fn open_session(config: &str) -> Result<ServerSession> {
    ServerSession::open(FileLayout::new(config))
        .with_context(|| format!("Failed to open configuration hierarchy at {}", config))
}
