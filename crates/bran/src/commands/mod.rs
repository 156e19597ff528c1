//! CLI command implementations.

pub mod aliases;
pub mod ask;
pub mod doctor;

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;

use bran_store::AliasStore;

/// Shared context passed to all commands.
pub struct Context {
    pub verbose: bool,
}

/// Where the durable alias database lives.
pub fn alias_db_path() -> PathBuf {
    bran_config::config_dir()
        .map(|d| d.join("aliases.db"))
        .unwrap_or_else(|| PathBuf::from("aliases.db"))
}

/// Open the alias store, creating its directory if needed.
pub fn open_store() -> Result<Arc<AliasStore>> {
    let path = alias_db_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = AliasStore::open(&path)
        .with_context(|| format!("opening alias store at {}", path.display()))?;
    Ok(Arc::new(store))
}
