//! Core commands (init) and shared utilities

use std::path::Path;

use anyhow::{Context, Result};
use centime_core::{db::Database, EngineConfig};

/// Open the database, creating the file and schema if needed
pub fn open_db(db_path: &Path) -> Result<Database> {
    Database::new(db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))
}

/// Load engine thresholds, falling back to defaults when the file is absent
pub fn load_config(config_path: &Path) -> Result<EngineConfig> {
    EngineConfig::load(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

pub fn cmd_init(db_path: &Path, config_path: &Path) -> Result<()> {
    let db = open_db(db_path)?;
    let config = load_config(config_path)?;
    db.seed_default_categories()
        .context("Failed to seed default categories")?;
    db.seed_global_patterns(config.global_pattern_confidence)
        .context("Failed to seed global patterns")?;

    let categories = db.list_categories()?;
    println!();
    println!("✅ Database initialized: {}", db_path.display());
    println!("   Categories: {}", categories.len());
    println!();
    println!("   Next: centime import --file <export.csv>");
    Ok(())
}
