//! Bulk classification command

use std::path::Path;

use anyhow::Result;
use centime_core::{CategoryAssigner, Database, EngineConfig};

use super::{load_config, open_db};

pub fn cmd_classify(db_path: &Path, config_path: &Path, user: &str, limit: i64) -> Result<()> {
    let db = open_db(db_path)?;
    let config = load_config(config_path)?;
    let user_id = db.ensure_user(user)?;
    cmd_classify_for_user(&db, config, user_id, limit)
}

/// Shared by `classify` and the post-import hook
pub fn cmd_classify_for_user(
    db: &Database,
    config: EngineConfig,
    user_id: i64,
    limit: i64,
) -> Result<()> {
    let assigner = CategoryAssigner::new(db, config);
    let result = assigner.bulk_classify(user_id, limit)?;

    println!();
    println!("🏷️  Classified {} transactions", result.processed);
    println!("   Assigned: {}", result.assigned);
    println!("   Needs review: {}", result.needs_review);
    if result.assigned > 0 {
        println!();
        println!("   By strategy:");
        for (label, count) in [
            ("category mapping", result.by_category_mapping),
            ("personal pattern", result.by_personal_pattern),
            ("global pattern", result.by_global_pattern),
            ("historical", result.by_historical),
            ("amount range", result.by_amount),
            ("similarity", result.by_similarity),
        ] {
            if count > 0 {
                println!("     {:<16} {}", label, count);
            }
        }
    }
    if result.needs_review > 0 {
        println!();
        println!("   Review pending transactions and assign them manually,");
        println!("   then run 'centime learn' to teach the engine.");
    }
    Ok(())
}
