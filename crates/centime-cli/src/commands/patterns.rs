//! Personal pattern listing command

use std::path::Path;

use anyhow::Result;

use super::{open_db, truncate};

pub fn cmd_patterns(db_path: &Path, user: &str, json: bool) -> Result<()> {
    let db = open_db(db_path)?;
    let user_id = db.ensure_user(user)?;
    let patterns = db.list_personal_patterns(user_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&patterns)?);
        return Ok(());
    }

    if patterns.is_empty() {
        println!();
        println!("No personal patterns yet. They appear after feedback or");
        println!("repeated manual assignments (see 'centime learn').");
        return Ok(());
    }

    println!();
    println!(
        "   {:<28} {:<10} {:>6} {:>6} {:>6}",
        "PATTERN", "SOURCE", "USES", "ACC", "CONF"
    );
    println!("   ─────────────────────────────────────────────────────────");
    for pattern in &patterns {
        let category = db.get_category(pattern.category_id)?;
        println!(
            "   {:<28} {:<10} {:>6} {:>5.0}% {:>6.2}  → {}",
            truncate(&pattern.pattern, 28),
            pattern.source.as_str(),
            pattern.usage_count,
            pattern.accuracy() * 100.0,
            pattern.confidence,
            category.name
        );
    }
    println!();
    println!("   {} patterns", patterns.len());
    Ok(())
}
