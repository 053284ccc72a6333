//! Status command

use std::fs;
use std::path::Path;

use anyhow::Result;

use super::open_db;

pub fn cmd_status(db_path: &Path, user: &str) -> Result<()> {
    println!();
    println!("📊 Centime Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
        println!();
        println!("   Run 'centime init' first.");
        return Ok(());
    }

    let db = open_db(db_path)?;
    let user_id = db.ensure_user(user)?;
    let counts = db.count_by_status(user_id)?;
    let stats = db.pattern_stats(user_id)?;

    println!();
    println!("   Transactions: {}", counts.total());
    println!("     Unassigned:        {}", counts.unassigned);
    println!("     Auto-assigned:     {}", counts.auto_assigned);
    println!("     Manually assigned: {}", counts.manually_assigned);
    println!("     Needs review:      {}", counts.needs_review);
    println!("     Recently assigned: {}", counts.recently_assigned);
    println!();
    println!("   Global patterns: {}", stats.global_patterns);
    println!("     Matches recorded: {}", stats.global_matches_recorded);
    println!(
        "   Personal patterns: {} ({} confirmed, {} learned)",
        stats.personal_patterns, stats.personal_confirmed, stats.personal_learned
    );
    println!("   Feedback records: {}", db.count_feedback(user_id)?);

    if counts.needs_review > 0 {
        println!();
        println!("   {} transactions are waiting for review.", counts.needs_review);
    }
    println!();
    Ok(())
}
