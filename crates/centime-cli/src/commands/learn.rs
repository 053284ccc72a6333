//! Pattern learning and maintenance command

use std::path::Path;

use anyhow::Result;
use centime_core::PatternLearner;

use super::{load_config, open_db};

pub fn cmd_learn(db_path: &Path, config_path: &Path, user: &str) -> Result<()> {
    let db = open_db(db_path)?;
    let config = load_config(config_path)?;
    let user_id = db.ensure_user(user)?;

    let learner = PatternLearner::new(&db, config);
    let created = learner.learn_from_manual_assignments(user_id)?;
    let maintenance = learner.maintain_patterns(user_id)?;

    println!();
    println!("🧠 Learning pass complete");
    println!("   New patterns learned: {}", created);
    println!("   Patterns damped: {}", maintenance.improved);
    println!("   Patterns removed: {}", maintenance.removed);
    if created == 0 && maintenance.improved == 0 && maintenance.removed == 0 {
        println!();
        println!("   Nothing to learn yet. Assign a merchant to the same");
        println!("   category a few times and run this again.");
    }
    Ok(())
}
