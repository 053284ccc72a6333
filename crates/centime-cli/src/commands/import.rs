//! CSV import command

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use centime_core::{ColumnMapping, SessionStore};

use super::{cmd_classify_for_user, load_config, open_db};

/// Per-column index overrides from the command line
#[derive(Debug, Default)]
pub struct ColumnOverrides {
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub amount: Option<usize>,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    pub merchant: Option<usize>,
    pub category: Option<usize>,
}

impl ColumnOverrides {
    fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.debit.is_none()
            && self.credit.is_none()
            && self.merchant.is_none()
            && self.category.is_none()
    }

    fn into_mapping(self) -> Result<ColumnMapping> {
        let (Some(date), Some(description)) = (self.date, self.description) else {
            bail!("Column overrides need at least --date-col and --description-col");
        };
        Ok(ColumnMapping {
            date,
            description,
            merchant: self.merchant,
            amount: self.amount,
            debit: self.debit,
            credit: self.credit,
            category: self.category,
        })
    }
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_import(
    db_path: &Path,
    config_path: &Path,
    user: &str,
    file: &Path,
    account: &str,
    overrides: ColumnOverrides,
    no_classify: bool,
) -> Result<()> {
    let db = open_db(db_path)?;
    let user_id = db.ensure_user(user)?;
    let account_id = db.ensure_account(user_id, account)?;

    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let store = SessionStore::default();
    let preview = store.begin(user_id, account_id, &content)?;

    if !overrides.is_empty() {
        store.map_columns(&preview.session_id, overrides.into_mapping()?)?;
    } else if preview.detected_mapping.is_none() {
        println!();
        println!("❌ Could not detect the column layout. Headers found:");
        for (index, header) in preview.headers.iter().enumerate() {
            println!("   [{}] {}", index, header);
        }
        println!();
        println!("   Re-run with explicit columns, e.g.:");
        println!("   centime import --file {} --date-col 0 --description-col 1 --amount-col 2", file.display());
        bail!("No column mapping for {}", file.display());
    }

    let summary = store.finalize(&preview.session_id, &db)?;

    println!();
    println!("📥 Imported {}", file.display());
    println!("   New transactions: {}", summary.imported);
    println!("   Duplicates skipped: {}", summary.duplicates);
    if !summary.errors.is_empty() {
        println!("   ⚠️  Rows skipped: {}", summary.errors.len());
        for error in summary.errors.iter().take(5) {
            println!("      row {} ({}): {}", error.row, error.field, error.message);
        }
        if summary.errors.len() > 5 {
            println!("      ... and {} more", summary.errors.len() - 5);
        }
    }

    if no_classify || summary.imported == 0 {
        return Ok(());
    }
    let config = load_config(config_path)?;
    cmd_classify_for_user(&db, config, user_id, summary.imported)
}
