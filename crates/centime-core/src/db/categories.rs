//! Category taxonomy operations

use rusqlite::{params, Row};
use tracing::info;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{AmountRange, Category, CategoryGroup};
use crate::taxonomy::{self, DEFAULT_CATEGORIES};

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    let group_str: String = row.get(2)?;
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        group: group_str.parse().unwrap_or(CategoryGroup::Other),
        typical_min: row.get(3)?,
        typical_max: row.get(4)?,
    })
}

impl Database {
    /// Create a category; name must be unique
    pub fn create_category(
        &self,
        name: &str,
        group: CategoryGroup,
        typical_min: Option<f64>,
        typical_max: Option<f64>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (name, category_group, typical_min, typical_max) \
             VALUES (?, ?, ?, ?)",
            params![name, group.as_str(), typical_min, typical_max],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Fetch a category by id
    pub fn get_category(&self, id: i64) -> Result<Category> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, category_group, typical_min, typical_max \
             FROM categories WHERE id = ?",
            params![id],
            row_to_category,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound(format!("category {}", id)),
            other => other.into(),
        })
    }

    /// Look up a category by name, translating legacy display names
    pub fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let canonical = taxonomy::canonical_category_name(name);
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, category_group, typical_min, typical_max \
                 FROM categories WHERE name = ?",
                params![canonical],
                row_to_category,
            )
            .ok();
        Ok(category)
    }

    /// List all categories, by name
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, category_group, typical_min, typical_max \
             FROM categories ORDER BY name",
        )?;
        let categories = stmt
            .query_map([], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// All configured amount ranges, for the amount-inference strategy
    pub fn list_amount_ranges(&self) -> Result<Vec<AmountRange>> {
        Ok(self
            .list_categories()?
            .iter()
            .filter_map(Category::amount_range)
            .collect())
    }

    /// Seed the default category taxonomy (idempotent)
    pub fn seed_default_categories(&self) -> Result<()> {
        let conn = self.conn()?;
        let mut seeded = 0;
        for (name, group, min, max) in DEFAULT_CATEGORIES {
            seeded += conn.execute(
                "INSERT OR IGNORE INTO categories (name, category_group, typical_min, typical_max) \
                 VALUES (?, ?, ?, ?)",
                params![name, group.as_str(), min, max],
            )?;
        }
        if seeded > 0 {
            info!("Seeded {} default categories", seeded);
        }
        Ok(())
    }
}
