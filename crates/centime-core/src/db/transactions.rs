//! Transaction operations

use chrono::NaiveDate;
use rusqlite::{params, Row};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{AssignmentStatus, Direction, NewTransaction, Transaction};

/// Outcome of inserting a parsed transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionInsert {
    Inserted(i64),
    /// A transaction with the same import hash already exists
    Duplicate(i64),
}

/// Per-status transaction counts for one user
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatusCounts {
    pub unassigned: i64,
    pub auto_assigned: i64,
    pub manually_assigned: i64,
    pub needs_review: i64,
    pub recently_assigned: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.unassigned
            + self.auto_assigned
            + self.manually_assigned
            + self.needs_review
            + self.recently_assigned
    }
}

fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(3)?;
    let direction_str: String = row.get(7)?;
    let status_str: String = row.get(8)?;
    let created_at_str: String = row.get(14)?;

    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        user_id: row.get(2)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
        description: row.get(4)?,
        merchant: row.get(5)?,
        amount: row.get(6)?,
        direction: direction_str.parse().unwrap_or(Direction::Expense),
        status: status_str.parse().unwrap_or(AssignmentStatus::Unassigned),
        category_id: row.get(9)?,
        assignment_confidence: row.get(10)?,
        import_category: row.get(11)?,
        import_hash: row.get(12)?,
        original_data: row.get(13)?,
        created_at: parse_datetime(&created_at_str),
    })
}

const TX_COLUMNS: &str = "id, account_id, user_id, date, description, merchant, amount, \
     direction, status, category_id, assignment_confidence, import_category, \
     import_hash, original_data, created_at";

impl Database {
    /// Insert a parsed transaction, deduplicating on import hash
    pub fn insert_transaction(
        &self,
        account_id: i64,
        user_id: i64,
        tx: &NewTransaction,
    ) -> Result<TransactionInsert> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM transactions WHERE import_hash = ?",
                params![tx.import_hash],
                |row| row.get(0),
            )
            .ok();
        if let Some(id) = existing {
            return Ok(TransactionInsert::Duplicate(id));
        }

        conn.execute(
            r#"
            INSERT INTO transactions (
                account_id, user_id, date, description, merchant, amount,
                direction, import_category, import_hash, original_data
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                account_id,
                user_id,
                tx.date.to_string(),
                tx.description,
                tx.merchant,
                tx.amount,
                tx.direction.as_str(),
                tx.import_category,
                tx.import_hash,
                tx.original_data,
            ],
        )?;

        Ok(TransactionInsert::Inserted(conn.last_insert_rowid()))
    }

    /// Fetch a transaction by id
    pub fn get_transaction(&self, id: i64) -> Result<Transaction> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM transactions WHERE id = ?", TX_COLUMNS),
            params![id],
            row_to_transaction,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                Error::NotFound(format!("transaction {}", id))
            }
            other => other.into(),
        })
    }

    /// List a user's transactions with a given status, oldest first
    pub fn list_transactions_by_status(
        &self,
        user_id: i64,
        status: AssignmentStatus,
        limit: i64,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? AND status = ? \
             ORDER BY date ASC, id ASC LIMIT ?",
            TX_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![user_id, status.as_str(), limit], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List a user's categorized transactions (any assigned status), newest
    /// first, for the historical-learning strategy
    pub fn list_assigned_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions \
             WHERE user_id = ? AND category_id IS NOT NULL \
               AND status IN ('auto_assigned', 'manually_assigned', 'recently_assigned') \
             ORDER BY date DESC, id DESC LIMIT ?",
            TX_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![user_id, limit], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List transactions the engine assigned within the current budget period
    /// (on or after `period_start`), for the recent-similarity strategy
    pub fn list_recently_assigned(
        &self,
        user_id: i64,
        period_start: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions \
             WHERE user_id = ? AND category_id IS NOT NULL AND date >= ? \
               AND status IN ('auto_assigned', 'recently_assigned') \
             ORDER BY date DESC, id DESC",
            TX_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![user_id, period_start.to_string()],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// List the user's most recent manual assignments that did not come from
    /// the engine (no recorded confidence), for the batch learner
    pub fn list_manual_assignments(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions \
             WHERE user_id = ? AND status = 'manually_assigned' \
               AND category_id IS NOT NULL AND assignment_confidence IS NULL \
             ORDER BY date DESC, id DESC LIMIT ?",
            TX_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![user_id, limit], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Persist an engine assignment (or a NEEDS_REVIEW outcome)
    pub fn update_assignment(
        &self,
        transaction_id: i64,
        category_id: Option<i64>,
        confidence: Option<f64>,
        status: AssignmentStatus,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE transactions SET category_id = ?, assignment_confidence = ?, status = ? \
             WHERE id = ?",
            params![category_id, confidence, status.as_str(), transaction_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("transaction {}", transaction_id)));
        }
        Ok(())
    }

    /// Record a manual assignment by the user (clears engine confidence)
    pub fn assign_manually(&self, transaction_id: i64, category_id: i64) -> Result<()> {
        self.update_assignment(
            transaction_id,
            Some(category_id),
            None,
            AssignmentStatus::ManuallyAssigned,
        )
    }

    /// Per-status counts for a user
    pub fn count_by_status(&self, user_id: i64) -> Result<StatusCounts> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM transactions WHERE user_id = ? GROUP BY status",
        )?;
        let mut counts = StatusCounts::default();
        let rows = stmt.query_map(params![user_id], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count))
        })?;
        for row in rows {
            let (status, count) = row?;
            match status.parse::<AssignmentStatus>() {
                Ok(AssignmentStatus::Unassigned) => counts.unassigned = count,
                Ok(AssignmentStatus::AutoAssigned) => counts.auto_assigned = count,
                Ok(AssignmentStatus::ManuallyAssigned) => counts.manually_assigned = count,
                Ok(AssignmentStatus::NeedsReview) => counts.needs_review = count,
                Ok(AssignmentStatus::RecentlyAssigned) => counts.recently_assigned = count,
                Err(_) => {}
            }
        }
        Ok(counts)
    }
}
