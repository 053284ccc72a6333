//! Assignment feedback store (append-only)

use rusqlite::params;

use super::Database;
use crate::error::Result;
use crate::models::NewFeedback;

impl Database {
    /// Append a feedback record
    pub fn append_feedback(&self, feedback: &NewFeedback) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO assignment_feedback \
             (user_id, transaction_id, suggested_category_id, chosen_category_id, \
              accepted, pattern_used) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                feedback.user_id,
                feedback.transaction_id,
                feedback.suggested_category_id,
                feedback.chosen_category_id,
                feedback.accepted,
                feedback.pattern_used,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// How often the user accepted suggestions for a category, as
    /// (accepted, total). Total of zero means no history yet.
    pub fn feedback_acceptance(&self, user_id: i64, category_id: i64) -> Result<(i64, i64)> {
        let conn = self.conn()?;
        let (accepted, total): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(accepted), 0), COUNT(*) \
             FROM assignment_feedback \
             WHERE user_id = ? AND suggested_category_id = ?",
            params![user_id, category_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((accepted, total))
    }

    /// Total feedback rows for a user
    pub fn count_feedback(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM assignment_feedback WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryGroup, Direction, NewTransaction};
    use chrono::NaiveDate;

    fn setup() -> (Database, i64, i64, i64, i64) {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("test").unwrap();
        let account = db.ensure_account(user, "checking").unwrap();
        let groceries = db
            .create_category("groceries", CategoryGroup::Essential, None, None)
            .unwrap();
        let dining = db
            .create_category("dining", CategoryGroup::Lifestyle, None, None)
            .unwrap();
        (db, user, account, groceries, dining)
    }

    fn insert_tx(db: &Database, user: i64, account: i64, description: &str) -> i64 {
        let date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        let tx = NewTransaction {
            date,
            description: description.to_string(),
            merchant: None,
            amount: -10.0,
            direction: Direction::Expense,
            import_category: None,
            import_hash: crate::ingest::import_hash(&date, description, -10.0),
            original_data: None,
        };
        match db.insert_transaction(account, user, &tx).unwrap() {
            crate::db::TransactionInsert::Inserted(id) => id,
            crate::db::TransactionInsert::Duplicate(id) => id,
        }
    }

    #[test]
    fn test_acceptance_rate_counts() {
        let (db, user, account, groceries, dining) = setup();
        let tx = insert_tx(&db, user, account, "CARREFOUR");

        for accepted in [true, true, true, false] {
            db.append_feedback(&NewFeedback {
                user_id: user,
                transaction_id: tx,
                suggested_category_id: groceries,
                chosen_category_id: if accepted { groceries } else { dining },
                accepted,
                pattern_used: Some("CARREFOUR".to_string()),
            })
            .unwrap();
        }

        let (accepted, total) = db.feedback_acceptance(user, groceries).unwrap();
        assert_eq!((accepted, total), (3, 4));

        // No history for the other category
        assert_eq!(db.feedback_acceptance(user, dining).unwrap(), (0, 0));
        assert_eq!(db.count_feedback(user).unwrap(), 4);
    }

}
