//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `transactions` - Transaction CRUD and assignment updates
//! - `categories` - Category taxonomy and amount ranges
//! - `patterns` - Global and personal pattern stores
//! - `feedback` - Append-only assignment feedback log
//!
//! The `Database` type is the concrete realization of the engine's store
//! collaborators (TransactionStore, CategoryStore, PatternStore,
//! FeedbackStore).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod categories;
mod feedback;
mod patterns;
mod transactions;

pub use patterns::PatternStats;
pub use transactions::{StatusCounts, TransactionInsert};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: PathBuf,
}

impl Database {
    /// Create a new database connection pool at the given path
    pub fn new(path: &Path) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_path_buf(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because every
    /// pooled connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "centime_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: better concurrency, readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Users (owners of accounts, patterns, and feedback)
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Bank accounts
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id);

            -- Categories (canonical taxonomy)
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                category_group TEXT NOT NULL,
                typical_min REAL,                        -- amount-range signal, absolute
                typical_max REAL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Transactions
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL REFERENCES accounts(id),
                user_id INTEGER NOT NULL REFERENCES users(id),
                date DATE NOT NULL,
                description TEXT NOT NULL,
                merchant TEXT,
                amount REAL NOT NULL,                    -- signed; negative = expense
                direction TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'unassigned',
                category_id INTEGER REFERENCES categories(id),
                assignment_confidence REAL,              -- NULL for manual assignments
                import_category TEXT,                    -- coarse label from the import file
                import_hash TEXT UNIQUE,                 -- SHA-256 for deduplication
                original_data TEXT,                      -- JSON of original import row
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_status ON transactions(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
            CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id);

            -- Global patterns (shared keyword/regex -> category)
            CREATE TABLE IF NOT EXISTS category_patterns (
                id INTEGER PRIMARY KEY,
                pattern TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'keyword',    -- keyword, regex
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                specificity INTEGER NOT NULL DEFAULT 0,
                confidence REAL NOT NULL DEFAULT 0.8,
                total_matches INTEGER NOT NULL DEFAULT 0,
                accepted_matches INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(pattern, category_id)
            );

            CREATE INDEX IF NOT EXISTS idx_category_patterns_category ON category_patterns(category_id);
            CREATE INDEX IF NOT EXISTS idx_category_patterns_confidence ON category_patterns(confidence);

            -- Personal patterns (per-user overrides, checked before global)
            -- At most one row per (user, pattern, category) is authoritative.
            CREATE TABLE IF NOT EXISTS user_merchant_patterns (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                pattern TEXT NOT NULL,                   -- normalized merchant key
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                source TEXT NOT NULL DEFAULT 'confirmed',-- confirmed, learned
                usage_count INTEGER NOT NULL DEFAULT 0,
                success_count INTEGER NOT NULL DEFAULT 0,
                confidence REAL NOT NULL DEFAULT 0.75,
                last_used_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, pattern, category_id)
            );

            CREATE INDEX IF NOT EXISTS idx_user_patterns_user ON user_merchant_patterns(user_id);

            -- Assignment feedback (append-only)
            CREATE TABLE IF NOT EXISTS assignment_feedback (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                transaction_id INTEGER NOT NULL REFERENCES transactions(id),
                suggested_category_id INTEGER NOT NULL REFERENCES categories(id),
                chosen_category_id INTEGER NOT NULL REFERENCES categories(id),
                accepted BOOLEAN NOT NULL,
                pattern_used TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_feedback_user_suggested
                ON assignment_feedback(user_id, suggested_category_id);
            CREATE INDEX IF NOT EXISTS idx_feedback_transaction
                ON assignment_feedback(transaction_id);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }

    /// Create a user, or return the existing id for the name
    pub fn ensure_user(&self, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO users (name) VALUES (?)",
            rusqlite::params![name],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM users WHERE name = ?",
            rusqlite::params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Create an account for a user, or return the existing id for the name
    pub fn ensure_account(&self, user_id: i64, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM accounts WHERE user_id = ? AND name = ?",
                rusqlite::params![user_id, name],
                |row| row.get(0),
            )
            .ok();
        if let Some(id) = existing {
            return Ok(id);
        }
        conn.execute(
            "INSERT INTO accounts (user_id, name) VALUES (?, ?)",
            rusqlite::params![user_id, name],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Database::in_memory().unwrap();
        // Running migrations again must not fail
        db.run_migrations().unwrap();
    }

    #[test]
    fn test_ensure_user_and_account() {
        let db = Database::in_memory().unwrap();

        let user = db.ensure_user("alex").unwrap();
        assert_eq!(db.ensure_user("alex").unwrap(), user);

        let account = db.ensure_account(user, "checking").unwrap();
        assert_eq!(db.ensure_account(user, "checking").unwrap(), account);
        assert_ne!(db.ensure_account(user, "savings").unwrap(), account);
    }
}
