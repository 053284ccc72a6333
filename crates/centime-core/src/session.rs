//! Import sessions: parse now, map columns, commit later
//!
//! An upload opens a session holding the parsed rows in memory. The caller
//! inspects the preview, fixes the column mapping if detection failed, then
//! finalizes to write transactions. Sessions expire after a TTL so an
//! abandoned upload never leaks rows.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::db::{Database, TransactionInsert};
use crate::error::{Error, Result};
use crate::ingest::{detect_layout, parse_csv, parse_row, ColumnMapping, RowError};

/// Default session lifetime
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);
/// Rows shown in a preview
const PREVIEW_ROWS: usize = 5;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

struct ImportSession {
    user_id: i64,
    account_id: i64,
    headers: Vec<String>,
    records: Vec<csv::StringRecord>,
    mapping: Option<ColumnMapping>,
    created_at: Instant,
}

/// What the caller sees after opening a session
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionPreview {
    pub session_id: String,
    pub headers: Vec<String>,
    /// None when header detection failed; the caller must map columns
    pub detected_mapping: Option<ColumnMapping>,
    pub sample_rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

/// Outcome of a finalized import
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImportSummary {
    pub imported: i64,
    pub duplicates: i64,
    pub errors: Vec<RowError>,
}

/// In-memory store of open import sessions
pub struct SessionStore {
    sessions: Mutex<HashMap<String, ImportSession>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Parse an upload and open a session for it
    pub fn begin(&self, user_id: i64, account_id: i64, content: &str) -> Result<SessionPreview> {
        let (headers, records) = parse_csv(content)?;
        if records.is_empty() {
            return Err(Error::Import("File contains no data rows".into()));
        }

        let detected = detect_layout(&headers);
        let session_id = next_session_id(user_id, content);
        let preview = SessionPreview {
            session_id: session_id.clone(),
            headers: headers.clone(),
            detected_mapping: detected.clone(),
            sample_rows: records
                .iter()
                .take(PREVIEW_ROWS)
                .map(|r| r.iter().map(str::to_string).collect())
                .collect(),
            total_rows: records.len(),
        };

        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        purge_expired(&mut sessions, self.ttl);
        sessions.insert(
            session_id,
            ImportSession {
                user_id,
                account_id,
                headers,
                records,
                mapping: detected,
                created_at: Instant::now(),
            },
        );

        debug!(
            session_id = %preview.session_id,
            rows = preview.total_rows,
            detected = preview.detected_mapping.is_some(),
            "Import session opened"
        );
        Ok(preview)
    }

    /// Set or replace the session's column mapping
    pub fn map_columns(&self, session_id: &str, mapping: ColumnMapping) -> Result<()> {
        mapping.validate()?;
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        purge_expired(&mut sessions, self.ttl);
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        session.mapping = Some(mapping);
        Ok(())
    }

    /// Write the session's rows as transactions and close the session
    ///
    /// Duplicates, both within the file and against already-stored
    /// transactions, are counted and skipped. Unparsable rows are reported
    /// in the summary without failing the import.
    pub fn finalize(&self, session_id: &str, db: &Database) -> Result<ImportSummary> {
        let session = {
            let mut sessions = self.sessions.lock().expect("session lock poisoned");
            purge_expired(&mut sessions, self.ttl);
            sessions
                .remove(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?
        };
        let mapping = session
            .mapping
            .as_ref()
            .ok_or_else(|| Error::Import("No column mapping set for session".into()))?;

        let mut summary = ImportSummary::default();
        let mut seen_hashes = HashSet::new();
        for (index, record) in session.records.iter().enumerate() {
            let row = index + 1;
            let tx = match parse_row(&session.headers, mapping, record, row) {
                Ok(tx) => tx,
                Err(error) => {
                    warn!(row, field = %error.field, "Skipping row: {}", error.message);
                    summary.errors.push(error);
                    continue;
                }
            };
            // Same date/description/amount twice in one file is one
            // transaction
            if !seen_hashes.insert(tx.import_hash.clone()) {
                summary.duplicates += 1;
                continue;
            }
            match db.insert_transaction(session.account_id, session.user_id, &tx)? {
                TransactionInsert::Inserted(_) => summary.imported += 1,
                TransactionInsert::Duplicate(_) => summary.duplicates += 1,
            }
        }

        info!(
            session_id,
            imported = summary.imported,
            duplicates = summary.duplicates,
            errors = summary.errors.len(),
            "Import finalized"
        );
        Ok(summary)
    }

    /// Open session count, after expiry
    pub fn open_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        purge_expired(&mut sessions, self.ttl);
        sessions.len()
    }
}

fn purge_expired(sessions: &mut HashMap<String, ImportSession>, ttl: Duration) {
    sessions.retain(|_, s| s.created_at.elapsed() < ttl);
}

fn next_session_id(user_id: i64, content: &str) -> String {
    let counter = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_le_bytes());
    hasher.update(counter.to_le_bytes());
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
