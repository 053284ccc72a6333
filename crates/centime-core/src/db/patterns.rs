//! Global and personal pattern stores

use chrono::Utc;
use regex::RegexBuilder;
use rusqlite::{params, Row};
use tracing::{info, warn};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{CategoryPattern, PatternKind, PatternSource, UserMerchantPattern};
use crate::taxonomy::DEFAULT_GLOBAL_PATTERNS;

/// Pattern store statistics for status reporting
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PatternStats {
    pub global_patterns: i64,
    pub global_matches_recorded: i64,
    pub personal_patterns: i64,
    pub personal_confirmed: i64,
    pub personal_learned: i64,
}

fn row_to_global(row: &Row) -> rusqlite::Result<CategoryPattern> {
    let kind_str: String = row.get(2)?;
    Ok(CategoryPattern {
        id: row.get(0)?,
        pattern: row.get(1)?,
        kind: kind_str.parse().unwrap_or(PatternKind::Keyword),
        category_id: row.get(3)?,
        specificity: row.get(4)?,
        confidence: row.get(5)?,
        total_matches: row.get(6)?,
        accepted_matches: row.get(7)?,
    })
}

fn row_to_personal(row: &Row) -> rusqlite::Result<UserMerchantPattern> {
    let source_str: String = row.get(4)?;
    let last_used_str: String = row.get(8)?;
    Ok(UserMerchantPattern {
        id: row.get(0)?,
        user_id: row.get(1)?,
        pattern: row.get(2)?,
        category_id: row.get(3)?,
        source: source_str.parse().unwrap_or(PatternSource::Confirmed),
        usage_count: row.get(5)?,
        success_count: row.get(6)?,
        confidence: row.get(7)?,
        last_used_at: parse_datetime(&last_used_str),
    })
}

/// Does a global pattern match the search text?
///
/// Keyword patterns are case-insensitive substrings; regex patterns are
/// compiled case-insensitive. An invalid stored regex is skipped with a
/// warning rather than failing the lookup.
fn global_pattern_matches(pattern: &CategoryPattern, text_upper: &str) -> bool {
    match pattern.kind {
        PatternKind::Keyword => text_upper.contains(&pattern.pattern.to_uppercase()),
        PatternKind::Regex => match RegexBuilder::new(&pattern.pattern)
            .case_insensitive(true)
            .build()
        {
            Ok(re) => re.is_match(text_upper),
            Err(e) => {
                warn!("Skipping invalid stored regex '{}': {}", pattern.pattern, e);
                false
            }
        },
    }
}

/// Does a personal pattern (a normalized merchant key) match the text?
///
/// Key tokens may be non-adjacent in the raw text (the key drops numeric and
/// short tokens), so every token must appear somewhere in the text.
fn personal_pattern_matches(pattern: &str, text_upper: &str) -> bool {
    !pattern.is_empty()
        && pattern
            .split_whitespace()
            .all(|token| text_upper.contains(token))
}

impl Database {
    // ============================================
    // Global patterns
    // ============================================

    /// Create a global pattern
    pub fn create_global_pattern(
        &self,
        pattern: &str,
        kind: PatternKind,
        category_id: i64,
        specificity: i64,
        confidence: f64,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO category_patterns (pattern, kind, category_id, specificity, confidence) \
             VALUES (?, ?, ?, ?, ?)",
            params![pattern, kind.as_str(), category_id, specificity, confidence],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All global patterns matching `text` with stored confidence >= the
    /// floor. No ordering guarantee; callers sort.
    pub fn find_global_matches(
        &self,
        text: &str,
        min_confidence: f64,
    ) -> Result<Vec<CategoryPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, pattern, kind, category_id, specificity, confidence, \
                    total_matches, accepted_matches \
             FROM category_patterns WHERE confidence >= ?",
        )?;
        let candidates = stmt
            .query_map(params![min_confidence], row_to_global)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let text_upper = text.to_uppercase();
        Ok(candidates
            .into_iter()
            .filter(|p| global_pattern_matches(p, &text_upper))
            .collect())
    }

    /// Record a match outcome on a global pattern
    ///
    /// Unknown pattern ids are logged and ignored; statistics bookkeeping
    /// must never fail an assignment.
    pub fn record_global_match(&self, pattern_id: i64, accepted: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE category_patterns \
             SET total_matches = total_matches + 1, \
                 accepted_matches = accepted_matches + ? \
             WHERE id = ?",
            params![accepted as i64, pattern_id],
        )?;
        if updated == 0 {
            warn!("record_global_match: unknown pattern id {}", pattern_id);
        }
        Ok(())
    }

    /// Seed the starter global pattern set (idempotent)
    ///
    /// Requires the default categories to exist. Seeded patterns start at
    /// `default_confidence` and evolve from there as feedback arrives.
    pub fn seed_global_patterns(&self, default_confidence: f64) -> Result<()> {
        let conn = self.conn()?;
        let mut seeded = 0;
        for (pattern, is_regex, category_name, specificity) in DEFAULT_GLOBAL_PATTERNS {
            let category_id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM categories WHERE name = ?",
                    params![category_name],
                    |row| row.get(0),
                )
                .ok();
            let Some(category_id) = category_id else {
                warn!("Skipping seed pattern '{}': no category {}", pattern, category_name);
                continue;
            };
            let kind = if *is_regex {
                PatternKind::Regex
            } else {
                PatternKind::Keyword
            };
            seeded += conn.execute(
                "INSERT OR IGNORE INTO category_patterns \
                 (pattern, kind, category_id, specificity, confidence) \
                 VALUES (?, ?, ?, ?, ?)",
                params![pattern, kind.as_str(), category_id, specificity, default_confidence],
            )?;
        }
        if seeded > 0 {
            info!("Seeded {} global patterns", seeded);
        }
        Ok(())
    }

    // ============================================
    // Personal patterns
    // ============================================

    /// The user's patterns matching `text`, ordered by usage count then
    /// recency. Personal matches are checked before global patterns.
    pub fn find_personal_matches(
        &self,
        user_id: i64,
        text: &str,
    ) -> Result<Vec<UserMerchantPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, pattern, category_id, source, usage_count, \
                    success_count, confidence, last_used_at \
             FROM user_merchant_patterns WHERE user_id = ? \
             ORDER BY usage_count DESC, last_used_at DESC",
        )?;
        let patterns = stmt
            .query_map(params![user_id], row_to_personal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let text_upper = text.to_uppercase();
        Ok(patterns
            .into_iter()
            .filter(|p| personal_pattern_matches(&p.pattern, &text_upper))
            .collect())
    }

    /// Fetch one personal pattern by its identity triple
    pub fn get_personal_pattern(
        &self,
        user_id: i64,
        pattern: &str,
        category_id: i64,
    ) -> Result<Option<UserMerchantPattern>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT id, user_id, pattern, category_id, source, usage_count, \
                        success_count, confidence, last_used_at \
                 FROM user_merchant_patterns \
                 WHERE user_id = ? AND pattern = ? AND category_id = ?",
                params![user_id, pattern, category_id],
                row_to_personal,
            )
            .ok();
        Ok(result)
    }

    /// Create a personal pattern, or reinforce the existing row for the same
    /// (user, pattern, category) triple. The triple is unique in the schema,
    /// so reinforcement never creates duplicates.
    pub fn upsert_personal_pattern(
        &self,
        user_id: i64,
        pattern: &str,
        category_id: i64,
        source: PatternSource,
        usage_count: i64,
        success_count: i64,
        confidence: f64,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO user_merchant_patterns
                (user_id, pattern, category_id, source, usage_count, success_count, confidence)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, pattern, category_id) DO UPDATE SET
                usage_count = usage_count + excluded.usage_count,
                success_count = success_count + excluded.success_count,
                confidence = MAX(confidence, excluded.confidence),
                last_used_at = CURRENT_TIMESTAMP
            "#,
            params![
                user_id,
                pattern,
                category_id,
                source.as_str(),
                usage_count,
                success_count,
                confidence,
            ],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM user_merchant_patterns \
             WHERE user_id = ? AND pattern = ? AND category_id = ?",
            params![user_id, pattern, category_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Record a personal pattern use
    ///
    /// Confidence grows monotonically with usage count (more repetitions,
    /// higher confidence), capped at `confidence_cap`. Unknown ids are
    /// logged and ignored.
    pub fn record_personal_usage(
        &self,
        pattern_id: i64,
        successful: bool,
        confidence_cap: f64,
    ) -> Result<()> {
        let conn = self.conn()?;
        let row: Option<(i64, f64)> = conn
            .query_row(
                "SELECT usage_count, confidence FROM user_merchant_patterns WHERE id = ?",
                params![pattern_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();
        let Some((usage_count, confidence)) = row else {
            warn!("record_personal_usage: unknown pattern id {}", pattern_id);
            return Ok(());
        };

        let new_usage = usage_count + 1;
        let new_confidence = confidence
            .max(0.5 + new_usage as f64 * 0.05)
            .min(confidence_cap);

        conn.execute(
            "UPDATE user_merchant_patterns \
             SET usage_count = ?, success_count = success_count + ?, \
                 confidence = ?, last_used_at = ? \
             WHERE id = ?",
            params![
                new_usage,
                successful as i64,
                new_confidence,
                Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                pattern_id,
            ],
        )?;
        Ok(())
    }

    /// Multiply a personal pattern's confidence by a damping factor
    pub fn scale_personal_confidence(&self, pattern_id: i64, factor: f64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE user_merchant_patterns SET confidence = confidence * ? WHERE id = ?",
            params![factor, pattern_id],
        )?;
        Ok(())
    }

    /// Delete a personal pattern
    pub fn delete_personal_pattern(&self, pattern_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM user_merchant_patterns WHERE id = ?",
            params![pattern_id],
        )?;
        Ok(())
    }

    /// All of a user's personal patterns
    pub fn list_personal_patterns(&self, user_id: i64) -> Result<Vec<UserMerchantPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, pattern, category_id, source, usage_count, \
                    success_count, confidence, last_used_at \
             FROM user_merchant_patterns WHERE user_id = ? \
             ORDER BY usage_count DESC, last_used_at DESC",
        )?;
        let patterns = stmt
            .query_map(params![user_id], row_to_personal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(patterns)
    }

    /// Pattern store statistics
    pub fn pattern_stats(&self, user_id: i64) -> Result<PatternStats> {
        let conn = self.conn()?;
        let global_patterns: i64 =
            conn.query_row("SELECT COUNT(*) FROM category_patterns", [], |row| {
                row.get(0)
            })?;
        let global_matches_recorded: i64 = conn.query_row(
            "SELECT COALESCE(SUM(total_matches), 0) FROM category_patterns",
            [],
            |row| row.get(0),
        )?;
        let personal_patterns: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_merchant_patterns WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        let personal_confirmed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_merchant_patterns WHERE user_id = ? AND source = 'confirmed'",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(PatternStats {
            global_patterns,
            global_matches_recorded,
            personal_patterns,
            personal_confirmed,
            personal_learned: personal_patterns - personal_confirmed,
        })
    }
}
