//! Pattern learning from feedback and manual assignments
//!
//! Feedback on a suggestion immediately creates or reinforces a confirmed
//! personal pattern. Manual assignments teach more slowly: the batch learner
//! looks for merchants the user has filed the same way several times and
//! promotes them to learned patterns, with confidence tiered by how often
//! the habit repeated. Maintenance prunes patterns the feedback record has
//! proven wrong.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    AssignmentStatus, MaintenanceResult, NewFeedback, PatternSource, Transaction,
};
use crate::normalize::{merchant_key, transaction_search_text};

/// Confidence tier for a learned pattern, by repetition count
fn learned_confidence(occurrences: i64) -> f64 {
    if occurrences >= 10 {
        0.95
    } else if occurrences >= 7 {
        0.90
    } else if occurrences >= 5 {
        0.85
    } else {
        0.80
    }
}

/// Learns and maintains per-user patterns
pub struct PatternLearner<'a> {
    db: &'a Database,
    config: EngineConfig,
}

impl<'a> PatternLearner<'a> {
    pub fn new(db: &'a Database, config: EngineConfig) -> Self {
        Self { db, config }
    }

    /// Record the user's verdict on a suggested assignment
    ///
    /// Accepting confirms the suggestion; choosing another category corrects
    /// it. Either way the chosen category becomes a confirmed personal
    /// pattern under the transaction's merchant key, and the stats of the
    /// global patterns that drove the suggestion are updated.
    pub fn process_feedback(&self, transaction_id: i64, chosen_category_id: i64) -> Result<()> {
        let tx = self.db.get_transaction(transaction_id)?;
        let Some(suggested_category_id) = tx.category_id else {
            return Err(Error::InvalidData(format!(
                "Transaction {} has no suggestion to give feedback on",
                transaction_id
            )));
        };
        let accepted = chosen_category_id == suggested_category_id;
        let text = transaction_search_text(&tx);
        let key = merchant_key(&text);

        self.db.append_feedback(&NewFeedback {
            user_id: tx.user_id,
            transaction_id,
            suggested_category_id,
            chosen_category_id,
            accepted,
            pattern_used: Some(key.clone()),
        })?;

        if accepted {
            // Confirmation pins the assignment; it no longer counts as a
            // pending suggestion.
            self.db.update_assignment(
                transaction_id,
                Some(chosen_category_id),
                tx.assignment_confidence,
                AssignmentStatus::ManuallyAssigned,
            )?;
        } else {
            self.db.assign_manually(transaction_id, chosen_category_id)?;
        }

        // The chosen category becomes (or reinforces) a confirmed pattern,
        // unless the text had no usable merchant tokens
        if key != "UNKNOWN" {
            self.db.upsert_personal_pattern(
                tx.user_id,
                &key,
                chosen_category_id,
                PatternSource::Confirmed,
                1,
                1,
                0.75,
            )?;
        }

        // A correction also counts against the pattern that misfired
        if !accepted {
            if let Some(wrong) =
                self.db
                    .get_personal_pattern(tx.user_id, &key, suggested_category_id)?
            {
                self.db
                    .record_personal_usage(wrong.id, false, self.config.personal_confidence_cap)?;
            }
        }

        // Global pattern bookkeeping: every matching pattern that proposed
        // the suggested category gets the verdict.
        for pattern in self.db.find_global_matches(&text, 0.0)? {
            if pattern.category_id == suggested_category_id {
                self.db.record_global_match(pattern.id, accepted)?;
            }
        }

        debug!(
            transaction_id,
            accepted, chosen_category_id, "Feedback processed"
        );
        Ok(())
    }

    /// Learn patterns from the user's manual assignment habits
    ///
    /// Groups unconsumed manual assignments by (merchant key, category) and
    /// promotes any group at or above the occurrence threshold to a learned
    /// pattern. Returns how many patterns were created.
    pub fn learn_from_manual_assignments(&self, user_id: i64) -> Result<i64> {
        let manual = self
            .db
            .list_manual_assignments(user_id, self.config.learn_batch_limit)?;

        let mut groups: HashMap<(String, i64), i64> = HashMap::new();
        for tx in &manual {
            let Some(category_id) = tx.category_id else {
                continue;
            };
            let key = merchant_key(&transaction_search_text(tx));
            if key == "UNKNOWN" {
                continue;
            }
            *groups.entry((key, category_id)).or_insert(0) += 1;
        }

        let mut created = 0;
        for ((key, category_id), count) in groups {
            if count < self.config.learn_min_occurrences {
                continue;
            }
            // Re-running the learner must not inflate an existing pattern
            if self
                .db
                .get_personal_pattern(user_id, &key, category_id)?
                .is_some()
            {
                continue;
            }
            let confidence = learned_confidence(count);
            self.db.upsert_personal_pattern(
                user_id,
                &key,
                category_id,
                PatternSource::Learned,
                count,
                count,
                confidence,
            )?;
            info!(
                user_id,
                pattern = %key,
                category_id,
                occurrences = count,
                confidence,
                "Learned personal pattern"
            );
            created += 1;
        }
        Ok(created)
    }

    /// Prune or damp personal patterns with a bad track record
    ///
    /// A well-used pattern that keeps being corrected is deleted; one that
    /// is merely unreliable gets its confidence damped so the resolver
    /// trusts it less.
    pub fn maintain_patterns(&self, user_id: i64) -> Result<MaintenanceResult> {
        let mut result = MaintenanceResult::default();
        for pattern in self.db.list_personal_patterns(user_id)? {
            if pattern.usage_count <= 5 {
                continue;
            }
            let accuracy = pattern.accuracy();
            if accuracy < 0.3 {
                self.db.delete_personal_pattern(pattern.id)?;
                info!(
                    pattern = %pattern.pattern,
                    accuracy,
                    "Removed unreliable personal pattern"
                );
                result.removed += 1;
            } else if accuracy < 0.6 {
                self.db.scale_personal_confidence(pattern.id, 0.8)?;
                result.improved += 1;
            }
        }
        Ok(result)
    }

    /// Manually assign a category outside the feedback flow
    pub fn assign_manually(&self, transaction: &Transaction, category_id: i64) -> Result<()> {
        self.db.assign_manually(transaction.id, category_id)
    }
}
