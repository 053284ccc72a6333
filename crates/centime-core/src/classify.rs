//! Transaction classification engine
//!
//! Multiple strategies each propose category candidates for a transaction;
//! the resolver in `resolve` picks among them. Personal patterns are the
//! exception: a personal match is authoritative and skips resolution
//! entirely.
//!
//! Classification itself is read-only. Persisting the outcome (status,
//! category, confidence) happens in `classify_transaction` and
//! `bulk_classify`; pattern statistics only move when feedback arrives.

use chrono::Duration;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    Assignment, AssignmentCandidate, AssignmentStatus, BulkClassifyResult, Direction,
    MatchedPattern, ResolutionRule, Strategy, Transaction,
};
use crate::normalize::{transaction_search_text, transaction_similarity};
use crate::resolve::resolve;
use crate::taxonomy;

/// How many assigned transactions the historical strategy scans
const HISTORY_SCAN_LIMIT: i64 = 500;
/// Window for the recent-similarity strategy
const RECENT_WINDOW_DAYS: i64 = 30;

/// Receives a signal whenever a category assignment lands, so budget
/// tracking can react without the engine knowing about budgets.
pub trait BudgetNotifier {
    fn assignment_applied(&self, user_id: i64, category_id: i64, amount: f64);
}

/// Notifier that does nothing
pub struct NullNotifier;

impl BudgetNotifier for NullNotifier {
    fn assignment_applied(&self, _user_id: i64, _category_id: i64, _amount: f64) {}
}

/// The auto-assignment engine
pub struct CategoryAssigner<'a> {
    db: &'a Database,
    config: EngineConfig,
    notifier: Box<dyn BudgetNotifier + Send + Sync>,
}

impl<'a> CategoryAssigner<'a> {
    pub fn new(db: &'a Database, config: EngineConfig) -> Self {
        Self {
            db,
            config,
            notifier: Box::new(NullNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn BudgetNotifier + Send + Sync>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Classify a transaction without persisting anything
    ///
    /// A personal pattern match wins outright. Otherwise every other
    /// strategy contributes candidates and the resolution cascade decides.
    pub fn classify(&self, tx: &Transaction) -> Result<Assignment> {
        let text = transaction_search_text(tx);

        // Personal patterns are authoritative
        let personal = self.db.find_personal_matches(tx.user_id, &text)?;
        if let Some(best) = personal.first() {
            debug!(
                transaction_id = tx.id,
                pattern = %best.pattern,
                "Personal pattern match"
            );
            let mut alternatives: Vec<i64> = personal[1..]
                .iter()
                .map(|p| p.category_id)
                .filter(|id| *id != best.category_id)
                .collect();
            alternatives.dedup();
            return Ok(Assignment {
                category_id: Some(best.category_id),
                confidence: best.confidence.clamp(0.0, self.config.personal_confidence_cap),
                strategy: Some(Strategy::PersonalPattern),
                resolution: ResolutionRule::SingleMatch,
                alternatives,
            });
        }

        let candidates = self.gather_candidates(tx, &text)?;
        let assignment = resolve(self.db, &self.config, tx.user_id, tx.amount, &candidates)?;

        // A resolved winner still needs a usable confidence. Weak leftovers
        // (an amount-only field, a heavily damped fallback) go to review
        // instead of auto-assigning.
        if assignment.category_id.is_some()
            && assignment.confidence < self.config.usable_signal_floor
        {
            debug!(
                transaction_id = tx.id,
                confidence = assignment.confidence,
                "Resolved confidence below floor, sending to review"
            );
            return Ok(Assignment::none());
        }
        Ok(assignment)
    }

    /// Classify one stored transaction and persist the outcome
    ///
    /// Already-assigned transactions are returned unchanged, so repeated
    /// calls are idempotent.
    pub fn classify_transaction(&self, transaction_id: i64) -> Result<Assignment> {
        let tx = self.db.get_transaction(transaction_id)?;
        if tx.status.is_assigned() {
            return Ok(Assignment {
                category_id: tx.category_id,
                confidence: tx.assignment_confidence.unwrap_or(1.0),
                strategy: None,
                resolution: ResolutionRule::SingleMatch,
                alternatives: Vec::new(),
            });
        }

        let assignment = self.classify(&tx)?;
        self.apply(&tx, &assignment)?;
        Ok(assignment)
    }

    /// Classify every unassigned transaction for a user
    pub fn bulk_classify(&self, user_id: i64, limit: i64) -> Result<BulkClassifyResult> {
        let pending =
            self.db
                .list_transactions_by_status(user_id, AssignmentStatus::Unassigned, limit)?;

        let mut result = BulkClassifyResult::default();
        for tx in &pending {
            let assignment = self.classify(tx)?;
            self.apply(tx, &assignment)?;
            result.processed += 1;
            if assignment.category_id.is_some() {
                result.assigned += 1;
                if let Some(strategy) = assignment.strategy {
                    result.record_strategy(strategy);
                }
            } else {
                result.needs_review += 1;
            }
        }

        info!(
            user_id,
            processed = result.processed,
            assigned = result.assigned,
            needs_review = result.needs_review,
            "Bulk classification finished"
        );
        Ok(result)
    }

    /// Persist a classification outcome on the transaction row
    fn apply(&self, tx: &Transaction, assignment: &Assignment) -> Result<()> {
        match assignment.category_id {
            Some(category_id) => {
                self.db.update_assignment(
                    tx.id,
                    Some(category_id),
                    Some(assignment.confidence),
                    AssignmentStatus::AutoAssigned,
                )?;
                self.notifier
                    .assignment_applied(tx.user_id, category_id, tx.amount);
            }
            None => {
                self.db.update_assignment(
                    tx.id,
                    None,
                    None,
                    AssignmentStatus::NeedsReview,
                )?;
            }
        }
        Ok(())
    }

    fn gather_candidates(
        &self,
        tx: &Transaction,
        text: &str,
    ) -> Result<Vec<AssignmentCandidate>> {
        let mut candidates = Vec::new();

        if let Some(candidate) = self.mapping_candidate(tx)? {
            candidates.push(candidate);
        }
        candidates.extend(self.global_candidates(text)?);
        if let Some(candidate) = self.historical_candidate(tx)? {
            candidates.push(candidate);
        }
        candidates.extend(self.amount_candidates(tx)?);
        if let Some(candidate) = self.similarity_candidate(tx)? {
            candidates.push(candidate);
        }

        // Weak non-amount signals are noise, not candidates. Amount-range
        // confidence is capped below the floor by construction, so it is
        // exempt rather than always dropped.
        candidates.retain(|c| {
            c.strategy == Strategy::Amount || c.confidence >= self.config.usable_signal_floor
        });
        for candidate in &mut candidates {
            candidate.confidence = candidate.confidence.clamp(0.0, 1.0);
        }
        Ok(candidates)
    }

    /// The import file's own category label, translated through the static
    /// taxonomy map
    fn mapping_candidate(&self, tx: &Transaction) -> Result<Option<AssignmentCandidate>> {
        let Some(label) = tx.import_category.as_deref() else {
            return Ok(None);
        };
        let Some(name) = taxonomy::map_import_category(label) else {
            return Ok(None);
        };
        let Some(category) = self.db.get_category_by_name(name)? else {
            return Ok(None);
        };
        Ok(Some(AssignmentCandidate {
            category_id: category.id,
            confidence: self.config.category_mapping_confidence,
            strategy: Strategy::CategoryMapping,
            specificity: 0,
            matched_pattern: None,
        }))
    }

    fn global_candidates(&self, text: &str) -> Result<Vec<AssignmentCandidate>> {
        let matches = self
            .db
            .find_global_matches(text, self.config.min_pattern_confidence)?;
        Ok(matches
            .into_iter()
            .map(|p| AssignmentCandidate {
                category_id: p.category_id,
                confidence: p.confidence,
                strategy: Strategy::GlobalPattern,
                specificity: p.specificity,
                matched_pattern: Some(MatchedPattern::Global {
                    id: p.id,
                    total_matches: p.total_matches,
                    accuracy: p.accuracy(),
                }),
            })
            .collect())
    }

    /// Votes from the user's own assignment history. Each sufficiently
    /// similar assigned transaction casts a similarity-weighted vote for
    /// its category; confidence grows with the weighted total up to a cap.
    fn historical_candidate(&self, tx: &Transaction) -> Result<Option<AssignmentCandidate>> {
        let history = self
            .db
            .list_assigned_transactions(tx.user_id, HISTORY_SCAN_LIMIT)?;

        let mut votes: Vec<(i64, f64)> = Vec::new();
        for past in &history {
            let Some(category_id) = past.category_id else {
                continue;
            };
            let similarity = transaction_similarity(tx, past);
            if similarity < self.config.historical_similarity_threshold {
                continue;
            }
            let weight = similarity * self.config.historical_vote_weight;
            match votes.iter_mut().find(|(id, _)| *id == category_id) {
                Some((_, total)) => *total += weight,
                None => votes.push((category_id, weight)),
            }
        }

        let Some(&(category_id, total)) = votes.iter().max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            return Ok(None);
        };
        let confidence = (total / self.config.historical_vote_divisor)
            .min(self.config.historical_confidence_cap);
        Ok(Some(AssignmentCandidate {
            category_id,
            confidence,
            strategy: Strategy::Historical,
            specificity: 0,
            matched_pattern: None,
        }))
    }

    /// Triangular amount-range inference; a deliberately weak signal
    ///
    /// Category ranges describe spending, so income stays out of this
    /// strategy entirely.
    fn amount_candidates(&self, tx: &Transaction) -> Result<Vec<AssignmentCandidate>> {
        if tx.direction != Direction::Expense {
            return Ok(Vec::new());
        }
        let magnitude = tx.amount.abs();
        let ranges = self.db.list_amount_ranges()?;
        Ok(ranges
            .into_iter()
            .filter(|r| r.contains(magnitude))
            .map(|r| AssignmentCandidate {
                category_id: r.category_id,
                confidence: r.confidence_at(magnitude) * self.config.amount_confidence_cap,
                strategy: Strategy::Amount,
                specificity: 0,
                matched_pattern: None,
            })
            .filter(|c| c.confidence > 0.0)
            .collect())
    }

    /// Nearest recently assigned transaction, if close enough
    fn similarity_candidate(&self, tx: &Transaction) -> Result<Option<AssignmentCandidate>> {
        let period_start = tx.date - Duration::days(RECENT_WINDOW_DAYS);
        let recent = self.db.list_recently_assigned(tx.user_id, period_start)?;

        let mut best: Option<(i64, f64)> = None;
        for past in &recent {
            let Some(category_id) = past.category_id else {
                continue;
            };
            let similarity = transaction_similarity(tx, past);
            if similarity < self.config.recent_similarity_threshold {
                continue;
            }
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((category_id, similarity));
            }
        }

        Ok(best.map(|(category_id, similarity)| AssignmentCandidate {
            category_id,
            confidence: similarity * self.config.recent_confidence_cap,
            strategy: Strategy::Similarity,
            specificity: 0,
            matched_pattern: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TransactionInsert;
    use crate::ingest::import_hash;
    use crate::models::{CategoryGroup, Direction, NewTransaction, PatternKind, PatternSource};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn setup() -> (Database, i64, i64) {
        let db = Database::in_memory().unwrap();
        let user = db.ensure_user("test").unwrap();
        let account = db.ensure_account(user, "checking").unwrap();
        (db, user, account)
    }

    fn insert(
        db: &Database,
        user: i64,
        account: i64,
        description: &str,
        amount: f64,
        import_category: Option<&str>,
    ) -> i64 {
        let date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        let tx = NewTransaction {
            date,
            description: description.to_string(),
            merchant: None,
            amount,
            direction: Direction::from_amount(amount),
            import_category: import_category.map(str::to_string),
            import_hash: import_hash(&date, description, amount),
            original_data: None,
        };
        match db.insert_transaction(account, user, &tx).unwrap() {
            TransactionInsert::Inserted(id) | TransactionInsert::Duplicate(id) => id,
        }
    }

    #[test]
    fn test_global_pattern_end_to_end() {
        let (db, user, account) = setup();
        let groceries = db
            .create_category("groceries", CategoryGroup::Essential, None, None)
            .unwrap();
        db.create_global_pattern(".*CARREFOUR.*", PatternKind::Regex, groceries, 9, 0.8)
            .unwrap();

        let tx_id = insert(&db, user, account, "CARREFOUR PARIS 15", -65.20, None);
        let assigner = CategoryAssigner::new(&db, EngineConfig::default());
        let assignment = assigner.classify_transaction(tx_id).unwrap();

        assert_eq!(assignment.category_id, Some(groceries));
        assert_eq!(assignment.strategy, Some(Strategy::GlobalPattern));
        assert!((assignment.confidence - 0.8).abs() < 1e-9);

        let stored = db.get_transaction(tx_id).unwrap();
        assert_eq!(stored.status, AssignmentStatus::AutoAssigned);
        assert_eq!(stored.category_id, Some(groceries));
    }

    #[test]
    fn test_personal_pattern_beats_global() {
        let (db, user, account) = setup();
        let groceries = db
            .create_category("groceries", CategoryGroup::Essential, None, None)
            .unwrap();
        let dining = db
            .create_category("dining", CategoryGroup::Lifestyle, None, None)
            .unwrap();
        // Global says groceries; the user's own pattern says dining
        db.create_global_pattern("CARREFOUR", PatternKind::Keyword, groceries, 9, 0.95)
            .unwrap();
        db.upsert_personal_pattern(user, "CARREFOUR", dining, PatternSource::Confirmed, 4, 4, 0.85)
            .unwrap();

        let tx_id = insert(&db, user, account, "CARREFOUR CITY", -12.0, None);
        let assigner = CategoryAssigner::new(&db, EngineConfig::default());
        let assignment = assigner.classify_transaction(tx_id).unwrap();

        assert_eq!(assignment.category_id, Some(dining));
        assert_eq!(assignment.strategy, Some(Strategy::PersonalPattern));
    }

    #[test]
    fn test_classify_is_idempotent() {
        let (db, user, account) = setup();
        let groceries = db
            .create_category("groceries", CategoryGroup::Essential, None, None)
            .unwrap();
        db.create_global_pattern("MONOPRIX", PatternKind::Keyword, groceries, 8, 0.8)
            .unwrap();

        let tx_id = insert(&db, user, account, "MONOPRIX", -30.0, None);
        let assigner = CategoryAssigner::new(&db, EngineConfig::default());

        let first = assigner.classify_transaction(tx_id).unwrap();
        let second = assigner.classify_transaction(tx_id).unwrap();
        assert_eq!(first.category_id, second.category_id);
        assert!((first.confidence - second.confidence).abs() < 1e-9);

        let stored = db.get_transaction(tx_id).unwrap();
        assert_eq!(stored.status, AssignmentStatus::AutoAssigned);
    }

    #[test]
    fn test_no_signal_goes_to_needs_review() {
        let (db, user, account) = setup();
        db.create_category("groceries", CategoryGroup::Essential, None, None)
            .unwrap();

        let tx_id = insert(&db, user, account, "TOTALLY OBSCURE MERCHANT", -42.0, None);
        let assigner = CategoryAssigner::new(&db, EngineConfig::default());
        let assignment = assigner.classify_transaction(tx_id).unwrap();

        assert!(assignment.category_id.is_none());
        assert_eq!(assignment.resolution, ResolutionRule::NoPatternMatch);
        let stored = db.get_transaction(tx_id).unwrap();
        assert_eq!(stored.status, AssignmentStatus::NeedsReview);
    }

    #[test]
    fn test_amount_inference_skips_income() {
        let (db, user, account) = setup();
        let groceries = db
            .create_category("groceries", CategoryGroup::Essential, Some(20.0), Some(250.0))
            .unwrap();

        // A deposit at the range midpoint must not look like groceries
        let income_id = insert(&db, user, account, "REMBOURSEMENT AMI", 135.0, None);
        let assigner = CategoryAssigner::new(&db, EngineConfig::default());
        let assignment = assigner.classify_transaction(income_id).unwrap();
        assert!(assignment.category_id.is_none());
        assert_eq!(
            db.get_transaction(income_id).unwrap().status,
            AssignmentStatus::NeedsReview
        );

        // The same magnitude spent is a valid (weak) amount signal
        let expense_id = insert(&db, user, account, "PAIEMENT DIVERS", -135.0, None);
        let assignment = assigner.classify_transaction(expense_id).unwrap();
        assert_eq!(assignment.category_id, Some(groceries));
        assert_eq!(assignment.strategy, Some(Strategy::Amount));
    }

    #[test]
    fn test_historical_votes_weighted_by_similarity() {
        let (db, user, account) = setup();
        let vet = db
            .create_category("vet", CategoryGroup::Lifestyle, None, None)
            .unwrap();

        // Five near-identical assigned visits are plenty of history
        for amount in [-80.0, -81.0, -82.0, -83.0, -84.0] {
            let id = insert(&db, user, account, "CLINIQUE VETERINAIRE AZUR", amount, None);
            db.update_assignment(id, Some(vet), Some(0.9), AssignmentStatus::AutoAssigned)
                .unwrap();
        }

        let tx_id = insert(&db, user, account, "CLINIQUE VETERINAIRE AZUR", -85.0, None);
        let assigner = CategoryAssigner::new(&db, EngineConfig::default());
        let assignment = assigner.classify_transaction(tx_id).unwrap();

        assert_eq!(assignment.category_id, Some(vet));
        assert_eq!(assignment.strategy, Some(Strategy::Historical));
        // Five similarity-1.0 votes of weight 10 hit the 0.9 cap
        assert!((assignment.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_import_category_mapping() {
        let (db, user, account) = setup();
        let groceries = db
            .create_category("groceries", CategoryGroup::Essential, None, None)
            .unwrap();

        let tx_id = insert(&db, user, account, "CB 4412", -45.67, Some("Alimentation"));
        let assigner = CategoryAssigner::new(&db, EngineConfig::default());
        let assignment = assigner.classify_transaction(tx_id).unwrap();

        assert_eq!(assignment.category_id, Some(groceries));
        assert_eq!(assignment.strategy, Some(Strategy::CategoryMapping));
        assert!((assignment.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_bulk_classify_counts() {
        let (db, user, account) = setup();
        let groceries = db
            .create_category("groceries", CategoryGroup::Essential, None, None)
            .unwrap();
        db.create_global_pattern("CARREFOUR", PatternKind::Keyword, groceries, 9, 0.8)
            .unwrap();

        insert(&db, user, account, "CARREFOUR A", -10.0, None);
        insert(&db, user, account, "CARREFOUR B", -20.0, None);
        insert(&db, user, account, "MYSTERY SHOP", -42.0, None);

        let assigner = CategoryAssigner::new(&db, EngineConfig::default());
        let result = assigner.bulk_classify(user, 100).unwrap();

        assert_eq!(result.processed, 3);
        assert_eq!(result.assigned, 2);
        assert_eq!(result.needs_review, 1);
        assert_eq!(result.by_global_pattern, 2);

        // A second pass finds nothing left to do
        let again = assigner.bulk_classify(user, 100).unwrap();
        assert_eq!(again.processed, 0);
    }

    #[test]
    fn test_notifier_fires_on_assignment() {
        struct Counting(Arc<AtomicI64>);
        impl BudgetNotifier for Counting {
            fn assignment_applied(&self, _user_id: i64, _category_id: i64, _amount: f64) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let (db, user, account) = setup();
        let groceries = db
            .create_category("groceries", CategoryGroup::Essential, None, None)
            .unwrap();
        db.create_global_pattern("LIDL", PatternKind::Keyword, groceries, 4, 0.8)
            .unwrap();

        insert(&db, user, account, "LIDL COURSES", -25.0, None);
        insert(&db, user, account, "NO MATCH HERE", -99.0, None);

        let count = Arc::new(AtomicI64::new(0));
        let assigner = CategoryAssigner::new(&db, EngineConfig::default())
            .with_notifier(Box::new(Counting(count.clone())));
        assigner.bulk_classify(user, 100).unwrap();

        // Only the assigned transaction notifies
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
