//! Domain models for Centime

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A user of the budgeting backend
///
/// Personal patterns, feedback history, and transactions are all scoped to a
/// user; the engine never mixes signal across users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A bank account owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Transaction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Infer direction from a signed amount (negative = expense)
    pub fn from_amount(amount: f64) -> Self {
        if amount < 0.0 {
            Self::Expense
        } else {
            Self::Income
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Assignment lifecycle of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Never classified
    #[default]
    Unassigned,
    /// Assigned by the engine
    AutoAssigned,
    /// Assigned by the user
    ManuallyAssigned,
    /// Engine could not classify with confidence; awaits human decision
    NeedsReview,
    /// Assigned within the current budget period (eligible as a similarity
    /// reference for new transactions)
    RecentlyAssigned,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unassigned => "unassigned",
            Self::AutoAssigned => "auto_assigned",
            Self::ManuallyAssigned => "manually_assigned",
            Self::NeedsReview => "needs_review",
            Self::RecentlyAssigned => "recently_assigned",
        }
    }

    /// True if the transaction carries a category the engine may learn from
    pub fn is_assigned(&self) -> bool {
        matches!(
            self,
            Self::AutoAssigned | Self::ManuallyAssigned | Self::RecentlyAssigned
        )
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unassigned" => Ok(Self::Unassigned),
            "auto_assigned" => Ok(Self::AutoAssigned),
            "manually_assigned" => Ok(Self::ManuallyAssigned),
            "needs_review" => Ok(Self::NeedsReview),
            "recently_assigned" => Ok(Self::RecentlyAssigned),
            _ => Err(format!("Unknown assignment status: {}", s)),
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bank transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub description: String,
    /// Merchant text from the bank, when distinct from the description
    pub merchant: Option<String>,
    /// Signed, currency-agnostic. Negative = expense.
    pub amount: f64,
    pub direction: Direction,
    pub status: AssignmentStatus,
    pub category_id: Option<i64>,
    /// Confidence of the winning candidate, possibly down-weighted by
    /// conflict resolution. Always in [0, 1]. None for manual assignments.
    pub assignment_confidence: Option<f64>,
    /// Coarse category label carried over from the import file, if any
    pub import_category: Option<String>,
    /// SHA-256 over (date, description, amount) for deduplication
    pub import_hash: String,
    /// Original CSV row as JSON
    pub original_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A transaction candidate produced by ingestion, before insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub merchant: Option<String>,
    pub amount: f64,
    pub direction: Direction,
    pub import_category: Option<String>,
    pub import_hash: String,
    pub original_data: Option<String>,
}

/// A spending category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub group: CategoryGroup,
    /// Typical absolute amount range for this category, if known
    pub typical_min: Option<f64>,
    pub typical_max: Option<f64>,
}

impl Category {
    /// The amount range signal for this category, when both bounds are set
    pub fn amount_range(&self) -> Option<AmountRange> {
        match (self.typical_min, self.typical_max) {
            (Some(min), Some(max)) if min < max => Some(AmountRange {
                category_id: self.id,
                min,
                max,
            }),
            _ => None,
        }
    }
}

/// Closed set of category groups
///
/// Exhaustive matching on this enum replaces the string comparisons the
/// amount-validation and mapping rules would otherwise need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryGroup {
    Income,
    Essential,
    Lifestyle,
    Savings,
    Other,
}

impl CategoryGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Essential => "essential",
            Self::Lifestyle => "lifestyle",
            Self::Savings => "savings",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for CategoryGroup {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "essential" => Ok(Self::Essential),
            "lifestyle" => Ok(Self::Lifestyle),
            "savings" => Ok(Self::Savings),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown category group: {}", s)),
        }
    }
}

impl std::fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typical amount range for a category, used as a weak classification signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub category_id: i64,
    pub min: f64,
    pub max: f64,
}

impl AmountRange {
    /// Inclusive containment check on the absolute amount
    pub fn contains(&self, amount: f64) -> bool {
        let a = amount.abs();
        a >= self.min && a <= self.max
    }

    /// Triangular confidence: 1.0 at the midpoint, falling linearly to 0 at
    /// either boundary, 0 outside the range.
    pub fn confidence_at(&self, amount: f64) -> f64 {
        let a = amount.abs();
        if a < self.min || a > self.max {
            return 0.0;
        }
        let mid = (self.min + self.max) / 2.0;
        let half = (self.max - self.min) / 2.0;
        if half <= 0.0 {
            return 0.0;
        }
        1.0 - (a - mid).abs() / half
    }
}

/// How a global pattern's text is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Case-insensitive substring match
    Keyword,
    /// Full regex match
    Regex,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Regex => "regex",
        }
    }
}

impl std::str::FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "regex" => Ok(Self::Regex),
            _ => Err(format!("Unknown pattern kind: {}", s)),
        }
    }
}

/// A shared (global) merchant pattern mapping text to a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPattern {
    pub id: i64,
    pub pattern: String,
    pub kind: PatternKind,
    pub category_id: i64,
    /// Distinctiveness proxy; longer, rarer patterns score higher
    pub specificity: i64,
    /// Decays or grows with match outcomes. Always in [0, 1].
    pub confidence: f64,
    pub total_matches: i64,
    pub accepted_matches: i64,
}

impl CategoryPattern {
    /// accepted / total, or 0.0 before any match was recorded
    pub fn accuracy(&self) -> f64 {
        if self.total_matches == 0 {
            0.0
        } else {
            self.accepted_matches as f64 / self.total_matches as f64
        }
    }
}

/// Origin of a personal pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSource {
    /// Created directly from user feedback
    Confirmed,
    /// Inferred from repeated manual assignments
    Learned,
}

impl PatternSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Learned => "learned",
        }
    }
}

impl std::str::FromStr for PatternSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "confirmed" => Ok(Self::Confirmed),
            "learned" => Ok(Self::Learned),
            _ => Err(format!("Unknown pattern source: {}", s)),
        }
    }
}

/// A per-user merchant pattern; always checked before global patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMerchantPattern {
    pub id: i64,
    pub user_id: i64,
    /// Normalized merchant key (see `normalize::merchant_key`)
    pub pattern: String,
    pub category_id: i64,
    pub source: PatternSource,
    pub usage_count: i64,
    pub success_count: i64,
    pub confidence: f64,
    pub last_used_at: DateTime<Utc>,
}

impl UserMerchantPattern {
    /// success / usage, or 0.0 before any use was recorded
    pub fn accuracy(&self) -> f64 {
        if self.usage_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.usage_count as f64
        }
    }
}

/// The heuristic that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Coarse import label translated via the static taxonomy map
    CategoryMapping,
    /// Per-user pattern; authoritative, bypasses all other strategies
    PersonalPattern,
    /// Shared keyword/regex pattern
    GlobalPattern,
    /// Votes from the user's own assignment history
    Historical,
    /// Typical-amount-range inference
    Amount,
    /// Similarity to recently auto-assigned transactions
    Similarity,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CategoryMapping => "category_mapping",
            Self::PersonalPattern => "personal_pattern",
            Self::GlobalPattern => "global_pattern",
            Self::Historical => "historical",
            Self::Amount => "amount",
            Self::Similarity => "similarity",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which conflict-resolution rule decided the assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionRule {
    /// Only one candidate was generated
    SingleMatch,
    /// Specificity-weighted score cleared the acceptance bar
    SpecificityWeighted,
    /// The user's feedback history favored one category
    UserFeedbackHistory,
    /// Long-run pattern accuracy favored one candidate
    AccuracyHistory,
    /// Coarse amount-based preference among the candidates
    AmountValidation,
    /// Highest (specificity, confidence) candidate, down-weighted
    FallbackSpecificity,
    /// No candidates at all
    NoPatternMatch,
}

impl ResolutionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleMatch => "single_match",
            Self::SpecificityWeighted => "specificity_weighted",
            Self::UserFeedbackHistory => "user_feedback_history",
            Self::AccuracyHistory => "accuracy_history",
            Self::AmountValidation => "amount_validation",
            Self::FallbackSpecificity => "fallback_specificity",
            Self::NoPatternMatch => "no_pattern_match",
        }
    }
}

impl std::fmt::Display for ResolutionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stats carried on a candidate when it came from a stored pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchedPattern {
    Global {
        id: i64,
        total_matches: i64,
        accuracy: f64,
    },
    Personal {
        id: i64,
    },
}

/// Transient candidate produced per classification call, never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentCandidate {
    pub category_id: i64,
    /// Always in [0, 1]
    pub confidence: f64,
    pub strategy: Strategy,
    /// Distinctiveness proxy; 0 for non-pattern strategies
    pub specificity: i64,
    pub matched_pattern: Option<MatchedPattern>,
}

/// Outcome of classifying one transaction
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    /// None = could not classify; transaction goes to NEEDS_REVIEW
    pub category_id: Option<i64>,
    pub confidence: f64,
    pub strategy: Option<Strategy>,
    pub resolution: ResolutionRule,
    /// Runner-up category ids, best first
    pub alternatives: Vec<i64>,
}

impl Assignment {
    /// The "no signal" outcome
    pub fn none() -> Self {
        Self {
            category_id: None,
            confidence: 0.0,
            strategy: None,
            resolution: ResolutionRule::NoPatternMatch,
            alternatives: Vec::new(),
        }
    }
}

/// Result of a bulk classification pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkClassifyResult {
    pub processed: i64,
    pub assigned: i64,
    pub needs_review: i64,
    pub by_category_mapping: i64,
    pub by_personal_pattern: i64,
    pub by_global_pattern: i64,
    pub by_historical: i64,
    pub by_amount: i64,
    pub by_similarity: i64,
}

impl BulkClassifyResult {
    pub(crate) fn record_strategy(&mut self, strategy: Strategy) {
        match strategy {
            Strategy::CategoryMapping => self.by_category_mapping += 1,
            Strategy::PersonalPattern => self.by_personal_pattern += 1,
            Strategy::GlobalPattern => self.by_global_pattern += 1,
            Strategy::Historical => self.by_historical += 1,
            Strategy::Amount => self.by_amount += 1,
            Strategy::Similarity => self.by_similarity += 1,
        }
    }
}

/// Feedback payload before insertion
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub user_id: i64,
    pub transaction_id: i64,
    pub suggested_category_id: i64,
    pub chosen_category_id: i64,
    pub accepted: bool,
    pub pattern_used: Option<String>,
}

/// Counts returned by personal-pattern maintenance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceResult {
    /// Patterns whose confidence was damped
    pub improved: i64,
    /// Patterns deleted outright
    pub removed: i64,
}
