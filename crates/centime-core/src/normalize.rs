//! Merchant text normalization and similarity scoring
//!
//! All matching runs against a canonical uppercase search string built from
//! merchant name + description. Similarity between transactions is a weighted
//! blend of merchant similarity, description similarity, amount closeness,
//! and direction agreement.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::Transaction;

/// Blend weights for transaction similarity
const MERCHANT_WEIGHT: f64 = 0.4;
const DESCRIPTION_WEIGHT: f64 = 0.3;
const AMOUNT_WEIGHT: f64 = 0.2;
const DIRECTION_WEIGHT: f64 = 0.1;

/// Amounts within this relative distance count as "close"
const AMOUNT_TOLERANCE: f64 = 0.2;

/// Build the canonical uppercase search string for pattern matching
///
/// Concatenates merchant name and description separated by a space, skipping
/// either when empty, and skipping the description when it duplicates the
/// merchant name. Empty inputs yield an empty string.
pub fn search_text(merchant: Option<&str>, description: Option<&str>) -> String {
    let merchant = merchant.map(str::trim).unwrap_or("");
    let description = description.map(str::trim).unwrap_or("");

    let text = if merchant.is_empty() {
        description.to_string()
    } else if description.is_empty() || description.eq_ignore_ascii_case(merchant) {
        merchant.to_string()
    } else {
        format!("{} {}", merchant, description)
    };

    text.to_uppercase()
}

/// Search text for a transaction
pub fn transaction_search_text(tx: &Transaction) -> String {
    search_text(tx.merchant.as_deref(), Some(&tx.description))
}

fn date_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}/\d{1,2}$").expect("static regex"))
}

/// Extract the normalized merchant key personal patterns are stored under
///
/// Uppercases, drops tokens of length <= 2, pure-numeric tokens, and
/// date-shaped tokens (dd/mm), then keeps the first two significant tokens.
/// An input with no significant tokens maps to "UNKNOWN".
pub fn merchant_key(text: &str) -> String {
    let upper = text.to_uppercase();
    let tokens: Vec<&str> = upper
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !date_token_re().is_match(t))
        .take(2)
        .collect();

    if tokens.is_empty() {
        "UNKNOWN".to_string()
    } else {
        tokens.join(" ")
    }
}

/// Case-insensitive string similarity in [0, 1]
///
/// Identical strings score 1.0, containment scores 0.8, otherwise
/// 1 - normalized Levenshtein distance.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.8;
    }

    let max_len = a.chars().count().max(b.chars().count());
    let distance = strsim::levenshtein(&a, &b);
    1.0 - distance as f64 / max_len as f64
}

/// Similarity of two transactions in [0, 1]
///
/// Weighted blend: merchant 0.4, description 0.3, amount closeness within
/// 20% 0.2, same direction 0.1. Missing merchant text on either side shifts
/// its weight onto the description comparison.
pub fn transaction_similarity(a: &Transaction, b: &Transaction) -> f64 {
    let description_sim = string_similarity(&a.description, &b.description);

    let mut score = 0.0;
    match (a.merchant.as_deref(), b.merchant.as_deref()) {
        (Some(ma), Some(mb)) => {
            score += MERCHANT_WEIGHT * string_similarity(ma, mb);
            score += DESCRIPTION_WEIGHT * description_sim;
        }
        _ => {
            score += (MERCHANT_WEIGHT + DESCRIPTION_WEIGHT) * description_sim;
        }
    }

    let amount_a = a.amount.abs();
    let amount_b = b.amount.abs();
    let larger = amount_a.max(amount_b);
    if larger > 0.0 && (amount_a - amount_b).abs() / larger <= AMOUNT_TOLERANCE {
        score += AMOUNT_WEIGHT;
    }

    if a.direction == b.direction {
        score += DIRECTION_WEIGHT;
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssignmentStatus, Direction};
    use chrono::{NaiveDate, Utc};

    fn tx(description: &str, merchant: Option<&str>, amount: f64) -> Transaction {
        Transaction {
            id: 0,
            account_id: 1,
            user_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            description: description.to_string(),
            merchant: merchant.map(String::from),
            amount,
            direction: Direction::from_amount(amount),
            status: AssignmentStatus::Unassigned,
            category_id: None,
            assignment_confidence: None,
            import_category: None,
            import_hash: String::new(),
            original_data: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_search_text() {
        assert_eq!(
            search_text(Some("Carrefour"), Some("courses mars")),
            "CARREFOUR COURSES MARS"
        );
        assert_eq!(search_text(None, Some("courses")), "COURSES");
        assert_eq!(search_text(Some("Carrefour"), None), "CARREFOUR");
        assert_eq!(search_text(None, None), "");
        // Duplicate description is not repeated
        assert_eq!(search_text(Some("Carrefour"), Some("CARREFOUR")), "CARREFOUR");
    }

    #[test]
    fn test_merchant_key() {
        assert_eq!(merchant_key("SUPERMARCHE XYZ PARIS 15"), "SUPERMARCHE XYZ");
        // Short, numeric, and date-like tokens are dropped
        assert_eq!(merchant_key("CB 12/03 CARREFOUR 75015"), "CARREFOUR");
        assert_eq!(merchant_key("12 34 ab"), "UNKNOWN");
        assert_eq!(merchant_key(""), "UNKNOWN");
    }

    #[test]
    fn test_string_similarity() {
        assert_eq!(string_similarity("CARREFOUR", "carrefour"), 1.0);
        assert_eq!(string_similarity("CARREFOUR", "CARREFOUR MARKET"), 0.8);
        // Distinct strings score by normalized Levenshtein
        let sim = string_similarity("kitten", "sitting");
        assert!((sim - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
        assert_eq!(string_similarity("", "anything"), 0.0);
    }

    #[test]
    fn test_transaction_similarity_identical() {
        let a = tx("COURSES", Some("CARREFOUR"), -65.20);
        let b = tx("COURSES", Some("CARREFOUR"), -60.00);
        // Same merchant + description + close amount + same direction
        assert!((transaction_similarity(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_transaction_similarity_amount_window() {
        let a = tx("COURSES", Some("CARREFOUR"), -100.0);
        let close = tx("COURSES", Some("CARREFOUR"), -85.0);
        let far = tx("COURSES", Some("CARREFOUR"), -50.0);
        assert!(transaction_similarity(&a, &close) > transaction_similarity(&a, &far));
    }

    #[test]
    fn test_transaction_similarity_no_merchant() {
        // Merchant weight shifts to description when merchant text is absent
        let a = tx("NETFLIX.COM", None, -15.99);
        let b = tx("NETFLIX.COM", None, -15.99);
        assert!((transaction_similarity(&a, &b) - 1.0).abs() < 1e-9);
    }
}
