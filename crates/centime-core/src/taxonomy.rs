//! Category taxonomy: default categories, coarse import-label mapping, and
//! legacy name translation
//!
//! Bank exports and older Centime versions describe categories with free-form
//! labels. Both surfaces are bounded translation tables into the canonical
//! category set rather than string comparisons scattered through the engine.

use crate::models::CategoryGroup;

/// Default category set seeded at init
///
/// (name, group, typical_min, typical_max). Ranges are absolute amounts;
/// None disables the amount-range strategy for that category.
pub const DEFAULT_CATEGORIES: &[(
    &str,
    CategoryGroup,
    Option<f64>,
    Option<f64>,
)] = &[
    ("salary", CategoryGroup::Income, None, None),
    ("other_income", CategoryGroup::Income, None, None),
    ("groceries", CategoryGroup::Essential, Some(20.0), Some(250.0)),
    ("bills", CategoryGroup::Essential, Some(30.0), Some(300.0)),
    ("housing", CategoryGroup::Essential, Some(400.0), Some(2500.0)),
    ("transport", CategoryGroup::Essential, Some(1.5), Some(80.0)),
    ("healthcare", CategoryGroup::Essential, Some(5.0), Some(150.0)),
    ("dining", CategoryGroup::Lifestyle, Some(3.0), Some(120.0)),
    ("shopping", CategoryGroup::Lifestyle, Some(10.0), Some(400.0)),
    ("entertainment", CategoryGroup::Lifestyle, Some(5.0), Some(100.0)),
    ("subscriptions", CategoryGroup::Lifestyle, Some(3.0), Some(60.0)),
    ("travel", CategoryGroup::Lifestyle, Some(30.0), Some(1500.0)),
    ("savings", CategoryGroup::Savings, None, None),
    ("other", CategoryGroup::Other, None, None),
];

/// Starter global patterns seeded at init
///
/// (pattern, is_regex, category, specificity). Specificity is roughly the
/// length of the distinctive part of the pattern.
pub const DEFAULT_GLOBAL_PATTERNS: &[(&str, bool, &str, i64)] = &[
    ("CARREFOUR", false, "groceries", 9),
    ("AUCHAN", false, "groceries", 6),
    ("LECLERC", false, "groceries", 7),
    ("INTERMARCHE", false, "groceries", 11),
    ("MONOPRIX", false, "groceries", 8),
    ("LIDL", false, "groceries", 4),
    ("SUPERMARCHE", false, "groceries", 11),
    ("BOULANGERIE", false, "dining", 11),
    ("MCDONALD", false, "dining", 8),
    ("DELIVEROO", false, "dining", 9),
    ("UBER EATS", false, "dining", 9),
    (r"RESTAURANT\s", true, "dining", 10),
    ("SNCF", false, "transport", 4),
    ("RATP", false, "transport", 4),
    ("UBER", false, "transport", 4),
    ("TOTALENERGIES", false, "transport", 13),
    ("AUTOROUTE", false, "transport", 9),
    ("EDF", false, "bills", 3),
    ("ENGIE", false, "bills", 5),
    ("ORANGE", false, "bills", 6),
    ("FREE MOBILE", false, "bills", 11),
    ("BOUYGUES", false, "bills", 8),
    ("NETFLIX", false, "subscriptions", 7),
    ("SPOTIFY", false, "subscriptions", 7),
    (r"AMAZON\s*PRIME", true, "subscriptions", 11),
    ("PHARMACIE", false, "healthcare", 9),
    ("AMAZON", false, "shopping", 6),
    ("FNAC", false, "shopping", 4),
    ("ZARA", false, "shopping", 4),
    ("CINEMA", false, "entertainment", 6),
    ("AIRBNB", false, "travel", 6),
    ("BOOKING", false, "travel", 7),
    (r"VIREMENT\s+SALAIRE", true, "salary", 16),
    ("LOYER", false, "housing", 5),
];

/// Map a coarse category label carried by an import file to a canonical
/// category name
///
/// Bank exports carry human-readable labels ("Alimentation", "Food & Drink",
/// "Transportation-Fuel"); this translates them to the canonical set.
/// Returns None when the label does not map, which simply yields no
/// candidate from the mapping strategy.
pub fn map_import_category(label: &str) -> Option<&'static str> {
    let label = label.trim().to_lowercase();
    if label.is_empty() {
        return None;
    }

    // Groceries
    if label.contains("alimentation")
        || label.contains("groceries")
        || label.contains("supermarket")
        || label.contains("supermarche")
    {
        return Some("groceries");
    }

    // Dining
    if label.contains("restaurant")
        || label.contains("restauration")
        || label.contains("food & drink")
        || label.contains("fast food")
    {
        return Some("dining");
    }

    // Transport (including fuel)
    if label.starts_with("transport")
        || label.contains("essence")
        || label.contains("fuel")
        || label.contains("carburant")
        || label.contains("parking")
        || label.contains("peage")
    {
        return Some("transport");
    }

    // Housing
    if label.contains("loyer") || label.contains("rent") || label.contains("housing") {
        return Some("housing");
    }

    // Bills and utilities
    if label.contains("facture")
        || label.contains("utilities")
        || label.contains("electricite")
        || label.contains("energie")
        || label.contains("telecom")
        || label.contains("internet")
    {
        return Some("bills");
    }

    // Healthcare
    if label.contains("sante")
        || label.contains("health")
        || label.contains("pharmac")
        || label.contains("medical")
    {
        return Some("healthcare");
    }

    // Subscriptions
    if label.contains("abonnement") || label.contains("subscription") {
        return Some("subscriptions");
    }

    // Entertainment
    if label.contains("loisir")
        || label.contains("entertainment")
        || label.contains("divertissement")
    {
        return Some("entertainment");
    }

    // Travel
    if label.contains("voyage")
        || label.contains("travel")
        || label.contains("hotel")
        || label.contains("airline")
    {
        return Some("travel");
    }

    // Shopping
    if label.contains("shopping")
        || label.contains("vetement")
        || label.contains("clothing")
        || label.contains("merchandise")
        || label.contains("retail")
    {
        return Some("shopping");
    }

    // Savings
    if label.contains("epargne") || label.contains("savings") {
        return Some("savings");
    }

    // Income
    if label.contains("salaire")
        || label.contains("salary")
        || label.contains("revenu")
        || label.contains("income")
        || label.contains("payroll")
    {
        return Some("salary");
    }

    None
}

/// Legacy display-name compatibility mapping (old key -> canonical name)
///
/// Bounded table for databases created before category names were
/// canonicalized. New code should only ever see canonical names.
const LEGACY_NAMES: &[(&str, &str)] = &[
    ("Alimentation", "groceries"),
    ("Courses", "groceries"),
    ("Restaurants", "dining"),
    ("Sorties", "entertainment"),
    ("Factures", "bills"),
    ("Logement", "housing"),
    ("Transports", "transport"),
    ("Santé", "healthcare"),
    ("Abonnements", "subscriptions"),
    ("Vêtements", "shopping"),
    ("Voyages", "travel"),
    ("Épargne", "savings"),
    ("Salaire", "salary"),
    ("Divers", "other"),
];

/// Translate a possibly-legacy category name to its canonical form
///
/// Canonical names pass through unchanged.
pub fn canonical_category_name(name: &str) -> &str {
    for (legacy, canonical) in LEGACY_NAMES {
        if name.eq_ignore_ascii_case(legacy) {
            return canonical;
        }
    }
    name
}

/// Whether a category is a plausible pick for very small amounts
/// (coffee-and-bus-ticket territory)
pub fn favors_small_amounts(category_name: &str) -> bool {
    matches!(category_name, "transport" | "dining")
}

/// Whether a category is a plausible pick for large amounts
pub fn favors_large_amounts(category_name: &str) -> bool {
    matches!(
        category_name,
        "groceries" | "bills" | "shopping" | "housing" | "travel"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_import_category() {
        assert_eq!(map_import_category("Alimentation"), Some("groceries"));
        assert_eq!(map_import_category("Food & Drink"), Some("dining"));
        assert_eq!(map_import_category("Transportation-Fuel"), Some("transport"));
        assert_eq!(map_import_category("Abonnement streaming"), Some("subscriptions"));
        assert_eq!(map_import_category("Salaire"), Some("salary"));
        // Unknown labels yield no candidate
        assert_eq!(map_import_category("Business Services"), None);
        assert_eq!(map_import_category(""), None);
    }

    #[test]
    fn test_canonical_category_name() {
        assert_eq!(canonical_category_name("Courses"), "groceries");
        assert_eq!(canonical_category_name("Épargne"), "savings");
        // Canonical names pass through
        assert_eq!(canonical_category_name("groceries"), "groceries");
        assert_eq!(canonical_category_name("unmapped"), "unmapped");
    }

    #[test]
    fn test_amount_preferences() {
        assert!(favors_small_amounts("transport"));
        assert!(favors_small_amounts("dining"));
        assert!(!favors_small_amounts("groceries"));

        assert!(favors_large_amounts("groceries"));
        assert!(favors_large_amounts("bills"));
        assert!(!favors_large_amounts("dining"));
    }

    #[test]
    fn test_default_patterns_reference_default_categories() {
        for (_, _, category, _) in DEFAULT_GLOBAL_PATTERNS {
            assert!(
                DEFAULT_CATEGORIES.iter().any(|(name, _, _, _)| name == category),
                "pattern references unknown category {}",
                category
            );
        }
    }
}
