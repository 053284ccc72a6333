//! CSV ingestion: separator and layout detection, tolerant field parsing
//!
//! Bank exports disagree on everything: separators, date order, decimal
//! marks, whether amounts live in one signed column or split debit/credit
//! columns. Parsing here is per-row tolerant (a bad row is reported, not
//! fatal) and keeps the raw cells as JSON so nothing from the source file
//! is lost.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::error::{Result, ValidationError};
use crate::models::{Direction, NewTransaction};

/// Dedup hash over the fields that identify a transaction across re-imports
pub fn import_hash(date: &NaiveDate, description: &str, amount: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(description.trim().as_bytes());
    hasher.update(b"|");
    hasher.update(format!("{:.2}", amount).as_bytes());
    hex::encode(hasher.finalize())
}

/// Pick the field separator from a sample of the file
///
/// Highest occurrence count in the first line wins; ties go to semicolon,
/// then comma, then tab. French bank exports are typically
/// semicolon-separated.
pub fn detect_separator(sample: &str) -> u8 {
    let first_line = sample.lines().next().unwrap_or("");
    let counts = [
        (b';', first_line.matches(';').count()),
        (b',', first_line.matches(',').count()),
        (b'\t', first_line.matches('\t').count()),
    ];
    // Strict comparison keeps the earlier candidate on ties
    let mut best = (b',', 0);
    for (sep, count) in counts {
        if count > best.1 {
            best = (sep, count);
        }
    }
    best.0
}

/// Date formats tried in order. Day-first formats come first; bare-year
/// ISO is unambiguous so it sits in the middle; month-first US order is
/// the last resort.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%d/%m/%y",
    "%m/%d/%Y",
];

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

fn french_decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\d{1,2}$").unwrap())
}

/// Parse an amount in either French ("1 234,56") or anglophone
/// ("1,234.56") notation
///
/// A trailing comma-decimal marks the French convention; dots and spaces
/// are then thousands separators. Otherwise commas are thousands
/// separators. Currency symbols and non-breaking spaces are stripped
/// either way, and a parenthesized value is the accounting notation for
/// a negative amount.
pub fn parse_amount(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let (inner, negate) = match trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (inner, true),
        None => (trimmed, false),
    };

    let cleaned: String = inner
        .trim()
        .chars()
        .filter(|c| !matches!(c, '€' | '$' | '£' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if french_decimal_re().is_match(&cleaned) {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned.replace(',', "")
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite())
        .map(|a| if negate { -a.abs() } else { a })
}

/// Which source column feeds which transaction field
///
/// Either a single signed `amount` column or a `debit`/`credit` pair must
/// be mapped, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: usize,
    pub description: usize,
    pub merchant: Option<usize>,
    pub amount: Option<usize>,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    pub category: Option<usize>,
}

impl ColumnMapping {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        let has_amount = self.amount.is_some();
        let has_split = self.debit.is_some() || self.credit.is_some();
        if has_amount && has_split {
            return Err(ValidationError::new(
                "amount",
                "Map either a single amount column or debit/credit columns, not both",
            ));
        }
        if !has_amount && !has_split {
            return Err(ValidationError::new(
                "amount",
                "No amount column mapped",
            ));
        }
        Ok(())
    }
}

/// Header synonyms recognized per field, lowercase
const DATE_HEADERS: &[&str] = &["date", "date operation", "date opération", "transaction date"];
const DESCRIPTION_HEADERS: &[&str] = &["libelle", "libellé", "description", "label", "intitule"];
const MERCHANT_HEADERS: &[&str] = &["merchant", "commercant", "commerçant", "payee", "tiers"];
const AMOUNT_HEADERS: &[&str] = &["montant", "amount", "valeur", "value"];
const DEBIT_HEADERS: &[&str] = &["debit", "débit"];
const CREDIT_HEADERS: &[&str] = &["credit", "crédit"];
const CATEGORY_HEADERS: &[&str] = &["categorie", "catégorie", "category", "type"];

fn find_header(headers: &[String], synonyms: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let lowered = h.trim().to_lowercase();
        synonyms.iter().any(|s| lowered == *s)
    })
}

/// Infer a column mapping from known bank export headers
///
/// Returns None when the required date/description/amount columns cannot
/// all be identified, or when the amount mapping is ambiguous (both a
/// signed column and debit/credit columns); the caller then asks the
/// user to map columns.
pub fn detect_layout(headers: &[String]) -> Option<ColumnMapping> {
    let mapping = ColumnMapping {
        date: find_header(headers, DATE_HEADERS)?,
        description: find_header(headers, DESCRIPTION_HEADERS)?,
        merchant: find_header(headers, MERCHANT_HEADERS),
        amount: find_header(headers, AMOUNT_HEADERS),
        debit: find_header(headers, DEBIT_HEADERS),
        credit: find_header(headers, CREDIT_HEADERS),
        category: find_header(headers, CATEGORY_HEADERS),
    };
    // A file exposing both a signed amount column and debit/credit columns
    // is ambiguous; fall back to manual mapping, where validation reports
    // the conflict on the amount field.
    mapping.validate().ok()?;
    Some(mapping)
}

/// A row that could not be turned into a transaction
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    /// 1-based data row number (header not counted)
    pub row: usize,
    pub field: String,
    pub message: String,
}

/// Read the whole file into headers plus data records
pub fn parse_csv(content: &str) -> Result<(Vec<String>, Vec<csv::StringRecord>)> {
    let separator = detect_separator(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        // Fully empty trailing lines are not rows
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        records.push(record);
    }
    Ok((headers, records))
}

fn cell<'r>(record: &'r csv::StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("").trim()
}

/// Raw cells as a JSON object keyed by header, for audit
fn original_json(headers: &[String], record: &csv::StringRecord) -> Option<String> {
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            (
                h.clone(),
                serde_json::Value::String(cell(record, i).to_string()),
            )
        })
        .collect();
    serde_json::to_string(&serde_json::Value::Object(map)).ok()
}

/// Turn one CSV record into an insertable transaction
pub fn parse_row(
    headers: &[String],
    mapping: &ColumnMapping,
    record: &csv::StringRecord,
    row: usize,
) -> std::result::Result<NewTransaction, RowError> {
    let date_raw = cell(record, mapping.date);
    let date = parse_date(date_raw).ok_or_else(|| RowError {
        row,
        field: "date".to_string(),
        message: format!("Unrecognized date '{}'", date_raw),
    })?;

    let description = cell(record, mapping.description).to_string();
    if description.is_empty() {
        return Err(RowError {
            row,
            field: "description".to_string(),
            message: "Empty description".to_string(),
        });
    }

    let amount = match mapping.amount {
        Some(index) => {
            let raw = cell(record, index);
            parse_amount(raw).ok_or_else(|| RowError {
                row,
                field: "amount".to_string(),
                message: format!("Unrecognized amount '{}'", raw),
            })?
        }
        None => {
            let debit = mapping
                .debit
                .map(|i| cell(record, i))
                .filter(|v| !v.is_empty())
                .map(parse_amount);
            let credit = mapping
                .credit
                .map(|i| cell(record, i))
                .filter(|v| !v.is_empty())
                .map(parse_amount);
            match (debit, credit) {
                (Some(Some(d)), None) => -d.abs(),
                (None, Some(Some(c))) => c.abs(),
                (Some(_), Some(_)) => {
                    return Err(RowError {
                        row,
                        field: "amount".to_string(),
                        message: "Both debit and credit are set".to_string(),
                    })
                }
                _ => {
                    return Err(RowError {
                        row,
                        field: "amount".to_string(),
                        message: "No parsable amount".to_string(),
                    })
                }
            }
        }
    };

    let merchant = mapping
        .merchant
        .map(|i| cell(record, i).to_string())
        .filter(|m| !m.is_empty());
    let import_category = mapping
        .category
        .map(|i| cell(record, i).to_string())
        .filter(|c| !c.is_empty());

    Ok(NewTransaction {
        date,
        description: description.clone(),
        merchant,
        amount,
        direction: Direction::from_amount(amount),
        import_category,
        import_hash: import_hash(&date, &description, amount),
        original_data: original_json(headers, record),
    })
}
