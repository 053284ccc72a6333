//! Engine threshold configuration
//!
//! Every cap and threshold the classification strategies and the conflict
//! resolver use lives here rather than as literals in the code. The defaults
//! are the empirically tuned values; deployments can override them with a
//! TOML file without rebuilding.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Thresholds and caps for the assignment engine
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum stored confidence for a global pattern to be considered.
    /// Unified floor for every pattern lookup.
    pub min_pattern_confidence: f64,
    /// Candidates from non-pattern strategies below this are dropped as
    /// "no usable signal". Amount-range candidates are exempt (their cap is
    /// below this floor by construction).
    pub usable_signal_floor: f64,
    /// Confidence assigned to a coarse import-label mapping hit
    pub category_mapping_confidence: f64,
    /// Starting confidence for seeded global patterns (candidates use the
    /// stored per-pattern confidence, which evolves with feedback)
    pub global_pattern_confidence: f64,
    /// Per-comparison similarity required before a historical vote counts
    pub historical_similarity_threshold: f64,
    /// Cap on historical-strategy confidence
    pub historical_confidence_cap: f64,
    /// Each historical vote counts as similarity times this weight
    pub historical_vote_weight: f64,
    /// Vote divisor: confidence = min(cap, weighted votes / this)
    pub historical_vote_divisor: f64,
    /// Similarity required for the recent-transaction strategy
    pub recent_similarity_threshold: f64,
    /// Cap on recent-similarity confidence
    pub recent_confidence_cap: f64,
    /// Cap on amount-range confidence (multiplied by the range's triangular
    /// confidence)
    pub amount_confidence_cap: f64,
    /// Specificity is normalized by this before weighting
    pub specificity_norm: f64,
    /// Weighted score = w * normalized specificity + (1 - w) * confidence
    pub specificity_weight: f64,
    /// Weighted score required for the specificity-weighted rule to accept
    pub weighted_accept_threshold: f64,
    /// Feedback samples required before the feedback-history rule applies
    pub feedback_min_samples: i64,
    /// Acceptance-rate-derived confidence required to accept
    pub feedback_accept_threshold: f64,
    /// Historical matches required before the accuracy-history rule applies
    pub accuracy_min_matches: i64,
    /// Accuracy-derived confidence required to accept
    pub accuracy_accept_threshold: f64,
    /// Absolute amount at or below which small-ticket categories are favored
    pub small_amount_cutoff: f64,
    /// Absolute amount at or above which large-ticket categories are favored
    pub large_amount_cutoff: f64,
    /// Confidence for a small-amount validation pick
    pub small_amount_confidence: f64,
    /// Confidence for a large-amount validation pick
    pub large_amount_confidence: f64,
    /// Fallback rule multiplies the winner's confidence by this
    pub fallback_damping: f64,
    /// Personal pattern confidence never exceeds this
    pub personal_confidence_cap: f64,
    /// How many manual assignments the batch learner scans
    pub learn_batch_limit: i64,
    /// Occurrences of a (merchant key, category) pair required to learn
    pub learn_min_occurrences: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_pattern_confidence: 0.3,
            usable_signal_floor: 0.4,
            category_mapping_confidence: 0.95,
            global_pattern_confidence: 0.8,
            historical_similarity_threshold: 0.7,
            historical_confidence_cap: 0.9,
            historical_vote_weight: 10.0,
            historical_vote_divisor: 30.0,
            recent_similarity_threshold: 0.6,
            recent_confidence_cap: 0.7,
            amount_confidence_cap: 0.4,
            specificity_norm: 20.0,
            specificity_weight: 0.6,
            weighted_accept_threshold: 0.8,
            feedback_min_samples: 3,
            feedback_accept_threshold: 0.75,
            accuracy_min_matches: 5,
            accuracy_accept_threshold: 0.7,
            small_amount_cutoff: 5.0,
            large_amount_cutoff: 100.0,
            small_amount_confidence: 0.65,
            large_amount_confidence: 0.6,
            fallback_damping: 0.6,
            personal_confidence_cap: 0.95,
            learn_batch_limit: 100,
            learn_min_occurrences: 3,
        }
    }
}

impl EngineConfig {
    /// Load config from a TOML file, or defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let unit_bounded = [
            ("min_pattern_confidence", self.min_pattern_confidence),
            ("usable_signal_floor", self.usable_signal_floor),
            ("category_mapping_confidence", self.category_mapping_confidence),
            ("global_pattern_confidence", self.global_pattern_confidence),
            (
                "historical_similarity_threshold",
                self.historical_similarity_threshold,
            ),
            ("historical_confidence_cap", self.historical_confidence_cap),
            ("recent_similarity_threshold", self.recent_similarity_threshold),
            ("recent_confidence_cap", self.recent_confidence_cap),
            ("amount_confidence_cap", self.amount_confidence_cap),
            ("specificity_weight", self.specificity_weight),
            ("weighted_accept_threshold", self.weighted_accept_threshold),
            ("feedback_accept_threshold", self.feedback_accept_threshold),
            ("accuracy_accept_threshold", self.accuracy_accept_threshold),
            ("small_amount_confidence", self.small_amount_confidence),
            ("large_amount_confidence", self.large_amount_confidence),
            ("fallback_damping", self.fallback_damping),
            ("personal_confidence_cap", self.personal_confidence_cap),
        ];
        for (name, value) in unit_bounded {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        let positive = [
            ("specificity_norm", self.specificity_norm),
            ("historical_vote_weight", self.historical_vote_weight),
            ("historical_vote_divisor", self.historical_vote_divisor),
        ];
        for (name, value) in positive {
            if value <= 0.0 {
                return Err(Error::Config(format!("{} must be positive, got {}", name, value)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_override() {
        let config = EngineConfig::from_toml(
            r#"
            global_pattern_confidence = 0.85
            feedback_min_samples = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.global_pattern_confidence, 0.85);
        assert_eq!(config.feedback_min_samples, 5);
        // Untouched fields keep defaults
        assert_eq!(config.fallback_damping, 0.6);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let result = EngineConfig::from_toml("fallback_damping = 1.5");
        assert!(result.is_err());
        assert!(EngineConfig::from_toml("historical_vote_weight = 0.0").is_err());
    }
}
