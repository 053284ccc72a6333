//! Conflict resolution between competing assignment candidates
//!
//! When several strategies propose different categories for the same
//! transaction, a fixed cascade of rules picks the winner. Each rule either
//! decides (possibly "needs review") or defers to the next one. The final
//! fallback always decides, at damped confidence.

use tracing::debug;

use crate::config::EngineConfig;
use crate::db::Database;
use crate::error::Result;
use crate::models::{
    Assignment, AssignmentCandidate, MatchedPattern, ResolutionRule,
};
use crate::taxonomy;

/// Runner-up category ids for a decided assignment, best first
fn alternatives(candidates: &[AssignmentCandidate], winner: i64) -> Vec<i64> {
    let mut sorted: Vec<&AssignmentCandidate> = candidates
        .iter()
        .filter(|c| c.category_id != winner)
        .collect();
    sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut seen = Vec::new();
    for c in sorted {
        if !seen.contains(&c.category_id) {
            seen.push(c.category_id);
        }
    }
    seen
}

fn decide(
    candidates: &[AssignmentCandidate],
    winner: &AssignmentCandidate,
    confidence: f64,
    resolution: ResolutionRule,
) -> Assignment {
    Assignment {
        category_id: Some(winner.category_id),
        confidence: confidence.clamp(0.0, 1.0),
        strategy: Some(winner.strategy),
        resolution,
        alternatives: alternatives(candidates, winner.category_id),
    }
}

/// Blend of distinctiveness and confidence used by the specificity rule
fn weighted_score(config: &EngineConfig, candidate: &AssignmentCandidate) -> f64 {
    let specificity = (candidate.specificity as f64 / config.specificity_norm).min(1.0);
    config.specificity_weight * specificity
        + (1.0 - config.specificity_weight) * candidate.confidence
}

/// Pick one category from a set of competing candidates
///
/// Rules run in order: single match, specificity-weighted score, the user's
/// feedback history, long-run pattern accuracy, amount plausibility, then a
/// damped specificity fallback. Later rules only run when earlier ones
/// cannot separate the candidates.
pub(crate) fn resolve(
    db: &Database,
    config: &EngineConfig,
    user_id: i64,
    amount: f64,
    candidates: &[AssignmentCandidate],
) -> Result<Assignment> {
    if candidates.is_empty() {
        return Ok(Assignment::none());
    }

    // Rule 1: no conflict. All candidates name the same category, or there
    // is only one candidate. Winner keeps its own confidence.
    let first_category = candidates[0].category_id;
    if candidates.iter().all(|c| c.category_id == first_category) {
        let best = candidates
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .unwrap();
        return Ok(decide(candidates, best, best.confidence, ResolutionRule::SingleMatch));
    }

    // Rule 2: specificity-weighted score. A long, distinctive pattern beats
    // shorter ones even at slightly lower confidence.
    let best_weighted = candidates
        .iter()
        .max_by(|a, b| weighted_score(config, a).total_cmp(&weighted_score(config, b)))
        .unwrap();
    let score = weighted_score(config, best_weighted);
    if score >= config.weighted_accept_threshold {
        debug!(
            category_id = best_weighted.category_id,
            score, "Resolved by specificity weight"
        );
        return Ok(decide(
            candidates,
            best_weighted,
            best_weighted.confidence,
            ResolutionRule::SpecificityWeighted,
        ));
    }

    // Rule 3: the user's own accept/reject history per suggested category.
    // Needs a minimum sample size before it is trusted.
    let mut best_feedback: Option<(&AssignmentCandidate, f64)> = None;
    for candidate in candidates {
        let (accepted, total) = db.feedback_acceptance(user_id, candidate.category_id)?;
        if total < config.feedback_min_samples {
            continue;
        }
        let rate = accepted as f64 / total as f64;
        let confidence = rate * 0.9 + 0.1;
        if best_feedback.map_or(true, |(_, c)| confidence > c) {
            best_feedback = Some((candidate, confidence));
        }
    }
    if let Some((candidate, confidence)) = best_feedback {
        if confidence >= config.feedback_accept_threshold {
            debug!(
                category_id = candidate.category_id,
                confidence, "Resolved by feedback history"
            );
            return Ok(decide(
                candidates,
                candidate,
                confidence,
                ResolutionRule::UserFeedbackHistory,
            ));
        }
    }

    // Rule 4: long-run accuracy of the matched global patterns.
    let mut best_accuracy: Option<(&AssignmentCandidate, f64)> = None;
    for candidate in candidates {
        let Some(MatchedPattern::Global {
            total_matches,
            accuracy,
            ..
        }) = candidate.matched_pattern
        else {
            continue;
        };
        if total_matches < config.accuracy_min_matches {
            continue;
        }
        let confidence = accuracy * 0.8 + 0.2;
        if best_accuracy.map_or(true, |(_, c)| confidence > c) {
            best_accuracy = Some((candidate, confidence));
        }
    }
    if let Some((candidate, confidence)) = best_accuracy {
        if confidence >= config.accuracy_accept_threshold {
            debug!(
                category_id = candidate.category_id,
                confidence, "Resolved by accuracy history"
            );
            return Ok(decide(
                candidates,
                candidate,
                confidence,
                ResolutionRule::AccuracyHistory,
            ));
        }
    }

    // Rule 5: coarse amount plausibility. Very small amounts lean toward
    // small-ticket categories, clearly large ones toward big-ticket
    // categories. Mid-range amounts decide nothing here.
    let magnitude = amount.abs();
    let (wants_small, confidence) = if magnitude <= config.small_amount_cutoff {
        (true, config.small_amount_confidence)
    } else if magnitude >= config.large_amount_cutoff {
        (false, config.large_amount_confidence)
    } else {
        (false, 0.0)
    };
    if confidence > 0.0 {
        for candidate in candidates {
            let category = db.get_category(candidate.category_id)?;
            let favored = if wants_small {
                taxonomy::favors_small_amounts(&category.name)
            } else {
                taxonomy::favors_large_amounts(&category.name)
            };
            if favored {
                debug!(
                    category_id = candidate.category_id,
                    magnitude, "Resolved by amount validation"
                );
                return Ok(decide(
                    candidates,
                    candidate,
                    confidence,
                    ResolutionRule::AmountValidation,
                ));
            }
        }
    }

    // Fallback: most specific candidate wins, ties broken by confidence,
    // damped because nothing above could separate the field.
    let winner = candidates
        .iter()
        .max_by(|a, b| {
            (a.specificity, a.confidence).partial_cmp(&(b.specificity, b.confidence))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap();
    debug!(category_id = winner.category_id, "Resolved by fallback specificity");
    Ok(decide(
        candidates,
        winner,
        winner.confidence * config.fallback_damping,
        ResolutionRule::FallbackSpecificity,
    ))
}
