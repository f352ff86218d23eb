//! Category distribution: weighted shares of a fixed total.

use crate::error::SpoolError;
use serde::{Deserialize, Serialize};

/// One weighted category in a job request. Weights are positive and need not
/// sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeight {
    pub category: String,
    pub weight: f64,
}

/// Exact per-category count produced by [`plan_distribution`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u32,
}

/// Split `total` across weighted categories so the counts sum to `total`
/// exactly.
///
/// Every category except the last receives its rounded proportional share,
/// clamped to the amount still unassigned; the last category absorbs whatever
/// remains. The remainder rule is order-dependent on purpose: the input order
/// is the tie-break and is never re-sorted.
///
/// Categories whose count works out to zero are dropped from the output, so
/// `total = 0` yields an empty list.
pub fn plan_distribution(
    total: u32,
    weights: &[CategoryWeight],
) -> Result<Vec<CategoryCount>, SpoolError> {
    validate_weights(weights)?;

    if total == 0 {
        return Ok(Vec::new());
    }

    let weight_sum: f64 = weights.iter().map(|w| w.weight).sum();
    let mut remaining = total;
    let mut counts = Vec::with_capacity(weights.len());

    for (idx, entry) in weights.iter().enumerate() {
        let count = if idx + 1 == weights.len() {
            remaining
        } else {
            let share = (entry.weight / weight_sum * f64::from(total)).round() as u32;
            share.min(remaining)
        };
        remaining -= count;
        if count > 0 {
            counts.push(CategoryCount {
                category: entry.category.clone(),
                count,
            });
        }
    }

    Ok(counts)
}

/// Reject empty weight lists and non-positive weights.
pub fn validate_weights(weights: &[CategoryWeight]) -> Result<(), SpoolError> {
    if weights.is_empty() {
        return Err(SpoolError::InvalidInput(
            "category weights cannot be empty".to_string(),
        ));
    }
    for entry in weights {
        if entry.category.trim().is_empty() {
            return Err(SpoolError::InvalidInput(
                "category name cannot be empty".to_string(),
            ));
        }
        if !(entry.weight > 0.0 && entry.weight.is_finite()) {
            return Err(SpoolError::InvalidInput(format!(
                "category '{}' has non-positive weight {}",
                entry.category, entry.weight
            )));
        }
    }
    Ok(())
}
