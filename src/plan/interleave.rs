//! Round-robin interleaving of weighted categories with rotating variation
//! tags.

use crate::plan::distribution::CategoryCount;
use serde::{Deserialize, Serialize};

/// Per-category planning state while a job is being laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryQuota {
    pub category: String,
    pub target: u32,
    pub used: u32,
    /// Rotating variation cursor, always in 1..=5.
    pub variation: u8,
}

impl CategoryQuota {
    pub fn new(category: impl Into<String>, target: u32) -> Self {
        Self {
            category: category.into(),
            target,
            used: 0,
            variation: 1,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.target.saturating_sub(self.used)
    }
}

impl From<CategoryCount> for CategoryQuota {
    fn from(count: CategoryCount) -> Self {
        CategoryQuota::new(count.category, count.count)
    }
}

/// One interleaved emission: the category it belongs to and the variation
/// value assigned from that category's cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSlot {
    pub category: String,
    pub variation: u8,
}

/// Order category quotas into a single sequence by sweeping the category list
/// repeatedly in its original order.
///
/// Each emission consumes one unit of quota and advances that category's
/// variation cursor (`cursor = cursor % 5 + 1`, cycling 1,2,3,4,5,1,...).
/// While two or more categories still hold quota, no two consecutive
/// emissions share a category; once a single category remains its tail
/// repeats, which is allowed.
pub fn interleave(mut quotas: Vec<CategoryQuota>) -> Vec<PinSlot> {
    let total: u32 = quotas.iter().map(CategoryQuota::remaining).sum();
    let mut slots = Vec::with_capacity(total as usize);

    loop {
        let mut emitted = false;
        for quota in quotas.iter_mut() {
            if quota.remaining() == 0 {
                continue;
            }
            slots.push(PinSlot {
                category: quota.category.clone(),
                variation: quota.variation,
            });
            quota.used += 1;
            quota.variation = (quota.variation % 5) + 1;
            emitted = true;
        }
        if !emitted {
            break;
        }
    }

    slots
}
