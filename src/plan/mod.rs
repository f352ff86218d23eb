//! Job planning: weighted category distribution, task decomposition, and
//! round-robin interleaving.
//!
//! Planning is pure. Nothing in this module touches storage; the output of
//! [`decompose`] is an ordered list of task specifications the caller persists
//! and executes.

pub mod decompose;
pub mod distribution;
pub mod interleave;

pub use decompose::{decompose, ContentSpec, JobPlan, JobRequest, PinSpec, SlideSpec, TaskSpec};
pub use distribution::{plan_distribution, CategoryCount, CategoryWeight};
pub use interleave::{interleave, CategoryQuota, PinSlot};
