//! Integration tests for the Spool job orchestration engine

mod planning;
mod store_transitions;
mod test_utils;
