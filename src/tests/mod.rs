//! In-crate test suites.
//!
//! - Integration tests: whole messages through the keeper (store, bank, VM)

mod integration;
