//! Test fixtures for trip-planner.
//!
//! Provides realistic test data including:
//! - Real French cities and sights (coordinates from OpenStreetMap)
//! - Builders for requests and planner drafts
//! - Scripted collaborators standing in for the planner, reviewer and provider

#![allow(dead_code)]

pub mod builders;
pub mod france_places;
pub mod mocks;

pub use builders::*;
pub use france_places::*;
pub use mocks::*;

/// Route `tracing` output to the test harness when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
