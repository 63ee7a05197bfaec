//! Common test utilities and infrastructure
//!
//! Simulated stores, fixtures and a recording sleeper shared by the
//! integration suites.

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
#[allow(unused_imports)]
pub use fixtures::TestFixtures;
#[allow(unused_imports)]
pub use helpers::{RecordingSleeper, StoreSim};
