//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the fraud
//! scoring test suite.
//!
//! # Modules
//!
//! - `fixtures`: Reference model, reference config and scenario claims
//! - `builders`: Claim builder and a wired scoring harness
//! - `assertions`: Assertion helpers for scores and explanations
//! - `generators`: Property-based claim generators

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
