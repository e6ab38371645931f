//! Request handlers

pub mod health;
pub mod models;
pub mod outcomes;
pub mod scoring;
pub mod thresholds;
