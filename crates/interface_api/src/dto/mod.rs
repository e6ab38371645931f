//! Request and response bodies

pub mod models;
pub mod scoring;
