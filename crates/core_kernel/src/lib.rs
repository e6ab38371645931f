//! Core Kernel - Foundational types shared by the fraud scoring crates
//!
//! - Strongly-typed identifiers for claims, policies, parties and events
//! - Money with precise decimal amounts and an explicit currency

pub mod money;
pub mod identifiers;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{ClaimId, PolicyId, PartyId, EventId};
