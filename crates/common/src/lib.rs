//! Shared identifier types used across the checkout system.

pub mod types;

pub use types::{FflId, InvalidStateCode, OrderId, StateCode, UserId};
