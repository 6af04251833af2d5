//! Compliance rules and evaluation for regulated-goods checkout.
//!
//! This crate provides:
//! - the per-jurisdiction Rule Catalog (`RuleCatalog`, `StateRule`)
//! - the versioned `ComplianceConfig` with its explicitly-invalidated
//!   read-through cache
//! - the `ComplianceEvaluator`, which applies the catalog and policy to a
//!   cart, destination and buyer history, producing a `ComplianceVerdict`

pub mod config;
pub mod error;
pub mod evaluator;
pub mod rules;
pub mod verdict;

pub use config::{ComplianceConfig, ConfigCache, ConfigSource};
pub use error::ComplianceError;
pub use evaluator::{BuyerHistory, ComplianceEvaluator, InMemoryBuyerHistory};
pub use rules::{ProductComplianceInfo, RuleCatalog, StateRule};
pub use verdict::{BlockReason, BlockedItem, ComplianceVerdict, HoldType};
