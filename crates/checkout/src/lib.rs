//! Checkout orchestration.
//!
//! Runs the whole compliance-gated checkout: jurisdiction rules, FFL and
//! multi-firearm holds, payment capture, order persistence with the atomic
//! window guard, distributor submission and best-effort CRM sync.
//!
//! The ordering invariant the whole crate is built around: hard blocks are
//! decided before payment, holds before capture, and nothing after a
//! successful capture is ever unwound automatically.

pub mod error;
pub mod orchestrator;
pub mod partial_failure;
pub mod request;
pub mod services;

pub use error::CheckoutError;
pub use orchestrator::{CheckoutOrchestrator, Timeouts};
pub use request::{CheckoutOutcome, CheckoutRequest, CustomerInfo, HoldNotice};
