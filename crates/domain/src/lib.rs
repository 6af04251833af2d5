//! Domain model for the regulated-goods checkout system.
//!
//! This crate provides the pure, I/O-free core:
//! - `CartItem` and `Money` value objects
//! - the `Order` aggregate with its guarded `OrderStatus` state machine
//! - fulfillment routing (`route`) that splits a cart into shipment groups

pub mod cart;
pub mod error;
pub mod fulfillment;
pub mod money;
pub mod order;

pub use cart::{CartItem, ProductCategory, cart_total};
pub use error::DomainError;
pub use fulfillment::{
    FulfillmentGroup, FulfillmentSource, FulfillmentType, RoutingPolicy, route,
};
pub use money::Money;
pub use order::{
    DistributorSubmission, FflSnapshot, Order, OrderNumber, OrderStatus,
};
