//! Domain layer for the storefront backend.
//!
//! This crate provides the value types shared by the stores and the
//! checkout flow:
//! - `Money` amounts in integer cents
//! - `Cart` and `CartLine` as submitted at checkout
//! - `Product` with per-size stock `Variation`s
//! - `Order` records and the opaque `PaymentResult` they embed

pub mod cart;
pub mod error;
pub mod order;
pub mod product;
pub mod value_objects;

pub use cart::{Cart, CartLine};
pub use error::DomainError;
pub use order::{NewOrder, Order, PaymentResult};
pub use product::{NewProduct, Product, Variation, slugify};
pub use value_objects::{Money, ProductId, Size};
