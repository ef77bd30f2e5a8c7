//! Persistence for the storefront: the catalog of products and the
//! order log written by checkout.
//!
//! Both stores are traits with an in-memory implementation (tests, local
//! runs) and a PostgreSQL implementation sharing the same semantics.

pub mod catalog;
pub mod error;
pub mod memory;
pub mod orders;
pub mod postgres;
pub mod query;

pub use catalog::{CatalogStore, CatalogStoreExt};
pub use error::{Result, StoreError};
pub use memory::{InMemoryCatalogStore, InMemoryOrderStore};
pub use orders::OrderStore;
pub use postgres::{PostgresCatalogStore, PostgresOrderStore, run_migrations};
pub use query::{MAX_LISTED_PRODUCTS, ProductQuery, RELATED_PRODUCTS_LIMIT};
