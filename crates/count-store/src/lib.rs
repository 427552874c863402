//! Cumulative object count storage.
//!
//! Every backend implements [`CountRepository`] with the same additive,
//! all-or-nothing batch semantics:
//! - [`InMemoryCountStore`] keeps counts in process memory
//! - [`MongoCountStore`] keeps one document per class, incremented server-side
//! - [`PostgresCountStore`] keeps one row per class, upserted in a transaction

pub mod error;
pub mod memory;
pub mod mongo;
pub mod postgres;
pub mod store;

pub use common::{ObjectClass, ObjectCount};
pub use error::{CountStoreError, Result};
pub use memory::InMemoryCountStore;
pub use mongo::MongoCountStore;
pub use postgres::PostgresCountStore;
pub use store::{CountRepository, CountRepositoryExt, merge_batch};
