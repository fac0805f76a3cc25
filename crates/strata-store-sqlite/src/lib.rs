//! SQLite backend for the Strata record store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Domain errors raised inside
//! a transaction closure roll the transaction back and surface unchanged;
//! database faults are mapped to [`strata_core::Error::Store`].

mod encode;
mod schema;
mod store;

pub use store::SqliteStore;

#[cfg(test)]
mod tests;
