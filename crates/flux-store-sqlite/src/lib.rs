//! SQLite backend for the Flux sports store.
//!
//! Keeps SQLite connections in a bounded [`r2d2`] [`pool::Pool`] and runs all
//! database access off the async runtime. Every store operation is one
//! transaction over a [`Session`].

mod encode;
mod session;
mod store;

pub mod error;
pub mod pool;
pub mod schema;

pub use error::{Error, Result};
pub use pool::{Pool, PoolConfig};
pub use session::Session;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
