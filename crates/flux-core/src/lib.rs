//! Core types and trait definitions for the Flux sports-statistics store.
//!
//! This crate is free of HTTP and database dependencies. It declares the
//! entities, the schema catalog with its delete policy, change sets, and the
//! [`store::SportsStore`] trait that backends implement.

// Native `async fn` in traits; the returned futures are bounded explicitly.
#![allow(async_fn_in_trait)]

pub mod association;
pub mod changes;
pub mod entity;
pub mod enums;
pub mod error;
pub mod fixture;
pub mod news;
pub mod query;
pub mod schema;
pub mod sport;
pub mod store;
pub mod team;

pub use error::{Error, Result};
