//! Core types, trait definitions and the audit engine for Docket.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! write path ([`emit`]) queues change records into a [`unit::UnitOfWork`];
//! the read path ([`audit::AuditLog`]) turns stored records back into
//! timeline entries through the collaborator traits in [`store`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod change;
pub mod emit;
pub mod entity;
pub mod error;
pub mod registry;
pub mod store;
pub mod timeline;
pub mod unit;

pub use error::{Error, Result};

#[cfg(test)]
mod testing;
