//! Core types and trait definitions for the Docket request-approval engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::RequestStore`]; the HTTP layer drives
//! the [`engine::TransitionEngine`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod engine;
pub mod error;
pub mod memory;
pub mod payload;
pub mod request;
pub mod role;
pub mod rules;
pub mod store;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
