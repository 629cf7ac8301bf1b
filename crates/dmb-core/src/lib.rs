//! Core domain + application logic for the Discord marketplace bot.
//!
//! This crate is intentionally framework-agnostic. The Discord REST API and
//! the sqlite store live behind ports (traits) implemented in adapter crates.

pub mod access;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod logging;
pub mod ports;
pub mod router;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
