//! Core domain + application logic for the keyword relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind the
//! messaging port (trait) implemented in the adapter crate; everything here,
//! including the pinned-message document store, only talks to that port.

pub mod actions;
pub mod config;
pub mod domain;
pub mod errors;
pub mod keywords;
pub mod logging;
pub mod messaging;
pub mod pagination;
pub mod relay;
pub mod render;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
