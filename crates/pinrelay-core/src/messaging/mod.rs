//! Messenger abstractions: the port the relay core talks to, the update model
//! adapters translate into, and a rate-limiting decorator.

pub mod port;
pub mod throttled;
pub mod types;
