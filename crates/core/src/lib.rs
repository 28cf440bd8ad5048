//! Transport-independent logic for the concierge relay.
//!
//! Nothing in this crate touches a socket. The `concierge-api` service owns
//! the connections and drives these types from its relay loops.

pub mod call_control;
pub mod goodbye;
pub mod realtime_api;
pub mod registry;
pub mod silence;
