//! Concierge API Library Crate
//!
//! This library contains all the logic for the concierge web service: the
//! application state, HTTP handlers, TwiML rendering, the Twilio/OpenAI media
//! relay, and routing. The `api` binary is a thin wrapper around this library.

pub mod audio_utils;
pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod twiml;
pub mod ws;
