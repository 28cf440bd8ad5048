//! Media Stream Relay
//!
//! This module contains the core logic for relaying a phone call between
//! Twilio Media Streams and the OpenAI Realtime API. It is structured into
//! submodules for clarity:
//!
//! - `protocol`: Defines the JSON messages exchanged with Twilio.
//! - `session`: Accepts the stream, owns per-call state and runs the relay.
//! - `inbound`: Twilio to OpenAI: caller audio and stream lifecycle events.
//! - `outbound`: OpenAI to Twilio: assistant audio, goodbye detection, hang-up.
//! - `watchdog`: Prompts the caller after a period of silence.
//! - `upstream`: The WebSocket connection to the OpenAI Realtime API.

mod inbound;
mod outbound;
pub mod protocol;
pub mod session;
mod upstream;
mod watchdog;

pub use session::media_stream_handler;
