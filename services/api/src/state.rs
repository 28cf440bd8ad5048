//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the call registry and service clients.

use crate::config::Config;
use concierge_core::{call_control::CallControl, registry::SessionRegistry};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub call_control: Arc<dyn CallControl>,
    pub http_client: reqwest::Client,
    pub system_prompt: Arc<String>,
}
