//! HTTP Models
//!
//! Request and response bodies for the HTTP endpoints, annotated for OpenAPI
//! generation with `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct StatusResponse {
    #[schema(example = "AI Concierge is running")]
    pub message: String,
}

/// The subset of Twilio's voice webhook parameters the relay uses.
#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct IncomingCallForm {
    #[serde(rename = "CallSid")]
    #[schema(example = "CA0123456789abcdef0123456789abcdef")]
    pub call_sid: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct OAuthCallbackParams {
    pub code: String,
    pub state: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
