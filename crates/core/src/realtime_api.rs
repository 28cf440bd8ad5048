//! Wire types for the OpenAI Realtime API.
//!
//! Only the subset of the protocol the relay actually speaks is modelled.
//! Server events with an unrecognised `type` deserialize to
//! [`ServerEvent::Unknown`] so new event types never break the relay.

use serde::{Deserialize, Serialize};

/// Audio encoding used on both legs of a telephony call.
pub const G711_ULAW: &str = "g711_ulaw";

/// Sampling temperature sent with every session configuration.
pub const SESSION_TEMPERATURE: f32 = 0.8;

/// Events sent from the relay to the realtime endpoint.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64 encoded audio, passed through exactly as received.
        audio: String,
    },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Builds an `input_audio_buffer.append` event for a base64 payload.
    pub fn append_audio(payload: impl Into<String>) -> Self {
        Self::InputAudioBufferAppend {
            audio: payload.into(),
        }
    }

    /// Builds a `conversation.item.create` event carrying a system text item.
    pub fn system_text(text: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem {
                kind: "message".to_string(),
                role: "system".to_string(),
                content: vec![InputContent {
                    kind: "input_text".to_string(),
                    text: text.into(),
                }],
            },
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
}

/// The `session` object of a `session.update` event.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub turn_detection: TurnDetection,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub voice: String,
    pub instructions: String,
    pub modalities: Vec<String>,
    pub temperature: f32,
}

impl SessionConfig {
    /// The fixed telephony session: server VAD, mu-law in and out, audio and text.
    pub fn telephony(instructions: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            turn_detection: TurnDetection {
                kind: "server_vad".to_string(),
            },
            input_audio_format: G711_ULAW.to_string(),
            output_audio_format: G711_ULAW.to_string(),
            voice: voice.into(),
            instructions: instructions.into(),
            modalities: vec!["audio".to_string(), "text".to_string()],
            temperature: SESSION_TEMPERATURE,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<InputContent>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InputContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Events received from the realtime endpoint.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: SessionInfo,
    },
    #[serde(rename = "response.text.delta")]
    ResponseTextDelta {
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta {
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: ResponseBody,
    },
    #[serde(rename = "error")]
    Error { error: ApiErrorDetail },
    #[serde(rename = "response.content.done")]
    ResponseContentDone,
    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated,
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted,
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted,
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped,
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// The wire name of the event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::ResponseTextDelta { .. } => "response.text.delta",
            Self::ResponseAudioDelta { .. } => "response.audio.delta",
            Self::ResponseDone { .. } => "response.done",
            Self::Error { .. } => "error",
            Self::ResponseContentDone => "response.content.done",
            Self::RateLimitsUpdated => "rate_limits.updated",
            Self::InputAudioBufferCommitted => "input_audio_buffer.committed",
            Self::InputAudioBufferSpeechStarted => "input_audio_buffer.speech_started",
            Self::InputAudioBufferSpeechStopped => "input_audio_buffer.speech_stopped",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SessionInfo {
    pub id: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
    pub code: Option<String>,
}

/// The `response` object of a `response.done` event.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ResponseBody {
    pub id: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct OutputItem {
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub transcript: Option<String>,
}

impl ResponseBody {
    /// Transcript of the first audio part of the first output item, if any.
    pub fn audio_transcript(&self) -> Option<&str> {
        self.output
            .first()?
            .content
            .iter()
            .find(|part| part.kind == "audio" && part.transcript.is_some())
            .and_then(|part| part.transcript.as_deref())
    }
}
