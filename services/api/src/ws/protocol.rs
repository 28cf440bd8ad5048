//! Defines the Twilio Media Streams message protocol.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Messages sent from Twilio to the relay.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "event")]
pub enum TwilioEvent {
    /// The stream has started. Always precedes any media.
    #[serde(rename = "start")]
    Start { start: StreamStart },
    /// One chunk of caller audio.
    #[serde(rename = "media")]
    Media { media: MediaPayload },
    /// Caller speech detected; resets the silence window.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    /// The stream is ending. Twilio closes the socket right after.
    #[serde(rename = "stop")]
    Stop,
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    pub stream_sid: String,
    pub call_sid: Option<String>,
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MediaPayload {
    /// Base64 encoded mu-law audio.
    pub payload: String,
}

/// Messages sent from the relay to Twilio.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Audio to play to the caller.
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: Option<String>,
        media: MediaPayload,
    },
}

impl RelayMessage {
    pub fn media(stream_sid: Option<String>, payload: String) -> Self {
        Self::Media {
            stream_sid,
            media: MediaPayload { payload },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_event() {
        let event: TwilioEvent = serde_json::from_value(json!({
            "event": "start",
            "sequenceNumber": "1",
            "start": {
                "accountSid": "AC1",
                "streamSid": "MZ1",
                "callSid": "CA1",
                "tracks": ["inbound"],
                "customParameters": {"token": "tok"},
                "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1}
            },
            "streamSid": "MZ1"
        }))
        .unwrap();

        let TwilioEvent::Start { start } = event else {
            panic!("expected start");
        };
        assert_eq!(start.stream_sid, "MZ1");
        assert_eq!(start.call_sid.as_deref(), Some("CA1"));
        assert_eq!(start.custom_parameters.get("token").map(String::as_str), Some("tok"));
    }

    #[test]
    fn test_media_event() {
        let event: TwilioEvent = serde_json::from_str(
            r#"{"event":"media","sequenceNumber":"3","media":{"track":"inbound","chunk":"1","timestamp":"5","payload":"AAEC"},"streamSid":"MZ1"}"#,
        )
        .unwrap();
        let TwilioEvent::Media { media } = event else {
            panic!("expected media");
        };
        assert_eq!(media.payload, "AAEC");
    }

    #[test]
    fn test_other_events() {
        let speech: TwilioEvent =
            serde_json::from_str(r#"{"event":"input_audio_buffer.speech_started"}"#).unwrap();
        assert!(matches!(speech, TwilioEvent::SpeechStarted));

        let stop: TwilioEvent =
            serde_json::from_str(r#"{"event":"stop","stop":{"callSid":"CA1"}}"#).unwrap();
        assert!(matches!(stop, TwilioEvent::Stop));

        let connected: TwilioEvent =
            serde_json::from_str(r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#)
                .unwrap();
        assert!(matches!(connected, TwilioEvent::Other));
    }

    #[test]
    fn test_media_message_serialization() {
        let message = RelayMessage::media(Some("MZ1".to_string()), "AAEC".to_string());
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"event": "media", "streamSid": "MZ1", "media": {"payload": "AAEC"}})
        );

        let unbound = RelayMessage::media(None, "AAEC".to_string());
        assert_eq!(serde_json::to_value(&unbound).unwrap()["streamSid"], json!(null));
    }
}
