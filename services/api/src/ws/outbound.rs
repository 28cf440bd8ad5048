//! OpenAI to Twilio: plays assistant audio and ends the call on goodbye.

use super::{protocol::RelayMessage, session::RelaySession};
use crate::audio_utils;
use concierge_core::{
    call_control::{self, CallControl, HangupOutcome},
    goodbye::GoodbyeDetector,
    realtime_api::ServerEvent,
};
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, error, info, trace, warn};

/// Why the outbound loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundEnd {
    /// OpenAI closed the connection or it failed.
    Closed,
    /// The assistant said goodbye and termination was attempted.
    Goodbye(HangupOutcome),
}

/// Running text of the assistant's responses, kept for diagnostics only.
#[derive(Debug, Default)]
struct TranscriptLog {
    current_response: String,
    total_chars: usize,
}

impl TranscriptLog {
    fn push(&mut self, delta: &str) {
        let delta = delta.to_lowercase();
        self.total_chars += delta.chars().count();
        self.current_response.push_str(&delta);
    }

    fn finish_turn(&mut self) {
        if !self.current_response.is_empty() {
            debug!(
                response = %self.current_response,
                total_chars = self.total_chars,
                "Assistant text response complete."
            );
        }
        self.current_response.clear();
    }
}

/// Reads OpenAI events until the connection closes or the call is ended.
///
/// On a `response.done`, the transcript is checked for a goodbye before the
/// hang-up decision for that same event, so the call ends at the close of
/// the farewell turn.
pub async fn relay_outbound<S, E>(
    mut events: S,
    session: &RelaySession,
    downstream: mpsc::Sender<RelayMessage>,
    control: &dyn CallControl,
) -> OutboundEnd
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    let mut detector = GoodbyeDetector::new();
    let mut transcript = TranscriptLog::default();

    while let Some(frame) = events.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(frame)) => {
                info!(?frame, "OpenAI closed the realtime connection.");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                error!(error = %e, "Error receiving from OpenAI WebSocket.");
                break;
            }
        };

        let event = match serde_json::from_str::<ServerEvent>(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed OpenAI event.");
                continue;
            }
        };

        match event {
            ServerEvent::ResponseTextDelta { delta } => {
                debug!(delta = %delta.trim(), "AI text delta.");
                transcript.push(&delta);
            }
            ServerEvent::ResponseAudioDelta { delta } => {
                if !delta.is_empty() {
                    forward_audio(&delta, session, &downstream).await;
                }
            }
            ServerEvent::ResponseDone { response } => {
                info!(status = ?response.status, "Assistant finished speaking.");
                if let Some(text) = detector.observe(&response) {
                    info!(transcript = %text, "Response transcript.");
                }
                transcript.finish_turn();

                if detector.detected() {
                    info!("Goodbye detected. Hanging up.");
                    let outcome = call_control::end_call(control, session.call_sid()).await;
                    return OutboundEnd::Goodbye(outcome);
                }
            }
            ServerEvent::Error { error } => {
                error!(message = %error.message, code = ?error.code, "OpenAI reported an error.");
            }
            ServerEvent::SessionCreated { session: created } => {
                info!(session_id = ?created.id, "Realtime session created.");
            }
            ServerEvent::Unknown => {}
            other => info!(event = other.kind(), "Realtime event."),
        }
    }

    OutboundEnd::Closed
}

async fn forward_audio(delta: &str, session: &RelaySession, downstream: &mpsc::Sender<RelayMessage>) {
    let payload = match audio_utils::reencode_payload(delta) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Dropping undecodable audio delta.");
            return;
        }
    };
    trace!(bytes = delta.len(), "Forwarding assistant audio.");

    if let Err(e) = downstream
        .send(RelayMessage::media(session.stream_sid(), payload))
        .await
    {
        warn!(error = %e, "Failed to queue assistant audio for Twilio.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::call_control::{CallControlError, CallUpdate};
    use futures::stream;
    use serde_json::json;
    use std::{
        convert::Infallible,
        sync::{Arc, Mutex},
    };

    /// Records every call-control request and reports a fixed status.
    #[derive(Default, Clone)]
    struct RecordingControl {
        status: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingControl {
        fn with_status(status: &str) -> Self {
            Self {
                status: status.to_string(),
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CallControl for RecordingControl {
        async fn fetch_status(&self, call_sid: &str) -> Result<String, CallControlError> {
            self.requests.lock().unwrap().push(format!("fetch {call_sid}"));
            Ok(self.status.clone())
        }

        async fn update(&self, call_sid: &str, update: CallUpdate) -> Result<(), CallControlError> {
            self.requests
                .lock()
                .unwrap()
                .push(format!("update {call_sid} {update:?}"));
            Ok(())
        }
    }

    fn event(value: serde_json::Value) -> Result<WsMessage, Infallible> {
        Ok(WsMessage::Text(value.to_string().into()))
    }

    fn response_done(transcript: &str) -> Result<WsMessage, Infallible> {
        event(json!({
            "type": "response.done",
            "response": {
                "status": "completed",
                "output": [{"content": [{"type": "audio", "transcript": transcript}]}]
            }
        }))
    }

    fn audio_delta(delta: &str) -> Result<WsMessage, Infallible> {
        event(json!({"type": "response.audio.delta", "delta": delta}))
    }

    fn drain(rx: &mut mpsc::Receiver<RelayMessage>) -> Vec<RelayMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    #[tokio::test]
    async fn test_audio_deltas_forwarded_in_order() {
        let session = RelaySession::new(Some("CA1".to_string()));
        session.set_stream_sid("MZ1".to_string());
        let control = RecordingControl::with_status("in-progress");
        let (tx, mut rx) = mpsc::channel(16);
        let events = stream::iter(vec![
            event(json!({"type": "session.created", "session": {"id": "sess_1"}})),
            audio_delta("AAEC"),
            audio_delta("not base64!"),
            event(json!({"type": "response.audio.delta", "delta": ""})),
            Ok(WsMessage::Text("garbage".into())),
            event(json!({"type": "response.text.delta", "delta": "Hello"})),
            audio_delta("/////w=="),
        ]);

        let end = relay_outbound(events, &session, tx, &control).await;

        assert_eq!(end, OutboundEnd::Closed);
        assert_eq!(
            drain(&mut rx),
            vec![
                RelayMessage::media(Some("MZ1".to_string()), "AAEC".to_string()),
                RelayMessage::media(Some("MZ1".to_string()), "/////w==".to_string()),
            ]
        );
        assert!(control.requests().is_empty());
    }

    #[tokio::test]
    async fn test_goodbye_hangs_up_on_same_response() {
        let session = RelaySession::new(Some("CA1".to_string()));
        let control = RecordingControl::with_status("in-progress");
        let (tx, mut rx) = mpsc::channel(16);
        let events = stream::iter(vec![
            response_done("Our hours are 8 to 4."),
            response_done("Goodbye"),
            audio_delta("AAEC"),
        ])
        .chain(stream::pending());

        let end = relay_outbound(events, &session, tx, &control).await;

        assert_eq!(end, OutboundEnd::Goodbye(HangupOutcome::HungUp));
        assert_eq!(
            control.requests(),
            vec![
                "fetch CA1".to_string(),
                format!("update CA1 {:?}", CallUpdate::pause_then_hangup()),
            ]
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_goodbye_on_ended_call_marks_completed() {
        let session = RelaySession::new(Some("CA1".to_string()));
        let control = RecordingControl::with_status("completed");
        let (tx, _rx) = mpsc::channel(16);

        let end = relay_outbound(
            stream::iter(vec![response_done("Thank you, have a great day!")]),
            &session,
            tx,
            &control,
        )
        .await;

        assert_eq!(end, OutboundEnd::Goodbye(HangupOutcome::Completed));
        assert_eq!(
            control.requests(),
            vec![
                "fetch CA1".to_string(),
                format!("update CA1 {:?}", CallUpdate::Complete),
            ]
        );
    }

    #[tokio::test]
    async fn test_goodbye_without_call_sid_still_ends_loop() {
        let session = RelaySession::new(None);
        let control = RecordingControl::with_status("in-progress");
        let (tx, _rx) = mpsc::channel(16);
        let events = stream::iter(vec![response_done("take care")]).chain(stream::pending());

        let end = relay_outbound(events, &session, tx, &control).await;

        assert_eq!(end, OutboundEnd::Goodbye(HangupOutcome::Skipped));
        assert!(control.requests().is_empty());
    }

    #[tokio::test]
    async fn test_other_events_do_not_end_the_call() {
        let session = RelaySession::new(Some("CA1".to_string()));
        let control = RecordingControl::with_status("in-progress");
        let (tx, _rx) = mpsc::channel(16);
        let events = stream::iter(vec![
            event(json!({"type": "error", "error": {"message": "bad", "code": "x"}})),
            event(json!({"type": "rate_limits.updated", "rate_limits": []})),
            event(json!({"type": "response.text.delta", "delta": "goodbye"})),
            event(json!({"type": "response.done", "response": {"output": []}})),
            event(json!({"type": "some.future.event"})),
        ]);

        let end = relay_outbound(events, &session, tx, &control).await;

        assert_eq!(end, OutboundEnd::Closed);
        assert!(control.requests().is_empty());
    }

    #[tokio::test]
    async fn test_closed_downstream_is_not_fatal() {
        let session = RelaySession::new(Some("CA1".to_string()));
        let control = RecordingControl::with_status("in-progress");
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let events = stream::iter(vec![audio_delta("AAEC"), response_done("goodbye")]);

        let end = relay_outbound(events, &session, tx, &control).await;

        assert_eq!(end, OutboundEnd::Goodbye(HangupOutcome::HungUp));
    }

    #[test]
    fn test_transcript_log_resets_per_turn() {
        let mut log = TranscriptLog::default();
        log.push("Hello ");
        log.push("THERE");
        assert_eq!(log.current_response, "hello there");

        log.finish_turn();
        log.push("Bye");
        assert_eq!(log.current_response, "bye");
        assert_eq!(log.total_chars, "hello therebye".len());
    }
}
