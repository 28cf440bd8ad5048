//! Twilio to OpenAI: forwards caller audio and tracks the stream.

use super::{protocol::TwilioEvent, session::RelaySession, watchdog};
use axum::extract::ws::Message;
use concierge_core::{
    realtime_api::ClientEvent, registry::SessionRegistry, silence::SilenceWatchdog,
};
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Reads Twilio frames until the stream closes.
///
/// The silence watchdog runs inside this future, so it stops when the
/// stream does. Its first window starts here rather than when the session
/// was created. A frame that fails to decode is logged and skipped.
pub async fn relay_inbound<S, E>(
    mut frames: S,
    session: &RelaySession,
    registry: &SessionRegistry,
    upstream: mpsc::Sender<ClientEvent>,
    silence_watchdog: SilenceWatchdog,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    session.touch();
    let watchdog_task = watchdog::run(silence_watchdog, session, upstream.clone());
    tokio::pin!(watchdog_task);
    let mut watchdog_done = false;

    loop {
        tokio::select! {
            () = &mut watchdog_task, if !watchdog_done => {
                watchdog_done = true;
            }
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(text.as_str(), session, registry, &upstream).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "Twilio closed the media stream.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Error receiving from Twilio WebSocket.");
                    break;
                }
                None => {
                    info!("Twilio media stream disconnected.");
                    break;
                }
            },
        }
    }
}

async fn handle_frame(
    text: &str,
    session: &RelaySession,
    registry: &SessionRegistry,
    upstream: &mpsc::Sender<ClientEvent>,
) {
    let event = match serde_json::from_str::<TwilioEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Dropping malformed Twilio message.");
            return;
        }
    };

    match event {
        TwilioEvent::Start { start } => {
            tracing::Span::current().record("stream_sid", start.stream_sid.as_str());
            info!(stream_sid = %start.stream_sid, "Incoming stream has started.");
            session.set_stream_sid(start.stream_sid);
            if session.call_sid().is_none() {
                let token = start.custom_parameters.get("token").map(String::as_str);
                match registry.resolve(start.call_sid.as_deref(), token) {
                    Some(call_sid) => {
                        tracing::Span::current().record("call_sid", call_sid.as_str());
                        info!(%call_sid, "Call SID taken from the stream start event.");
                        session.adopt_call_sid(call_sid);
                    }
                    None => warn!("No call SID for this stream; hang-up will be skipped."),
                }
            }
        }
        TwilioEvent::Media { media } => {
            session.touch();
            if let Err(e) = upstream.send(ClientEvent::append_audio(media.payload)).await {
                warn!(error = %e, "Failed to queue caller audio for OpenAI.");
            }
        }
        TwilioEvent::SpeechStarted => {
            debug!("Caller speech started.");
            session.touch();
        }
        TwilioEvent::Stop => info!("Twilio sent stop; waiting for the socket to close."),
        TwilioEvent::Other => {}
    }
}
