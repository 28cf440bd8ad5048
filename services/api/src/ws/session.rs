//! Manages the lifecycle of one call's media stream.

use super::{inbound, outbound, protocol::RelayMessage, upstream};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use concierge_core::{
    realtime_api::SessionConfig,
    registry::SessionRegistry,
    silence::{DEFAULT_POLL_INTERVAL, SilenceWatchdog},
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use std::{
    fmt::Display,
    sync::{
        Arc, Mutex, MutexGuard, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::{sync::mpsc, time::Instant};
use tracing::{error, info, instrument, warn};

/// Query parameters Twilio appends to the stream URL.
#[derive(Deserialize, Debug, Default)]
pub struct MediaStreamParams {
    #[serde(rename = "callSid")]
    pub call_sid: Option<String>,
    pub token: Option<String>,
}

/// Per-call state shared by the relay loops and the silence watchdog.
#[derive(Debug)]
pub struct RelaySession {
    call_sid: OnceLock<String>,
    stream_sid: Mutex<Option<String>>,
    last_activity: Mutex<Instant>,
    prompt_sent: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RelaySession {
    pub fn new(call_sid: Option<String>) -> Self {
        let session = Self {
            call_sid: OnceLock::new(),
            stream_sid: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
            prompt_sent: AtomicBool::new(false),
        };
        if let Some(sid) = call_sid {
            session.adopt_call_sid(sid);
        }
        session
    }

    pub fn call_sid(&self) -> Option<&str> {
        self.call_sid.get().map(String::as_str)
    }

    /// Sets the call identifier if none is known yet. Returns true if it was set.
    pub fn adopt_call_sid(&self, call_sid: String) -> bool {
        self.call_sid.set(call_sid).is_ok()
    }

    pub fn stream_sid(&self) -> Option<String> {
        lock(&self.stream_sid).clone()
    }

    pub fn set_stream_sid(&self, stream_sid: String) {
        *lock(&self.stream_sid) = Some(stream_sid);
    }

    /// Records inbound audio activity now.
    pub fn touch(&self) {
        *lock(&self.last_activity) = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *lock(&self.last_activity)
    }

    pub fn mark_prompt_sent(&self) {
        self.prompt_sent.store(true, Ordering::SeqCst);
    }

    pub fn prompt_sent(&self) -> bool {
        self.prompt_sent.load(Ordering::SeqCst)
    }
}

/// Axum handler to upgrade Twilio's media stream request to a WebSocket.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<MediaStreamParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// The call identifier known when the socket is accepted.
///
/// Only an explicit `callSid` or a registered token counts here. The
/// most-recent-call fallback waits for the `start` event, whose own
/// parameters take precedence over it.
fn initial_call_sid(registry: &SessionRegistry, params: &MediaStreamParams) -> Option<String> {
    registry.resolve_exact(params.call_sid.as_deref(), params.token.as_deref())
}

#[instrument(name = "media_stream", skip_all, fields(call_sid, stream_sid))]
async fn handle_socket(socket: WebSocket, params: MediaStreamParams, state: Arc<AppState>) {
    let call_sid = initial_call_sid(&state.registry, &params);
    match &call_sid {
        Some(sid) => {
            tracing::Span::current().record("call_sid", sid.as_str());
            info!("Media stream connected.");
        }
        None => info!("Media stream connected; call SID will come from the start event."),
    }

    let session = RelaySession::new(call_sid);
    let (twilio_tx, twilio_rx) = socket.split();
    if let Err(e) = run_relay_session(twilio_tx, twilio_rx, &session, &state).await {
        error!(error = ?e, "Relay session terminated with error.");
    }
    info!(
        call_sid = session.call_sid().unwrap_or("[missing]"),
        prompt_sent = session.prompt_sent(),
        "Relay session finished."
    );
}

/// Relays one call until either side hangs up.
///
/// Connects to OpenAI first; if that fails the Twilio side is closed and the
/// call is not relayed at all. Afterwards the inbound loop, the outbound
/// loop and both socket writers run concurrently, and the first one to
/// finish ends the session.
async fn run_relay_session<W, R, E>(
    mut twilio_tx: W,
    twilio_rx: R,
    session: &RelaySession,
    state: &AppState,
) -> Result<()>
where
    W: Sink<Message> + Unpin,
    W::Error: std::error::Error + Send + Sync + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let session_config =
        SessionConfig::telephony(state.system_prompt.as_str(), state.config.voice.as_str());
    let (mut openai_tx, openai_rx) = match upstream::connect(
        &state.config.realtime_url,
        &state.config.openai_api_key,
        session_config,
    )
    .await
    {
        Ok(connection) => connection,
        Err(e) => {
            let _ = twilio_tx.close().await;
            return Err(e);
        }
    };

    let (upstream_tx, mut upstream_rx) = mpsc::channel(128);
    let (downstream_tx, mut downstream_rx) = mpsc::channel(128);
    let watchdog = SilenceWatchdog::new(DEFAULT_POLL_INTERVAL, state.config.silence_timeout);

    tokio::select! {
        () = inbound::relay_inbound(twilio_rx, session, &state.registry, upstream_tx, watchdog) => {
            info!("Twilio stream ended.");
        }
        end = outbound::relay_outbound(openai_rx, session, downstream_tx, state.call_control.as_ref()) => {
            info!(?end, "Realtime stream ended.");
        }
        result = upstream::forward_client_events(&mut upstream_rx, &mut openai_tx) => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to write to OpenAI.");
            }
        }
        result = forward_relay_messages(&mut downstream_rx, &mut twilio_tx) => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to write to Twilio.");
            }
        }
    }

    // Audio already produced by the assistant should still reach the caller.
    while let Ok(msg) = downstream_rx.try_recv() {
        if send_msg(&mut twilio_tx, &msg).await.is_err() {
            break;
        }
    }
    let _ = openai_tx.close().await;
    let _ = twilio_tx.close().await;
    Ok(())
}

/// Writes queued relay messages to Twilio in order.
async fn forward_relay_messages<W>(rx: &mut mpsc::Receiver<RelayMessage>, socket_tx: &mut W) -> Result<()>
where
    W: Sink<Message> + Unpin,
    W::Error: std::error::Error + Send + Sync + 'static,
{
    while let Some(msg) = rx.recv().await {
        send_msg(socket_tx, &msg).await?;
    }
    Ok(())
}

/// A helper function to serialize and send a `RelayMessage` to Twilio.
async fn send_msg<W>(socket_tx: &mut W, msg: &RelayMessage) -> Result<()>
where
    W: Sink<Message> + Unpin,
    W::Error: std::error::Error + Send + Sync + 'static,
{
    let serialized = serde_json::to_string(msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
