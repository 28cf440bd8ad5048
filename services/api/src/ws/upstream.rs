//! Handles the real-time WebSocket connection to OpenAI.

use anyhow::{Context, Result};
use concierge_core::realtime_api::{ClientEvent, SessionConfig};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use secrecy::{ExposeSecret, SecretString};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::info;

pub type RealtimeSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type RealtimeSink = SplitSink<RealtimeSocket, WsMessage>;
pub type RealtimeStream = SplitStream<RealtimeSocket>;

/// Connects to the Realtime API and configures the session.
///
/// The `session.update` is written before this returns, so it always
/// precedes any relayed audio. There is exactly one attempt; a failure here
/// ends the call's relay.
pub async fn connect(
    url: &str,
    api_key: &SecretString,
    session: SessionConfig,
) -> Result<(RealtimeSink, RealtimeStream)> {
    let mut request = url.into_client_request()?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", api_key.expose_secret()).parse()?,
    );
    request
        .headers_mut()
        .insert("OpenAI-Beta", "realtime=v1".parse()?);

    let (ws_stream, _) = connect_async(request)
        .await
        .context("Failed to connect to OpenAI Realtime WebSocket")?;
    let (mut openai_tx, openai_rx) = ws_stream.split();
    info!("Connected to OpenAI Realtime API.");

    send_event(&mut openai_tx, &ClientEvent::SessionUpdate { session })
        .await
        .context("Failed to send session.update")?;

    Ok((openai_tx, openai_rx))
}

/// Serializes and sends one client event.
pub async fn send_event(openai_tx: &mut RealtimeSink, event: &ClientEvent) -> Result<()> {
    let serialized = serde_json::to_string(event)?;
    openai_tx.send(WsMessage::Text(serialized.into())).await?;
    Ok(())
}

/// Writes queued client events to OpenAI in order.
///
/// Returns when every sender has been dropped, or with an error as soon as
/// the socket rejects a write.
pub async fn forward_client_events(
    rx: &mut mpsc::Receiver<ClientEvent>,
    openai_tx: &mut RealtimeSink,
) -> Result<()> {
    while let Some(event) = rx.recv().await {
        send_event(openai_tx, &event).await?;
    }
    Ok(())
}
