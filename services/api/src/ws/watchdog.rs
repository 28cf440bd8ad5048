//! Drives the silence watchdog for one relay session.

use super::session::RelaySession;
use concierge_core::{
    realtime_api::ClientEvent,
    silence::{SILENCE_PROMPT, SilenceWatchdog},
};
use tokio::{sync::mpsc, time::Instant};
use tracing::{info, warn};

/// Polls for silence until the prompt has been sent once.
///
/// The prompt is a system text item followed by `response.create`, so the
/// assistant speaks it immediately. The future completes after firing; it is
/// dropped with the inbound loop that owns it if the call ends first.
pub async fn run(
    mut watchdog: SilenceWatchdog,
    session: &RelaySession,
    upstream: mpsc::Sender<ClientEvent>,
) {
    loop {
        tokio::time::sleep(watchdog.poll_interval()).await;
        if !watchdog.observe(Instant::now(), session.last_activity()) {
            continue;
        }

        info!(
            threshold_secs = watchdog.threshold().as_secs_f32(),
            "No speech detected. Prompting the caller."
        );
        session.mark_prompt_sent();
        for event in [ClientEvent::system_text(SILENCE_PROMPT), ClientEvent::ResponseCreate] {
            if let Err(e) = upstream.send(event).await {
                warn!(error = %e, "Failed to queue silence prompt.");
                break;
            }
        }
        return;
    }
}
