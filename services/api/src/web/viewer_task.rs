//! services/api/src/web/viewer_task.rs
//!
//! The worker that streams a viewer's playback to its WebSocket client.

use crate::web::protocol::{PlaybackView, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use futures::{stream::SplitSink, SinkExt};
use std::sync::Arc;
use stories_core::playback::{PlaybackEvent, PlaybackSnapshot};
use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Serializes and sends one message. Returns `false` when the client is gone.
pub async fn send_message(ws_sender: &WsSender, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}

/// Forwards snapshots and events until cancelled, the controller shuts down
/// or the client stops accepting messages.
///
/// Snapshots arrive through a `watch` channel, so a slow client skips
/// intermediate progress values and always receives the latest one.
pub async fn forward_playback(
    mut snapshots: watch::Receiver<PlaybackSnapshot>,
    mut events: broadcast::Receiver<PlaybackEvent>,
    ws_sender: WsSender,
    cancellation_token: CancellationToken,
) {
    info!("Playback forwarding started.");

    loop {
        let message = tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Playback forwarding cancelled.");
                return;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    debug!("Playback controller closed its snapshot channel.");
                    return;
                }
                let view = PlaybackView::from(&*snapshots.borrow_and_update());
                ServerMessage::Playback(view)
            }
            event = events.recv() => match event {
                Ok(event) => ServerMessage::from(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Viewer lagged behind playback events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Playback controller closed its event channel.");
                    return;
                }
            },
        };

        if !send_message(&ws_sender, &message).await {
            error!("Failed to send playback update to client. Ending forwarding task.");
            return;
        }
    }
}
