//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a story viewer connection.
//! Each connection owns one playback controller and one forwarding task.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
    viewer_task::{forward_playback, send_message, WsSender},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::StreamExt;
use std::sync::Arc;
use stories_core::domain::StoryId;
use stories_core::playback::{PlaybackCommand, PlaybackHandle};
use stories_core::ports::StoryLookup;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New viewer connection established.");

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Open Phase ---
    let story_id = match receiver.next().await {
        Some(Ok(Message::Text(open_json))) => match serde_json::from_str::<ClientMessage>(&open_json)
        {
            Ok(ClientMessage::Open { story_id }) => story_id,
            _ => {
                error!("First message was not a valid Open message.");
                let message = ServerMessage::Error {
                    message: "The first message must open a story.".to_string(),
                };
                send_message(&ws_sender, &message).await;
                return;
            }
        },
        _ => {
            error!("Client disconnected before sending Open message.");
            return;
        }
    };

    if let Err(message) = validate_story(&app_state, story_id).await {
        send_message(&ws_sender, &ServerMessage::Error { message }).await;
        return;
    }

    let handle = app_state.playback_controller(story_id).spawn();
    if !send_message(&ws_sender, &ServerMessage::ViewerOpened { story_id }).await {
        error!("Failed to send viewer opened message.");
        handle.shutdown().await;
        return;
    }

    let forward_token = CancellationToken::new();
    let forward_task = tokio::spawn(forward_playback(
        handle.snapshots(),
        handle.subscribe_events(),
        ws_sender.clone(),
        forward_token.clone(),
    ));
    handle.send(PlaybackCommand::Start).await;

    // --- 2. Main Message Loop ---
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                if !handle_text_message(text.as_str(), &handle, &ws_sender).await {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
            None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    forward_token.cancel();
    handle.shutdown().await;
    if let Err(e) = forward_task.await {
        warn!("Forwarding task failed: {}", e);
    }
    info!(story_id, "Viewer connection closed.");
}

/// Checks that the story is part of a loaded feed page.
async fn validate_story(app_state: &AppState, story_id: StoryId) -> Result<(), String> {
    match app_state.feed.get_story(story_id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => {
            warn!(story_id, "Viewer requested an unknown story");
            Err(format!("Story {} is not available.", story_id))
        }
        Err(e) => {
            error!(story_id, "Failed to resolve story: {:?}", e);
            Err("Failed to load story.".to_string())
        }
    }
}

/// Handles one client message. Returns `false` when the connection should close.
async fn handle_text_message(text: &str, handle: &PlaybackHandle, ws_sender: &WsSender) -> bool {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => client_msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            let message = ServerMessage::Error {
                message: format!("Unrecognized message: {}", e),
            };
            return send_message(ws_sender, &message).await;
        }
    };

    match client_msg {
        ClientMessage::Close => {
            info!("Close message received.");
            false
        }
        ClientMessage::Open { .. } => {
            warn!("Received subsequent Open message, which is ignored.");
            true
        }
        other => match other.to_command() {
            Some(command) => {
                if handle.send(command).await {
                    true
                } else {
                    error!("Playback controller is gone.");
                    false
                }
            }
            None => true,
        },
    }
}
