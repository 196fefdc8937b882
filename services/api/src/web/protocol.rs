//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the story viewer client and
//! the API server.

use serde::{Deserialize, Serialize};
use stories_core::domain::StoryId;
use stories_core::playback::{PlaybackCommand, PlaybackEvent, PlaybackSnapshot, PlaybackState};

use crate::web::rest::{InteractionResponse, StoryResponse};

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens the viewer on a story. This must be the first message sent on the connection.
    Open { story_id: StoryId },

    Pause,
    Resume,
    Next,
    Previous,

    /// Toggles the like flag; without a `story_id` the current story is used.
    ToggleLike {
        #[serde(default)]
        story_id: Option<StoryId>,
    },

    MarkSeen,

    /// Starts the current story over from zero progress.
    Restart,

    /// Closes the viewer. The connection is closed by the server afterwards.
    Close,
}

impl ClientMessage {
    /// The controller command this message maps to, if any.
    ///
    /// `Open` and `Close` manage the connection itself and have no command.
    pub fn to_command(&self) -> Option<PlaybackCommand> {
        match self {
            ClientMessage::Pause => Some(PlaybackCommand::Pause),
            ClientMessage::Resume => Some(PlaybackCommand::Resume),
            ClientMessage::Next => Some(PlaybackCommand::Next),
            ClientMessage::Previous => Some(PlaybackCommand::Previous),
            ClientMessage::ToggleLike { story_id } => Some(PlaybackCommand::ToggleLike {
                story_id: *story_id,
            }),
            ClientMessage::MarkSeen => Some(PlaybackCommand::MarkSeen),
            ClientMessage::Restart => Some(PlaybackCommand::Start),
            ClientMessage::Open { .. } | ClientMessage::Close => None,
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms that the requested story exists and playback is about to start.
    ViewerOpened { story_id: StoryId },

    /// The latest playback snapshot. Sent on every change, including progress ticks.
    Playback(PlaybackView),

    StoryStarted { story_id: StoryId },

    /// The story's timer ran out.
    StoryCompleted { story_id: StoryId },

    /// The last loaded story completed. The client should close the viewer.
    EndOfContent,

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

impl From<PlaybackEvent> for ServerMessage {
    fn from(event: PlaybackEvent) -> Self {
        match event {
            PlaybackEvent::StoryStarted { story_id } => ServerMessage::StoryStarted { story_id },
            PlaybackEvent::StoryCompleted { story_id } => {
                ServerMessage::StoryCompleted { story_id }
            }
            PlaybackEvent::EndOfContent => ServerMessage::EndOfContent,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStateView {
    Idle,
    Loading,
    Playing,
    Paused,
    Completed,
}

impl From<PlaybackState> for PlaybackStateView {
    fn from(state: PlaybackState) -> Self {
        match state {
            PlaybackState::Idle => Self::Idle,
            PlaybackState::Loading => Self::Loading,
            PlaybackState::Playing => Self::Playing,
            PlaybackState::Paused => Self::Paused,
            PlaybackState::Completed => Self::Completed,
        }
    }
}

/// The wire form of a playback snapshot.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PlaybackView {
    pub state: PlaybackStateView,
    pub story: Option<StoryResponse>,
    pub interaction: Option<InteractionResponse>,
    pub previous_id: Option<StoryId>,
    pub next_id: Option<StoryId>,
    /// Fraction of the current story shown, in `[0, 1]`.
    pub progress: f64,
    pub is_paused: bool,
    pub end_of_content: bool,
}

impl From<&PlaybackSnapshot> for PlaybackView {
    fn from(snapshot: &PlaybackSnapshot) -> Self {
        Self {
            state: snapshot.state.into(),
            story: snapshot.story.as_ref().map(StoryResponse::from),
            interaction: snapshot.interaction.as_ref().map(InteractionResponse::from),
            previous_id: snapshot.previous_id,
            next_id: snapshot.next_id,
            progress: snapshot.progress,
            is_paused: snapshot.is_paused,
            end_of_content: snapshot.end_of_content,
        }
    }
}
