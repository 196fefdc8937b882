//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use stories_core::domain::StoryId;
use stories_core::feed::StoryFeed;
use stories_core::playback::PlaybackController;
use stories_core::ports::InteractionStore;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The paginated feed, also the story lookup used by viewers.
    pub feed: Arc<StoryFeed>,
    pub interactions: Arc<dyn InteractionStore>,
}

impl AppState {
    /// Creates an idle playback controller for one viewer, starting at `story_id`.
    pub fn playback_controller(&self, story_id: StoryId) -> PlaybackController {
        PlaybackController::new(
            story_id,
            self.feed.clone(),
            self.interactions.clone(),
            self.config.playback,
        )
    }
}
