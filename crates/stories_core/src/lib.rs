pub mod domain;
pub mod feed;
pub mod playback;
pub mod ports;

#[cfg(test)]
mod testing;

pub use domain::{Story, StoryId, StoryInteraction};
pub use feed::{stories_with_interactions, StoryFeed, DEFAULT_PAGE_SIZE};
pub use playback::{
    PlaybackCommand, PlaybackConfig, PlaybackController, PlaybackEvent, PlaybackHandle,
    PlaybackSnapshot, PlaybackState,
};
pub use ports::{InteractionStore, PortError, PortResult, StoriesRemoteSource, StoryLookup};
