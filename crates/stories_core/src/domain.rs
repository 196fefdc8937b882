//! crates/stories_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use url::Url;

/// Identifier of a story. Unique within one feed session.
pub type StoryId = i64;

/// A single ephemeral media post with a fixed display duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    pub id: StoryId,
    pub author_id: i64,
    pub author_name: String,
    pub author_avatar_url: Option<Url>,
    pub media_url: Option<Url>,
    pub created_at: DateTime<Utc>,
    /// Display duration in seconds.
    pub duration: f64,
}

impl Story {
    /// Returns a copy of this story carrying a different id.
    ///
    /// Used by the paginated feed, which repeats the base stories under fresh ids.
    pub fn with_id(&self, id: StoryId) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }
}

/// Per-story seen/liked state. Replaced wholesale, never patched in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryInteraction {
    pub story_id: StoryId,
    pub is_seen: bool,
    pub is_liked: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl StoryInteraction {
    /// The state implied by a missing interaction record.
    pub fn unseen(story_id: StoryId) -> Self {
        Self {
            story_id,
            is_seen: false,
            is_liked: false,
            last_seen_at: None,
        }
    }
}
