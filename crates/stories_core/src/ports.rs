//! crates/stories_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete remote feed and local store.

use async_trait::async_trait;
use crate::domain::{Story, StoryId, StoryInteraction};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// A remote fetch failed; retrying may succeed.
    #[error("Transient fetch error: {0}")]
    Transient(String),
    /// The local interaction store failed to read or write.
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote supplier of the base story list.
#[async_trait]
pub trait StoriesRemoteSource: Send + Sync {
    /// Fetches one page of stories. May be slow and may fail transiently.
    async fn fetch_stories(&self, page: usize, page_size: usize) -> PortResult<Vec<Story>>;
}

/// Persists seen/liked flags keyed by story id.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn get_interaction(&self, story_id: StoryId) -> PortResult<Option<StoryInteraction>>;

    async fn get_all_interactions(&self) -> PortResult<Vec<StoryInteraction>>;

    /// Marks the story as seen and stamps `last_seen_at`. Repeating it keeps `is_seen` true.
    async fn mark_seen(&self, story_id: StoryId) -> PortResult<()>;

    /// Flips the like flag. A story without a record becomes liked.
    async fn toggle_like(&self, story_id: StoryId) -> PortResult<()>;

    async fn set_liked(&self, story_id: StoryId, is_liked: bool) -> PortResult<()>;

    async fn delete_interaction(&self, story_id: StoryId) -> PortResult<()>;

    async fn delete_all(&self) -> PortResult<()>;
}

/// Resolves stories and their neighbors by id, for single-story viewing.
#[async_trait]
pub trait StoryLookup: Send + Sync {
    async fn get_story(&self, story_id: StoryId) -> PortResult<Option<Story>>;

    async fn get_next_id(&self, after: StoryId) -> PortResult<Option<StoryId>>;

    async fn get_previous_id(&self, before: StoryId) -> PortResult<Option<StoryId>>;
}
