//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::port_error_status;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use stories_core::domain::{Story, StoryId, StoryInteraction};
use stories_core::feed::stories_with_interactions;
use stories_core::ports::{InteractionStore, PortError, StoryLookup};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_stories_handler,
        next_page_handler,
        story_detail_handler,
        mark_seen_handler,
        toggle_like_handler,
        delete_interactions_handler,
    ),
    components(
        schemas(StoryResponse, InteractionResponse, FeedItemResponse, FeedPageResponse, StoryDetailResponse)
    ),
    tags(
        (name = "Stories API", description = "Paginated story feed and per-story interactions.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A story as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StoryResponse {
    pub id: StoryId,
    pub author_id: i64,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Display duration in seconds.
    pub duration: f64,
}

impl From<&Story> for StoryResponse {
    fn from(story: &Story) -> Self {
        Self {
            id: story.id,
            author_id: story.author_id,
            author_name: story.author_name.clone(),
            author_avatar_url: story.author_avatar_url.as_ref().map(|u| u.to_string()),
            media_url: story.media_url.as_ref().map(|u| u.to_string()),
            created_at: story.created_at,
            duration: story.duration,
        }
    }
}

/// Seen/liked state of a story. Stories without a record are reported unseen and unliked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct InteractionResponse {
    pub story_id: StoryId,
    pub is_seen: bool,
    pub is_liked: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl From<&StoryInteraction> for InteractionResponse {
    fn from(interaction: &StoryInteraction) -> Self {
        Self {
            story_id: interaction.story_id,
            is_seen: interaction.is_seen,
            is_liked: interaction.is_liked,
            last_seen_at: interaction.last_seen_at,
        }
    }
}

impl InteractionResponse {
    fn for_story(story_id: StoryId, interaction: Option<&StoryInteraction>) -> Self {
        interaction
            .map(Self::from)
            .unwrap_or_else(|| Self::from(&StoryInteraction::unseen(story_id)))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedItemResponse {
    pub story: StoryResponse,
    pub interaction: InteractionResponse,
}

/// One page of the feed.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedPageResponse {
    pub page: usize,
    pub page_size: usize,
    pub stories: Vec<FeedItemResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoryDetailResponse {
    pub story: StoryResponse,
    pub interaction: InteractionResponse,
    pub previous_id: Option<StoryId>,
    pub next_id: Option<StoryId>,
}

type HandlerError = (StatusCode, String);

fn port_failure(context: &str, e: PortError) -> HandlerError {
    error!("{}: {:?}", context, e);
    (port_error_status(&e), format!("{}: {}", context, e))
}

async fn feed_page(app_state: &AppState, stories: Vec<Story>) -> FeedPageResponse {
    let page = app_state.feed.current_page().await;
    let paired = stories_with_interactions(stories, app_state.interactions.as_ref()).await;
    FeedPageResponse {
        page,
        page_size: app_state.feed.page_size(),
        stories: paired
            .iter()
            .map(|(story, interaction)| FeedItemResponse {
                story: StoryResponse::from(story),
                interaction: InteractionResponse::for_story(story.id, interaction.as_ref()),
            })
            .collect(),
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Load the first page of the feed.
///
/// Fetches the base story list on first use. A 503 means nothing could be
/// loaded and the whole list should offer a retry.
#[utoipa::path(
    get,
    path = "/stories",
    responses(
        (status = 200, description = "The first page of stories", body = FeedPageResponse),
        (status = 503, description = "The remote story source is unavailable"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_stories_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<FeedPageResponse>, HandlerError> {
    let stories = app_state
        .feed
        .fetch_initial_page()
        .await
        .map_err(|e| port_failure("Failed to load stories", e))?;
    Ok(Json(feed_page(&app_state, stories).await))
}

/// Load the next page of the feed.
///
/// On a 503 the page cursor is unchanged; already loaded stories stay valid and
/// the same request can be retried.
#[utoipa::path(
    post,
    path = "/stories/next-page",
    responses(
        (status = 200, description = "The next page of stories", body = FeedPageResponse),
        (status = 503, description = "The remote story source is unavailable"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn next_page_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<FeedPageResponse>, HandlerError> {
    let stories = app_state
        .feed
        .fetch_next_page()
        .await
        .map_err(|e| port_failure("Failed to load more stories", e))?;
    Ok(Json(feed_page(&app_state, stories).await))
}

/// Get a single story with its interaction and neighbor ids.
#[utoipa::path(
    get,
    path = "/stories/{id}",
    params(("id" = i64, Path, description = "Story id from a loaded feed page.")),
    responses(
        (status = 200, description = "The story", body = StoryDetailResponse),
        (status = 404, description = "The story is not part of a loaded page")
    )
)]
pub async fn story_detail_handler(
    State(app_state): State<Arc<AppState>>,
    Path(story_id): Path<StoryId>,
) -> Result<Json<StoryDetailResponse>, HandlerError> {
    let feed = &app_state.feed;
    let story = feed
        .get_story(story_id)
        .await
        .map_err(|e| port_failure("Failed to load story", e))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Story {} not found", story_id)))?;
    let previous_id = feed
        .get_previous_id(story_id)
        .await
        .map_err(|e| port_failure("Failed to resolve previous story", e))?;
    let next_id = feed
        .get_next_id(story_id)
        .await
        .map_err(|e| port_failure("Failed to resolve next story", e))?;
    let interaction = app_state
        .interactions
        .get_interaction(story_id)
        .await
        .map_err(|e| port_failure("Failed to load interaction", e))?;

    Ok(Json(StoryDetailResponse {
        story: StoryResponse::from(&story),
        interaction: InteractionResponse::for_story(story_id, interaction.as_ref()),
        previous_id,
        next_id,
    }))
}

/// Mark a story as seen.
#[utoipa::path(
    post,
    path = "/stories/{id}/seen",
    params(("id" = i64, Path, description = "Story id.")),
    responses(
        (status = 200, description = "The updated interaction", body = InteractionResponse),
        (status = 500, description = "The interaction store failed")
    )
)]
pub async fn mark_seen_handler(
    State(app_state): State<Arc<AppState>>,
    Path(story_id): Path<StoryId>,
) -> Result<Json<InteractionResponse>, HandlerError> {
    let store = &app_state.interactions;
    store
        .mark_seen(story_id)
        .await
        .map_err(|e| port_failure("Failed to mark story as seen", e))?;
    let interaction = store
        .get_interaction(story_id)
        .await
        .map_err(|e| port_failure("Failed to load interaction", e))?;
    Ok(Json(InteractionResponse::for_story(story_id, interaction.as_ref())))
}

/// Toggle the like flag of a story.
#[utoipa::path(
    post,
    path = "/stories/{id}/like",
    params(("id" = i64, Path, description = "Story id.")),
    responses(
        (status = 200, description = "The updated interaction", body = InteractionResponse),
        (status = 500, description = "The interaction store failed")
    )
)]
pub async fn toggle_like_handler(
    State(app_state): State<Arc<AppState>>,
    Path(story_id): Path<StoryId>,
) -> Result<Json<InteractionResponse>, HandlerError> {
    let store = &app_state.interactions;
    store
        .toggle_like(story_id)
        .await
        .map_err(|e| port_failure("Failed to toggle like", e))?;
    let interaction = store
        .get_interaction(story_id)
        .await
        .map_err(|e| port_failure("Failed to load interaction", e))?;
    info!(story_id, "Toggled like");
    Ok(Json(InteractionResponse::for_story(story_id, interaction.as_ref())))
}

/// Forget every seen/liked flag.
#[utoipa::path(
    delete,
    path = "/interactions",
    responses(
        (status = 204, description = "All interactions deleted"),
        (status = 500, description = "The interaction store failed")
    )
)]
pub async fn delete_interactions_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<StatusCode, HandlerError> {
    app_state
        .interactions
        .delete_all()
        .await
        .map_err(|e| port_failure("Failed to delete interactions", e))?;
    info!("Deleted all interactions");
    Ok(StatusCode::NO_CONTENT)
}
