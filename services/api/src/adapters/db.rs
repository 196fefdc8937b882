//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `InteractionStore` port from the `core` crate. It keeps seen/liked flags
//! in a SQLite table using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use stories_core::domain::{StoryId, StoryInteraction};
use stories_core::ports::{InteractionStore, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `InteractionStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn persistence(e: sqlx::Error) -> PortError {
    PortError::Persistence(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct InteractionRecord {
    story_id: i64,
    is_seen: bool,
    is_liked: bool,
    last_seen_at: Option<DateTime<Utc>>,
}
impl InteractionRecord {
    fn to_domain(self) -> StoryInteraction {
        StoryInteraction {
            story_id: self.story_id,
            is_seen: self.is_seen,
            is_liked: self.is_liked,
            last_seen_at: self.last_seen_at,
        }
    }
}

//=========================================================================================
// `InteractionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl InteractionStore for DbAdapter {
    async fn get_interaction(&self, story_id: StoryId) -> PortResult<Option<StoryInteraction>> {
        let record = sqlx::query_as::<_, InteractionRecord>(
            "SELECT story_id, is_seen, is_liked, last_seen_at FROM story_interactions WHERE story_id = ?",
        )
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(record.map(InteractionRecord::to_domain))
    }

    async fn get_all_interactions(&self) -> PortResult<Vec<StoryInteraction>> {
        let records = sqlx::query_as::<_, InteractionRecord>(
            "SELECT story_id, is_seen, is_liked, last_seen_at FROM story_interactions ORDER BY story_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(records.into_iter().map(InteractionRecord::to_domain).collect())
    }

    async fn mark_seen(&self, story_id: StoryId) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO story_interactions (story_id, is_seen, is_liked, last_seen_at) VALUES (?, TRUE, FALSE, ?) \
             ON CONFLICT (story_id) DO UPDATE SET is_seen = TRUE, last_seen_at = excluded.last_seen_at",
        )
        .bind(story_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn toggle_like(&self, story_id: StoryId) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO story_interactions (story_id, is_seen, is_liked, last_seen_at) VALUES (?, FALSE, TRUE, NULL) \
             ON CONFLICT (story_id) DO UPDATE SET is_liked = NOT story_interactions.is_liked",
        )
        .bind(story_id)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn set_liked(&self, story_id: StoryId, is_liked: bool) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO story_interactions (story_id, is_seen, is_liked, last_seen_at) VALUES (?, FALSE, ?, NULL) \
             ON CONFLICT (story_id) DO UPDATE SET is_liked = excluded.is_liked",
        )
        .bind(story_id)
        .bind(is_liked)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn delete_interaction(&self, story_id: StoryId) -> PortResult<()> {
        sqlx::query("DELETE FROM story_interactions WHERE story_id = ?")
            .bind(story_id)
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn delete_all(&self) -> PortResult<()> {
        sqlx::query("DELETE FROM story_interactions")
            .execute(&self.pool)
            .await
            .map_err(persistence)?;
        Ok(())
    }
}
