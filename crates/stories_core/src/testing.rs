//! In-memory port implementations shared by the unit tests.

use crate::domain::{Story, StoryId, StoryInteraction};
use crate::ports::{InteractionStore, PortError, PortResult, StoriesRemoteSource, StoryLookup};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn story(id: StoryId, author_name: &str, duration: f64) -> Story {
    Story {
        id,
        author_id: 100 + id,
        author_name: author_name.to_string(),
        author_avatar_url: None,
        media_url: None,
        created_at: Utc::now(),
        duration,
    }
}

pub struct FakeRemote {
    stories: Vec<Story>,
    failing: AtomicBool,
    calls: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakeRemote {
    pub fn new(stories: Vec<Story>) -> Self {
        Self {
            stories,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoriesRemoteSource for FakeRemote {
    async fn fetch_stories(&self, _page: usize, _page_size: usize) -> PortResult<Vec<Story>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Transient("remote unavailable".to_string()));
        }
        Ok(self.stories.clone())
    }
}

#[derive(Default)]
pub struct MemoryInteractionStore {
    records: Mutex<HashMap<StoryId, StoryInteraction>>,
    failing: AtomicBool,
    seen_writes: AtomicUsize,
    read_delay: Mutex<Duration>,
}

impl MemoryInteractionStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delays every `get_interaction` after the record has been read.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = delay;
    }

    pub fn seen_writes(&self) -> usize {
        self.seen_writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> PortResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PortError::Persistence("store offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn update(&self, story_id: StoryId, apply: impl FnOnce(&mut StoryInteraction)) {
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(story_id)
            .or_insert_with(|| StoryInteraction::unseen(story_id));
        apply(record);
    }
}

#[async_trait]
impl InteractionStore for MemoryInteractionStore {
    async fn get_interaction(&self, story_id: StoryId) -> PortResult<Option<StoryInteraction>> {
        self.check()?;
        let record = self.records.lock().unwrap().get(&story_id).cloned();
        let delay = *self.read_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(record)
    }

    async fn get_all_interactions(&self) -> PortResult<Vec<StoryInteraction>> {
        self.check()?;
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn mark_seen(&self, story_id: StoryId) -> PortResult<()> {
        self.check()?;
        self.seen_writes.fetch_add(1, Ordering::SeqCst);
        self.update(story_id, |record| {
            record.is_seen = true;
            record.last_seen_at = Some(Utc::now());
        });
        Ok(())
    }

    async fn toggle_like(&self, story_id: StoryId) -> PortResult<()> {
        self.check()?;
        self.update(story_id, |record| record.is_liked = !record.is_liked);
        Ok(())
    }

    async fn set_liked(&self, story_id: StoryId, is_liked: bool) -> PortResult<()> {
        self.check()?;
        self.update(story_id, |record| record.is_liked = is_liked);
        Ok(())
    }

    async fn delete_interaction(&self, story_id: StoryId) -> PortResult<()> {
        self.check()?;
        self.records.lock().unwrap().remove(&story_id);
        Ok(())
    }

    async fn delete_all(&self) -> PortResult<()> {
        self.check()?;
        self.records.lock().unwrap().clear();
        Ok(())
    }
}

/// Neighbor lookup over a fixed, ordered list of stories.
pub struct ListLookup {
    stories: Vec<Story>,
    failing: AtomicBool,
}

impl ListLookup {
    pub fn new(stories: Vec<Story>) -> Self {
        Self {
            stories,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn position(&self, story_id: StoryId) -> PortResult<Option<usize>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Transient("lookup unavailable".to_string()));
        }
        Ok(self.stories.iter().position(|s| s.id == story_id))
    }
}

#[async_trait]
impl StoryLookup for ListLookup {
    async fn get_story(&self, story_id: StoryId) -> PortResult<Option<Story>> {
        Ok(self.position(story_id)?.map(|i| self.stories[i].clone()))
    }

    async fn get_next_id(&self, after: StoryId) -> PortResult<Option<StoryId>> {
        Ok(self
            .position(after)?
            .and_then(|i| self.stories.get(i + 1))
            .map(|s| s.id))
    }

    async fn get_previous_id(&self, before: StoryId) -> PortResult<Option<StoryId>> {
        Ok(self
            .position(before)?
            .and_then(|i| i.checked_sub(1))
            .map(|i| self.stories[i].id))
    }
}
