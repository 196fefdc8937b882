//! crates/stories_core/src/feed.rs
//!
//! An infinite-scroll story feed synthesized from a fixed base list.
//!
//! The base list is fetched from the remote source once and then repeated page
//! after page. Every synthesized story gets a fresh id derived from its position,
//! `page * page_size + index + 1`, so ids stay unique as long as pages are
//! requested in increasing order. Re-requesting a page number reissues the same
//! ids; this is a mock pagination strategy, not server-side pagination.

use crate::domain::{Story, StoryId, StoryInteraction};
use crate::ports::{InteractionStore, PortResult, StoriesRemoteSource, StoryLookup};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// The remote page that supplies the base list.
const BASE_LIST_PAGE: usize = 1;

#[derive(Debug, Default)]
struct Cursor {
    base_stories: Vec<Story>,
    current_page: usize,
}

impl Cursor {
    fn synthesize_page(&self, page: usize, page_size: usize) -> Vec<Story> {
        synthesize_page(&self.base_stories, page, page_size)
    }

    /// Number of ids handed out by the pages loaded so far.
    fn loaded_len(&self, page_size: usize) -> usize {
        if self.base_stories.is_empty() {
            0
        } else {
            (self.current_page + 1) * page_size
        }
    }

    fn resolve(&self, story_id: StoryId, page_size: usize) -> Option<Story> {
        if story_id < 1 || story_id as usize > self.loaded_len(page_size) {
            return None;
        }
        let position = (story_id - 1) as usize;
        let base = &self.base_stories[position % self.base_stories.len()];
        Some(base.with_id(story_id))
    }
}

/// Builds one page of the synthetic feed.
///
/// Returns an empty page when there is nothing to repeat.
pub fn synthesize_page(base_stories: &[Story], page: usize, page_size: usize) -> Vec<Story> {
    if base_stories.is_empty() {
        return Vec::new();
    }
    let start = page * page_size;
    (0..page_size)
        .map(|i| {
            let base = &base_stories[(start + i) % base_stories.len()];
            base.with_id((start + i + 1) as StoryId)
        })
        .collect()
}

/// Paginated story source backed by a remote collaborator.
pub struct StoryFeed {
    remote: Arc<dyn StoriesRemoteSource>,
    page_size: usize,
    cursor: Mutex<Cursor>,
}

impl StoryFeed {
    pub fn new(remote: Arc<dyn StoriesRemoteSource>, page_size: usize) -> Self {
        Self {
            remote,
            page_size: page_size.max(1),
            cursor: Mutex::new(Cursor::default()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn current_page(&self) -> usize {
        self.cursor.lock().await.current_page
    }

    /// Returns page 0, fetching the base list first if it is not cached yet.
    ///
    /// A remote failure here propagates: there is nothing to show at all.
    pub async fn fetch_initial_page(&self) -> PortResult<Vec<Story>> {
        let mut cursor = self.cursor.lock().await;
        if cursor.base_stories.is_empty() {
            cursor.base_stories = self.fetch_base_list().await?;
        }
        cursor.current_page = 0;
        let stories = cursor.synthesize_page(0, self.page_size);
        info!(count = stories.len(), "Initial feed page ready");
        Ok(stories)
    }

    /// Returns the page after the current one and advances the cursor.
    ///
    /// The remote is always called first and its result discarded. The feed is
    /// synthesized locally, but the request keeps the remote's latency and failure
    /// behaviour on every "load more". The cursor only advances after that call
    /// succeeds, so a failed page can be retried.
    ///
    /// The cursor is not locked during remote calls; lookups keep answering
    /// from the loaded pages meanwhile.
    pub async fn fetch_next_page(&self) -> PortResult<Vec<Story>> {
        let (requested_page, has_base) = {
            let cursor = self.cursor.lock().await;
            (cursor.current_page + 1, !cursor.base_stories.is_empty())
        };

        self.remote
            .fetch_stories(requested_page, self.page_size)
            .await
            .map_err(|e| {
                warn!(page = requested_page, error = %e, "Remote request for next page failed");
                e
            })?;

        let fetched_base = if has_base {
            None
        } else {
            Some(self.fetch_base_list().await?)
        };

        let mut cursor = self.cursor.lock().await;
        if let Some(base) = fetched_base {
            if cursor.base_stories.is_empty() {
                cursor.base_stories = base;
            }
        }
        // Concurrent requests each advance by one page.
        let next_page = cursor.current_page + 1;
        cursor.current_page = next_page;
        let stories = cursor.synthesize_page(next_page, self.page_size);
        debug!(page = next_page, count = stories.len(), "Next feed page ready");
        Ok(stories)
    }

    async fn fetch_base_list(&self) -> PortResult<Vec<Story>> {
        let fetched = self
            .remote
            .fetch_stories(BASE_LIST_PAGE, self.page_size)
            .await?;
        let mut seen = HashSet::new();
        let base: Vec<Story> = fetched
            .into_iter()
            .filter(|story| seen.insert(story.id))
            .collect();
        info!(count = base.len(), "Fetched base story list");
        Ok(base)
    }
}

#[async_trait]
impl StoryLookup for StoryFeed {
    async fn get_story(&self, story_id: StoryId) -> PortResult<Option<Story>> {
        Ok(self.cursor.lock().await.resolve(story_id, self.page_size))
    }

    async fn get_next_id(&self, after: StoryId) -> PortResult<Option<StoryId>> {
        let cursor = self.cursor.lock().await;
        Ok(after
            .checked_add(1)
            .filter(|&next| next >= 1 && next as usize <= cursor.loaded_len(self.page_size)))
    }

    async fn get_previous_id(&self, before: StoryId) -> PortResult<Option<StoryId>> {
        let cursor = self.cursor.lock().await;
        Ok(before
            .checked_sub(1)
            .filter(|&previous| {
                previous >= 1 && previous as usize <= cursor.loaded_len(self.page_size)
            }))
    }
}

/// Pairs each story with its interaction record.
///
/// A failed read is treated like a missing record.
pub async fn stories_with_interactions(
    stories: Vec<Story>,
    store: &dyn InteractionStore,
) -> Vec<(Story, Option<StoryInteraction>)> {
    let mut paired = Vec::with_capacity(stories.len());
    for story in stories {
        let interaction = match store.get_interaction(story.id).await {
            Ok(interaction) => interaction,
            Err(e) => {
                warn!(story_id = story.id, error = %e, "Failed to load interaction");
                None
            }
        };
        paired.push((story, interaction));
    }
    paired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{story, FakeRemote, MemoryInteractionStore};
    use std::time::Duration;

    fn scenario_base() -> Vec<Story> {
        vec![story(1, "Jessica", 5.0), story(2, "Krystina", 7.0), story(3, "Taty", 6.0)]
    }

    #[tokio::test]
    async fn initial_page_repeats_base_list_under_fresh_ids() {
        let feed = StoryFeed::new(Arc::new(FakeRemote::new(scenario_base())), 20);

        let page = feed.fetch_initial_page().await.unwrap();

        assert_eq!(page.len(), 20);
        let ids: Vec<StoryId> = page.iter().map(|s| s.id).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
        assert_eq!(page[0].duration, 5.0);
        assert_eq!(page[1].duration, 7.0);
        assert_eq!(page[2].duration, 6.0);
        assert_eq!(page[3].author_name, "Jessica");
    }

    #[tokio::test]
    async fn next_pages_continue_ids_and_cycle_authors() {
        let feed = StoryFeed::new(Arc::new(FakeRemote::new(scenario_base())), 20);
        feed.fetch_initial_page().await.unwrap();

        let names = ["Jessica", "Krystina", "Taty"];
        for page_index in 1..=3usize {
            let page = feed.fetch_next_page().await.unwrap();
            let start = (page_index * 20) as StoryId;
            for (i, story) in page.iter().enumerate() {
                assert_eq!(story.id, start + i as StoryId + 1);
                assert_eq!(story.author_name, names[(page_index * 20 + i) % 3]);
            }
            assert_eq!(feed.current_page().await, page_index);
        }
    }

    #[tokio::test]
    async fn second_page_first_story_maps_to_third_base_story() {
        let feed = StoryFeed::new(Arc::new(FakeRemote::new(scenario_base())), 20);
        feed.fetch_initial_page().await.unwrap();

        let page = feed.fetch_next_page().await.unwrap();

        assert_eq!(page[0].id, 21);
        assert_eq!(page[0].duration, 6.0);
    }

    #[tokio::test]
    async fn base_list_is_fetched_once() {
        let remote = Arc::new(FakeRemote::new(scenario_base()));
        let feed = StoryFeed::new(remote.clone(), 20);

        feed.fetch_initial_page().await.unwrap();
        feed.fetch_initial_page().await.unwrap();

        assert_eq!(remote.calls(), 1);
        assert_eq!(feed.current_page().await, 0);
    }

    #[tokio::test]
    async fn next_page_always_calls_remote() {
        let remote = Arc::new(FakeRemote::new(scenario_base()));
        let feed = StoryFeed::new(remote.clone(), 20);
        feed.fetch_initial_page().await.unwrap();

        feed.fetch_next_page().await.unwrap();
        feed.fetch_next_page().await.unwrap();

        assert_eq!(remote.calls(), 3);
    }

    #[tokio::test]
    async fn failed_next_page_leaves_cursor_untouched() {
        let remote = Arc::new(FakeRemote::new(scenario_base()));
        let feed = StoryFeed::new(remote.clone(), 20);
        feed.fetch_initial_page().await.unwrap();

        remote.set_failing(true);
        assert!(feed.fetch_next_page().await.is_err());
        assert_eq!(feed.current_page().await, 0);

        remote.set_failing(false);
        let page = feed.fetch_next_page().await.unwrap();
        assert_eq!(page[0].id, 21);
    }

    #[tokio::test]
    async fn failed_initial_page_propagates() {
        let remote = Arc::new(FakeRemote::new(scenario_base()));
        remote.set_failing(true);
        let feed = StoryFeed::new(remote, 20);

        assert!(feed.fetch_initial_page().await.is_err());
        assert!(feed.get_story(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn initial_page_resets_cursor() {
        let feed = StoryFeed::new(Arc::new(FakeRemote::new(scenario_base())), 20);
        feed.fetch_initial_page().await.unwrap();
        feed.fetch_next_page().await.unwrap();

        let page = feed.fetch_initial_page().await.unwrap();

        assert_eq!(page[0].id, 1);
        assert_eq!(feed.current_page().await, 0);
    }

    #[tokio::test]
    async fn duplicate_base_ids_are_dropped() {
        let base = vec![story(1, "Jessica", 5.0), story(1, "Jessica again", 5.0), story(2, "Taty", 6.0)];
        let feed = StoryFeed::new(Arc::new(FakeRemote::new(base)), 4);

        let page = feed.fetch_initial_page().await.unwrap();

        let names: Vec<&str> = page.iter().map(|s| s.author_name.as_str()).collect();
        assert_eq!(names, ["Jessica", "Taty", "Jessica", "Taty"]);
    }

    #[test]
    fn empty_base_list_yields_empty_page() {
        assert!(synthesize_page(&[], 3, 20).is_empty());
    }

    #[tokio::test]
    async fn lookup_is_limited_to_loaded_pages() {
        let feed = StoryFeed::new(Arc::new(FakeRemote::new(scenario_base())), 20);
        feed.fetch_initial_page().await.unwrap();

        let story = feed.get_story(20).await.unwrap().unwrap();
        assert_eq!(story.id, 20);
        assert_eq!(story.author_name, "Krystina");
        assert!(feed.get_story(21).await.unwrap().is_none());
        assert!(feed.get_story(0).await.unwrap().is_none());

        assert_eq!(feed.get_next_id(1).await.unwrap(), Some(2));
        assert_eq!(feed.get_next_id(20).await.unwrap(), None);
        assert_eq!(feed.get_previous_id(1).await.unwrap(), None);
        assert_eq!(feed.get_previous_id(20).await.unwrap(), Some(19));

        feed.fetch_next_page().await.unwrap();
        assert_eq!(feed.get_next_id(20).await.unwrap(), Some(21));
        assert_eq!(feed.get_story(21).await.unwrap().unwrap().duration, 6.0);
    }

    #[tokio::test]
    async fn neighbor_ids_at_the_id_limits_are_none() {
        let feed = StoryFeed::new(Arc::new(FakeRemote::new(scenario_base())), 20);
        feed.fetch_initial_page().await.unwrap();

        assert_eq!(feed.get_next_id(StoryId::MAX).await.unwrap(), None);
        assert_eq!(feed.get_previous_id(StoryId::MIN).await.unwrap(), None);
        assert!(feed.get_story(StoryId::MAX).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn lookups_are_not_blocked_by_a_slow_next_page() {
        let remote = Arc::new(FakeRemote::new(scenario_base()));
        let feed = Arc::new(StoryFeed::new(remote.clone(), 20));
        feed.fetch_initial_page().await.unwrap();
        remote.set_delay(Duration::from_millis(500));

        let loading = tokio::spawn({
            let feed = feed.clone();
            async move { feed.fetch_next_page().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let story = tokio::time::timeout(Duration::from_millis(100), feed.get_story(20))
            .await
            .expect("lookup waited on the remote call")
            .unwrap();
        assert_eq!(story.map(|s| s.id), Some(20));
        assert_eq!(feed.current_page().await, 0);

        let page = loading.await.unwrap().unwrap();
        assert_eq!(page[0].id, 21);
        assert_eq!(feed.current_page().await, 1);
    }

    #[tokio::test]
    async fn interactions_are_paired_with_stories() {
        let store = MemoryInteractionStore::default();
        store.mark_seen(2).await.unwrap();

        let paired =
            stories_with_interactions(vec![story(1, "a", 1.0), story(2, "b", 1.0)], &store).await;

        assert!(paired[0].1.is_none());
        assert!(paired[1].1.as_ref().unwrap().is_seen);
    }

    #[tokio::test]
    async fn failing_store_reads_pair_as_absent() {
        let store = MemoryInteractionStore::default();
        store.mark_seen(1).await.unwrap();
        store.set_failing(true);

        let paired = stories_with_interactions(vec![story(1, "a", 1.0)], &store).await;

        assert!(paired[0].1.is_none());
    }
}
