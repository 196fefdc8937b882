//! services/api/src/adapters/remote.rs
//!
//! A stand-in for the remote story API. It serves a fixed JSON feed with
//! artificial latency and a configurable random failure rate, which is what the
//! client's error and retry paths are exercised against.

use crate::adapters::feed_dto::parse_feed;
use crate::config::RemoteConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use std::time::Duration;
use stories_core::domain::Story;
use stories_core::ports::{PortError, PortResult, StoriesRemoteSource};
use tracing::{debug, info, warn};

/// The sample feed shipped with the service.
const BUNDLED_FEED: &str = include_str!("../../data/sample_stories.json");

/// An adapter that implements the `StoriesRemoteSource` port from an in-memory feed.
#[derive(Clone)]
pub struct MockStoriesRemote {
    stories: Vec<Story>,
    delay: Duration,
    error_rate: f64,
    should_fail: bool,
}

impl MockStoriesRemote {
    pub fn new(stories: Vec<Story>, delay: Duration, error_rate: f64, should_fail: bool) -> Self {
        Self {
            stories,
            delay,
            error_rate: error_rate.clamp(0.0, 1.0),
            should_fail,
        }
    }

    /// Builds the adapter from configuration, reading the feed file if one is set.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, ApiError> {
        let stories = match &config.feed_path {
            Some(path) => {
                info!("Loading story feed from {}", path.display());
                let json = std::fs::read_to_string(path)?;
                parse_feed(&json).map_err(|e| {
                    ApiError::Internal(format!("Invalid story feed {}: {}", path.display(), e))
                })?
            }
            None => bundled_stories()?,
        };
        info!(count = stories.len(), "Story feed loaded");
        Ok(Self::new(
            stories,
            config.delay,
            config.error_rate,
            config.should_fail,
        ))
    }
}

/// Decodes the bundled sample feed.
pub fn bundled_stories() -> Result<Vec<Story>, ApiError> {
    parse_feed(BUNDLED_FEED)
        .map_err(|e| ApiError::Internal(format!("Invalid bundled story feed: {}", e)))
}

#[async_trait]
impl StoriesRemoteSource for MockStoriesRemote {
    async fn fetch_stories(&self, page: usize, page_size: usize) -> PortResult<Vec<Story>> {
        debug!(page, page_size, "Fetching stories from mock remote");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if rand::random::<f64>() < self.error_rate {
            warn!(page, "Simulated network failure");
            return Err(PortError::Transient(
                "Network connection failed. Please try again.".to_string(),
            ));
        }
        if self.should_fail {
            return Err(PortError::Transient("Mock network error".to_string()));
        }

        Ok(self.stories.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bundled_feed_has_ten_stories() {
        let stories = bundled_stories().unwrap();
        assert_eq!(stories.len(), 10);
        assert_eq!(stories[0].author_name, "Jessica");
        assert_eq!(stories[0].duration, 5.0);
    }

    #[tokio::test]
    async fn returns_feed_when_healthy() {
        let remote = MockStoriesRemote::new(bundled_stories().unwrap(), Duration::ZERO, 0.0, false);

        let stories = remote.fetch_stories(1, 20).await.unwrap();

        assert_eq!(stories.len(), 10);
    }

    #[tokio::test]
    async fn should_fail_always_fails() {
        let remote = MockStoriesRemote::new(bundled_stories().unwrap(), Duration::ZERO, 0.0, true);

        for _ in 0..5 {
            assert!(matches!(
                remote.fetch_stories(1, 20).await,
                Err(PortError::Transient(_))
            ));
        }
    }

    #[tokio::test]
    async fn full_error_rate_always_fails() {
        let remote = MockStoriesRemote::new(bundled_stories().unwrap(), Duration::ZERO, 1.0, false);
        assert!(remote.fetch_stories(1, 20).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied() {
        let remote =
            MockStoriesRemote::new(Vec::new(), Duration::from_millis(500), 0.0, false);
        let started = tokio::time::Instant::now();

        remote.fetch_stories(1, 20).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn reads_feed_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"story_id": 7, "user_id": 1, "user_name": "Nini", "user_profile_image_url": null,
                 "media_url": null, "created_at": "2025-10-24T10:30:00Z", "duration": 6.0}}]"#
        )
        .unwrap();
        let config = RemoteConfig {
            feed_path: Some(file.path().to_path_buf()),
            delay: Duration::ZERO,
            error_rate: 0.0,
            should_fail: false,
        };

        let remote = MockStoriesRemote::from_config(&config).unwrap();

        assert_eq!(remote.stories.len(), 1);
        assert_eq!(remote.stories[0].id, 7);
    }

    #[test]
    fn missing_feed_file_is_an_error() {
        let config = RemoteConfig {
            feed_path: Some("/definitely/not/here.json".into()),
            delay: Duration::ZERO,
            error_rate: 0.0,
            should_fail: false,
        };
        assert!(matches!(MockStoriesRemote::from_config(&config), Err(ApiError::Io(_))));
    }
}
