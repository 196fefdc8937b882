//! services/api/src/adapters/feed_dto.rs
//!
//! The wire format of the story feed and its mapping onto the domain `Story`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stories_core::domain::Story;
use url::Url;

/// One story as it appears in the JSON feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryDto {
    pub story_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_profile_image_url: Option<String>,
    pub media_url: Option<String>,
    pub created_at: String,
    pub duration: f64,
}

impl StoryDto {
    /// Maps the record onto the domain model.
    ///
    /// An unparseable `created_at` falls back to the current time and an
    /// unparseable URL becomes `None`; neither rejects the story.
    pub fn to_domain(self) -> Story {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|date| date.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Story {
            id: self.story_id,
            author_id: self.user_id,
            author_name: self.user_name,
            author_avatar_url: parse_url(self.user_profile_image_url.as_deref()),
            media_url: parse_url(self.media_url.as_deref()),
            created_at,
            duration: self.duration,
        }
    }
}

fn parse_url(raw: Option<&str>) -> Option<Url> {
    raw.and_then(|s| Url::parse(s).ok())
}

/// Decodes a JSON array of stories.
pub fn parse_feed(json: &str) -> Result<Vec<Story>, serde_json::Error> {
    let dtos: Vec<StoryDto> = serde_json::from_str(json)?;
    Ok(dtos.into_iter().map(StoryDto::to_domain).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dto(created_at: &str, avatar: Option<&str>) -> StoryDto {
        StoryDto {
            story_id: 1,
            user_id: 100,
            user_name: "Jessica".to_string(),
            user_profile_image_url: avatar.map(str::to_string),
            media_url: Some("https://picsum.photos/id/237/1080/1920".to_string()),
            created_at: created_at.to_string(),
            duration: 5.0,
        }
    }

    #[test]
    fn decodes_snake_case_feed() {
        let json = r#"{
            "story_id": 1,
            "user_id": 100,
            "user_name": "Jessica",
            "user_profile_image_url": "https://i.pravatar.cc/300?img=1",
            "media_url": "https://picsum.photos/id/237/1080/1920",
            "created_at": "2025-10-24T10:30:00Z",
            "duration": 5.0
        }"#;

        let dto: StoryDto = serde_json::from_str(json).unwrap();

        assert_eq!(dto.story_id, 1);
        assert_eq!(dto.user_id, 100);
        assert_eq!(dto.user_name, "Jessica");
        assert_eq!(dto.user_profile_image_url.as_deref(), Some("https://i.pravatar.cc/300?img=1"));
        assert_eq!(dto.created_at, "2025-10-24T10:30:00Z");
        assert_eq!(dto.duration, 5.0);
    }

    #[test]
    fn maps_fields_onto_story() {
        let story = dto("2025-10-24T10:30:00Z", Some("https://i.pravatar.cc/300?img=1")).to_domain();

        assert_eq!(story.id, 1);
        assert_eq!(story.author_id, 100);
        assert_eq!(story.author_name, "Jessica");
        assert_eq!(
            story.author_avatar_url.map(String::from).as_deref(),
            Some("https://i.pravatar.cc/300?img=1")
        );
        assert_eq!(
            story.created_at,
            Utc.with_ymd_and_hms(2025, 10, 24, 10, 30, 0).unwrap()
        );
        assert_eq!(story.duration, 5.0);
    }

    #[test]
    fn invalid_date_falls_back_to_now() {
        let before = Utc::now();
        let story = dto("invalid-date", None).to_domain();
        assert!(story.created_at >= before);
    }

    #[test]
    fn missing_or_invalid_urls_become_none() {
        assert!(dto("2025-10-24T10:30:00Z", None).to_domain().author_avatar_url.is_none());
        assert!(dto("2025-10-24T10:30:00Z", Some("not a url")).to_domain().author_avatar_url.is_none());
    }

    #[test]
    fn parses_a_feed_array() {
        let json = r#"[
            {"story_id": 1, "user_id": 100, "user_name": "Jessica", "user_profile_image_url": null,
             "media_url": null, "created_at": "2025-10-24T10:30:00Z", "duration": 5.0},
            {"story_id": 2, "user_id": 101, "user_name": "Krystina", "user_profile_image_url": null,
             "media_url": null, "created_at": "2025-10-24T11:15:00Z", "duration": 7.0}
        ]"#;

        let stories = parse_feed(json).unwrap();

        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0].id, 1);
        assert_eq!(stories[1].id, 2);
        assert_eq!(stories[1].duration, 7.0);
    }
}
