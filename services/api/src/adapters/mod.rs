pub mod db;
pub mod feed_dto;
pub mod remote;

pub use db::DbAdapter;
pub use feed_dto::{parse_feed, StoryDto};
pub use remote::MockStoriesRemote;
