use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Postgres BIGSERIAL keys, mirrored by the in-memory store's counter
pub type Id = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "social_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SocialType {
    Naver,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Id,
    pub social_id: String,
    pub social_type: SocialType,
    pub nickname: String,
    pub email: String,
    pub profile_image: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub social_id: String,
    pub social_type: SocialType,
    pub nickname: String,
    pub email: String,
    pub profile_image: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "diary_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiaryStatus {
    Public,
    Private,
}

impl DiaryStatus {
    pub const ALLOWED: &'static str = "private, public";

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "mood_degree", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MoodDegree {
    VeryBad,
    Bad,
    #[default]
    SoSo,
    Good,
    VeryGood,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Diary {
    pub id: Id,
    pub author_id: Id,
    pub title: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub emotion: String,
    pub mood: MoodDegree,
    pub status: DiaryStatus,
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>, // soft delete marker
}

impl Diary {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiary {
    pub author_id: Id,
    pub title: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub emotion: String,
    pub mood: MoodDegree,
    pub status: DiaryStatus,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Tag {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "friend_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    Pending,
    Complete,
}

/// Directed edge; `sender` asked `receiver`. Symmetric once `Complete`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Friend {
    pub id: Id,
    pub sender_id: Id,
    pub receiver_id: Id,
    pub status: FriendStatus,
    pub created_at: DateTime<Utc>,
}

impl Friend {
    pub fn other(&self, me: Id) -> Id {
        if self.sender_id == me { self.receiver_id } else { self.sender_id }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Reaction {
    pub id: Id,
    pub diary_id: Id,
    pub user_id: Id,
    pub reaction: String,
    pub created_at: DateTime<Utc>,
}

/// Repository-level listing filter. Results always exclude soft-deleted rows.
#[derive(Debug, Clone, Default)]
pub struct DiaryQuery {
    pub author_ids: Vec<Id>,
    pub statuses: Vec<DiaryStatus>,
    pub created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub title_contains: Option<String>,
    pub tag: Option<String>,
    pub before_id: Option<Id>,
    pub limit: Option<usize>,
}

impl DiaryQuery {
    pub fn by_author(author_id: Id, statuses: Vec<DiaryStatus>) -> Self {
        Self { author_ids: vec![author_id], statuses, ..Self::default() }
    }

    pub fn matches(&self, diary: &Diary, tags: &[String]) -> bool {
        if diary.is_deleted() {
            return false;
        }
        if !self.author_ids.is_empty() && !self.author_ids.contains(&diary.author_id) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&diary.status) {
            return false;
        }
        if let Some((start, end)) = self.created_between {
            if diary.created_at < start || diary.created_at > end {
                return false;
            }
        }
        if let Some(ref needle) = self.title_contains {
            if !diary.title.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(ref tag) = self.tag {
            if !tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }
}
