#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moodiary::auth::issue_token;
use moodiary::cache::{InMemoryCache, SessionCache};
use moodiary::models::{Diary, DiaryStatus, Id, MoodDegree, NewDiary, NewUser, SocialType, User};
use moodiary::oauth::{IdentityProvider, NaverProvider, OAuthError, SocialIdentity};
use moodiary::repo::inmem::InMemRepo;
use moodiary::repo::{DiaryRepo, UserRepo};
use moodiary::routes::AppState;

pub const SERVICE_URL: &str = "http://localhost:5173";

pub fn set_secret() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

pub fn state(repo: &InMemRepo) -> AppState {
    state_with(repo, Arc::new(InMemoryCache::new()), Arc::new(NaverProvider::new(None)))
}

pub fn state_with(repo: &InMemRepo, cache: Arc<dyn SessionCache>, identity: Arc<dyn IdentityProvider>) -> AppState {
    AppState { repo: Arc::new(repo.clone()), cache, identity, service_url: SERVICE_URL.into() }
}

pub fn bearer(user_id: Id) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", issue_token(user_id).unwrap()))
}

pub async fn user(repo: &InMemRepo, nickname: &str) -> User {
    repo.create_user(NewUser {
        social_id: format!("naver-{nickname}"),
        social_type: SocialType::Naver,
        nickname: nickname.into(),
        email: format!("{nickname}@test.com"),
        profile_image: "testImage".into(),
    })
    .await
    .unwrap()
}

pub async fn diary_at(repo: &InMemRepo, author: Id, status: DiaryStatus, title: &str, emotion: &str, created_at: DateTime<Utc>) -> Diary {
    repo.create_diary(
        NewDiary {
            author_id: author,
            title: title.into(),
            content: "일기 내용".into(),
            thumbnail: None,
            emotion: emotion.into(),
            mood: MoodDegree::Bad,
            status,
            summary: "요약".into(),
            created_at,
        },
        Vec::new(),
    )
    .await
    .unwrap()
}

pub async fn diary(repo: &InMemRepo, author: Id, status: DiaryStatus) -> Diary {
    diary_at(repo, author, status, "일기 제목", "🐶", Utc::now()).await
}

/// Identity provider that accepts the code `ok` and rejects everything else.
pub struct StubIdentity(pub SocialIdentity);

impl StubIdentity {
    pub fn naver(social_id: &str, nickname: &str) -> Self {
        Self(SocialIdentity {
            social_id: social_id.into(),
            social_type: SocialType::Naver,
            nickname: nickname.into(),
            email: format!("{nickname}@naver.com"),
            profile_image: "https://phinf.pstatic.net/profile.png".into(),
        })
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    fn authorize_url(&self, state: &str) -> Option<String> {
        Some(format!("https://nid.naver.com/oauth2.0/authorize?state={state}"))
    }

    async fn identify(&self, code: &str, _state: &str) -> Result<SocialIdentity, OAuthError> {
        if code == "ok" {
            Ok(self.0.clone())
        } else {
            Err(OAuthError::Rejected("invalid authorization code".into()))
        }
    }
}
