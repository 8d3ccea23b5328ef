//! Diary operations: authoring, shelves, feeds and statistics.
//!
//! Handlers hand these functions already-validated input; each one authorizes
//! through [`crate::access`] before touching the repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::access::{find_accessible, visible_statuses, AccessMode};
use crate::error::ApiError;
use crate::models::{Diary, DiaryQuery, DiaryStatus, Id, MoodDegree, NewDiary, User};
use crate::paging::{DateRange, Selection, DEFAULT_PAGE_SIZE};
use crate::repo::{Repo, RepoError};
use crate::validate::{DiaryInput, DiaryPatch};

pub const CREATED: &str = "일기가 저장되었습니다.";
pub const UPDATED: &str = "일기가 수정되었습니다.";
pub const DELETED: &str = "일기가 삭제되었습니다.";
pub const UNKNOWN_USER: &str = "존재하지 않는 사용자입니다.";

/// Window used by the mood statistics.
pub const MOOD_WINDOW_MONTHS: u32 = 12;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiaryItem {
    pub diary_id: Id,
    pub author_id: Id,
    pub nickname: String,
    pub profile_image: String,
    pub title: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub emotion: String,
    pub mood: MoodDegree,
    pub summary: String,
    pub tags: Vec<String>,
    pub reaction_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiaryDetail {
    pub user_id: Id,
    pub author_name: String,
    pub title: String,
    pub content: String,
    pub thumbnail: Option<String>,
    pub emotion: String,
    pub mood: MoodDegree,
    pub status: DiaryStatus,
    pub summary: String,
    pub tags: Vec<String>,
    pub reaction_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDiaries {
    pub nickname: String,
    pub diary_list: Vec<DiaryItem>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiaryList {
    pub diary_list: Vec<DiaryItem>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct EmotionCount {
    pub emotion: String,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmotionStats {
    pub emotions: Vec<EmotionCount>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct MoodCount {
    pub mood: MoodDegree,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MoodStats {
    pub moods: Vec<MoodCount>,
}

pub async fn create<R: Repo + ?Sized>(repo: &R, author_id: Id, input: DiaryInput, now: DateTime<Utc>) -> Result<Diary, ApiError> {
    let new = NewDiary {
        author_id,
        title: input.title,
        content: input.content,
        thumbnail: input.thumbnail,
        emotion: input.emotion,
        mood: input.mood,
        status: input.status,
        summary: input.summary,
        created_at: now,
    };
    let diary = repo.create_diary(new, input.tag_names).await?;
    tracing::info!(diary_id = diary.id, author_id, "diary created");
    Ok(diary)
}

pub async fn find<R: Repo + ?Sized>(repo: &R, id: Id, requester: Id) -> Result<DiaryDetail, ApiError> {
    let diary = find_accessible(repo, id, requester, AccessMode::Read).await?;
    let author = repo.get_user(diary.author_id).await?;
    let tags = tag_names(repo, diary.id).await?;
    let reaction_count = repo.count_reactions(diary.id).await?;
    Ok(DiaryDetail {
        user_id: author.id,
        author_name: author.nickname,
        title: diary.title,
        content: diary.content,
        thumbnail: diary.thumbnail,
        emotion: diary.emotion,
        mood: diary.mood,
        status: diary.status,
        summary: diary.summary,
        tags,
        reaction_count,
        created_at: diary.created_at,
    })
}

/// Copy every field present in `patch` onto `diary`. Empty strings are values
/// like any other.
pub fn merge_update(mut diary: Diary, patch: &DiaryPatch) -> Diary {
    if let Some(ref title) = patch.title {
        diary.title = title.clone();
    }
    if let Some(ref content) = patch.content {
        diary.content = content.clone();
    }
    if let Some(ref emotion) = patch.emotion {
        diary.emotion = emotion.clone();
    }
    if let Some(status) = patch.status {
        diary.status = status;
    }
    if let Some(ref thumbnail) = patch.thumbnail {
        diary.thumbnail = Some(thumbnail.clone());
    }
    if let Some(mood) = patch.mood {
        diary.mood = mood;
    }
    if let Some(ref summary) = patch.summary {
        diary.summary = summary.clone();
    }
    diary
}

pub async fn update<R: Repo + ?Sized>(repo: &R, id: Id, requester: Id, patch: DiaryPatch) -> Result<Diary, ApiError> {
    let diary = find_accessible(repo, id, requester, AccessMode::Write).await?;
    let merged = merge_update(diary, &patch);
    Ok(repo.update_diary(merged, patch.tag_names).await?)
}

pub async fn delete<R: Repo + ?Sized>(repo: &R, id: Id, requester: Id) -> Result<(), ApiError> {
    find_accessible(repo, id, requester, AccessMode::Write).await?;
    repo.soft_delete_diary(id).await?;
    tracing::info!(diary_id = id, requester, "diary deleted");
    Ok(())
}

/// A user's shelf, paged by cursor (`Day`) or bounded by dates (`Week`, `Month`).
pub async fn list_user_diaries<R: Repo + ?Sized>(
    repo: &R,
    target: Id,
    requester: Id,
    selection: Selection,
) -> Result<UserDiaries, ApiError> {
    let owner = find_user(repo, target).await?;
    let mut query = DiaryQuery::by_author(target, visible_statuses(target, requester));
    match selection {
        Selection::Page { last_index } => {
            query.before_id = last_index;
            query.limit = Some(DEFAULT_PAGE_SIZE);
        }
        Selection::Range(range) => query.created_between = Some(range.as_bounds()),
    }
    let diaries = repo.list_diaries(&query).await?;
    Ok(UserDiaries { nickname: owner.nickname, diary_list: present(repo, diaries).await? })
}

/// Public diaries written by the requester's friends.
pub async fn friends_feed<R: Repo + ?Sized>(repo: &R, requester: Id, last_index: Option<Id>) -> Result<DiaryList, ApiError> {
    let friend_ids = repo.friend_ids(requester).await?;
    if friend_ids.is_empty() {
        return Ok(DiaryList { diary_list: Vec::new() });
    }
    let query = DiaryQuery {
        author_ids: friend_ids,
        statuses: vec![DiaryStatus::Public],
        before_id: last_index,
        limit: Some(DEFAULT_PAGE_SIZE),
        ..DiaryQuery::default()
    };
    let diaries = repo.list_diaries(&query).await?;
    Ok(DiaryList { diary_list: present(repo, diaries).await? })
}

pub async fn search_by_keyword<R: Repo + ?Sized>(
    repo: &R,
    requester: Id,
    keyword: &str,
    last_index: Option<Id>,
) -> Result<DiaryList, ApiError> {
    let query = DiaryQuery {
        title_contains: Some(keyword.to_string()),
        before_id: last_index,
        limit: Some(DEFAULT_PAGE_SIZE),
        ..DiaryQuery::by_author(requester, visible_statuses(requester, requester))
    };
    let diaries = repo.list_diaries(&query).await?;
    Ok(DiaryList { diary_list: present(repo, diaries).await? })
}

pub async fn search_by_tag<R: Repo + ?Sized>(repo: &R, requester: Id, tag_name: &str) -> Result<DiaryList, ApiError> {
    if repo.find_tag(tag_name).await?.is_none() {
        return Ok(DiaryList { diary_list: Vec::new() });
    }
    let query = DiaryQuery {
        tag: Some(tag_name.to_string()),
        ..DiaryQuery::by_author(requester, visible_statuses(requester, requester))
    };
    let diaries = repo.list_diaries(&query).await?;
    Ok(DiaryList { diary_list: present(repo, diaries).await? })
}

/// Emotion frequencies in `range`, most frequent first.
pub async fn emotion_stats<R: Repo + ?Sized>(
    repo: &R,
    target: Id,
    requester: Id,
    range: DateRange,
) -> Result<EmotionStats, ApiError> {
    find_user(repo, target).await?;
    let diaries = in_range(repo, target, requester, range).await?;
    Ok(EmotionStats { emotions: count_emotions(&diaries) })
}

/// Mood frequencies over the trailing year, one entry per degree.
pub async fn mood_stats<R: Repo + ?Sized>(repo: &R, target: Id, requester: Id, now: DateTime<Utc>) -> Result<MoodStats, ApiError> {
    find_user(repo, target).await?;
    let range = DateRange::last_months(now, MOOD_WINDOW_MONTHS);
    let diaries = in_range(repo, target, requester, range).await?;
    Ok(MoodStats { moods: count_moods(&diaries) })
}

pub fn count_emotions(diaries: &[Diary]) -> Vec<EmotionCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for d in diaries {
        *counts.entry(d.emotion.as_str()).or_default() += 1;
    }
    let mut out: Vec<EmotionCount> = counts
        .into_iter()
        .map(|(emotion, count)| EmotionCount { emotion: emotion.to_string(), count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.emotion.cmp(&b.emotion)));
    out
}

pub fn count_moods(diaries: &[Diary]) -> Vec<MoodCount> {
    [MoodDegree::VeryBad, MoodDegree::Bad, MoodDegree::SoSo, MoodDegree::Good, MoodDegree::VeryGood]
        .into_iter()
        .map(|mood| MoodCount { mood, count: diaries.iter().filter(|d| d.mood == mood).count() })
        .collect()
}

async fn in_range<R: Repo + ?Sized>(repo: &R, target: Id, requester: Id, range: DateRange) -> Result<Vec<Diary>, ApiError> {
    let query = DiaryQuery {
        created_between: Some(range.as_bounds()),
        ..DiaryQuery::by_author(target, visible_statuses(target, requester))
    };
    Ok(repo.list_diaries(&query).await?)
}

async fn find_user<R: Repo + ?Sized>(repo: &R, id: Id) -> Result<User, ApiError> {
    match repo.get_user(id).await {
        Ok(user) => Ok(user),
        Err(RepoError::NotFound) => Err(ApiError::NotFound(UNKNOWN_USER.into())),
        Err(e) => Err(e.into()),
    }
}

async fn tag_names<R: Repo + ?Sized>(repo: &R, diary_id: Id) -> Result<Vec<String>, ApiError> {
    Ok(repo.tags_of(diary_id).await?.into_iter().map(|t| t.name).collect())
}

/// Attach author, tags and reaction counts, keeping the listing order.
async fn present<R: Repo + ?Sized>(repo: &R, diaries: Vec<Diary>) -> Result<Vec<DiaryItem>, ApiError> {
    let mut author_ids: Vec<Id> = diaries.iter().map(|d| d.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();
    let authors: HashMap<Id, User> = repo.get_users(&author_ids).await?.into_iter().map(|u| (u.id, u)).collect();

    let mut items = Vec::with_capacity(diaries.len());
    for diary in diaries {
        let (nickname, profile_image) = authors
            .get(&diary.author_id)
            .map(|u| (u.nickname.clone(), u.profile_image.clone()))
            .unwrap_or_default();
        items.push(DiaryItem {
            diary_id: diary.id,
            author_id: diary.author_id,
            nickname,
            profile_image,
            tags: tag_names(repo, diary.id).await?,
            reaction_count: repo.count_reactions(diary.id).await?,
            title: diary.title,
            content: diary.content,
            thumbnail: diary.thumbnail,
            emotion: diary.emotion,
            mood: diary.mood,
            summary: diary.summary,
            created_at: diary.created_at,
        });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diary(emotion: &str, mood: MoodDegree) -> Diary {
        Diary {
            id: 1,
            author_id: 1,
            title: "제목".into(),
            content: "내용".into(),
            thumbnail: Some("https://img/1.png".into()),
            emotion: emotion.into(),
            mood,
            status: DiaryStatus::Private,
            summary: "요약".into(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn merge_applies_present_fields_only() {
        let patch = DiaryPatch { title: Some("새 제목".into()), mood: Some(MoodDegree::Good), ..Default::default() };
        let merged = merge_update(diary("🐶", MoodDegree::Bad), &patch);
        assert_eq!(merged.title, "새 제목");
        assert_eq!(merged.mood, MoodDegree::Good);
        assert_eq!(merged.content, "내용");
        assert_eq!(merged.status, DiaryStatus::Private);
    }

    #[test]
    fn merge_keeps_empty_strings() {
        let patch = DiaryPatch { summary: Some(String::new()), thumbnail: Some(String::new()), ..Default::default() };
        let merged = merge_update(diary("🐶", MoodDegree::Bad), &patch);
        assert_eq!(merged.summary, "");
        assert_eq!(merged.thumbnail.as_deref(), Some(""));
    }

    #[test]
    fn emotions_sorted_by_frequency() {
        let ds = vec![diary("🌱", MoodDegree::Bad), diary("🐶", MoodDegree::Bad), diary("🐶", MoodDegree::Good)];
        let counts = count_emotions(&ds);
        assert_eq!(counts[0], EmotionCount { emotion: "🐶".into(), count: 2 });
        assert_eq!(counts[1], EmotionCount { emotion: "🌱".into(), count: 1 });
    }

    #[test]
    fn moods_cover_every_degree() {
        let counts = count_moods(&[diary("🐶", MoodDegree::Bad), diary("🐶", MoodDegree::Bad)]);
        assert_eq!(counts.len(), 5);
        assert_eq!(counts[1], MoodCount { mood: MoodDegree::Bad, count: 2 });
        assert!(counts.iter().filter(|c| c.mood != MoodDegree::Bad).all(|c| c.count == 0));
    }
}
