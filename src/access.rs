//! Ownership and visibility checks for a single diary.

use crate::error::ApiError;
use crate::models::{Diary, DiaryStatus, Id};
use crate::repo::{DiaryRepo, RepoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

#[derive(thiserror::Error, Debug)]
pub enum AccessError {
    #[error("존재하지 않는 일기입니다.")]
    NotFound,
    #[error("권한이 없는 사용자입니다.")]
    Forbidden,
    #[error(transparent)]
    Repo(RepoError),
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::NotFound => ApiError::NotFound(e.to_string()),
            AccessError::Forbidden => ApiError::Forbidden(e.to_string()),
            AccessError::Repo(inner) => inner.into(),
        }
    }
}

/// Owners may do anything; everyone else may only read public diaries.
pub fn check_access(diary: &Diary, requester: Id, mode: AccessMode) -> Result<(), AccessError> {
    if diary.author_id == requester {
        return Ok(());
    }
    match (mode, diary.status) {
        (AccessMode::Read, DiaryStatus::Public) => Ok(()),
        _ => Err(AccessError::Forbidden),
    }
}

/// Statuses a requester may list on `author`'s shelf.
pub fn visible_statuses(author: Id, requester: Id) -> Vec<DiaryStatus> {
    if author == requester {
        vec![DiaryStatus::Public, DiaryStatus::Private]
    } else {
        vec![DiaryStatus::Public]
    }
}

/// Load a live diary and authorize `requester` on it. Existence is checked first,
/// so a missing or soft-deleted id never reports a permission problem.
pub async fn find_accessible<R: DiaryRepo + ?Sized>(
    repo: &R,
    id: Id,
    requester: Id,
    mode: AccessMode,
) -> Result<Diary, AccessError> {
    let diary = match repo.get_diary(id).await {
        Ok(d) if !d.is_deleted() => d,
        Ok(_) | Err(RepoError::NotFound) => return Err(AccessError::NotFound),
        Err(e) => return Err(AccessError::Repo(e)),
    };
    check_access(&diary, requester, mode)?;
    Ok(diary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MoodDegree;
    use chrono::Utc;

    fn diary(author_id: Id, status: DiaryStatus) -> Diary {
        Diary {
            id: 1,
            author_id,
            title: "t".into(),
            content: "c".into(),
            thumbnail: None,
            emotion: "🐶".into(),
            mood: MoodDegree::Bad,
            status,
            summary: String::new(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn owner_reads_and_writes_everything() {
        for status in [DiaryStatus::Public, DiaryStatus::Private] {
            let d = diary(7, status);
            assert!(check_access(&d, 7, AccessMode::Read).is_ok());
            assert!(check_access(&d, 7, AccessMode::Write).is_ok());
        }
    }

    #[test]
    fn strangers_read_only_public() {
        assert!(check_access(&diary(7, DiaryStatus::Public), 8, AccessMode::Read).is_ok());
        assert!(matches!(
            check_access(&diary(7, DiaryStatus::Private), 8, AccessMode::Read),
            Err(AccessError::Forbidden)
        ));
    }

    #[test]
    fn strangers_never_write() {
        for status in [DiaryStatus::Public, DiaryStatus::Private] {
            assert!(matches!(check_access(&diary(7, status), 8, AccessMode::Write), Err(AccessError::Forbidden)));
        }
    }

    #[test]
    fn forbidden_message_is_user_facing() {
        assert_eq!(AccessError::Forbidden.to_string(), "권한이 없는 사용자입니다.");
    }

    #[test]
    fn shelf_visibility_depends_on_ownership() {
        assert_eq!(visible_statuses(1, 1).len(), 2);
        assert_eq!(visible_statuses(1, 2), vec![DiaryStatus::Public]);
    }
}
