//! Emoji reactions, at most one per user and diary.

use serde::Serialize;
use utoipa::ToSchema;

use crate::access::{find_accessible, AccessMode};
use crate::error::ApiError;
use crate::models::{Id, Reaction};
use crate::repo::{Repo, RepoError};

pub const DUPLICATE: &str = "이미 리액션을 남긴 일기입니다.";
pub const MISSING: &str = "리액션 기록이 없습니다.";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReactionItem {
    pub user_id: Id,
    pub nickname: String,
    pub profile_image: String,
    pub reaction: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReactionList {
    pub reaction_list: Vec<ReactionItem>,
}

pub async fn list<R: Repo + ?Sized>(repo: &R, diary_id: Id, requester: Id) -> Result<ReactionList, ApiError> {
    find_accessible(repo, diary_id, requester, AccessMode::Read).await?;
    let reactions = repo.list_reactions(diary_id).await?;
    let user_ids: Vec<Id> = reactions.iter().map(|r| r.user_id).collect();
    let users = repo.get_users(&user_ids).await?;
    let reaction_list = reactions
        .into_iter()
        .filter_map(|r| {
            let user = users.iter().find(|u| u.id == r.user_id)?;
            Some(ReactionItem {
                user_id: user.id,
                nickname: user.nickname.clone(),
                profile_image: user.profile_image.clone(),
                reaction: r.reaction,
            })
        })
        .collect();
    Ok(ReactionList { reaction_list })
}

pub async fn add<R: Repo + ?Sized>(repo: &R, diary_id: Id, requester: Id, reaction: String) -> Result<Reaction, ApiError> {
    find_accessible(repo, diary_id, requester, AccessMode::Read).await?;
    if repo.find_reaction(diary_id, requester).await?.is_some() {
        return Err(ApiError::Conflict(DUPLICATE.into()));
    }
    match repo.create_reaction(diary_id, requester, reaction).await {
        Ok(r) => Ok(r),
        // lost a race against a concurrent insert
        Err(RepoError::Conflict) => Err(ApiError::Conflict(DUPLICATE.into())),
        Err(e) => Err(e.into()),
    }
}

pub async fn update<R: Repo + ?Sized>(repo: &R, diary_id: Id, requester: Id, reaction: String) -> Result<Reaction, ApiError> {
    find_accessible(repo, diary_id, requester, AccessMode::Read).await?;
    let existing = own(repo, diary_id, requester).await?;
    Ok(repo.update_reaction(existing.id, reaction).await?)
}

pub async fn remove<R: Repo + ?Sized>(repo: &R, diary_id: Id, requester: Id) -> Result<(), ApiError> {
    find_accessible(repo, diary_id, requester, AccessMode::Read).await?;
    let existing = own(repo, diary_id, requester).await?;
    repo.delete_reaction(existing.id).await?;
    Ok(())
}

async fn own<R: Repo + ?Sized>(repo: &R, diary_id: Id, requester: Id) -> Result<Reaction, ApiError> {
    repo.find_reaction(diary_id, requester)
        .await?
        .ok_or_else(|| ApiError::BadRequest(MISSING.into()))
}
