//! Friend relations between two users.
//!
//! A relation is a single directed row per unordered pair: `Pending` while the
//! receiver has not answered, `Complete` once accepted. Rejecting, cancelling
//! and unfriending all delete the row.

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::{Friend, FriendStatus, Id, User};
use crate::repo::{Repo, RepoError};

#[derive(thiserror::Error, Debug)]
pub enum FriendError {
    #[error("나에게 친구신청 보낼 수 없습니다.")]
    SelfRequest,
    #[error("나와는 친구신청 관리를 할 수 없습니다.")]
    SelfManage,
    #[error("이미 친구신청을 하셨습니다.")]
    AlreadyRequested,
    #[error("상대의 친구신청을 확인해주세요.")]
    IncomingPending,
    #[error("이미 친구인 사용자입니다.")]
    AlreadyFriends,
    #[error("해당 사용자 사이의 친구신청 기록이 없습니다.")]
    NoPendingRequest,
    #[error("상대의 친구신청을 확인하세요.")]
    CancelIncoming,
    #[error("존재하지 않는 관계입니다.")]
    NoRelation,
    #[error("존재하지 않는 사용자입니다.")]
    UnknownUser,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<FriendError> for ApiError {
    fn from(e: FriendError) -> Self {
        match e {
            FriendError::UnknownUser => ApiError::NotFound(e.to_string()),
            FriendError::Repo(inner) => inner.into(),
            other => ApiError::Conflict(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendAction {
    Request,
    Cancel,
    Accept,
    Reject,
    Unfriend,
}

/// What to do with the stored relation once an action is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Complete(Id),
    Delete(Id),
}

/// Decide whether `me` may apply `action` towards `other`, given their current
/// relation (if any).
pub fn plan(me: Id, other: Id, action: FriendAction, relation: Option<&Friend>) -> Result<Step, FriendError> {
    if me == other {
        return Err(match action {
            FriendAction::Request => FriendError::SelfRequest,
            _ => FriendError::SelfManage,
        });
    }
    let pending_from = |sender: Id| {
        relation.filter(|r| r.status == FriendStatus::Pending && r.sender_id == sender)
    };
    let complete = relation.filter(|r| r.status == FriendStatus::Complete);

    match action {
        FriendAction::Request => match relation {
            None => Ok(Step::Create),
            Some(r) if r.status == FriendStatus::Complete => Err(FriendError::AlreadyFriends),
            Some(r) if r.sender_id == me => Err(FriendError::AlreadyRequested),
            Some(_) => Err(FriendError::IncomingPending),
        },
        FriendAction::Cancel => match (pending_from(me), pending_from(other)) {
            (Some(r), _) => Ok(Step::Delete(r.id)),
            (None, Some(_)) => Err(FriendError::CancelIncoming),
            (None, None) => Err(FriendError::NoPendingRequest),
        },
        FriendAction::Accept => pending_from(other).map(|r| Step::Complete(r.id)).ok_or(FriendError::NoPendingRequest),
        FriendAction::Reject => pending_from(other).map(|r| Step::Delete(r.id)).ok_or(FriendError::NoPendingRequest),
        FriendAction::Unfriend => complete.map(|r| Step::Delete(r.id)).ok_or(FriendError::NoRelation),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: Id,
    pub nickname: String,
    pub profile_image: String,
}

impl From<User> for UserSummary {
    fn from(u: User) -> Self {
        Self { user_id: u.id, nickname: u.nickname, profile_image: u.profile_image }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FriendList {
    pub friends: Vec<UserSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StrangerList {
    pub strangers: Vec<UserSummary>,
}

/// Run `action` from `me` towards `other` and return the resulting relation, if
/// one still exists.
pub async fn apply<R: Repo + ?Sized>(repo: &R, me: Id, other: Id, action: FriendAction) -> Result<Option<Friend>, FriendError> {
    if me != other {
        match repo.get_user(other).await {
            Ok(_) => {}
            Err(RepoError::NotFound) => return Err(FriendError::UnknownUser),
            Err(e) => return Err(e.into()),
        }
    }
    let relation = if me == other { None } else { repo.find_relation(me, other).await? };
    let step = plan(me, other, action, relation.as_ref())?;
    let outcome = match step {
        Step::Create => Some(repo.create_request(me, other).await?),
        Step::Complete(id) => Some(repo.set_relation_status(id, FriendStatus::Complete).await?),
        Step::Delete(id) => {
            repo.delete_relation(id).await?;
            None
        }
    };
    tracing::info!(me, other, ?action, "friend relation changed");
    Ok(outcome)
}

pub async fn request<R: Repo + ?Sized>(repo: &R, sender: Id, receiver: Id) -> Result<Friend, ApiError> {
    apply(repo, sender, receiver, FriendAction::Request)
        .await?
        .ok_or(ApiError::Internal)
}

pub async fn cancel<R: Repo + ?Sized>(repo: &R, sender: Id, receiver: Id) -> Result<(), ApiError> {
    apply(repo, sender, receiver, FriendAction::Cancel).await?;
    Ok(())
}

pub async fn accept<R: Repo + ?Sized>(repo: &R, receiver: Id, sender: Id) -> Result<Friend, ApiError> {
    apply(repo, receiver, sender, FriendAction::Accept)
        .await?
        .ok_or(ApiError::Internal)
}

pub async fn reject<R: Repo + ?Sized>(repo: &R, receiver: Id, sender: Id) -> Result<(), ApiError> {
    apply(repo, receiver, sender, FriendAction::Reject).await?;
    Ok(())
}

pub async fn unfriend<R: Repo + ?Sized>(repo: &R, me: Id, friend: Id) -> Result<(), ApiError> {
    apply(repo, me, friend, FriendAction::Unfriend).await?;
    Ok(())
}

pub async fn friends_of<R: Repo + ?Sized>(repo: &R, user_id: Id) -> Result<FriendList, ApiError> {
    let ids = repo.friend_ids(user_id).await?;
    let users = repo.get_users(&ids).await?;
    Ok(FriendList { friends: users.into_iter().map(UserSummary::from).collect() })
}

/// Users whose requests to `user_id` are still unanswered.
pub async fn received_requests<R: Repo + ?Sized>(repo: &R, user_id: Id) -> Result<StrangerList, ApiError> {
    let ids = repo.pending_sender_ids(user_id).await?;
    let users = repo.get_users(&ids).await?;
    Ok(StrangerList { strangers: users.into_iter().map(UserSummary::from).collect() })
}

/// Friends of `user_id` whose nickname contains `term`.
pub async fn search<R: Repo + ?Sized>(repo: &R, user_id: Id, term: &str) -> Result<Vec<UserSummary>, ApiError> {
    let friends = friends_of(repo, user_id).await?.friends;
    Ok(friends.into_iter().filter(|f| f.nickname.contains(term)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rel(sender_id: Id, receiver_id: Id, status: FriendStatus) -> Friend {
        Friend { id: 10, sender_id, receiver_id, status, created_at: Utc::now() }
    }

    fn msg(r: Result<Step, FriendError>) -> String {
        r.unwrap_err().to_string()
    }

    #[test]
    fn self_targets_are_rejected() {
        assert_eq!(msg(plan(1, 1, FriendAction::Request, None)), "나에게 친구신청 보낼 수 없습니다.");
        for action in [FriendAction::Cancel, FriendAction::Accept, FriendAction::Reject, FriendAction::Unfriend] {
            assert_eq!(msg(plan(1, 1, action, None)), "나와는 친구신청 관리를 할 수 없습니다.");
        }
    }

    #[test]
    fn request_transitions() {
        assert_eq!(plan(1, 2, FriendAction::Request, None).unwrap(), Step::Create);
        let mine = rel(1, 2, FriendStatus::Pending);
        assert_eq!(msg(plan(1, 2, FriendAction::Request, Some(&mine))), "이미 친구신청을 하셨습니다.");
        let theirs = rel(2, 1, FriendStatus::Pending);
        assert_eq!(msg(plan(1, 2, FriendAction::Request, Some(&theirs))), "상대의 친구신청을 확인해주세요.");
        let done = rel(2, 1, FriendStatus::Complete);
        assert_eq!(msg(plan(1, 2, FriendAction::Request, Some(&done))), "이미 친구인 사용자입니다.");
    }

    #[test]
    fn cancel_only_own_pending_request() {
        let mine = rel(1, 2, FriendStatus::Pending);
        assert_eq!(plan(1, 2, FriendAction::Cancel, Some(&mine)).unwrap(), Step::Delete(10));
        let theirs = rel(2, 1, FriendStatus::Pending);
        assert_eq!(msg(plan(1, 2, FriendAction::Cancel, Some(&theirs))), "상대의 친구신청을 확인하세요.");
        assert_eq!(msg(plan(1, 2, FriendAction::Cancel, None)), "해당 사용자 사이의 친구신청 기록이 없습니다.");
    }

    #[test]
    fn accept_and_reject_need_an_incoming_request() {
        let theirs = rel(2, 1, FriendStatus::Pending);
        assert_eq!(plan(1, 2, FriendAction::Accept, Some(&theirs)).unwrap(), Step::Complete(10));
        assert_eq!(plan(1, 2, FriendAction::Reject, Some(&theirs)).unwrap(), Step::Delete(10));
        let mine = rel(1, 2, FriendStatus::Pending);
        assert!(matches!(plan(1, 2, FriendAction::Accept, Some(&mine)), Err(FriendError::NoPendingRequest)));
        let done = rel(2, 1, FriendStatus::Complete);
        assert!(matches!(plan(1, 2, FriendAction::Reject, Some(&done)), Err(FriendError::NoPendingRequest)));
    }

    #[test]
    fn unfriend_requires_completed_relation_either_way() {
        for r in [rel(1, 2, FriendStatus::Complete), rel(2, 1, FriendStatus::Complete)] {
            assert_eq!(plan(1, 2, FriendAction::Unfriend, Some(&r)).unwrap(), Step::Delete(10));
        }
        let pending = rel(1, 2, FriendStatus::Pending);
        assert_eq!(msg(plan(1, 2, FriendAction::Unfriend, Some(&pending))), "존재하지 않는 관계입니다.");
    }

    #[test]
    fn conflicts_surface_as_bad_requests() {
        let err: ApiError = FriendError::AlreadyFriends.into();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "이미 친구인 사용자입니다."));
        let err: ApiError = FriendError::UnknownUser.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
