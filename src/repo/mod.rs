use async_trait::async_trait;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn find_user_by_social(&self, social_id: &str, social_type: SocialType) -> RepoResult<Option<User>>;
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    /// Users for `ids`, in the same order; unknown ids are skipped.
    async fn get_users(&self, ids: &[Id]) -> RepoResult<Vec<User>>;
}

#[async_trait]
pub trait DiaryRepo: Send + Sync {
    /// Diary and its tag links in one atomic step; unknown tag names are created.
    async fn create_diary(&self, new: NewDiary, tag_names: Vec<String>) -> RepoResult<Diary>;
    /// Includes soft-deleted rows; callers decide visibility.
    async fn get_diary(&self, id: Id) -> RepoResult<Diary>;
    /// `tag_names = None` keeps the current tag set.
    async fn update_diary(&self, diary: Diary, tag_names: Option<Vec<String>>) -> RepoResult<Diary>;
    /// Marks the diary deleted and drops its tag links.
    async fn soft_delete_diary(&self, id: Id) -> RepoResult<()>;
    /// Live diaries matching `query`, newest id first (range queries: newest
    /// `created_at` first), cursor and limit applied.
    async fn list_diaries(&self, query: &DiaryQuery) -> RepoResult<Vec<Diary>>;
}

#[async_trait]
pub trait TagRepo: Send + Sync {
    async fn tags_of(&self, diary_id: Id) -> RepoResult<Vec<Tag>>;
    async fn find_tag(&self, name: &str) -> RepoResult<Option<Tag>>;
}

#[async_trait]
pub trait FriendRepo: Send + Sync {
    /// The relation between `a` and `b` in either direction, if any.
    async fn find_relation(&self, a: Id, b: Id) -> RepoResult<Option<Friend>>;
    async fn create_request(&self, sender_id: Id, receiver_id: Id) -> RepoResult<Friend>;
    async fn set_relation_status(&self, id: Id, status: FriendStatus) -> RepoResult<Friend>;
    async fn delete_relation(&self, id: Id) -> RepoResult<()>;
    /// Ids of users holding a `Complete` relation with `user_id`, oldest first.
    async fn friend_ids(&self, user_id: Id) -> RepoResult<Vec<Id>>;
    /// Senders of pending requests addressed to `user_id`, oldest first.
    async fn pending_sender_ids(&self, user_id: Id) -> RepoResult<Vec<Id>>;
}

#[async_trait]
pub trait ReactionRepo: Send + Sync {
    async fn find_reaction(&self, diary_id: Id, user_id: Id) -> RepoResult<Option<Reaction>>;
    async fn create_reaction(&self, diary_id: Id, user_id: Id, reaction: String) -> RepoResult<Reaction>;
    async fn update_reaction(&self, id: Id, reaction: String) -> RepoResult<Reaction>;
    async fn delete_reaction(&self, id: Id) -> RepoResult<()>;
    async fn list_reactions(&self, diary_id: Id) -> RepoResult<Vec<Reaction>>;
    async fn count_reactions(&self, diary_id: Id) -> RepoResult<usize>;
}

pub trait Repo: UserRepo + DiaryRepo + TagRepo + FriendRepo + ReactionRepo {}

impl<T> Repo for T where T: UserRepo + DiaryRepo + TagRepo + FriendRepo + ReactionRepo {}

/// Trimmed, de-duplicated tag names in first-seen order.
pub fn normalize_tag_names(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim().to_string();
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

#[cfg(feature = "inmem-store")]
pub mod inmem;

#[cfg(feature = "postgres-store")]
pub mod pg;

#[cfg(test)]
mod tests {
    use super::normalize_tag_names;

    #[test]
    fn tag_names_are_trimmed_and_unique() {
        let names = vec![" 안녕 ".into(), "안녕".into(), "".into(), "여행".into()];
        assert_eq!(normalize_tag_names(names), vec!["안녕".to_string(), "여행".to_string()]);
    }
}
