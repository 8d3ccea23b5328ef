use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::*;
use crate::paging::page_before;

#[derive(Default, Serialize, Deserialize)]
struct State {
    users: BTreeMap<Id, User>,
    diaries: BTreeMap<Id, Diary>,
    tags: BTreeMap<Id, Tag>,
    diary_tags: BTreeSet<(Id, Id)>, // (diary_id, tag_id)
    friends: BTreeMap<Id, Friend>,
    reactions: BTreeMap<Id, Reaction>,
    next_id: Id,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn tag_names_of(&self, diary_id: Id) -> Vec<String> {
        self.diary_tags
            .range((diary_id, Id::MIN)..=(diary_id, Id::MAX))
            .filter_map(|(_, tag_id)| self.tags.get(tag_id).map(|t| t.name.clone()))
            .collect()
    }

    fn ensure_tag(&mut self, name: &str) -> Id {
        if let Some(tag) = self.tags.values().find(|t| t.name == name) {
            return tag.id;
        }
        let id = self.next_id();
        self.tags.insert(id, Tag { id, name: name.to_string() });
        id
    }

    fn relink_tags(&mut self, diary_id: Id, names: Vec<String>) {
        self.unlink_tags(diary_id);
        for name in normalize_tag_names(names) {
            let tag_id = self.ensure_tag(&name);
            self.diary_tags.insert((diary_id, tag_id));
        }
    }

    fn unlink_tags(&mut self, diary_id: Id) {
        self.diary_tags.retain(|(d, _)| *d != diary_id);
    }
}

/// Process-local store. Every compound write happens under a single write lock,
/// which is what makes a diary and its tag links commit together.
#[derive(Clone, Default)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
    snapshot_path: Option<Arc<PathBuf>>,
    // one snapshot write at a time, each reading the newest state
    persist_lock: Arc<Mutex<()>>,
}

impl InMemRepo {
    /// Ephemeral store, nothing touches disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a JSON snapshot under `data_dir`, reloaded on start.
    pub fn with_snapshot(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join("state.json");
        let state = Self::load_state_from(&path);
        Self {
            state: Arc::new(RwLock::new(state)),
            snapshot_path: Some(Arc::new(path)),
            persist_lock: Arc::default(),
        }
    }

    fn load_state_from(path: &Path) -> State {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                Ok(s) => {
                    info!(path = %path.display(), "loaded snapshot");
                    s
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable snapshot, starting empty");
                    State::default()
                }
            },
            Err(e) => {
                info!(path = %path.display(), error = %e, "no snapshot, starting empty");
                State::default()
            }
        }
    }

    /// Writes the snapshot next to its final path, then renames it into place
    /// so a crash never leaves a truncated `state.json` behind.
    fn persist(&self) {
        let Some(path) = self.snapshot_path.as_deref() else { return };
        let Ok(_guard) = self.persist_lock.lock() else {
            warn!("snapshot lock poisoned");
            return;
        };
        let bytes = match self.read() {
            Ok(s) => serde_json::to_vec_pretty(&*s),
            Err(_) => return,
        };
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode snapshot");
                return;
            }
        };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp, bytes) {
            warn!(path = %tmp.display(), error = %e, "failed to write snapshot");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp, path) {
            warn!(path = %path.display(), error = %e, "failed to replace snapshot");
            let _ = std::fs::remove_file(&tmp);
        }
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }
}

#[async_trait]
impl UserRepo for InMemRepo {
    async fn get_user(&self, id: Id) -> RepoResult<User> {
        self.read()?.users.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn find_user_by_social(&self, social_id: &str, social_type: SocialType) -> RepoResult<Option<User>> {
        let s = self.read()?;
        Ok(s.users
            .values()
            .find(|u| u.social_id == social_id && u.social_type == social_type)
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let mut s = self.write()?;
        if s.users.values().any(|u| u.social_id == new.social_id && u.social_type == new.social_type) {
            return Err(RepoError::Conflict);
        }
        let id = s.next_id();
        let user = User {
            id,
            social_id: new.social_id,
            social_type: new.social_type,
            nickname: new.nickname,
            email: new.email,
            profile_image: new.profile_image,
            created_at: Utc::now(),
        };
        s.users.insert(id, user.clone());
        drop(s); // release lock before persisting
        self.persist();
        Ok(user)
    }

    async fn get_users(&self, ids: &[Id]) -> RepoResult<Vec<User>> {
        let s = self.read()?;
        Ok(ids.iter().filter_map(|id| s.users.get(id).cloned()).collect())
    }
}

#[async_trait]
impl DiaryRepo for InMemRepo {
    async fn create_diary(&self, new: NewDiary, tag_names: Vec<String>) -> RepoResult<Diary> {
        let mut s = self.write()?;
        if !s.users.contains_key(&new.author_id) {
            return Err(RepoError::NotFound);
        }
        let id = s.next_id();
        let diary = Diary {
            id,
            author_id: new.author_id,
            title: new.title,
            content: new.content,
            thumbnail: new.thumbnail,
            emotion: new.emotion,
            mood: new.mood,
            status: new.status,
            summary: new.summary,
            created_at: new.created_at,
            deleted_at: None,
        };
        s.diaries.insert(id, diary.clone());
        s.relink_tags(id, tag_names);
        drop(s);
        self.persist();
        Ok(diary)
    }

    async fn get_diary(&self, id: Id) -> RepoResult<Diary> {
        self.read()?.diaries.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn update_diary(&self, diary: Diary, tag_names: Option<Vec<String>>) -> RepoResult<Diary> {
        let mut s = self.write()?;
        let slot = s.diaries.get_mut(&diary.id).ok_or(RepoError::NotFound)?;
        if slot.is_deleted() {
            return Err(RepoError::NotFound);
        }
        // identity and bookkeeping columns are not caller-controlled
        *slot = Diary {
            author_id: slot.author_id,
            created_at: slot.created_at,
            deleted_at: slot.deleted_at,
            ..diary
        };
        let updated = slot.clone();
        if let Some(names) = tag_names {
            s.relink_tags(updated.id, names);
        }
        drop(s);
        self.persist();
        Ok(updated)
    }

    async fn soft_delete_diary(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        let diary = s.diaries.get_mut(&id).ok_or(RepoError::NotFound)?;
        if diary.is_deleted() {
            return Err(RepoError::NotFound);
        }
        diary.deleted_at = Some(Utc::now());
        s.unlink_tags(id);
        drop(s);
        self.persist();
        Ok(())
    }

    async fn list_diaries(&self, query: &DiaryQuery) -> RepoResult<Vec<Diary>> {
        let s = self.read()?;
        let mut v: Vec<Diary> = s
            .diaries
            .values()
            .rev() // newest id first
            .filter(|d| query.matches(d, &s.tag_names_of(d.id)))
            .cloned()
            .collect();
        if query.created_between.is_some() {
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        }
        Ok(page_before(v, query.before_id, query.limit.unwrap_or(usize::MAX)))
    }
}

#[async_trait]
impl TagRepo for InMemRepo {
    async fn tags_of(&self, diary_id: Id) -> RepoResult<Vec<Tag>> {
        let s = self.read()?;
        Ok(s.diary_tags
            .range((diary_id, Id::MIN)..=(diary_id, Id::MAX))
            .filter_map(|(_, tag_id)| s.tags.get(tag_id).cloned())
            .collect())
    }

    async fn find_tag(&self, name: &str) -> RepoResult<Option<Tag>> {
        Ok(self.read()?.tags.values().find(|t| t.name == name).cloned())
    }
}

#[async_trait]
impl FriendRepo for InMemRepo {
    async fn find_relation(&self, a: Id, b: Id) -> RepoResult<Option<Friend>> {
        let s = self.read()?;
        Ok(s.friends
            .values()
            .find(|f| (f.sender_id == a && f.receiver_id == b) || (f.sender_id == b && f.receiver_id == a))
            .cloned())
    }

    async fn create_request(&self, sender_id: Id, receiver_id: Id) -> RepoResult<Friend> {
        let mut s = self.write()?;
        let taken = s.friends.values().any(|f| {
            (f.sender_id == sender_id && f.receiver_id == receiver_id)
                || (f.sender_id == receiver_id && f.receiver_id == sender_id)
        });
        if taken {
            return Err(RepoError::Conflict);
        }
        let id = s.next_id();
        let friend = Friend { id, sender_id, receiver_id, status: FriendStatus::Pending, created_at: Utc::now() };
        s.friends.insert(id, friend.clone());
        drop(s);
        self.persist();
        Ok(friend)
    }

    async fn set_relation_status(&self, id: Id, status: FriendStatus) -> RepoResult<Friend> {
        let mut s = self.write()?;
        let friend = s.friends.get_mut(&id).ok_or(RepoError::NotFound)?;
        friend.status = status;
        let updated = friend.clone();
        drop(s);
        self.persist();
        Ok(updated)
    }

    async fn delete_relation(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        s.friends.remove(&id).ok_or(RepoError::NotFound)?;
        drop(s);
        self.persist();
        Ok(())
    }

    async fn friend_ids(&self, user_id: Id) -> RepoResult<Vec<Id>> {
        let s = self.read()?;
        Ok(s.friends
            .values()
            .filter(|f| f.status == FriendStatus::Complete && (f.sender_id == user_id || f.receiver_id == user_id))
            .map(|f| f.other(user_id))
            .collect())
    }

    async fn pending_sender_ids(&self, user_id: Id) -> RepoResult<Vec<Id>> {
        let s = self.read()?;
        Ok(s.friends
            .values()
            .filter(|f| f.status == FriendStatus::Pending && f.receiver_id == user_id)
            .map(|f| f.sender_id)
            .collect())
    }
}

#[async_trait]
impl ReactionRepo for InMemRepo {
    async fn find_reaction(&self, diary_id: Id, user_id: Id) -> RepoResult<Option<Reaction>> {
        let s = self.read()?;
        Ok(s.reactions
            .values()
            .find(|r| r.diary_id == diary_id && r.user_id == user_id)
            .cloned())
    }

    async fn create_reaction(&self, diary_id: Id, user_id: Id, reaction: String) -> RepoResult<Reaction> {
        let mut s = self.write()?;
        if !s.diaries.contains_key(&diary_id) {
            return Err(RepoError::NotFound);
        }
        if s.reactions.values().any(|r| r.diary_id == diary_id && r.user_id == user_id) {
            return Err(RepoError::Conflict);
        }
        let id = s.next_id();
        let r = Reaction { id, diary_id, user_id, reaction, created_at: Utc::now() };
        s.reactions.insert(id, r.clone());
        drop(s);
        self.persist();
        Ok(r)
    }

    async fn update_reaction(&self, id: Id, reaction: String) -> RepoResult<Reaction> {
        let mut s = self.write()?;
        let r = s.reactions.get_mut(&id).ok_or(RepoError::NotFound)?;
        r.reaction = reaction;
        let updated = r.clone();
        drop(s);
        self.persist();
        Ok(updated)
    }

    async fn delete_reaction(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        s.reactions.remove(&id).ok_or(RepoError::NotFound)?;
        drop(s);
        self.persist();
        Ok(())
    }

    async fn list_reactions(&self, diary_id: Id) -> RepoResult<Vec<Reaction>> {
        let s = self.read()?;
        Ok(s.reactions.values().filter(|r| r.diary_id == diary_id).cloned().collect())
    }

    async fn count_reactions(&self, diary_id: Id) -> RepoResult<usize> {
        let s = self.read()?;
        Ok(s.reactions.values().filter(|r| r.diary_id == diary_id).count())
    }
}
