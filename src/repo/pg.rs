use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use super::*;

const DIARY_COLUMNS: &str =
    "d.id, d.author_id, d.title, d.content, d.thumbnail, d.emotion, d.mood, d.status, d.summary, d.created_at, d.deleted_at";

const USER_COLUMNS: &str = "id, social_id, social_type, nickname, email, profile_image, created_at";

#[derive(Clone)]
pub struct PgRepo { pool: Pool<Postgres> }

impl PgRepo {
    pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn link_tags(tx: &mut Transaction<'_, Postgres>, diary_id: Id, names: Vec<String>) -> RepoResult<()> {
        for name in normalize_tag_names(names) {
            let (tag_id,): (Id,) = sqlx::query_as(
                "INSERT INTO tags (name) VALUES ($1) ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id",
            )
            .bind(&name)
            .fetch_one(&mut **tx)
            .await
            .map_err(db_err)?;
            sqlx::query("INSERT INTO diary_tags (diary_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(diary_id)
                .bind(tag_id)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> RepoError {
    match e {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => RepoError::Conflict,
        sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23503") => RepoError::NotFound,
        other => RepoError::Internal(other.to_string()),
    }
}

#[async_trait]
impl UserRepo for PgRepo {
    async fn get_user(&self, id: Id) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_user_by_social(&self, social_id: &str, social_type: SocialType) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE social_id = $1 AND social_type = $2"))
            .bind(social_id)
            .bind(social_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (social_id, social_type, nickname, email, profile_image) VALUES ($1,$2,$3,$4,$5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.social_id)
        .bind(new.social_type)
        .bind(&new.nickname)
        .bind(&new.email)
        .bind(&new.profile_image)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn get_users(&self, ids: &[Id]) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        // keep caller order
        Ok(ids.iter().filter_map(|id| rows.iter().find(|u| u.id == *id).cloned()).collect())
    }
}

#[async_trait]
impl DiaryRepo for PgRepo {
    async fn create_diary(&self, new: NewDiary, tag_names: Vec<String>) -> RepoResult<Diary> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let diary = sqlx::query_as::<_, Diary>(&format!(
            "INSERT INTO diaries AS d (author_id, title, content, thumbnail, emotion, mood, status, summary, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9) RETURNING {DIARY_COLUMNS}"
        ))
        .bind(new.author_id)
        .bind(&new.title)
        .bind(&new.content)
        .bind(&new.thumbnail)
        .bind(&new.emotion)
        .bind(new.mood)
        .bind(new.status)
        .bind(&new.summary)
        .bind(new.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        Self::link_tags(&mut tx, diary.id, tag_names).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(diary)
    }

    async fn get_diary(&self, id: Id) -> RepoResult<Diary> {
        sqlx::query_as::<_, Diary>(&format!("SELECT {DIARY_COLUMNS} FROM diaries d WHERE d.id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn update_diary(&self, diary: Diary, tag_names: Option<Vec<String>>) -> RepoResult<Diary> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let updated = sqlx::query_as::<_, Diary>(&format!(
            "UPDATE diaries AS d SET title = $2, content = $3, thumbnail = $4, emotion = $5, mood = $6, status = $7, summary = $8
             WHERE d.id = $1 AND d.deleted_at IS NULL RETURNING {DIARY_COLUMNS}"
        ))
        .bind(diary.id)
        .bind(&diary.title)
        .bind(&diary.content)
        .bind(&diary.thumbnail)
        .bind(&diary.emotion)
        .bind(diary.mood)
        .bind(diary.status)
        .bind(&diary.summary)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if let Some(names) = tag_names {
            sqlx::query("DELETE FROM diary_tags WHERE diary_id = $1")
                .bind(updated.id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            Self::link_tags(&mut tx, updated.id, names).await?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    async fn soft_delete_diary(&self, id: Id) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let done = sqlx::query("UPDATE diaries SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        sqlx::query("DELETE FROM diary_tags WHERE diary_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn list_diaries(&self, query: &DiaryQuery) -> RepoResult<Vec<Diary>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {DIARY_COLUMNS} FROM diaries d WHERE d.deleted_at IS NULL"));
        if !query.author_ids.is_empty() {
            qb.push(" AND d.author_id = ANY(").push_bind(query.author_ids.clone()).push(")");
        }
        if !query.statuses.is_empty() {
            let statuses: Vec<String> = query
                .statuses
                .iter()
                .map(|s| match s { DiaryStatus::Public => "public".to_string(), DiaryStatus::Private => "private".to_string() })
                .collect();
            qb.push(" AND d.status::text = ANY(").push_bind(statuses).push(")");
        }
        if let Some((start, end)) = query.created_between {
            qb.push(" AND d.created_at BETWEEN ").push_bind(start).push(" AND ").push_bind(end);
        }
        if let Some(ref needle) = query.title_contains {
            qb.push(" AND strpos(d.title, ").push_bind(needle.clone()).push(") > 0");
        }
        if let Some(ref tag) = query.tag {
            qb.push(" AND EXISTS (SELECT 1 FROM diary_tags dt JOIN tags t ON t.id = dt.tag_id WHERE dt.diary_id = d.id AND t.name = ")
                .push_bind(tag.clone())
                .push(")");
        }
        if let Some(before) = query.before_id {
            qb.push(" AND d.id < ").push_bind(before);
        }
        if query.created_between.is_some() {
            qb.push(" ORDER BY d.created_at DESC, d.id DESC");
        } else {
            qb.push(" ORDER BY d.id DESC");
        }
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        qb.build_query_as::<Diary>().fetch_all(&self.pool).await.map_err(db_err)
    }
}

#[async_trait]
impl TagRepo for PgRepo {
    async fn tags_of(&self, diary_id: Id) -> RepoResult<Vec<Tag>> {
        sqlx::query_as::<_, Tag>(
            "SELECT t.id, t.name FROM tags t JOIN diary_tags dt ON dt.tag_id = t.id WHERE dt.diary_id = $1 ORDER BY t.id",
        )
        .bind(diary_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_tag(&self, name: &str) -> RepoResult<Option<Tag>> {
        sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl FriendRepo for PgRepo {
    async fn find_relation(&self, a: Id, b: Id) -> RepoResult<Option<Friend>> {
        sqlx::query_as::<_, Friend>(
            "SELECT id, sender_id, receiver_id, status, created_at FROM friends
             WHERE (sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1)",
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn create_request(&self, sender_id: Id, receiver_id: Id) -> RepoResult<Friend> {
        sqlx::query_as::<_, Friend>(
            "INSERT INTO friends (sender_id, receiver_id) VALUES ($1, $2) RETURNING id, sender_id, receiver_id, status, created_at",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn set_relation_status(&self, id: Id, status: FriendStatus) -> RepoResult<Friend> {
        sqlx::query_as::<_, Friend>(
            "UPDATE friends SET status = $2 WHERE id = $1 RETURNING id, sender_id, receiver_id, status, created_at",
        )
        .bind(id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn delete_relation(&self, id: Id) -> RepoResult<()> {
        let done = sqlx::query("DELETE FROM friends WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }

    async fn friend_ids(&self, user_id: Id) -> RepoResult<Vec<Id>> {
        let rows: Vec<(Id,)> = sqlx::query_as(
            "SELECT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END FROM friends
             WHERE status = 'complete' AND (sender_id = $1 OR receiver_id = $1) ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn pending_sender_ids(&self, user_id: Id) -> RepoResult<Vec<Id>> {
        let rows: Vec<(Id,)> = sqlx::query_as(
            "SELECT sender_id FROM friends WHERE status = 'pending' AND receiver_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[async_trait]
impl ReactionRepo for PgRepo {
    async fn find_reaction(&self, diary_id: Id, user_id: Id) -> RepoResult<Option<Reaction>> {
        sqlx::query_as::<_, Reaction>(
            "SELECT id, diary_id, user_id, reaction, created_at FROM reactions WHERE diary_id = $1 AND user_id = $2",
        )
        .bind(diary_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn create_reaction(&self, diary_id: Id, user_id: Id, reaction: String) -> RepoResult<Reaction> {
        sqlx::query_as::<_, Reaction>(
            "INSERT INTO reactions (diary_id, user_id, reaction) VALUES ($1,$2,$3) RETURNING id, diary_id, user_id, reaction, created_at",
        )
        .bind(diary_id)
        .bind(user_id)
        .bind(reaction)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn update_reaction(&self, id: Id, reaction: String) -> RepoResult<Reaction> {
        sqlx::query_as::<_, Reaction>(
            "UPDATE reactions SET reaction = $2 WHERE id = $1 RETURNING id, diary_id, user_id, reaction, created_at",
        )
        .bind(id)
        .bind(reaction)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn delete_reaction(&self, id: Id) -> RepoResult<()> {
        let done = sqlx::query("DELETE FROM reactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }

    async fn list_reactions(&self, diary_id: Id) -> RepoResult<Vec<Reaction>> {
        sqlx::query_as::<_, Reaction>(
            "SELECT id, diary_id, user_id, reaction, created_at FROM reactions WHERE diary_id = $1 ORDER BY id",
        )
        .bind(diary_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn count_reactions(&self, diary_id: Id) -> RepoResult<usize> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reactions WHERE diary_id = $1")
            .bind(diary_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(n as usize)
    }
}
