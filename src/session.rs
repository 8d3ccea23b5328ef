//! Login, token refresh and logout.
//!
//! The access token travels in the `utk` cookie and the refresh secret in the
//! `rtk` cookie. The session cache keeps only a hash of the refresh secret, one
//! entry per user, and every refresh rotates it.

use std::time::Duration;

use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::auth::{issue_token, verify_signature};
use crate::cache::SessionCache;
use crate::error::ApiError;
use crate::models::{Id, NewUser, User};
use crate::oauth::IdentityProvider;
use crate::repo::{Repo, RepoError};

pub const REFRESH_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);
pub const LOGGED_OUT: &str = "정상적으로 로그아웃되었습니다.";

pub fn refresh_key(user_id: Id) -> String {
    format!("refresh:{user_id}")
}

pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Random `state` value for the provider's authorize redirect.
pub fn new_state() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(24).map(char::from).collect()
}

/// Tokens handed to the client after a login or a refresh.
#[derive(Debug, Clone)]
pub struct Tokens {
    pub user_id: Id,
    pub access_token: String,
    pub refresh_secret: String,
}

async fn issue_tokens(cache: &dyn SessionCache, user_id: Id) -> Result<Tokens, ApiError> {
    let access_token = issue_token(user_id)?;
    let refresh_secret = uuid::Uuid::new_v4().to_string();
    cache.set(&refresh_key(user_id), hash_secret(&refresh_secret), REFRESH_TTL).await?;
    Ok(Tokens { user_id, access_token, refresh_secret })
}

pub async fn login<R: Repo + ?Sized>(
    repo: &R,
    cache: &dyn SessionCache,
    identity: &dyn IdentityProvider,
    code: &str,
    state: &str,
) -> Result<Tokens, ApiError> {
    let profile = identity.identify(code, state).await?;
    let user = match repo.find_user_by_social(&profile.social_id, profile.social_type).await? {
        Some(user) => user,
        None => {
            let new = NewUser {
                social_id: profile.social_id.clone(),
                social_type: profile.social_type,
                nickname: profile.nickname,
                email: profile.email,
                profile_image: profile.profile_image,
            };
            create_or_reload(repo, new).await?
        }
    };

    let tokens = issue_tokens(cache, user.id).await?;
    info!(user_id = user.id, "user logged in");
    Ok(tokens)
}

// two first logins for the same account can race on the unique index
async fn create_or_reload<R: Repo + ?Sized>(repo: &R, new: NewUser) -> Result<User, ApiError> {
    let (social_id, social_type) = (new.social_id.clone(), new.social_type);
    match repo.create_user(new).await {
        Ok(user) => {
            info!(user_id = user.id, "new user registered");
            Ok(user)
        }
        Err(RepoError::Conflict) => repo
            .find_user_by_social(&social_id, social_type)
            .await?
            .ok_or(ApiError::Internal),
        Err(e) => Err(e.into()),
    }
}

/// Reissue both tokens from a possibly expired access token and the refresh
/// secret issued alongside it. The secret must hash to the stored entry.
pub async fn refresh(
    cache: &dyn SessionCache,
    access_token: Option<&str>,
    refresh_secret: Option<&str>,
) -> Result<Tokens, ApiError> {
    let (Some(token), Some(secret)) = (access_token, refresh_secret) else {
        return Err(ApiError::Unauthorized("Unauthorized".into()));
    };
    let user_id = verify_signature(token)?.user_id()?;
    match cache.get(&refresh_key(user_id)).await? {
        None => Err(ApiError::Unauthorized("refresh session expired".into())),
        Some(stored) if stored != hash_secret(secret) => {
            warn!(user_id, "refresh secret mismatch");
            Err(ApiError::Unauthorized("invalid refresh token".into()))
        }
        Some(_) => issue_tokens(cache, user_id).await,
    }
}

/// Drop the refresh entry belonging to `access_token`, if it is one of ours.
pub async fn logout(cache: &dyn SessionCache, access_token: Option<&str>) {
    let Some(user_id) = access_token.and_then(|t| verify_signature(t).ok()).and_then(|c| c.user_id().ok()) else {
        return;
    };
    if let Err(e) = cache.delete(&refresh_key(user_id)).await {
        warn!(user_id, error = %e, "could not drop refresh entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use serial_test::serial;

    #[test]
    fn secrets_are_hashed_hex() {
        let h = hash_secret("abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn states_are_random_alphanumerics() {
        let (a, b) = (new_state(), new_state());
        assert_eq!(a.len(), 24);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    #[serial]
    async fn refresh_requires_the_issued_secret() {
        std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
        let cache = InMemoryCache::new();
        let issued = issue_tokens(&cache, 5).await.unwrap();
        let token = Some(issued.access_token.as_str());

        let err = refresh(&cache, token, Some("not-the-secret")).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert!(matches!(refresh(&cache, token, None).await.unwrap_err(), ApiError::Unauthorized(_)));

        let renewed = refresh(&cache, token, Some(&issued.refresh_secret)).await.unwrap();
        assert_eq!(renewed.user_id, 5);
        // rotated: the first secret is spent
        let err = refresh(&cache, token, Some(&issued.refresh_secret)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        cache.set(&refresh_key(5), "garbage".into(), REFRESH_TTL).await.unwrap();
        let err = refresh(&cache, token, Some(&renewed.refresh_secret)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn refresh_keys_are_per_user() {
        assert_eq!(refresh_key(3), "refresh:3");
    }
}
