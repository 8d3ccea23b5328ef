//! Social identity providers.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::NaverConfig;
use crate::error::ApiError;
use crate::models::SocialType;

const NAVER_AUTHORIZE_URL: &str = "https://nid.naver.com/oauth2.0/authorize";
const NAVER_TOKEN_URL: &str = "https://nid.naver.com/oauth2.0/token";
const NAVER_PROFILE_URL: &str = "https://openapi.naver.com/v1/nid/me";

#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    #[error("oauth provider not configured")]
    NotConfigured,
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Rejected(String),
}

impl From<OAuthError> for ApiError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::Rejected(msg) => ApiError::Unauthorized(msg),
            other => {
                tracing::error!(error = %other, "oauth login failed");
                ApiError::Internal
            }
        }
    }
}

/// Profile returned by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialIdentity {
    pub social_id: String,
    pub social_type: SocialType,
    pub nickname: String,
    pub email: String,
    pub profile_image: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start a login; `None` when unconfigured.
    fn authorize_url(&self, state: &str) -> Option<String>;
    async fn identify(&self, code: &str, state: &str) -> Result<SocialIdentity, OAuthError>;
}

pub struct NaverProvider {
    client: reqwest::Client,
    config: Option<NaverConfig>,
}

impl NaverProvider {
    pub fn new(config: Option<NaverConfig>) -> Self {
        Self { client: reqwest::Client::new(), config }
    }
}

#[derive(Deserialize)]
struct NaverToken {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct NaverProfileEnvelope {
    resultcode: String,
    message: String,
    response: Option<NaverProfile>,
}

#[derive(Deserialize)]
struct NaverProfile {
    id: String,
    nickname: Option<String>,
    email: Option<String>,
    profile_image: Option<String>,
}

#[async_trait]
impl IdentityProvider for NaverProvider {
    fn authorize_url(&self, state: &str) -> Option<String> {
        let cfg = self.config.as_ref()?;
        Some(format!(
            "{NAVER_AUTHORIZE_URL}?response_type=code&client_id={}&redirect_uri={}&state={}",
            urlencoding::encode(&cfg.client_id),
            urlencoding::encode(&cfg.redirect_uri),
            urlencoding::encode(state),
        ))
    }

    async fn identify(&self, code: &str, state: &str) -> Result<SocialIdentity, OAuthError> {
        let cfg = self.config.as_ref().ok_or(OAuthError::NotConfigured)?;
        let token = self
            .client
            .post(NAVER_TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", cfg.client_id.as_str()),
                ("client_secret", cfg.client_secret.as_str()),
                ("code", code),
                ("state", state),
            ])
            .send()
            .await?
            .json::<NaverToken>()
            .await?;
        let access_token = match token.access_token {
            Some(t) => t,
            None => {
                let reason = token.error_description.or(token.error).unwrap_or_else(|| "token exchange failed".into());
                return Err(OAuthError::Rejected(reason));
            }
        };

        let envelope = self
            .client
            .get(NAVER_PROFILE_URL)
            .bearer_auth(access_token)
            .send()
            .await?
            .json::<NaverProfileEnvelope>()
            .await?;
        let profile = match envelope.response {
            Some(p) if envelope.resultcode == "00" => p,
            _ => return Err(OAuthError::Rejected(envelope.message)),
        };
        Ok(SocialIdentity {
            social_id: profile.id,
            social_type: SocialType::Naver,
            nickname: profile.nickname.unwrap_or_default(),
            email: profile.email.unwrap_or_default(),
            profile_image: profile.profile_image.unwrap_or_default(),
        })
    }
}
