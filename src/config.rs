use std::env;
use std::path::PathBuf;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least 32 bytes long")]
    WeakSecret,
    #[error("PORT is not a valid port number: {0}")]
    Port(String),
}

/// Naver application credentials; login is disabled without them.
#[derive(Debug, Clone)]
pub struct NaverConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub service_url: String,
    pub naver: Option<NaverConfig>,
    /// Where the in-memory store keeps its snapshot; `None` keeps state in memory only.
    pub data_dir: Option<PathBuf>,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        let port = match var("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Port(raw))?,
            None => 8080,
        };
        let naver = match (var("NAVER_CLIENT_ID"), var("NAVER_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(NaverConfig {
                client_id,
                client_secret,
                redirect_uri: var("NAVER_REDIRECT_URI")
                    .unwrap_or_else(|| "http://localhost:5173/auth/naver/callback".to_string()),
            }),
            _ => None,
        };
        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: var("DATABASE_URL"),
            redis_url: var("REDIS_URL"),
            service_url: var("SERVICE_URL").unwrap_or_else(|| "http://localhost:5173".to_string()),
            naver,
            data_dir: var("DIARY_DATA_DIR").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &["JWT_SECRET", "PORT", "NAVER_CLIENT_ID", "NAVER_CLIENT_SECRET", "SERVICE_URL"];

    fn clear() {
        for v in VARS {
            env::remove_var(v);
        }
    }

    #[test]
    #[serial]
    fn secret_is_required_and_long_enough() {
        clear();
        assert_eq!(Config::from_env().unwrap_err(), ConfigError::Missing("JWT_SECRET"));
        env::set_var("JWT_SECRET", "short");
        assert_eq!(Config::from_env().unwrap_err(), ConfigError::WeakSecret);
    }

    #[test]
    #[serial]
    fn defaults_apply() {
        clear();
        env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(cfg.naver.is_none());
        assert_eq!(cfg.service_url, "http://localhost:5173");
    }

    #[test]
    #[serial]
    fn bad_port_is_reported() {
        clear();
        env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
        env::set_var("PORT", "eighty");
        assert!(matches!(Config::from_env(), Err(ConfigError::Port(_))));
        env::remove_var("PORT");
    }
}
