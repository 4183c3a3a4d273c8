use std::{env, path::PathBuf};

use anyhow::{Result, anyhow};

const DEFAULT_DATABASE_URL: &str = "sqlite://users.db?mode=rwc";
const DEFAULT_UPLOAD_ROOT: &str = "users";
const DEFAULT_PORT: u16 = 8080;
const MIN_SECRET_KEY_BYTES: usize = 32;

/// Credentials for the administrator account seeded at startup.
#[derive(Clone, Debug)]
pub struct SeedAdmin {
    pub username: String,
    pub password: String,
}

/// Process configuration, read once from the environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub upload_root: PathBuf,
    pub port: u16,
    pub secret_key: Option<String>,
    pub seed_admin: Option<SeedAdmin>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("PORT must be a valid port number, got `{raw}`"))?,
            None => DEFAULT_PORT,
        };

        let secret_key = non_empty("SECRET_KEY");
        if let Some(key) = secret_key.as_deref() {
            if key.len() < MIN_SECRET_KEY_BYTES {
                return Err(anyhow!(
                    "SECRET_KEY must be at least {MIN_SECRET_KEY_BYTES} bytes long"
                ));
            }
        }

        let seed_admin = match (non_empty("ADMIN_USERNAME"), non_empty("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(SeedAdmin {
                username: username.trim().to_string(),
                password,
            }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "ADMIN_USERNAME and ADMIN_PASSWORD must be set together"
                ));
            }
        };

        Ok(Self {
            database_url: non_empty("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            upload_root: non_empty("UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_ROOT)),
            port,
            secret_key,
            seed_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).expect("config");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.upload_root, PathBuf::from("users"));
        assert_eq!(config.port, 8080);
        assert!(config.secret_key.is_none());
        assert!(config.seed_admin.is_none());
    }

    #[test]
    fn reads_seed_admin_pair() {
        let config = config_from(&[("ADMIN_USERNAME", " root "), ("ADMIN_PASSWORD", "hunter22")])
            .expect("config");
        let admin = config.seed_admin.expect("seed admin");
        assert_eq!(admin.username, "root");
        assert_eq!(admin.password, "hunter22");
    }

    #[test]
    fn rejects_half_configured_admin() {
        assert!(config_from(&[("ADMIN_USERNAME", "root")]).is_err());
    }

    #[test]
    fn rejects_short_secret_key() {
        assert!(config_from(&[("SECRET_KEY", "too-short")]).is_err());
    }

    #[test]
    fn rejects_invalid_port() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
    }
}
