use std::{str::FromStr, sync::Arc};

use anyhow::{Context, Result, anyhow};
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    ordering::OrderBook,
    web::{auth, storage::UserArea},
};

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    config: Arc<AppConfig>,
    orders: OrderBook,
    cookie_key: Key,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .with_context(|| format!("invalid DATABASE_URL `{}`", config.database_url))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to open SQLite database")?;

        Self::with_pool(pool, config).await
    }

    /// Runs migrations on `pool` and assembles the state around it.
    pub async fn with_pool(pool: SqlitePool, config: AppConfig) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        tokio::fs::create_dir_all(&config.upload_root)
            .await
            .with_context(|| {
                format!(
                    "failed to create upload root at {}",
                    config.upload_root.display()
                )
            })?;

        let cookie_key = match config.secret_key.as_deref() {
            Some(secret) => Key::derive_from(secret.as_bytes()),
            None => {
                warn!("SECRET_KEY is not set; sessions will not survive a restart");
                Key::generate()
            }
        };

        Ok(Self {
            pool,
            config: Arc::new(config),
            orders: OrderBook::new(),
            cookie_key,
        })
    }

    pub async fn ensure_seed_admin(&self) -> Result<()> {
        let Some(seed) = self.config.seed_admin.as_ref() else {
            return Ok(());
        };

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)")
                .bind(&seed.username)
                .fetch_one(&self.pool)
                .await
                .context("failed to check for seed admin")?;

        if exists {
            return Ok(());
        }

        let password_hash = auth::hash_password(&seed.password)
            .map_err(|err| anyhow!("failed to hash seed admin password: {err}"))?;

        auth::insert_user(&self.pool, &seed.username, &password_hash, true, true)
            .await
            .context("failed to insert seed admin user")?;

        info!(username = %seed.username, "seeded admin user");
        Ok(())
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub fn pool_ref(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    pub fn user_area(&self, username: &str) -> UserArea {
        UserArea::for_user(&self.config.upload_root, username)
    }

    #[cfg(test)]
    pub fn cookie_key(&self) -> Key {
        self.cookie_key.clone()
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use axum::response::{IntoResponse, Redirect};
    use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
    use uuid::Uuid;

    use super::*;
    use crate::web::auth::{self, SESSION_COOKIE};

    /// State backed by a private in-memory database and `upload_root`.
    pub async fn test_state(upload_root: &Path) -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");

        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            upload_root: upload_root.to_path_buf(),
            port: 0,
            secret_key: Some("test-secret-key-that-is-long-enough-0123456789".to_string()),
            seed_admin: None,
        };

        AppState::with_pool(pool, config).await.expect("state")
    }

    pub async fn create_user(state: &AppState, username: &str, active: bool, admin: bool) -> Uuid {
        let hash = auth::hash_password("password123").expect("hash");
        auth::insert_user(state.pool_ref(), username, &hash, active, admin)
            .await
            .expect("insert user")
    }

    /// A signed cookie jar holding a fresh session for `user_id`.
    pub async fn signed_in_jar(state: &AppState, user_id: Uuid) -> SignedCookieJar {
        let token = auth::create_session(state.pool_ref(), user_id)
            .await
            .expect("session");
        SignedCookieJar::new(state.cookie_key()).add(Cookie::new(SESSION_COOKIE, token.to_string()))
    }

    pub fn location(redirect: Redirect) -> String {
        let response = redirect.into_response();
        response
            .headers()
            .get(axum::http::header::LOCATION)
            .expect("location header")
            .to_str()
            .expect("ascii location")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{test_support::test_state, *};
    use crate::config::SeedAdmin;

    #[tokio::test]
    async fn seeds_admin_once() {
        let dir = tempdir().unwrap();
        let mut state = test_state(dir.path()).await;
        let mut config = (*state.config).clone();
        config.seed_admin = Some(SeedAdmin {
            username: "admin".to_string(),
            password: "admin-password".to_string(),
        });
        state.config = Arc::new(config);

        state.ensure_seed_admin().await.expect("first seed");
        state.ensure_seed_admin().await.expect("second seed");

        let (count, is_admin, is_active): (i64, bool, bool) = sqlx::query_as(
            "SELECT COUNT(*), MAX(is_admin), MAX(is_active) FROM users WHERE username = 'admin'",
        )
        .fetch_one(state.pool_ref())
        .await
        .unwrap();
        assert_eq!(count, 1);
        assert!(is_admin);
        assert!(is_active);
    }
}
