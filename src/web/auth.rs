use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use chrono::{Duration as ChronoDuration, Utc};
use cookie::time::Duration as CookieDuration;
use rand_core::OsRng;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{error, info};
use uuid::Uuid;

use crate::web::{AppState, compose_flash_message, render_login_page, render_register_page};

#[derive(Clone, sqlx::FromRow)]
pub struct DbUserAuth {
    pub id: Uuid,
    pub password_hash: String,
    pub is_active: bool,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

pub const SESSION_COOKIE: &str = "auth_token";
pub const SESSION_TTL_DAYS: i64 = 7;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 4..=20;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=20;

#[derive(Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

#[derive(Default, Deserialize)]
pub struct AuthPageQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

/// Error payload for JSON endpoints hit without a valid session.
pub struct JsonAuthError {
    pub status: StatusCode,
    pub message: &'static str,
}

pub async fn login_page(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<AuthPageQuery>,
) -> Result<Html<String>, Redirect> {
    if let Some(redirect) = redirect_if_authenticated(&state, &jar).await {
        return Err(redirect);
    }

    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());
    Ok(Html(render_login_page(&flash, "")))
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(form): Form<CredentialsForm>,
) -> Result<(SignedCookieJar, Redirect), (StatusCode, Html<String>)> {
    let username = form.username.trim();
    let pool = state.pool();

    let user = match fetch_user_by_username(&pool, username).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(login_rejected(username, "invalid_credentials")),
        Err(err) => {
            error!(?err, "failed to fetch user during login");
            return Err(server_error());
        }
    };

    if !verify_password(&form.password, &user.password_hash) {
        return Err(login_rejected(username, "invalid_credentials"));
    }

    if !user.is_active {
        return Err(login_rejected(username, "inactive"));
    }

    let session_token = match create_session(&pool, user.id).await {
        Ok(token) => token,
        Err(err) => {
            error!(?err, "failed to create session");
            return Err(server_error());
        }
    };

    let mut cookie = Cookie::new(SESSION_COOKIE, session_token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(SESSION_TTL_DAYS));

    info!(%username, "user signed in");
    Ok((jar.add(cookie), Redirect::to("/home")))
}

pub async fn register_page(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Html<String>, Redirect> {
    if let Some(redirect) = redirect_if_authenticated(&state, &jar).await {
        return Err(redirect);
    }

    Ok(Html(render_register_page("", "")))
}

pub async fn process_register(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Result<Redirect, (StatusCode, Html<String>)> {
    let username = form.username.trim();

    if let Err(code) = validate_registration(username, &form.password) {
        return Err(register_rejected(username, code));
    }

    let password_hash = match hash_password(&form.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash password during registration");
            return Err(register_rejected(username, "hash_failed"));
        }
    };

    match insert_user(state.pool_ref(), username, &password_hash, false, false).await {
        Ok(_) => {
            info!(%username, "registered new account awaiting activation");
            Ok(Redirect::to("/login?status=registered"))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(register_rejected(username, "duplicate"))
        }
        Err(err) => {
            error!(?err, "failed to create user during registration");
            Err(server_error())
        }
    }
}

pub async fn logout(State(state): State<AppState>, jar: SignedCookieJar) -> (SignedCookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(token) = Uuid::parse_str(cookie.value()) {
            if let Err(err) = sqlx::query("DELETE FROM sessions WHERE id = ?1")
                .bind(token)
                .execute(state.pool_ref())
                .await
            {
                error!(?err, "failed to remove session during logout");
            }
        }
    }

    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));

    (jar.remove(removal), Redirect::to("/login?status=logged_out"))
}

pub async fn redirect_if_authenticated(state: &AppState, jar: &SignedCookieJar) -> Option<Redirect> {
    current_user(state, jar).await.map(|_| Redirect::to("/home"))
}

/// Resolves the signed session cookie to an active user.
pub async fn current_user(state: &AppState, jar: &SignedCookieJar) -> Option<AuthUser> {
    let token_cookie = jar.get(SESSION_COOKIE)?;
    let token = Uuid::parse_str(token_cookie.value()).ok()?;

    match fetch_user_by_session(state.pool_ref(), token).await {
        Ok(user) => user,
        Err(err) => {
            error!(?err, "failed to validate session");
            None
        }
    }
}

/// Route guard for HTML pages.
pub async fn require_user_redirect(
    state: &AppState,
    jar: &SignedCookieJar,
) -> Result<AuthUser, Redirect> {
    current_user(state, jar)
        .await
        .ok_or_else(|| Redirect::to("/login"))
}

/// Route guard for JSON endpoints.
pub async fn current_user_or_json_error(
    state: &AppState,
    jar: &SignedCookieJar,
) -> Result<AuthUser, JsonAuthError> {
    current_user(state, jar).await.ok_or(JsonAuthError {
        status: StatusCode::UNAUTHORIZED,
        message: "Please sign in first.",
    })
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed = PasswordHash::new(password_hash);
    match parsed {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

/// Checks the registration form, returning a flash error code on failure.
pub fn validate_registration(username: &str, password: &str) -> Result<(), &'static str> {
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err("username_length");
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
    if !username.chars().all(allowed) || username.starts_with('.') {
        return Err("username_chars");
    }
    if !PASSWORD_LEN.contains(&password.chars().count()) {
        return Err("password_length");
    }
    Ok(())
}

pub async fn insert_user(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    is_active: bool,
    is_admin: bool,
) -> sqlx::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, username, password_hash, is_active, is_admin, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(id)
    .bind(username)
    .bind(password_hash)
    .bind(is_active)
    .bind(is_admin)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn create_session(pool: &SqlitePool, user_id: Uuid) -> sqlx::Result<Uuid> {
    let token = Uuid::new_v4();
    let expires_at = Utc::now() + ChronoDuration::days(SESSION_TTL_DAYS);

    sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)")
        .bind(token)
        .bind(user_id)
        .bind(expires_at.timestamp())
        .execute(pool)
        .await?;

    Ok(token)
}

pub async fn fetch_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> sqlx::Result<Option<DbUserAuth>> {
    sqlx::query_as::<_, DbUserAuth>(
        "SELECT id, password_hash, is_active FROM users WHERE username = ?1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_user_by_session(
    pool: &SqlitePool,
    token: Uuid,
) -> sqlx::Result<Option<AuthUser>> {
    sqlx::query_as::<_, AuthUser>(
        "SELECT users.id, users.username, users.is_admin FROM sessions
         JOIN users ON users.id = sessions.user_id
         WHERE sessions.id = ?1 AND sessions.expires_at > ?2 AND users.is_active = 1",
    )
    .bind(token)
    .bind(Utc::now().timestamp())
    .fetch_optional(pool)
    .await
}

fn login_rejected(username: &str, code: &str) -> (StatusCode, Html<String>) {
    let flash = compose_flash_message(None, Some(code));
    (
        StatusCode::UNAUTHORIZED,
        Html(render_login_page(&flash, username)),
    )
}

fn register_rejected(username: &str, code: &str) -> (StatusCode, Html<String>) {
    let flash = compose_flash_message(None, Some(code));
    let status = if code == "duplicate" {
        StatusCode::CONFLICT
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Html(render_register_page(&flash, username)))
}

fn server_error() -> (StatusCode, Html<String>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html("<h1>Server error</h1><p>Please try again later.</p>".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, header};
    use tempfile::tempdir;

    use super::*;
    use crate::web::state::test_support::{create_user, location, signed_in_jar, test_state};

    fn credentials(username: &str, password: &str) -> Form<CredentialsForm> {
        Form(CredentialsForm {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn registration_rules_follow_form_limits() {
        assert_eq!(validate_registration("abc", "password1"), Err("username_length"));
        assert_eq!(validate_registration("a/../b", "password1"), Err("username_chars"));
        assert_eq!(validate_registration("alice", "short"), Err("password_length"));
        assert_eq!(
            validate_registration("alice", "a-password-that-is-too-long"),
            Err("password_length")
        );
        assert_eq!(validate_registration("alice", "password1"), Ok(()));
    }

    #[tokio::test]
    async fn registering_twice_is_rejected() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;

        let first = process_register(State(state.clone()), credentials("alice", "password1"))
            .await
            .expect("first registration");
        assert_eq!(location(first), "/login?status=registered");

        let (status, Html(body)) =
            process_register(State(state.clone()), credentials("alice", "password2"))
                .await
                .expect_err("duplicate registration");
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("That username already exists"));
    }

    #[tokio::test]
    async fn registered_accounts_start_inactive() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        process_register(State(state.clone()), credentials("bob_1", "password1"))
            .await
            .expect("registration");

        let user = fetch_user_by_username(state.pool_ref(), "bob_1")
            .await
            .unwrap()
            .expect("user row");
        assert!(!user.is_active);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_with_message() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        create_user(&state, "carol", true, false).await;

        let jar = SignedCookieJar::new(state.cookie_key());
        let (status, Html(body)) =
            process_login(State(state.clone()), jar, credentials("carol", "not-the-password"))
                .await
                .expect_err("wrong password");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid username or password"));
    }

    #[tokio::test]
    async fn login_rejects_inactive_account_with_message() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        create_user(&state, "dave", false, false).await;

        let jar = SignedCookieJar::new(state.cookie_key());
        let (status, Html(body)) =
            process_login(State(state.clone()), jar, credentials("dave", "password123"))
                .await
                .expect_err("inactive account");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("awaiting activation"));
    }

    #[tokio::test]
    async fn login_sets_session_cookie() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let user_id = create_user(&state, "erin", true, false).await;

        let jar = SignedCookieJar::new(state.cookie_key());
        let (jar, redirect) =
            process_login(State(state.clone()), jar, credentials("erin", "password123"))
                .await
                .expect("login");
        assert_eq!(location(redirect), "/home");

        let user = current_user(&state, &jar).await.expect("session resolves");
        assert_eq!(user.id, user_id);
        assert_eq!(user.username, "erin");
    }

    #[tokio::test]
    async fn logout_invalidates_session() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let user_id = create_user(&state, "frank", true, false).await;
        let jar = signed_in_jar(&state, user_id).await;
        let token = Uuid::parse_str(jar.get(SESSION_COOKIE).unwrap().value()).unwrap();

        let (_jar, redirect) = logout(State(state.clone()), jar).await;
        assert_eq!(location(redirect), "/login?status=logged_out");
        assert!(fetch_user_by_session(state.pool_ref(), token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unsigned_cookie_is_ignored() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let user_id = create_user(&state, "grace", true, false).await;
        let token = create_session(state.pool_ref(), user_id).await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}")).unwrap(),
        );
        let jar = SignedCookieJar::from_headers(&headers, state.cookie_key());

        assert!(current_user(&state, &jar).await.is_none());
    }

    #[tokio::test]
    async fn deactivated_user_loses_session() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let user_id = create_user(&state, "heidi", true, false).await;
        let jar = signed_in_jar(&state, user_id).await;

        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(user_id)
            .execute(state.pool_ref())
            .await
            .unwrap();

        let redirect = require_user_redirect(&state, &jar).await.unwrap_err();
        assert_eq!(location(redirect), "/login");
    }
}
