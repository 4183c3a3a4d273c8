use sqlx::SqlitePool;
use uuid::Uuid;

use super::models::UserRow;

pub async fn fetch_users(pool: &SqlitePool) -> sqlx::Result<Vec<UserRow>> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, username, is_active, is_admin, created_at FROM users ORDER BY created_at, username",
    )
    .fetch_all(pool)
    .await
}

pub async fn fetch_user(pool: &SqlitePool, user_id: Uuid) -> sqlx::Result<Option<UserRow>> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, username, is_active, is_admin, created_at FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}
