use sqlx::FromRow;
use uuid::Uuid;

/// One row of the admin user table. The password hash is never selected.
#[derive(Clone, Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: i64,
}
