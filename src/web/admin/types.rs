use serde::Deserialize;
use uuid::Uuid;

#[derive(Default, Deserialize)]
pub struct DashboardQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct ActiveForm {
    pub user_id: Uuid,
    pub active: bool,
}

#[derive(Deserialize)]
pub struct RoleForm {
    pub user_id: Uuid,
    pub is_admin: bool,
}

#[derive(Deserialize)]
pub struct UserIdForm {
    pub user_id: Uuid,
}
