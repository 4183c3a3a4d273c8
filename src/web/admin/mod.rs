mod auth;
mod dashboard;
mod types;
mod users;

pub use dashboard::dashboard;
pub use users::{delete_user, set_user_active, set_user_role};
