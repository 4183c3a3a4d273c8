pub mod admin;
pub mod auth;
pub mod data;
pub mod flash;
pub mod landing;
pub mod models;
pub mod responses;
pub mod router;
pub mod state;
pub mod storage;
pub mod templates;
pub mod upload_ui;
pub mod uploads;

pub use auth::AuthUser;
pub use flash::compose_flash_message;
pub use responses::{ApiMessage, json_error};
pub use state::AppState;
pub use templates::{
    PageLayout, escape_html, render_login_page, render_page, render_register_page,
};
pub use upload_ui::{
    SORTABLE_LIST_SCRIPT, SORTABLE_LIST_STYLES, render_sortable_list, render_upload_form,
};
pub use uploads::{FileFieldConfig, process_upload_form};
