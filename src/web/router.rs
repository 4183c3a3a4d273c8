use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    modules,
    web::{AppState, admin, auth, landing},
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing::index))
        .route("/home", get(landing::home_page))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route(
            "/register",
            get(auth::register_page).post(auth::process_register),
        )
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/healthz", get(healthz))
        .route("/admin", get(admin::dashboard))
        .route("/admin/users/active", post(admin::set_user_active))
        .route("/admin/users/role", post(admin::set_user_role))
        .route("/admin/users/delete", post(admin::delete_user))
        .merge(modules::merge::router())
        .merge(modules::img2pdf::router())
        .merge(modules::staging::router())
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
