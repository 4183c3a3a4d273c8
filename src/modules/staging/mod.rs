//! Routes shared by both tool pages: reordering, clearing and downloads.

use std::collections::HashSet;

use axum::{
    Form, Json, Router,
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};

use super::tool::Tool;
use crate::{
    ordering::UnknownFiles,
    web::{
        ApiMessage, AppState,
        auth::{self, JsonAuthError},
        json_error,
        storage::{FileKind, stream_file},
    },
};

#[derive(Default, Deserialize)]
pub struct ClearForm {
    #[serde(default)]
    pub return_to: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clear_folder", post(clear_folder))
        .route("/sorted_list", post(sorted_list))
        .route("/download/:filename", get(download))
}

/// Replaces the caller's merge order and echoes what was stored.
pub(crate) async fn sorted_list(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(order): Json<Vec<String>>,
) -> Result<Json<Vec<String>>, (StatusCode, Json<ApiMessage>)> {
    let user = auth::current_user_or_json_error(&state, &jar)
        .await
        .map_err(|JsonAuthError { status, message }| json_error(status, message))?;

    let staged: HashSet<String> = state
        .user_area(&user.username)
        .staged_names()
        .await
        .map_err(|err| {
            error!(?err, username = %user.username, "failed to list staged files");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not read your uploaded files.",
            )
        })?
        .into_iter()
        .collect();

    match state.orders().replace(user.id, order, &staged).await {
        Ok(stored) => Ok(Json(stored)),
        Err(UnknownFiles(unknown)) => {
            warn!(username = %user.username, ?unknown, "rejected order with unstaged files");
            Err(json_error(
                StatusCode::BAD_REQUEST,
                format!("Unknown files: {}", unknown.join(", ")),
            ))
        }
    }
}

/// Empties the caller's staging and output folders and forgets their order.
async fn clear_folder(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(form): Form<ClearForm>,
) -> Result<Redirect, Redirect> {
    let user = auth::require_user_redirect(&state, &jar).await?;
    let tool = Tool::from_return_to(form.return_to.as_deref());

    state.orders().clear(user.id).await;
    if let Err(err) = state.user_area(&user.username).clear().await {
        error!(?err, username = %user.username, "failed to clear folder");
        return Ok(tool.redirect("error", "clear_failed"));
    }

    info!(username = %user.username, "cleared folder");
    Ok(tool.redirect("status", "cleared"))
}

async fn download(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    AxumPath(filename): AxumPath<String>,
) -> Result<Response, (StatusCode, Json<ApiMessage>)> {
    let user = auth::current_user_or_json_error(&state, &jar)
        .await
        .map_err(|JsonAuthError { status, message }| json_error(status, message))?;

    let Some(path) = state
        .user_area(&user.username)
        .resolve_download(&filename)
        .await
    else {
        return Err(json_error(StatusCode::NOT_FOUND, "File not found."));
    };

    let content_type = match FileKind::from_name(&filename) {
        Some(FileKind::Pdf) => mime::APPLICATION_PDF.as_ref(),
        _ => mime::APPLICATION_OCTET_STREAM.as_ref(),
    };
    stream_file(&path, &filename, content_type).await
}
