use axum::{
    Router,
    extract::{Multipart, Query, State},
    response::{Html, Redirect},
    routing::{get, post},
};
use axum_extra::extract::cookie::SignedCookieJar;
use tracing::{error, info};

use super::tool::{Tool, ToolPageQuery, handle_upload, ordered_inputs, render_tool_page};
use crate::{
    pdf,
    web::{AppState, auth},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/merge", get(merge_page).post(upload_pdfs))
        .route("/run_script", post(run_script))
}

async fn merge_page(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<ToolPageQuery>,
) -> Result<Html<String>, Redirect> {
    let user = auth::require_user_redirect(&state, &jar).await?;
    Ok(render_tool_page(&state, &user, Tool::Merge, &params).await)
}

async fn upload_pdfs(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    multipart: Multipart,
) -> Result<Redirect, Redirect> {
    let user = auth::require_user_redirect(&state, &jar).await?;
    Ok(handle_upload(&state, &user, Tool::Merge, multipart).await)
}

/// Merges the caller's staged PDFs, in their chosen order, into `merged.pdf`.
async fn run_script(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<Redirect, Redirect> {
    let user = auth::require_user_redirect(&state, &jar).await?;
    let tool = Tool::Merge;

    let inputs = match ordered_inputs(&state, &user, tool).await {
        Ok(inputs) => inputs,
        Err(code) => return Ok(tool.redirect("error", code)),
    };
    let count = inputs.len();
    let output = state
        .user_area(&user.username)
        .output_path(tool.output_name());

    match pdf::merge_pdfs_blocking(inputs, output).await {
        Ok(pages) => {
            info!(username = %user.username, files = count, pages, "merged PDFs");
            Ok(tool.redirect("status", "merged"))
        }
        Err(err) => {
            error!(?err, username = %user.username, "failed to merge PDFs");
            Ok(tool.redirect("error", "merge_failed"))
        }
    }
}
