use std::{borrow::Cow, collections::BTreeSet, path::PathBuf};

use axum::{
    extract::Multipart,
    response::{Html, Redirect},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    ordering,
    web::{
        AppState, AuthUser, FileFieldConfig, PageLayout, SORTABLE_LIST_SCRIPT,
        SORTABLE_LIST_STYLES, compose_flash_message, escape_html, process_upload_form,
        render_page, render_sortable_list, render_upload_form,
        storage::{FileKind, IMAGE_EXTENSIONS, MERGED_IMAGES_PDF, MERGED_PDF, PDF_EXTENSIONS},
    },
};

const MAX_FILES_PER_UPLOAD: usize = 50;

#[derive(Default, Deserialize)]
pub struct ToolPageQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

/// The two pages that share a user's staging directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Merge,
    Img2Pdf,
}

impl Tool {
    /// Maps a `return_to` form value onto a tool page, defaulting to merge.
    pub fn from_return_to(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("img2pdf") => Tool::Img2Pdf,
            _ => Tool::Merge,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Tool::Merge => "/merge",
            Tool::Img2Pdf => "/img2pdf",
        }
    }

    fn slug(self) -> &'static str {
        match self {
            Tool::Merge => "merge",
            Tool::Img2Pdf => "img2pdf",
        }
    }

    pub fn kind(self) -> FileKind {
        match self {
            Tool::Merge => FileKind::Pdf,
            Tool::Img2Pdf => FileKind::Image,
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Tool::Merge => PDF_EXTENSIONS,
            Tool::Img2Pdf => IMAGE_EXTENSIONS,
        }
    }

    pub fn output_name(self) -> &'static str {
        match self {
            Tool::Merge => MERGED_PDF,
            Tool::Img2Pdf => MERGED_IMAGES_PDF,
        }
    }

    fn empty_error(self) -> &'static str {
        match self {
            Tool::Merge => "no_pdfs",
            Tool::Img2Pdf => "no_images",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Tool::Merge => "Merge PDFs",
            Tool::Img2Pdf => "Images to PDF",
        }
    }

    /// Redirects back to the tool page with a `status` or `error` code.
    pub fn redirect(self, key: &str, code: &str) -> Redirect {
        Redirect::to(&format!("{}?{key}={code}", self.path()))
    }
}

/// Renders a tool page: upload form, the caller's staged files in merge
/// order, the trigger and clear forms, and links to finished outputs.
pub async fn render_tool_page(
    state: &AppState,
    user: &AuthUser,
    tool: Tool,
    params: &ToolPageQuery,
) -> Html<String> {
    let area = state.user_area(&user.username);

    let mut staged = match area.staged_files().await {
        Ok(files) => files,
        Err(err) => {
            error!(?err, username = %user.username, "failed to list staged files");
            Vec::new()
        }
    };
    let order = state.orders().snapshot(user.id).await;
    let names: BTreeSet<String> = staged.iter().map(|file| file.name.clone()).collect();
    let resolved = ordering::resolve(&order, &names);
    staged.sort_by_key(|file| {
        resolved
            .files
            .iter()
            .position(|name| name == &file.name)
            .unwrap_or(usize::MAX)
    });

    let outputs = match area.output_files().await {
        Ok(outputs) => outputs,
        Err(err) => {
            error!(?err, username = %user.username, "failed to list output files");
            Vec::new()
        }
    };

    let accept = tool
        .extensions()
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");
    let upload_label = match tool {
        Tool::Merge => "Add PDF files",
        Tool::Img2Pdf => "Add JPEG or PNG images",
    };
    let upload_form = render_upload_form(tool.path(), &accept, upload_label);
    let file_list = render_sortable_list(&staged, tool.kind());

    let run_form = match tool {
        Tool::Merge => r#"<form method="post" action="/run_script">
                            <button type="submit">Merge PDFs</button>
                        </form>"#
            .to_string(),
        Tool::Img2Pdf => r#"<form method="post" action="/run_img2pdf">
                            <label><input type="checkbox" name="enhance" value="on"> Fit each image onto an A4 page</label>
                            <button type="submit">Convert images</button>
                        </form>"#
            .to_string(),
    };

    let downloads = if outputs.is_empty() {
        r#"<p class="note">Nothing to download yet.</p>"#.to_string()
    } else {
        let links = outputs
            .iter()
            .map(|name| {
                let name = escape_html(name);
                format!(r#"<a href="/download/{name}">{name}</a>"#)
            })
            .collect::<String>();
        format!(r#"<div class="downloads">{links}</div>"#)
    };

    let body_html = format!(
        r#"        <section class="panel">
                    <h2>Upload</h2>
                    {upload_form}
                </section>
                <section class="panel">
                    <h2>Files</h2>
                    <p class="note">Drag files to change the order they are combined in.</p>
                    {file_list}
                    <div class="actions">
                        {run_form}
                        <form method="post" action="/clear_folder">
                            <input type="hidden" name="return_to" value="{slug}">
                            <button type="submit" class="danger">Clear folder</button>
                        </form>
                    </div>
                </section>
                <section class="panel">
                    <h2>Downloads</h2>
                    {downloads}
                </section>"#,
        slug = tool.slug(),
    );

    let flash = compose_flash_message(params.status.as_deref(), params.error.as_deref());

    Html(render_page(PageLayout {
        meta_title: tool.title(),
        page_heading: tool.title(),
        username: &user.username,
        is_admin: user.is_admin,
        show_back_link: true,
        flash_html: Cow::Owned(flash),
        body_html: Cow::Owned(body_html),
        extra_style_blocks: vec![Cow::Borrowed(SORTABLE_LIST_STYLES)],
        body_scripts: vec![Cow::Borrowed(SORTABLE_LIST_SCRIPT)],
    }))
}

/// Stores the uploaded `file` fields in the caller's staging directory and
/// appends each stored name to their order. A rejected form stores nothing.
pub async fn handle_upload(
    state: &AppState,
    user: &AuthUser,
    tool: Tool,
    multipart: Multipart,
) -> Redirect {
    let area = state.user_area(&user.username);
    if let Err(err) = area.ensure().await {
        error!(?err, username = %user.username, "failed to prepare staging directory");
        return tool.redirect("error", "upload_rejected");
    }

    let field = FileFieldConfig::new("file", tool.extensions(), MAX_FILES_PER_UPLOAD)
        .with_min_files(0);
    let outcome = match process_upload_form(multipart, area.staging(), &[field]).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(username = %user.username, error = err.message(), "upload rejected");
            return tool.redirect("error", "upload_rejected");
        }
    };

    if outcome.files.is_empty() {
        return tool.redirect("error", "no_file");
    }

    for file in outcome.files_for("file") {
        state.orders().append(user.id, &file.stored_name).await;
        info!(
            username = %user.username,
            original = %file.original_name,
            path = %file.stored_path.display(),
            bytes = file.file_size,
            "staged upload"
        );
    }

    tool.redirect("status", "uploaded")
}

/// Lines the caller's order up against their staging directory and returns
/// the paths `tool` consumes, in order. Errors are flash codes.
pub async fn ordered_inputs(
    state: &AppState,
    user: &AuthUser,
    tool: Tool,
) -> Result<Vec<PathBuf>, &'static str> {
    let area = state.user_area(&user.username);
    let staged = area.staged_names().await.map_err(|err| {
        error!(?err, username = %user.username, "failed to list staged files");
        match tool {
            Tool::Merge => "merge_failed",
            Tool::Img2Pdf => "convert_failed",
        }
    })?;

    let order = state.orders().snapshot(user.id).await;
    let resolved = ordering::resolve(&order, &staged);

    let of_kind = |name: &String| FileKind::from_name(name) == Some(tool.kind());

    let missing: Vec<&String> = resolved.missing.iter().filter(|name| of_kind(name)).collect();
    if !missing.is_empty() {
        warn!(username = %user.username, ?missing, "order refers to files that are gone");
        return Err("order_stale");
    }

    let inputs: Vec<PathBuf> = resolved
        .files
        .iter()
        .filter(|name| of_kind(name))
        .map(|name| area.staged_path(name))
        .collect();

    if inputs.is_empty() {
        return Err(tool.empty_error());
    }

    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tempfile::tempdir;

    use super::*;
    use crate::web::state::test_support::{create_user, location, test_state};

    async fn user(state: &AppState, name: &str) -> AuthUser {
        let id = create_user(state, name, true, false).await;
        AuthUser {
            id,
            username: name.to_string(),
            is_admin: false,
        }
    }

    #[test]
    fn return_to_defaults_to_merge() {
        assert_eq!(Tool::from_return_to(Some("img2pdf")), Tool::Img2Pdf);
        assert_eq!(Tool::from_return_to(Some("merge")), Tool::Merge);
        assert_eq!(Tool::from_return_to(Some("../admin")), Tool::Merge);
        assert_eq!(Tool::from_return_to(None), Tool::Merge);
    }

    #[tokio::test]
    async fn inputs_follow_order_and_skip_other_kinds() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let alice = user(&state, "alice").await;
        let area = state.user_area("alice");
        area.ensure().await.unwrap();
        for name in ["a.pdf", "b.pdf", "c.pdf", "photo.png"] {
            tokio::fs::write(area.staged_path(name), b"x").await.unwrap();
        }
        let staged: HashSet<String> = ["a.pdf", "b.pdf", "c.pdf", "photo.png"]
            .into_iter()
            .map(String::from)
            .collect();
        state
            .orders()
            .replace(alice.id, vec!["photo.png".into(), "c.pdf".into(), "a.pdf".into()], &staged)
            .await
            .unwrap();

        let inputs = ordered_inputs(&state, &alice, Tool::Merge).await.unwrap();
        assert_eq!(
            inputs,
            vec![
                area.staged_path("c.pdf"),
                area.staged_path("a.pdf"),
                area.staged_path("b.pdf"),
            ]
        );
    }

    #[tokio::test]
    async fn missing_ordered_file_is_reported() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let alice = user(&state, "alice").await;
        let area = state.user_area("alice");
        area.ensure().await.unwrap();
        tokio::fs::write(area.staged_path("a.pdf"), b"x").await.unwrap();
        state.orders().append(alice.id, "gone.pdf").await;

        assert_eq!(
            ordered_inputs(&state, &alice, Tool::Merge).await,
            Err("order_stale")
        );
    }

    #[tokio::test]
    async fn nothing_of_the_right_kind() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let alice = user(&state, "alice").await;
        let area = state.user_area("alice");
        area.ensure().await.unwrap();
        tokio::fs::write(area.staged_path("a.pdf"), b"x").await.unwrap();

        assert_eq!(
            ordered_inputs(&state, &alice, Tool::Img2Pdf).await,
            Err("no_images")
        );
    }

    #[test]
    fn redirect_carries_code() {
        assert_eq!(
            location(Tool::Img2Pdf.redirect("error", "no_images")),
            "/img2pdf?error=no_images"
        );
    }
}
