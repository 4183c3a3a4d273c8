use axum::{
    Form, Router,
    extract::{Multipart, Query, State},
    response::{Html, Redirect},
    routing::{get, post},
};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;
use tracing::{error, info};

use super::tool::{Tool, ToolPageQuery, handle_upload, ordered_inputs, render_tool_page};
use crate::{
    pdf::{self, ConvertOptions},
    web::{AppState, auth},
};

#[derive(Default, Deserialize)]
pub struct ConvertForm {
    #[serde(default)]
    pub enhance: Option<String>,
}

impl ConvertForm {
    fn options(&self) -> ConvertOptions {
        ConvertOptions {
            enhance: matches!(
                self.enhance.as_deref().map(str::trim),
                Some("on" | "true" | "1" | "yes")
            ),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/img2pdf", get(img2pdf_page).post(upload_images))
        .route("/run_img2pdf", post(run_img2pdf))
}

async fn img2pdf_page(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<ToolPageQuery>,
) -> Result<Html<String>, Redirect> {
    let user = auth::require_user_redirect(&state, &jar).await?;
    Ok(render_tool_page(&state, &user, Tool::Img2Pdf, &params).await)
}

async fn upload_images(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    multipart: Multipart,
) -> Result<Redirect, Redirect> {
    let user = auth::require_user_redirect(&state, &jar).await?;
    Ok(handle_upload(&state, &user, Tool::Img2Pdf, multipart).await)
}

/// Builds `merged_images.pdf` from the caller's staged images, one page each.
async fn run_img2pdf(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(form): Form<ConvertForm>,
) -> Result<Redirect, Redirect> {
    let user = auth::require_user_redirect(&state, &jar).await?;
    let tool = Tool::Img2Pdf;

    let inputs = match ordered_inputs(&state, &user, tool).await {
        Ok(inputs) => inputs,
        Err(code) => return Ok(tool.redirect("error", code)),
    };
    let options = form.options();
    let output = state
        .user_area(&user.username)
        .output_path(tool.output_name());

    match pdf::images_to_pdf_blocking(inputs, output, options).await {
        Ok(pages) => {
            info!(
                username = %user.username,
                pages,
                enhance = options.enhance,
                "converted images to PDF"
            );
            Ok(tool.redirect("status", "converted"))
        }
        Err(err) => {
            error!(?err, username = %user.username, "failed to convert images");
            Ok(tool.redirect("error", "convert_failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use lopdf::Document;
    use tempfile::tempdir;

    use super::*;
    use crate::{
        pdf::{jpeg_bytes, png_bytes},
        web::{
            state::test_support::{create_user, location, signed_in_jar, test_state},
            storage::{MERGED_IMAGES_PDF, MERGED_PDF},
            uploads::tests::multipart_from,
        },
    };

    fn enhance(value: Option<&str>) -> Form<ConvertForm> {
        Form(ConvertForm {
            enhance: value.map(String::from),
        })
    }

    #[test]
    fn checkbox_values_enable_enhance() {
        assert!(enhance(Some("on")).0.options().enhance);
        assert!(!enhance(None).0.options().enhance);
        assert!(!enhance(Some("off")).0.options().enhance);
    }

    #[tokio::test]
    async fn converts_images_in_upload_order() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let user_id = create_user(&state, "alice", true, false).await;
        let jar = signed_in_jar(&state, user_id).await;

        let jpeg = jpeg_bytes(300, 200);
        let png = png_bytes(40, 80, 2);
        let multipart = multipart_from(&[
            ("file", Some("wide.jpg"), jpeg.as_slice()),
            ("file", Some("tall.png"), png.as_slice()),
        ])
        .await;
        let redirect = upload_images(State(state.clone()), jar.clone(), multipart)
            .await
            .expect("signed in");
        assert_eq!(location(redirect), "/img2pdf?status=uploaded");

        let redirect = run_img2pdf(State(state.clone()), jar, enhance(None))
            .await
            .expect("signed in");
        assert_eq!(location(redirect), "/img2pdf?status=converted");

        let area = state.user_area("alice");
        let doc = Document::load(area.output_path(MERGED_IMAGES_PDF)).unwrap();
        let widths: Vec<f32> = doc
            .get_pages()
            .into_values()
            .map(|id| {
                let page = doc.get_object(id).unwrap().as_dict().unwrap();
                let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
                media_box[2].as_float().unwrap()
            })
            .collect();
        assert_eq!(widths, vec![300.0, 40.0]);
        assert!(!area.output_path(MERGED_PDF).exists());
    }

    #[tokio::test]
    async fn transparent_png_reports_conversion_failure() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let user_id = create_user(&state, "alice", true, false).await;
        let jar = signed_in_jar(&state, user_id).await;

        let png = png_bytes(10, 10, 6);
        let multipart = multipart_from(&[("file", Some("alpha.png"), png.as_slice())]).await;
        upload_images(State(state.clone()), jar.clone(), multipart)
            .await
            .expect("signed in");

        let redirect = run_img2pdf(State(state.clone()), jar, enhance(Some("on")))
            .await
            .expect("signed in");
        assert_eq!(location(redirect), "/img2pdf?error=convert_failed");
    }

    #[tokio::test]
    async fn pdf_upload_is_rejected_here() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let user_id = create_user(&state, "alice", true, false).await;
        let jar = signed_in_jar(&state, user_id).await;

        let multipart = multipart_from(&[("file", Some("a.pdf"), b"%PDF-1.5")]).await;
        let redirect = upload_images(State(state.clone()), jar, multipart)
            .await
            .expect("signed in");
        assert_eq!(location(redirect), "/img2pdf?error=upload_rejected");
    }
}
