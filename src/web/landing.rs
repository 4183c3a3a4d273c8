use std::borrow::Cow;

use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;

use crate::web::{
    AppState, AuthUser, PageLayout, auth, compose_flash_message, escape_html, render_page,
    templates::APP_TITLE,
};

const LANDING_STYLES: &str = r#"
        .modules-grid { display: grid; gap: 1.5rem; grid-template-columns: repeat(auto-fit, minmax(240px, 1fr)); }
        .module-card { display: block; background: #ffffff; padding: 1.75rem; border-radius: 16px; text-decoration: none; color: inherit; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); transition: transform 0.15s ease, box-shadow 0.15s ease, border 0.15s ease; border: 1px solid #e2e8f0; }
        .module-card:hover { transform: translateY(-4px); box-shadow: 0 24px 55px rgba(15, 23, 42, 0.12); border-color: #bfdbfe; }
        .module-card h2 { margin-top: 0; margin-bottom: 0.75rem; font-size: 1.25rem; }
        .module-card p { margin: 0 0 1.25rem 0; color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .module-card .cta { font-weight: 600; color: #2563eb; }
"#;

#[derive(Default, Deserialize)]
pub struct LandingQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

pub async fn index(State(state): State<AppState>, jar: SignedCookieJar) -> Redirect {
    match auth::current_user(&state, &jar).await {
        Some(_) => Redirect::to("/home"),
        None => Redirect::to("/login"),
    }
}

pub async fn home_page(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<LandingQuery>,
) -> Result<Html<String>, Redirect> {
    let user = auth::require_user_redirect(&state, &jar).await?;
    Ok(Html(render_home_page(&user, &params)))
}

fn render_home_page(user: &AuthUser, params: &LandingQuery) -> String {
    let tools = [
        (
            "Merge PDFs",
            "Upload PDF files, drag them into order and combine them into one document.",
            "/merge",
        ),
        (
            "Images to PDF",
            "Turn JPEG and PNG images into a single PDF with one page per image.",
            "/img2pdf",
        ),
    ];

    let module_cards = tools
        .iter()
        .map(|(title, description, href)| {
            format!(
                r#"<a class="module-card" href="{href}"><h2>{title}</h2><p>{description}</p><span class="cta">Open →</span></a>"#,
                title = escape_html(title),
                description = escape_html(description),
            )
        })
        .collect::<String>();

    let body_html = format!(
        r#"        <div class="modules-grid">
            {module_cards}
        </div>"#
    );

    render_page(PageLayout {
        meta_title: APP_TITLE,
        page_heading: APP_TITLE,
        username: &user.username,
        is_admin: user.is_admin,
        show_back_link: false,
        flash_html: Cow::Owned(compose_flash_message(
            params.status.as_deref(),
            params.error.as_deref(),
        )),
        body_html: Cow::Owned(body_html),
        extra_style_blocks: vec![Cow::Borrowed(LANDING_STYLES)],
        body_scripts: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::web::state::test_support::{create_user, location, signed_in_jar, test_state};

    #[tokio::test]
    async fn index_routes_by_session() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let anonymous = SignedCookieJar::new(state.cookie_key());
        assert_eq!(location(index(State(state.clone()), anonymous).await), "/login");

        let user_id = create_user(&state, "alice", true, false).await;
        let jar = signed_in_jar(&state, user_id).await;
        assert_eq!(location(index(State(state.clone()), jar).await), "/home");
    }

    #[tokio::test]
    async fn home_lists_both_tools() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let user_id = create_user(&state, "alice", true, false).await;
        let jar = signed_in_jar(&state, user_id).await;

        let Html(page) = home_page(State(state.clone()), jar, Query(LandingQuery::default()))
            .await
            .expect("signed in");
        assert!(page.contains(r#"href="/merge""#));
        assert!(page.contains(r#"href="/img2pdf""#));
        assert!(!page.contains(r#"href="/admin""#));
    }
}
