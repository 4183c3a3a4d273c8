use std::borrow::Cow;

use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::SignedCookieJar;
use chrono::DateTime;
use tracing::error;

use crate::web::{
    AppState, AuthUser, PageLayout, compose_flash_message, data::fetch_users, escape_html,
    models::UserRow, render_page,
};

use super::{auth::require_admin_user, types::DashboardQuery};

const DASHBOARD_STYLES: &str = r#"
        tr.current-user { border-left: 4px solid #2563eb; }
        .badge { display: inline-block; padding: 0.15rem 0.6rem; border-radius: 999px; font-size: 0.8rem; font-weight: 600; }
        .badge.on { background: #dcfce7; color: #166534; }
        .badge.off { background: #f1f5f9; color: #475569; }
        td.actions { display: flex; gap: 0.5rem; flex-wrap: wrap; }
        td.actions button { padding: 0.4rem 0.8rem; font-size: 0.85rem; }
"#;

pub async fn dashboard(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<DashboardQuery>,
) -> Result<Html<String>, Redirect> {
    let auth_user = require_admin_user(&state, &jar).await?;

    let users = fetch_users(state.pool_ref()).await.map_err(|err| {
        error!(?err, "failed to load users for admin console");
        Redirect::to("/home?error=unknown")
    })?;

    Ok(Html(render_dashboard(&auth_user, &users, &params)))
}

fn render_dashboard(auth_user: &AuthUser, users: &[UserRow], params: &DashboardQuery) -> String {
    let mut table_rows = String::new();

    if users.is_empty() {
        table_rows.push_str("<tr><td colspan=\"6\">No users yet.</td></tr>");
    }

    for user in users {
        let is_self = user.id == auth_user.id;
        let highlight = if is_self { " class=\"current-user\"" } else { "" };
        let created = DateTime::from_timestamp(user.created_at, 0)
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();

        let actions = if is_self {
            "<span class=\"note\">This is you</span>".to_string()
        } else {
            render_user_actions(user)
        };

        table_rows.push_str(&format!(
            "<tr{highlight}><td><code>{id}</code></td><td>{name}</td><td>{active}</td><td>{admin}</td><td>{created}</td><td class=\"actions\">{actions}</td></tr>",
            id = user.id,
            name = escape_html(&user.username),
            active = badge(user.is_active, "Active", "Inactive"),
            admin = badge(user.is_admin, "Admin", "User"),
        ));
    }

    let body_html = format!(
        r#"        <section class="panel">
                    <h2>Users</h2>
                    <p class="note">New accounts register themselves and stay inactive until activated here.</p>
                    <table>
                        <thead>
                            <tr><th>ID</th><th>Username</th><th>Status</th><th>Role</th><th>Created</th><th>Actions</th></tr>
                        </thead>
                        <tbody>
                            {table_rows}
                        </tbody>
                    </table>
                </section>"#
    );

    render_page(PageLayout {
        meta_title: "Admin console",
        page_heading: "Admin console",
        username: &auth_user.username,
        is_admin: true,
        show_back_link: true,
        flash_html: Cow::Owned(compose_flash_message(
            params.status.as_deref(),
            params.error.as_deref(),
        )),
        body_html: Cow::Owned(body_html),
        extra_style_blocks: vec![Cow::Borrowed(DASHBOARD_STYLES)],
        body_scripts: Vec::new(),
    })
}

fn render_user_actions(user: &UserRow) -> String {
    let id = user.id;
    let (active_value, active_label) = if user.is_active {
        ("false", "Deactivate")
    } else {
        ("true", "Activate")
    };
    let (role_value, role_label) = if user.is_admin {
        ("false", "Remove admin")
    } else {
        ("true", "Make admin")
    };

    format!(
        r#"<form method="post" action="/admin/users/active" class="inline-form"><input type="hidden" name="user_id" value="{id}"><input type="hidden" name="active" value="{active_value}"><button type="submit" class="secondary">{active_label}</button></form><form method="post" action="/admin/users/role" class="inline-form"><input type="hidden" name="user_id" value="{id}"><input type="hidden" name="is_admin" value="{role_value}"><button type="submit" class="secondary">{role_label}</button></form><form method="post" action="/admin/users/delete" class="inline-form" onsubmit="return confirm('Delete {name} and all of their files?');"><input type="hidden" name="user_id" value="{id}"><button type="submit" class="danger">Delete</button></form>"#,
        name = escape_html(&user.username),
    )
}

fn badge(on: bool, on_label: &str, off_label: &str) -> String {
    if on {
        format!("<span class=\"badge on\">{on_label}</span>")
    } else {
        format!("<span class=\"badge off\">{off_label}</span>")
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::web::state::test_support::{create_user, location, signed_in_jar, test_state};

    #[tokio::test]
    async fn lists_users_without_password_hashes() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let admin = create_user(&state, "root_admin", true, true).await;
        let pending = create_user(&state, "pending_user", false, false).await;
        let jar = signed_in_jar(&state, admin).await;

        let Html(page) = dashboard(State(state.clone()), jar, Query(DashboardQuery::default()))
            .await
            .expect("admin");
        assert!(page.contains("<th>ID</th>"));
        assert!(page.contains(&format!("<td><code>{pending}</code></td><td>pending_user</td>")));
        assert!(page.contains("pending_user"));
        assert!(page.contains("Activate"));
        assert!(page.contains("This is you"));
        assert!(!page.contains("$argon2"));
    }

    #[tokio::test]
    async fn non_admin_is_redirected_to_login() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path()).await;
        let user = create_user(&state, "regular", true, false).await;
        let jar = signed_in_jar(&state, user).await;

        let redirect = dashboard(State(state.clone()), jar, Query(DashboardQuery::default()))
            .await
            .expect_err("not an admin");
        assert_eq!(location(redirect), "/login");

        let anonymous = SignedCookieJar::new(state.cookie_key());
        let redirect = dashboard(State(state.clone()), anonymous, Query(DashboardQuery::default()))
            .await
            .expect_err("anonymous");
        assert_eq!(location(redirect), "/login");
    }
}
