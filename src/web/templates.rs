use std::borrow::Cow;

use chrono::{Datelike, Utc};

pub const APP_TITLE: &str = "PDF Workbench";

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 2rem 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .header-bar h1 { margin: 0; }
        .header-actions { display: flex; gap: 0.75rem; align-items: center; flex-wrap: wrap; }
        .back-link { display: inline-flex; align-items: center; gap: 0.4rem; color: #1d4ed8; text-decoration: none; font-weight: 600; background: #e0f2fe; padding: 0.5rem 0.95rem; border-radius: 999px; border: 1px solid #bfdbfe; }
        .back-link:hover { background: #bfdbfe; border-color: #93c5fd; }
        .admin-link { display: inline-flex; align-items: center; gap: 0.35rem; color: #0f172a; background: #fee2e2; border: 1px solid #fecaca; padding: 0.45rem 0.9rem; border-radius: 999px; text-decoration: none; font-weight: 600; }
        .admin-link:hover { background: #fecaca; border-color: #fca5a5; }
        .logout-form button { padding: 0.5rem 1.1rem; border-radius: 999px; }
        main { padding: 2rem 1.5rem; max-width: 960px; margin: 0 auto; box-sizing: border-box; }
        section { margin-bottom: 2rem; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); }
        .panel h2 { margin-top: 0; }
        label { display: block; margin-bottom: 0.5rem; font-weight: 600; color: #0f172a; }
        input[type="checkbox"] { margin-right: 0.5rem; }
        button { padding: 0.75rem 1.2rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; transition: background 0.15s ease; }
        button:hover { background: #1d4ed8; }
        button.danger { background: #dc2626; }
        button.danger:hover { background: #b91c1c; }
        button.secondary { background: #e2e8f0; color: #0f172a; }
        table { width: 100%; border-collapse: collapse; background: #ffffff; border: 1px solid #e2e8f0; border-radius: 12px; overflow: hidden; }
        th, td { padding: 0.75rem 1rem; border-bottom: 1px solid #e2e8f0; text-align: left; }
        th { background: #f1f5f9; font-weight: 600; }
        .inline-form { display: inline; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .flash { padding: 1rem 1.25rem; border-radius: 10px; margin-bottom: 1.5rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .downloads a { color: #2563eb; text-decoration: none; margin-right: 1rem; font-weight: 600; }
        .downloads a:hover { text-decoration: underline; }
        .actions { display: flex; gap: 0.75rem; flex-wrap: wrap; align-items: center; margin-top: 1rem; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
        @media (max-width: 768px) {
            header { padding: 1.5rem 1rem; }
            main { padding: 1.5rem 1rem; }
            .header-bar { flex-direction: column; align-items: flex-start; }
            th, td { padding: 0.5rem; }
        }
"#;

const AUTH_PAGE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; display: flex; flex-direction: column; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f1f5f9; color: #0f172a; padding: 1.5rem; box-sizing: border-box; }
        main { width: 100%; max-width: 440px; display: flex; flex-direction: column; align-items: center; gap: 1.5rem; }
        .panel { background: #ffffff; padding: 2.5rem 2.25rem; border-radius: 18px; box-shadow: 0 20px 60px rgba(15, 23, 42, 0.08); width: 100%; border: 1px solid #e2e8f0; box-sizing: border-box; }
        h1 { margin: 0 0 1rem; font-size: 1.8rem; text-align: center; }
        p.description { margin: 0 0 1.5rem; color: #475569; text-align: center; font-size: 0.95rem; }
        label { display: block; margin-top: 1.2rem; font-weight: 600; color: #0f172a; }
        input { width: 100%; padding: 0.85rem; margin-top: 0.65rem; border-radius: 10px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; font-size: 1rem; box-sizing: border-box; }
        input:focus { outline: none; border-color: #2563eb; box-shadow: 0 0 0 3px rgba(37, 99, 235, 0.15); }
        button { margin-top: 2rem; width: 100%; padding: 0.95rem; border: none; border-radius: 10px; background: #2563eb; color: #ffffff; font-weight: 600; font-size: 1.05rem; cursor: pointer; }
        button:hover { background: #1d4ed8; }
        .switch { margin-top: 1.25rem; text-align: center; font-size: 0.95rem; }
        .switch a { color: #2563eb; font-weight: 600; text-decoration: none; }
        .flash { padding: 0.85rem 1rem; border-radius: 10px; margin-bottom: 1rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .app-footer { margin-top: 2rem; text-align: center; font-size: 0.85rem; color: #64748b; }
"#;

pub struct PageLayout<'a> {
    pub meta_title: &'a str,
    pub page_heading: &'a str,
    pub username: &'a str,
    pub is_admin: bool,
    pub show_back_link: bool,
    pub flash_html: Cow<'a, str>,
    pub body_html: Cow<'a, str>,
    pub extra_style_blocks: Vec<Cow<'a, str>>,
    pub body_scripts: Vec<Cow<'a, str>>,
}

/// Renders a signed-in page: header with navigation, flash banner, body.
pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        meta_title,
        page_heading,
        username,
        is_admin,
        show_back_link,
        flash_html,
        body_html,
        extra_style_blocks,
        body_scripts,
    } = layout;

    let back_link_html = if show_back_link {
        r#"<a class="back-link" href="/home">← Home</a>"#
    } else {
        ""
    };
    let admin_link_html = if is_admin {
        r#"<a class="admin-link" href="/admin">Admin console</a>"#
    } else {
        ""
    };

    let styles = std::iter::once(Cow::Borrowed(PAGE_BASE_STYLES))
        .chain(extra_style_blocks)
        .map(|block| block.into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    let scripts = body_scripts
        .into_iter()
        .map(|script| script.into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{meta_title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{page_heading}</h1>
            <div class="header-actions">
                {back_link_html}
                {admin_link_html}
                <span class="note">Signed in as <strong>{username}</strong></span>
                <form class="logout-form" method="post" action="/logout">
                    <button type="submit">Log out</button>
                </form>
            </div>
        </div>
    </header>
    <main>
        {flash_html}
{body_html}
        {footer}
    </main>
{scripts}
</body>
</html>"#,
        meta_title = escape_html(meta_title),
        page_heading = escape_html(page_heading),
        username = escape_html(username),
    )
}

pub fn render_login_page(flash_html: &str, username: &str) -> String {
    let form = format!(
        r#"<form method="post" action="/login">
                <label for="username">Username</label>
                <input id="username" name="username" value="{username}" minlength="4" maxlength="20" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" minlength="8" maxlength="20" required>
                <button type="submit">Login</button>
            </form>
            <p class="switch">No account yet? <a href="/register">Register</a></p>"#,
        username = escape_html(username),
    );
    render_auth_page("Sign in to merge and convert your files.", flash_html, &form)
}

pub fn render_register_page(flash_html: &str, username: &str) -> String {
    let form = format!(
        r#"<form method="post" action="/register">
                <label for="username">Username</label>
                <input id="username" name="username" value="{username}" minlength="4" maxlength="20" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" minlength="8" maxlength="20" required>
                <button type="submit">Register</button>
            </form>
            <p class="switch">Already registered? <a href="/login">Sign in</a></p>"#,
        username = escape_html(username),
    );
    render_auth_page(
        "New accounts can sign in once an administrator activates them.",
        flash_html,
        &form,
    )
}

fn render_auth_page(description: &str, flash_html: &str, form_html: &str) -> String {
    let footer = render_footer();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{APP_TITLE}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{AUTH_PAGE_STYLES}
    </style>
</head>
<body>
    <main>
        <section class="panel">
            <h1>{APP_TITLE}</h1>
            <p class="description">{description}</p>
            {flash_html}
            {form_html}
        </section>
        {footer}
    </main>
</body>
</html>"#,
        description = escape_html(description),
    )
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} {APP_TITLE}</footer>"#,
        year = current_year
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn login_page_keeps_escaped_username() {
        let page = render_login_page("", "<bob>");
        assert!(page.contains(r#"value="&lt;bob&gt;""#));
        assert!(page.contains(r#"action="/login""#));
    }

    #[test]
    fn page_shows_admin_link_only_for_admins() {
        let layout = |is_admin| PageLayout {
            meta_title: "t",
            page_heading: "h",
            username: "alice",
            is_admin,
            show_back_link: false,
            flash_html: Cow::Borrowed(""),
            body_html: Cow::Borrowed("<p>body</p>"),
            extra_style_blocks: Vec::new(),
            body_scripts: Vec::new(),
        };
        assert!(render_page(layout(true)).contains(r#"href="/admin""#));
        assert!(!render_page(layout(false)).contains(r#"href="/admin""#));
    }
}
