use axum::response::Redirect;
use axum_extra::extract::cookie::SignedCookieJar;

use crate::web::{AppState, AuthUser, auth};

/// Resolves the session to an active administrator. Anonymous visitors and
/// non-admins are both sent to the login page.
pub async fn require_admin_user(
    state: &AppState,
    jar: &SignedCookieJar,
) -> Result<AuthUser, Redirect> {
    let auth_user = auth::require_user_redirect(state, jar).await?;

    if !auth_user.is_admin {
        return Err(Redirect::to("/login"));
    }

    Ok(auth_user)
}
