use axum::{
    extract::{Form, State},
    response::Redirect,
};
use axum_extra::extract::cookie::SignedCookieJar;
use tracing::{error, info, warn};

use crate::web::{AppState, data::fetch_user};

use super::{
    auth::require_admin_user,
    types::{ActiveForm, RoleForm, UserIdForm},
};

pub async fn set_user_active(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(form): Form<ActiveForm>,
) -> Result<Redirect, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    if form.user_id == admin.id {
        return Ok(Redirect::to("/admin?error=self_action"));
    }

    let mut transaction = match state.pool_ref().begin().await {
        Ok(tx) => tx,
        Err(err) => {
            error!(?err, "failed to start transaction");
            return Ok(Redirect::to("/admin?error=unknown"));
        }
    };

    let updated = sqlx::query("UPDATE users SET is_active = ?2 WHERE id = ?1")
        .bind(form.user_id)
        .bind(form.active)
        .execute(&mut *transaction)
        .await;

    match updated {
        Ok(res) if res.rows_affected() > 0 => {}
        Ok(_) => return Ok(Redirect::to("/admin?error=user_missing")),
        Err(err) => {
            error!(?err, "failed to update user activation");
            return Ok(Redirect::to("/admin?error=unknown"));
        }
    }

    if !form.active {
        if let Err(err) = sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(form.user_id)
            .execute(&mut *transaction)
            .await
        {
            error!(?err, "failed to end sessions of deactivated user");
            return Ok(Redirect::to("/admin?error=unknown"));
        }
    }

    if let Err(err) = transaction.commit().await {
        error!(?err, "failed to commit user activation");
        return Ok(Redirect::to("/admin?error=unknown"));
    }

    info!(
        admin = %admin.username,
        user_id = %form.user_id,
        active = form.active,
        "changed user activation"
    );
    if form.active {
        Ok(Redirect::to("/admin?status=user_activated"))
    } else {
        Ok(Redirect::to("/admin?status=user_deactivated"))
    }
}

pub async fn set_user_role(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(form): Form<RoleForm>,
) -> Result<Redirect, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    if form.user_id == admin.id {
        return Ok(Redirect::to("/admin?error=self_action"));
    }

    let result = sqlx::query("UPDATE users SET is_admin = ?2 WHERE id = ?1")
        .bind(form.user_id)
        .bind(form.is_admin)
        .execute(state.pool_ref())
        .await;

    match result {
        Ok(res) if res.rows_affected() > 0 => {
            info!(
                admin = %admin.username,
                user_id = %form.user_id,
                is_admin = form.is_admin,
                "changed user role"
            );
            if form.is_admin {
                Ok(Redirect::to("/admin?status=user_promoted"))
            } else {
                Ok(Redirect::to("/admin?status=user_demoted"))
            }
        }
        Ok(_) => Ok(Redirect::to("/admin?error=user_missing")),
        Err(err) => {
            error!(?err, "failed to update user role");
            Ok(Redirect::to("/admin?error=unknown"))
        }
    }
}

/// Deletes the account, its sessions, its merge order and its files.
pub async fn delete_user(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(form): Form<UserIdForm>,
) -> Result<Redirect, Redirect> {
    let admin = require_admin_user(&state, &jar).await?;

    if form.user_id == admin.id {
        return Ok(Redirect::to("/admin?error=self_action"));
    }

    let user = match fetch_user(state.pool_ref(), form.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Ok(Redirect::to("/admin?error=user_missing")),
        Err(err) => {
            error!(?err, "failed to load user for deletion");
            return Ok(Redirect::to("/admin?error=unknown"));
        }
    };

    let deleted: sqlx::Result<()> = async {
        let mut transaction = state.pool_ref().begin().await?;
        sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user.id)
            .execute(&mut *transaction)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(user.id)
            .execute(&mut *transaction)
            .await?;
        transaction.commit().await
    }
    .await;

    if let Err(err) = deleted {
        error!(?err, "failed to delete user");
        return Ok(Redirect::to("/admin?error=unknown"));
    }

    state.orders().clear(user.id).await;
    let area = state.user_area(&user.username);
    if let Err(err) = area.remove().await {
        warn!(?err, path = %area.root().display(), "deleted user but could not remove their files");
    }

    info!(admin = %admin.username, username = %user.username, "deleted user");
    Ok(Redirect::to("/admin?status=user_deleted"))
}
