use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{AppError, AppJson, AppResult, model::PublicUser, store::users};

use super::{log_in, password::verify_password};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginBody {
    #[serde(default)]
    email_or_username: String,
    #[serde(default)]
    password: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,
    AppJson(LoginBody {
        email_or_username,
        password,
    }): AppJson<LoginBody>,
) -> AppResult<Json<PublicUser>> {
    let login = email_or_username.trim();
    if login.is_empty() || password.is_empty() {
        return Err(AppError::InvalidInput("All fields are required.".to_owned()));
    }

    let mut conn = db_pool.acquire().await?;
    let Some(row) = users::find_by_login(&mut conn, login).await? else {
        return Err(AppError::Unauthorized);
    };
    if !verify_password(&password, &row.password_hash)? {
        return Err(AppError::Unauthorized);
    }
    let user = users::to_public(&mut conn, row).await?;
    drop(conn);

    log_in(&session, &user.id).await?;
    info!("@{} logged in", user.username);

    Ok(Json(user))
}
