use axum::{Json, debug_handler, extract::State};
use sqlx::SqlitePool;

use crate::{AppError, AppResult, model::PublicUser, store::users};

use super::CurrentUser;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn check_auth(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<PublicUser>> {
    let mut conn = db_pool.acquire().await?;
    let user = users::public(&mut conn, &user)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(user))
}
