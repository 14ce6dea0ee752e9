use axum::{
    Json, debug_handler,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    AppError, AppResult,
    auth::CurrentUser,
    model::{PublicUser, UserId},
    social::{DEFAULT_SUGGESTIONS, RelationshipManager},
    store::users,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn profile(
    Path(username): Path<String>,
    State(db_pool): State<SqlitePool>,
    _: CurrentUser,
) -> AppResult<Json<PublicUser>> {
    let mut tx = db_pool.begin().await?;
    let Some(row) = users::find_by_username(&mut tx, &username).await? else {
        return Err(AppError::not_found("user"));
    };
    let user = users::to_public(&mut tx, row).await?;
    tx.commit().await?;
    Ok(Json(user))
}

#[derive(Deserialize)]
pub(crate) struct SuggestedQuery {
    limit: Option<u32>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn suggested(
    Query(SuggestedQuery { limit }): Query<SuggestedQuery>,
    State(relationships): State<RelationshipManager>,
    CurrentUser(me): CurrentUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    let limit = limit.unwrap_or(DEFAULT_SUGGESTIONS);
    Ok(Json(relationships.suggested_users(&me, limit).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn followers(
    Path(id): Path<UserId>,
    State(relationships): State<RelationshipManager>,
    _: CurrentUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    Ok(Json(relationships.followers(&id).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn followings(
    Path(id): Path<UserId>,
    State(relationships): State<RelationshipManager>,
    _: CurrentUser,
) -> AppResult<Json<Vec<PublicUser>>> {
    Ok(Json(relationships.followings(&id).await?))
}
