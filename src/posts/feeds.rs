use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Serialize;

use crate::{
    AppResult,
    auth::CurrentUser,
    model::{PostView, UserId},
    social::FeedComposer,
};

/// Every feed is wrapped as `{"posts": [...]}`.
#[derive(Serialize)]
pub(crate) struct Feed {
    posts: Vec<PostView>,
}

impl From<Vec<PostView>> for Feed {
    fn from(posts: Vec<PostView>) -> Self {
        Self { posts }
    }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn all_posts(
    State(feeds): State<FeedComposer>,
    _: CurrentUser,
) -> AppResult<Json<Feed>> {
    Ok(Json(feeds.global_feed().await?.into()))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn following(
    State(feeds): State<FeedComposer>,
    CurrentUser(me): CurrentUser,
) -> AppResult<Json<Feed>> {
    Ok(Json(feeds.following_feed(&me).await?.into()))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn by_user(
    Path(username): Path<String>,
    State(feeds): State<FeedComposer>,
    _: CurrentUser,
) -> AppResult<Json<Feed>> {
    Ok(Json(feeds.user_feed(&username).await?.into()))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn liked(
    Path(user): Path<UserId>,
    State(feeds): State<FeedComposer>,
    _: CurrentUser,
) -> AppResult<Json<Feed>> {
    Ok(Json(feeds.liked_feed(&user).await?.into()))
}
