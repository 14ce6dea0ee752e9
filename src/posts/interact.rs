use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppJson, AppResult,
    auth::CurrentUser,
    model::{PostId, PostView},
    social::{FeedComposer, Inbox, InteractionManager, LikeState},
};

#[derive(Deserialize)]
pub(crate) struct CreateBody {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "image")]
    img: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create(
    State(interactions): State<InteractionManager>,
    State(feeds): State<FeedComposer>,
    CurrentUser(me): CurrentUser,
    AppJson(CreateBody { text, img }): AppJson<CreateBody>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let id = interactions.create_post(&me, text, img).await?;
    Ok((StatusCode::CREATED, Json(feeds.post(&id).await?)))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete_post(
    Path(id): Path<PostId>,
    State(interactions): State<InteractionManager>,
    CurrentUser(me): CurrentUser,
) -> AppResult<Json<Value>> {
    interactions.delete_post(&me, &id).await?;
    Ok(Json(json!({ "message": "Post deleted successfully." })))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn like(
    Path(id): Path<PostId>,
    State(interactions): State<InteractionManager>,
    State(inbox): State<Inbox>,
    CurrentUser(me): CurrentUser,
) -> AppResult<Json<LikeState>> {
    let outcome = interactions.toggle_like(&me, &id).await?;
    inbox.dispatch(outcome.events).await;
    Ok(Json(outcome.value))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentBody {
    post_id: PostId,
    #[serde(default)]
    text: String,
}

/// Responds with the post as it reads after the comment landed.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn comment(
    State(interactions): State<InteractionManager>,
    State(feeds): State<FeedComposer>,
    State(inbox): State<Inbox>,
    CurrentUser(me): CurrentUser,
    AppJson(CommentBody { post_id, text }): AppJson<CommentBody>,
) -> AppResult<Json<PostView>> {
    let outcome = interactions.add_comment(&me, &post_id, &text).await?;
    inbox.dispatch(outcome.events).await;
    Ok(Json(feeds.post(&post_id).await?))
}
