use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Serialize;

use crate::{
    AppResult,
    auth::CurrentUser,
    model::UserId,
    social::{FollowState, Inbox, RelationshipManager},
};

#[derive(Serialize)]
pub(crate) struct FollowResponse {
    message: &'static str,
    state: FollowState,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn follow(
    Path(target): Path<UserId>,
    State(relationships): State<RelationshipManager>,
    State(inbox): State<Inbox>,
    CurrentUser(me): CurrentUser,
) -> AppResult<Json<FollowResponse>> {
    let outcome = relationships.toggle_follow(&me, &target).await?;
    inbox.dispatch(outcome.events).await;

    let message = match outcome.value {
        FollowState::Followed => "Followed successfully",
        FollowState::Unfollowed => "Unfollowed successfully",
    };
    Ok(Json(FollowResponse {
        message,
        state: outcome.value,
    }))
}
