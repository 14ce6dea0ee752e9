use axum::{Json, Router, debug_handler, extract::State, routing::get};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{AppResult, AppState, auth::CurrentUser, model::NotificationView, social::Inbox};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(open).delete(clear))
        .route("/unread", get(unread))
}

/// Lists the inbox, newest first, then marks all of it read. Items show
/// the state they had before this call.
#[debug_handler(state = AppState)]
async fn open(
    State(inbox): State<Inbox>,
    CurrentUser(me): CurrentUser,
) -> AppResult<Json<Vec<NotificationView>>> {
    Ok(Json(inbox.open(&me).await?))
}

#[debug_handler(state = AppState)]
async fn clear(State(inbox): State<Inbox>, CurrentUser(me): CurrentUser) -> AppResult<Json<Value>> {
    let deleted = inbox.clear(&me).await?;
    Ok(Json(json!({ "message": "Notifications deleted", "deleted": deleted })))
}

#[derive(Serialize)]
struct Unread {
    unread: i64,
}

#[debug_handler(state = AppState)]
async fn unread(State(inbox): State<Inbox>, CurrentUser(me): CurrentUser) -> AppResult<Json<Unread>> {
    Ok(Json(Unread {
        unread: inbox.unread_count(&me).await?,
    }))
}
