mod feeds;
mod interact;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/allPost", get(feeds::all_posts))
        .route("/following", get(feeds::following))
        .route("/user/{username}", get(feeds::by_user))
        .route("/liked/{id}", get(feeds::liked))
        .route("/create", post(interact::create))
        .route("/delete/{id}", delete(interact::delete_post))
        .route("/like/{id}", post(interact::like))
        .route("/comment", post(interact::comment))
}
