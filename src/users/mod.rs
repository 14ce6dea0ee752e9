mod follow;
mod profile;
mod update;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile/{username}", get(profile::profile))
        .route("/follow/{id}", post(follow::follow))
        .route("/suggested", get(profile::suggested))
        .route("/update-profile", post(update::update_profile))
        .route("/followers/{id}", get(profile::followers))
        .route("/followings/{id}", get(profile::followings))
}
