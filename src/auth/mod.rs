mod check;
mod login;
mod logout;
pub(crate) mod password;
mod signup;

use anyhow::anyhow;
use axum::{
    Router,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::{AppError, AppResult, AppState, model::UserId, session::USER_ID};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 3;

/// Usernames and full names are at least `MIN_NAME_LEN` characters.
pub(crate) fn check_name(field: &str, value: &str) -> AppResult<()> {
    if value.chars().count() < MIN_NAME_LEN {
        return Err(AppError::InvalidInput(format!(
            "{field} must be at least {MIN_NAME_LEN} characters."
        )));
    }
    Ok(())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup::signup))
        .route("/login", post(login::login))
        .route("/logout", post(logout::logout))
        .route("/check", get(check::check_auth))
}

/// The logged-in user, read from the session. Rejects with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Internal(anyhow!(msg)))?;

        match session.get::<String>(USER_ID).await? {
            Some(id) => Ok(CurrentUser(UserId::from(id))),
            None => Err(AppError::Unauthorized),
        }
    }
}

/// Starts a fresh session for `user`.
pub(crate) async fn log_in(session: &Session, user: &UserId) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(USER_ID, user.as_str()).await?;
    Ok(())
}
