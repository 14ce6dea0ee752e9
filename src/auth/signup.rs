use axum::{Json, debug_handler, extract::State, http::StatusCode};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{
    AppError, AppJson, AppResult,
    model::PublicUser,
    store::users::{self, NewUser},
};

use super::{MIN_PASSWORD_LEN, check_name, log_in, password::hash_password};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignupBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn signup(
    State(db_pool): State<SqlitePool>,
    session: Session,
    AppJson(body): AppJson<SignupBody>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let username = body.username.trim();
    let full_name = body.full_name.trim();
    let email = body.email.trim();
    if username.is_empty() || full_name.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(AppError::InvalidInput("All fields are required.".to_owned()));
    }
    check_name("Username", username)?;
    check_name("Full name", full_name)?;
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }

    let password_hash = hash_password(&body.password)?;

    let mut tx = db_pool.begin().await?;
    if users::identity_taken(&mut tx, Some(username), Some(email), None).await? {
        return Err(AppError::Conflict("Username or email already exists.".to_owned()));
    }
    let row = users::insert(
        &mut tx,
        NewUser {
            username,
            email,
            password_hash: &password_hash,
            full_name,
        },
    )
    .await?;
    let user = users::to_public(&mut tx, row).await?;
    tx.commit().await?;

    log_in(&session, &user.id).await?;
    info!("welcome @{} ({})", user.username, user.id);

    Ok((StatusCode::CREATED, Json(user)))
}
