use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{
    AppError, AppJson, AppResult,
    auth::{
        CurrentUser, MIN_PASSWORD_LEN, check_name,
        password::{hash_password, verify_password},
    },
    blob::BlobStore,
    model::PublicUser,
    store::users::{self, ProfileChanges},
};

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct UpdateProfileBody {
    full_name: Option<String>,
    email: Option<String>,
    username: Option<String>,
    current_password: Option<String>,
    new_password: Option<String>,
    bio: Option<String>,
    link: Option<String>,
    profile_picture: Option<String>,
    cover_picture: Option<String>,
}

/// Blank strings count as "leave unchanged".
fn given(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn update_profile(
    State(db_pool): State<SqlitePool>,
    State(blobs): State<Arc<dyn BlobStore>>,
    CurrentUser(me): CurrentUser,
    AppJson(body): AppJson<UpdateProfileBody>,
) -> AppResult<Json<PublicUser>> {
    let current_password = body.current_password.filter(|p| !p.is_empty());
    let new_password = body.new_password.filter(|p| !p.is_empty());
    let mut changes = ProfileChanges {
        username: given(body.username),
        email: given(body.email),
        full_name: given(body.full_name),
        bio: given(body.bio),
        link: given(body.link),
        ..Default::default()
    };
    if let Some(username) = &changes.username {
        check_name("Username", username)?;
    }
    if let Some(full_name) = &changes.full_name {
        check_name("Full name", full_name)?;
    }
    let profile_picture = given(body.profile_picture);
    let cover_picture = given(body.cover_picture);

    let mut conn = db_pool.acquire().await?;
    let Some(row) = users::find(&mut conn, &me).await? else {
        return Err(AppError::Unauthorized);
    };

    match (current_password, new_password) {
        (None, None) => {}
        (Some(current), Some(new)) => {
            if !verify_password(&current, &row.password_hash)? {
                return Err(AppError::InvalidInput("Invalid password".to_owned()));
            }
            if new.chars().count() < MIN_PASSWORD_LEN {
                return Err(AppError::InvalidInput(format!(
                    "Password must be at least {MIN_PASSWORD_LEN} characters"
                )));
            }
            changes.password_hash = Some(hash_password(&new)?);
        }
        _ => {
            return Err(AppError::InvalidInput(
                "Please enter your current password and new password".to_owned(),
            ));
        }
    }

    if (changes.username.is_some() || changes.email.is_some())
        && users::identity_taken(
            &mut conn,
            changes.username.as_deref(),
            changes.email.as_deref(),
            Some(&me),
        )
        .await?
    {
        return Err(AppError::Conflict("Username or email already exists.".to_owned()));
    }
    drop(conn);

    let mut uploaded = Vec::new();
    let mut replaced = Vec::new();
    if let Some(payload) = profile_picture {
        let url = upload(blobs.as_ref(), &payload, "profile_pictures", &mut uploaded).await?;
        changes.profile_picture = Some(url);
        replaced.extend(row.profile_picture.clone());
    }
    if let Some(payload) = cover_picture {
        let url = upload(blobs.as_ref(), &payload, "cover_pictures", &mut uploaded).await?;
        changes.cover_picture = Some(url);
        replaced.extend(row.cover_picture.clone());
    }

    let saved = async {
        let mut tx = db_pool.begin().await?;
        users::update_profile(&mut tx, &me, &changes).await?;
        let user = users::public(&mut tx, &me)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;
        tx.commit().await?;
        Ok::<_, AppError>(user)
    }
    .await;

    match saved {
        Ok(user) => {
            discard(blobs.as_ref(), &replaced).await;
            info!("@{} updated their profile", user.username);
            Ok(Json(user))
        }
        Err(e) => {
            discard(blobs.as_ref(), &uploaded).await;
            Err(e)
        }
    }
}

/// Uploads one picture. On failure, everything uploaded so far for this
/// request is thrown away.
async fn upload(
    blobs: &dyn BlobStore,
    payload: &str,
    folder: &str,
    uploaded: &mut Vec<String>,
) -> AppResult<String> {
    match blobs.upload(payload, folder).await {
        Ok(url) => {
            uploaded.push(url.clone());
            Ok(url)
        }
        Err(e) => {
            discard(blobs, uploaded).await;
            Err(e.into())
        }
    }
}

async fn discard(blobs: &dyn BlobStore, urls: &[String]) {
    for url in urls {
        if let Err(e) = blobs.destroy(url).await {
            warn!("failed to destroy blob {url}: {e}");
        }
    }
}
