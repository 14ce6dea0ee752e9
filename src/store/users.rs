//! Identity store: user records and the edge sets hanging off them.

use sqlx::SqliteConnection;

use crate::{
    AppResult,
    db::{from_millis, new_id, now_millis},
    model::{PostId, PublicUser, UserId},
};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub cover_picture: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserRow {
    pub fn user_id(&self) -> UserId {
        UserId(self.id.clone())
    }
}

const USER_COLUMNS: &str = "id,username,email,password_hash,full_name,profile_picture,cover_picture,bio,link,created_at,updated_at";

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
    pub profile_picture: Option<String>,
    pub cover_picture: Option<String>,
}

pub async fn insert(conn: &mut SqliteConnection, new: NewUser<'_>) -> AppResult<UserRow> {
    let id = new_id();
    let now = now_millis();
    sqlx::query(
        "INSERT INTO users (id,username,email,password_hash,full_name,created_at,updated_at) VALUES (?,?,?,?,?,?,?)",
    )
    .bind(&id)
    .bind(new.username)
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.full_name)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(UserRow {
        id,
        username: new.username.to_owned(),
        email: new.email.to_owned(),
        password_hash: new.password_hash.to_owned(),
        full_name: new.full_name.to_owned(),
        profile_picture: None,
        cover_picture: None,
        bio: None,
        link: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn find(conn: &mut SqliteConnection, id: &UserId) -> AppResult<Option<UserRow>> {
    Ok(
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id=?"))
            .bind(id.as_str())
            .fetch_optional(&mut *conn)
            .await?,
    )
}

pub async fn find_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> AppResult<Option<UserRow>> {
    Ok(
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username=?"))
            .bind(username)
            .fetch_optional(&mut *conn)
            .await?,
    )
}

pub async fn find_by_login(
    conn: &mut SqliteConnection,
    email_or_username: &str,
) -> AppResult<Option<UserRow>> {
    Ok(sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email=? OR username=? LIMIT 1"
    ))
    .bind(email_or_username)
    .bind(email_or_username)
    .fetch_optional(&mut *conn)
    .await?)
}

pub async fn exists(conn: &mut SqliteConnection, id: &UserId) -> AppResult<bool> {
    Ok(sqlx::query_scalar::<_, i64>("SELECT 1 FROM users WHERE id=?")
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .is_some())
}

/// Whether another account already holds `username` or `email`.
pub async fn identity_taken(
    conn: &mut SqliteConnection,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<&UserId>,
) -> AppResult<bool> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT 1 FROM users WHERE (username=? OR email=?) AND id IS NOT ? LIMIT 1",
    )
    .bind(username)
    .bind(email)
    .bind(except.map(UserId::as_str))
    .fetch_optional(&mut *conn)
    .await?
    .is_some())
}

pub async fn update_profile(
    conn: &mut SqliteConnection,
    id: &UserId,
    changes: &ProfileChanges,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE users SET
            username=COALESCE(?,username),
            email=COALESCE(?,email),
            full_name=COALESCE(?,full_name),
            password_hash=COALESCE(?,password_hash),
            bio=COALESCE(?,bio),
            link=COALESCE(?,link),
            profile_picture=COALESCE(?,profile_picture),
            cover_picture=COALESCE(?,cover_picture),
            updated_at=?
        WHERE id=?",
    )
    .bind(&changes.username)
    .bind(&changes.email)
    .bind(&changes.full_name)
    .bind(&changes.password_hash)
    .bind(&changes.bio)
    .bind(&changes.link)
    .bind(&changes.profile_picture)
    .bind(&changes.cover_picture)
    .bind(now_millis())
    .bind(id.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn followings(conn: &mut SqliteConnection, id: &UserId) -> AppResult<Vec<UserId>> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT target_id FROM user_followings WHERE user_id=? ORDER BY rowid",
    )
    .bind(id.as_str())
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids.into_iter().map(UserId).collect())
}

pub async fn followers(conn: &mut SqliteConnection, id: &UserId) -> AppResult<Vec<UserId>> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT follower_id FROM user_followers WHERE user_id=? ORDER BY rowid",
    )
    .bind(id.as_str())
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids.into_iter().map(UserId).collect())
}

pub async fn liked_posts(conn: &mut SqliteConnection, id: &UserId) -> AppResult<Vec<PostId>> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT post_id FROM user_liked_posts WHERE user_id=? ORDER BY rowid",
    )
    .bind(id.as_str())
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids.into_iter().map(PostId).collect())
}

/// Callers remove first, so the row is absent; a self-edge fails the CHECK.
pub async fn add_following(
    conn: &mut SqliteConnection,
    user: &UserId,
    target: &UserId,
) -> AppResult<()> {
    sqlx::query("INSERT INTO user_followings (user_id,target_id) VALUES (?,?)")
        .bind(user.as_str())
        .bind(target.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns whether an edge was actually removed.
pub async fn remove_following(
    conn: &mut SqliteConnection,
    user: &UserId,
    target: &UserId,
) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM user_followings WHERE user_id=? AND target_id=?")
        .bind(user.as_str())
        .bind(target.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_follower(
    conn: &mut SqliteConnection,
    user: &UserId,
    follower: &UserId,
) -> AppResult<()> {
    sqlx::query("INSERT INTO user_followers (user_id,follower_id) VALUES (?,?)")
        .bind(user.as_str())
        .bind(follower.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn remove_follower(
    conn: &mut SqliteConnection,
    user: &UserId,
    follower: &UserId,
) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM user_followers WHERE user_id=? AND follower_id=?")
        .bind(user.as_str())
        .bind(follower.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_liked_post(
    conn: &mut SqliteConnection,
    user: &UserId,
    post: &PostId,
) -> AppResult<()> {
    sqlx::query("INSERT OR IGNORE INTO user_liked_posts (user_id,post_id) VALUES (?,?)")
        .bind(user.as_str())
        .bind(post.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn remove_liked_post(
    conn: &mut SqliteConnection,
    user: &UserId,
    post: &PostId,
) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM user_liked_posts WHERE user_id=? AND post_id=?")
        .bind(user.as_str())
        .bind(post.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Drops every reciprocal liked-post pointer to `post`.
pub async fn forget_liked_post(conn: &mut SqliteConnection, post: &PostId) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM user_liked_posts WHERE post_id=?")
        .bind(post.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Users `actor` does not follow yet, in store order.
pub async fn suggested(
    conn: &mut SqliteConnection,
    actor: &UserId,
    limit: u32,
) -> AppResult<Vec<UserRow>> {
    Ok(sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users
        WHERE id<>? AND id NOT IN (SELECT target_id FROM user_followings WHERE user_id=?)
        ORDER BY rowid LIMIT ?"
    ))
    .bind(actor.as_str())
    .bind(actor.as_str())
    .bind(limit as i64)
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn to_public(conn: &mut SqliteConnection, row: UserRow) -> AppResult<PublicUser> {
    let id = row.user_id();
    let followers = followers(conn, &id).await?;
    let followings = followings(conn, &id).await?;
    let liked_posts = liked_posts(conn, &id).await?;

    Ok(PublicUser {
        id,
        username: row.username,
        full_name: row.full_name,
        email: row.email,
        profile_picture: row.profile_picture,
        cover_picture: row.cover_picture,
        bio: row.bio,
        link: row.link,
        followers,
        followings,
        liked_posts,
        created_at: from_millis(row.created_at),
        updated_at: from_millis(row.updated_at),
    })
}

pub async fn public(conn: &mut SqliteConnection, id: &UserId) -> AppResult<Option<PublicUser>> {
    match find(conn, id).await? {
        Some(row) => Ok(Some(to_public(conn, row).await?)),
        None => Ok(None),
    }
}

pub async fn public_many(
    conn: &mut SqliteConnection,
    ids: &[UserId],
) -> AppResult<Vec<PublicUser>> {
    let mut users = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = public(conn, id).await? {
            users.push(user);
        }
    }
    Ok(users)
}
