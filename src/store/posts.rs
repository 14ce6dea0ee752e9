//! Post store: posts, their like sets and their embedded comment lists.

use sqlx::SqliteConnection;

use crate::{
    AppResult,
    db::{new_id, now_millis},
    model::{PostId, UserId},
};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub text: Option<String>,
    pub img: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PostRow {
    pub fn post_id(&self) -> PostId {
        PostId(self.id.clone())
    }

    pub fn author(&self) -> UserId {
        UserId(self.user_id.clone())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: i64,
}

const POST_COLUMNS: &str = "posts.id,posts.user_id,posts.text,posts.img,posts.created_at,posts.updated_at";

// newest first; insertion order breaks same-millisecond ties
const NEWEST_FIRST: &str = "ORDER BY posts.created_at DESC, posts.rowid DESC";

pub async fn insert(
    conn: &mut SqliteConnection,
    author: &UserId,
    text: Option<&str>,
    img: Option<&str>,
) -> AppResult<PostRow> {
    let id = new_id();
    let now = now_millis();
    sqlx::query("INSERT INTO posts (id,user_id,text,img,created_at,updated_at) VALUES (?,?,?,?,?,?)")
        .bind(&id)
        .bind(author.as_str())
        .bind(text)
        .bind(img)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(PostRow {
        id,
        user_id: author.0.clone(),
        text: text.map(str::to_owned),
        img: img.map(str::to_owned),
        created_at: now,
        updated_at: now,
    })
}

pub async fn find(conn: &mut SqliteConnection, id: &PostId) -> AppResult<Option<PostRow>> {
    Ok(
        sqlx::query_as::<_, PostRow>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE posts.id=?"))
            .bind(id.as_str())
            .fetch_optional(&mut *conn)
            .await?,
    )
}

/// Removes the post together with everything embedded in it.
pub async fn delete(conn: &mut SqliteConnection, id: &PostId) -> AppResult<bool> {
    for table in ["comments", "post_likes"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE post_id=?"))
            .bind(id.as_str())
            .execute(&mut *conn)
            .await?;
    }

    let result = sqlx::query("DELETE FROM posts WHERE id=?")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn all(conn: &mut SqliteConnection) -> AppResult<Vec<PostRow>> {
    Ok(
        sqlx::query_as::<_, PostRow>(&format!("SELECT {POST_COLUMNS} FROM posts {NEWEST_FIRST}"))
            .fetch_all(&mut *conn)
            .await?,
    )
}

pub async fn by_author(conn: &mut SqliteConnection, author: &UserId) -> AppResult<Vec<PostRow>> {
    Ok(sqlx::query_as::<_, PostRow>(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE posts.user_id=? {NEWEST_FIRST}"
    ))
    .bind(author.as_str())
    .fetch_all(&mut *conn)
    .await?)
}

/// Posts written by anyone `actor` follows.
pub async fn by_followed_authors(
    conn: &mut SqliteConnection,
    actor: &UserId,
) -> AppResult<Vec<PostRow>> {
    Ok(sqlx::query_as::<_, PostRow>(&format!(
        "SELECT {POST_COLUMNS} FROM posts
        WHERE posts.user_id IN (SELECT target_id FROM user_followings WHERE user_id=?)
        {NEWEST_FIRST}"
    ))
    .bind(actor.as_str())
    .fetch_all(&mut *conn)
    .await?)
}

/// Posts in `user`'s liked set, in the order the store holds the posts.
pub async fn liked_by(conn: &mut SqliteConnection, user: &UserId) -> AppResult<Vec<PostRow>> {
    Ok(sqlx::query_as::<_, PostRow>(&format!(
        "SELECT {POST_COLUMNS} FROM posts
        WHERE posts.id IN (SELECT post_id FROM user_liked_posts WHERE user_id=?)
        ORDER BY posts.rowid"
    ))
    .bind(user.as_str())
    .fetch_all(&mut *conn)
    .await?)
}

pub async fn likes(conn: &mut SqliteConnection, post: &PostId) -> AppResult<Vec<UserId>> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT user_id FROM post_likes WHERE post_id=? ORDER BY rowid",
    )
    .bind(post.as_str())
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids.into_iter().map(UserId).collect())
}

pub async fn add_like(conn: &mut SqliteConnection, post: &PostId, user: &UserId) -> AppResult<()> {
    sqlx::query("INSERT OR IGNORE INTO post_likes (post_id,user_id) VALUES (?,?)")
        .bind(post.as_str())
        .bind(user.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns whether `user` was in the like set.
pub async fn remove_like(
    conn: &mut SqliteConnection,
    post: &PostId,
    user: &UserId,
) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM post_likes WHERE post_id=? AND user_id=?")
        .bind(post.as_str())
        .bind(user.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn push_comment(
    conn: &mut SqliteConnection,
    post: &PostId,
    author: &UserId,
    text: &str,
) -> AppResult<CommentRow> {
    let id = new_id();
    let now = now_millis();
    sqlx::query("INSERT INTO comments (id,post_id,user_id,text,created_at) VALUES (?,?,?,?,?)")
        .bind(&id)
        .bind(post.as_str())
        .bind(author.as_str())
        .bind(text)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE posts SET updated_at=? WHERE id=?")
        .bind(now)
        .bind(post.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(CommentRow {
        id,
        user_id: author.0.clone(),
        text: text.to_owned(),
        created_at: now,
    })
}

/// Comments in arrival order.
pub async fn comments(conn: &mut SqliteConnection, post: &PostId) -> AppResult<Vec<CommentRow>> {
    Ok(sqlx::query_as::<_, CommentRow>(
        "SELECT id,user_id,text,created_at FROM comments WHERE post_id=? ORDER BY rowid",
    )
    .bind(post.as_str())
    .fetch_all(&mut *conn)
    .await?)
}
