use std::collections::HashMap;

use anyhow::anyhow;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    AppError, AppResult,
    db::from_millis,
    model::{CommentView, PostId, PostView, PublicUser, UserId},
    store::{
        posts::{self, PostRow},
        users,
    },
};

/// Read-only feed queries. Each one runs in a single read transaction so
/// it sees every edge pair either before or after a concurrent toggle.
#[derive(Clone)]
pub struct FeedComposer {
    db_pool: SqlitePool,
}

impl FeedComposer {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Every post, newest first.
    pub async fn global_feed(&self) -> AppResult<Vec<PostView>> {
        let mut tx = self.db_pool.begin().await?;
        let rows = posts::all(&mut tx).await?;
        let feed = hydrate(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(feed)
    }

    /// Posts by the people `actor` follows, newest first.
    pub async fn following_feed(&self, actor: &UserId) -> AppResult<Vec<PostView>> {
        let mut tx = self.db_pool.begin().await?;
        if !users::exists(&mut tx, actor).await? {
            return Err(AppError::not_found("user"));
        }
        let rows = posts::by_followed_authors(&mut tx, actor).await?;
        let feed = hydrate(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(feed)
    }

    pub async fn user_feed(&self, username: &str) -> AppResult<Vec<PostView>> {
        let mut tx = self.db_pool.begin().await?;
        let Some(author) = users::find_by_username(&mut tx, username).await? else {
            return Err(AppError::not_found("user"));
        };
        let rows = posts::by_author(&mut tx, &author.user_id()).await?;
        let feed = hydrate(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(feed)
    }

    /// Posts `user` liked. Store order, not sorted.
    pub async fn liked_feed(&self, user: &UserId) -> AppResult<Vec<PostView>> {
        let mut tx = self.db_pool.begin().await?;
        if !users::exists(&mut tx, user).await? {
            return Err(AppError::not_found("user"));
        }
        let rows = posts::liked_by(&mut tx, user).await?;
        let feed = hydrate(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(feed)
    }

    pub async fn post(&self, id: &PostId) -> AppResult<PostView> {
        let mut tx = self.db_pool.begin().await?;
        let Some(row) = posts::find(&mut tx, id).await? else {
            return Err(AppError::not_found("post"));
        };
        let mut views = hydrate(&mut tx, vec![row]).await?;
        tx.commit().await?;
        views.pop().ok_or_else(|| AppError::not_found("post"))
    }
}

async fn hydrate(conn: &mut SqliteConnection, rows: Vec<PostRow>) -> AppResult<Vec<PostView>> {
    let mut people = HashMap::new();
    let mut views = Vec::with_capacity(rows.len());

    for row in rows {
        let id = row.post_id();
        let user = resolve(conn, &mut people, &row.user_id).await?;
        let likes = posts::likes(conn, &id).await?;

        let mut comments = Vec::new();
        for comment in posts::comments(conn, &id).await? {
            comments.push(CommentView {
                user: resolve(conn, &mut people, &comment.user_id).await?,
                id: comment.id,
                text: comment.text,
                created_at: from_millis(comment.created_at),
            });
        }

        views.push(PostView {
            id,
            user,
            text: row.text,
            img: row.img,
            likes,
            comments,
            created_at: from_millis(row.created_at),
            updated_at: from_millis(row.updated_at),
        });
    }

    Ok(views)
}

async fn resolve(
    conn: &mut SqliteConnection,
    people: &mut HashMap<String, PublicUser>,
    id: &str,
) -> AppResult<PublicUser> {
    if let Some(user) = people.get(id) {
        return Ok(user.clone());
    }

    let user = users::public(conn, &UserId::from(id))
        .await?
        .ok_or_else(|| AppError::Internal(anyhow!("post references missing user {id}")))?;
    people.insert(id.to_owned(), user.clone());
    Ok(user)
}
