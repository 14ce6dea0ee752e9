//! Notification store: append-only log of directed social events.

use anyhow::anyhow;
use sqlx::SqliteConnection;

use crate::{
    AppError, AppResult,
    db::{from_millis, new_id, now_millis},
    model::{NotificationKind, NotificationView, PostId, UserCard, UserId},
    social::SocialEvent,
};

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: String,
    from_id: String,
    from_username: String,
    from_picture: Option<String>,
    to_id: String,
    kind: String,
    post_id: Option<String>,
    read: bool,
    created_at: i64,
}

impl NotificationRow {
    fn into_view(self) -> AppResult<NotificationView> {
        let Some(kind) = NotificationKind::parse(&self.kind) else {
            return Err(AppError::Internal(anyhow!(
                "notification {} has unknown kind {:?}",
                self.id,
                self.kind
            )));
        };

        Ok(NotificationView {
            id: self.id,
            from: UserCard {
                id: UserId(self.from_id),
                username: self.from_username,
                profile_picture: self.from_picture,
            },
            to: UserId(self.to_id),
            kind,
            post: self.post_id.map(PostId),
            read: self.read,
            created_at: from_millis(self.created_at),
        })
    }
}

pub async fn insert(conn: &mut SqliteConnection, event: &SocialEvent) -> AppResult<String> {
    let id = new_id();
    sqlx::query(
        "INSERT INTO notifications (id,from_id,to_id,kind,post_id,read,created_at) VALUES (?,?,?,?,?,0,?)",
    )
    .bind(&id)
    .bind(event.from.as_str())
    .bind(event.to.as_str())
    .bind(event.kind.as_str())
    .bind(event.post.as_ref().map(PostId::as_str))
    .bind(now_millis())
    .execute(&mut *conn)
    .await?;
    Ok(id)
}

/// Everything addressed to `to`, newest first.
pub async fn for_recipient(
    conn: &mut SqliteConnection,
    to: &UserId,
) -> AppResult<Vec<NotificationView>> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT n.id, n.from_id, u.username AS from_username, u.profile_picture AS from_picture,
            n.to_id, n.kind, n.post_id, n.read, n.created_at
        FROM notifications n JOIN users u ON u.id = n.from_id
        WHERE n.to_id=?
        ORDER BY n.created_at DESC, n.rowid DESC",
    )
    .bind(to.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(NotificationRow::into_view).collect()
}

pub async fn mark_all_read(conn: &mut SqliteConnection, to: &UserId) -> AppResult<u64> {
    let result = sqlx::query("UPDATE notifications SET read=1 WHERE to_id=? AND read=0")
        .bind(to.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn unread_count(conn: &mut SqliteConnection, to: &UserId) -> AppResult<i64> {
    Ok(
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE to_id=? AND read=0")
            .bind(to.as_str())
            .fetch_one(&mut *conn)
            .await?,
    )
}

pub async fn delete_all(conn: &mut SqliteConnection, to: &UserId) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM notifications WHERE to_id=?")
        .bind(to.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        store::users::{self, NewUser},
    };

    async fn user(conn: &mut SqliteConnection, name: &str) -> UserId {
        let email = format!("{name}@example.com");
        let row = users::insert(
            conn,
            NewUser {
                username: name,
                email: &email,
                password_hash: "$argon2id$stub",
                full_name: name,
            },
        )
        .await
        .unwrap();
        UserId(row.id)
    }

    #[tokio::test]
    async fn lists_newest_first_with_sender_card() {
        let db_pool = db::in_memory().await.unwrap();
        let mut conn = db_pool.acquire().await.unwrap();
        let alice = user(&mut conn, "alice").await;
        let bob = user(&mut conn, "bob").await;

        insert(&mut conn, &SocialEvent::follow(&bob, &alice)).await.unwrap();
        let second = insert(&mut conn, &SocialEvent::follow(&bob, &alice)).await.unwrap();

        let list = for_recipient(&mut conn, &alice).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second);
        assert_eq!(list[0].from.username, "bob");
        assert_eq!(list[0].kind, NotificationKind::Follow);
        assert!(for_recipient(&mut conn, &bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_kind_is_an_internal_error() {
        let db_pool = db::in_memory().await.unwrap();
        let mut conn = db_pool.acquire().await.unwrap();
        let alice = user(&mut conn, "alice").await;
        let bob = user(&mut conn, "bob").await;
        let id = insert(&mut conn, &SocialEvent::follow(&bob, &alice)).await.unwrap();

        sqlx::query("PRAGMA ignore_check_constraints = ON")
            .execute(&mut *conn)
            .await
            .unwrap();
        sqlx::query("UPDATE notifications SET kind='poke' WHERE id=?")
            .bind(&id)
            .execute(&mut *conn)
            .await
            .unwrap();

        let result = for_recipient(&mut conn, &alice).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
