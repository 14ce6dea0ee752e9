use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::{
    AppResult,
    model::{NotificationView, UserId},
    store::notifications,
};

use super::SocialEvent;

/// Recipient-side view of the notification log.
#[derive(Clone)]
pub struct Inbox {
    db_pool: SqlitePool,
}

impl Inbox {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Persists pending events. A failed write is logged and skipped; the
    /// mutation that produced the event already stands.
    pub async fn dispatch(&self, events: Vec<SocialEvent>) -> usize {
        if events.is_empty() {
            return 0;
        }

        let mut conn = match self.db_pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("dropping {} notifications: {e}", events.len());
                return 0;
            }
        };

        let mut recorded = 0;
        for event in &events {
            match notifications::insert(&mut conn, event).await {
                Ok(id) => {
                    debug!("{} notification {id} from {} to {}", event.kind, event.from, event.to);
                    recorded += 1;
                }
                Err(e) => warn!("failed to record {} notification for {}: {e}", event.kind, event.to),
            }
        }
        recorded
    }

    /// Newest first. Does not touch read flags.
    pub async fn list(&self, recipient: &UserId) -> AppResult<Vec<NotificationView>> {
        let mut conn = self.db_pool.acquire().await?;
        notifications::for_recipient(&mut conn, recipient).await
    }

    pub async fn mark_all_read(&self, recipient: &UserId) -> AppResult<u64> {
        let mut conn = self.db_pool.acquire().await?;
        notifications::mark_all_read(&mut conn, recipient).await
    }

    /// What the inbox endpoint serves: the list as it stood, after which
    /// everything in it counts as read.
    pub async fn open(&self, recipient: &UserId) -> AppResult<Vec<NotificationView>> {
        let mut tx = self.db_pool.begin().await?;
        let listed = notifications::for_recipient(&mut tx, recipient).await?;
        notifications::mark_all_read(&mut tx, recipient).await?;
        tx.commit().await?;
        Ok(listed)
    }

    pub async fn unread_count(&self, recipient: &UserId) -> AppResult<i64> {
        let mut conn = self.db_pool.acquire().await?;
        notifications::unread_count(&mut conn, recipient).await
    }

    pub async fn clear(&self, recipient: &UserId) -> AppResult<u64> {
        let mut conn = self.db_pool.acquire().await?;
        notifications::delete_all(&mut conn, recipient).await
    }
}
