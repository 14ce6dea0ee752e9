use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use crate::{
    AppError, AppResult,
    blob::BlobStore,
    model::{NotificationKind, PostId, UserId},
    store::{posts, users},
};

use super::{Outcome, SocialEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub liked: bool,
    /// Unordered: callers must not read meaning into the order.
    pub likes: Vec<UserId>,
}

/// Likes, comments and the post lifecycle.
#[derive(Clone)]
pub struct InteractionManager {
    db_pool: SqlitePool,
    blobs: Arc<dyn BlobStore>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl InteractionManager {
    pub fn new(db_pool: SqlitePool, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db_pool, blobs }
    }

    /// Flips the actor's like on `post`. The post's like set and the
    /// actor's liked-post list change in one transaction.
    #[instrument(skip(self))]
    pub async fn toggle_like(&self, actor: &UserId, post: &PostId) -> AppResult<Outcome<LikeState>> {
        let mut tx = self.db_pool.begin().await?;

        if posts::remove_like(&mut tx, post, actor).await? {
            users::remove_liked_post(&mut tx, actor, post).await?;
            let likes = posts::likes(&mut tx, post).await?;
            tx.commit().await?;

            info!("{actor} unliked {post}");
            return Ok(Outcome::quiet(LikeState {
                liked: false,
                likes,
            }));
        }

        let Some(row) = posts::find(&mut tx, post).await? else {
            return Err(AppError::not_found("post"));
        };

        posts::add_like(&mut tx, post, actor).await?;
        users::add_liked_post(&mut tx, actor, post).await?;
        let likes = posts::likes(&mut tx, post).await?;
        tx.commit().await?;

        info!("{actor} liked {post}");
        Ok(Outcome::with_events(
            LikeState { liked: true, likes },
            SocialEvent::on_post(NotificationKind::Like, actor, &row.author(), post),
        ))
    }

    /// Appends a comment and returns its id.
    #[instrument(skip(self, text))]
    pub async fn add_comment(
        &self,
        actor: &UserId,
        post: &PostId,
        text: &str,
    ) -> AppResult<Outcome<String>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidInput("Please enter a comment.".to_owned()));
        }

        let mut tx = self.db_pool.begin().await?;
        let Some(row) = posts::find(&mut tx, post).await? else {
            return Err(AppError::not_found("post"));
        };

        let comment = posts::push_comment(&mut tx, post, actor, text).await?;
        tx.commit().await?;

        info!("{actor} commented on {post}");
        Ok(Outcome::with_events(
            comment.id,
            SocialEvent::on_post(NotificationKind::Comment, actor, &row.author(), post),
        ))
    }

    /// Creates a post from text and/or an image payload. The image goes to
    /// the blob store first; only its URL is persisted.
    #[instrument(skip(self, text, image))]
    pub async fn create_post(
        &self,
        actor: &UserId,
        text: Option<String>,
        image: Option<String>,
    ) -> AppResult<PostId> {
        let text = non_blank(text);
        let image = non_blank(image);
        if text.is_none() && image.is_none() {
            return Err(AppError::InvalidInput("Please enter text or image.".to_owned()));
        }

        let mut conn = self.db_pool.acquire().await?;
        if !users::exists(&mut conn, actor).await? {
            return Err(AppError::not_found("user"));
        }
        drop(conn);

        let img = match image {
            Some(image) => Some(self.blobs.upload(&image, "posts").await?),
            None => None,
        };

        match self.insert_post(actor, text.as_deref(), img.as_deref()).await {
            Ok(row) => {
                info!("{actor} created post {}", row.id);
                Ok(row.post_id())
            }
            Err(e) => {
                if let Some(url) = img {
                    self.discard_blob(&url).await;
                }
                Err(e)
            }
        }
    }

    /// Deletes the actor's own post. The stored image is cleaned up after
    /// the record is gone and never fails the call.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, actor: &UserId, post: &PostId) -> AppResult<()> {
        let mut tx = self.db_pool.begin().await?;

        let Some(row) = posts::find(&mut tx, post).await? else {
            return Err(AppError::not_found("post"));
        };
        if &row.author() != actor {
            return Err(AppError::Forbidden(
                "You are not authorized to delete this post.".to_owned(),
            ));
        }

        users::forget_liked_post(&mut tx, post).await?;
        posts::delete(&mut tx, post).await?;
        tx.commit().await?;
        info!("{actor} deleted post {post}");

        if let Some(url) = row.img {
            self.discard_blob(&url).await;
        }
        Ok(())
    }

    async fn insert_post(
        &self,
        actor: &UserId,
        text: Option<&str>,
        img: Option<&str>,
    ) -> AppResult<posts::PostRow> {
        let mut conn = self.db_pool.acquire().await?;
        posts::insert(&mut conn, actor, text, img).await
    }

    async fn discard_blob(&self, url: &str) {
        if let Err(e) = self.blobs.destroy(url).await {
            warn!("failed to destroy blob {url}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        social::testing::{self, RecordingBlobs},
    };

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgo=";

    async fn setup(blobs: RecordingBlobs) -> (SqlitePool, Arc<RecordingBlobs>, InteractionManager) {
        let db_pool = db::in_memory().await.unwrap();
        let blobs = Arc::new(blobs);
        let manager = InteractionManager::new(db_pool.clone(), blobs.clone());
        (db_pool, blobs, manager)
    }

    async fn liked_posts(db_pool: &SqlitePool, user: &UserId) -> Vec<PostId> {
        let mut conn = db_pool.acquire().await.unwrap();
        users::liked_posts(&mut conn, user).await.unwrap()
    }

    #[tokio::test]
    async fn like_twice_restores_both_sides() {
        let (db_pool, _, manager) = setup(RecordingBlobs::default()).await;
        let alice = testing::user(&db_pool, "alice").await;
        let bob = testing::user(&db_pool, "bob").await;
        let post = manager
            .create_post(&alice, Some("hello".to_owned()), None)
            .await
            .unwrap();

        let liked = manager.toggle_like(&bob, &post).await.unwrap();
        assert!(liked.value.liked);
        assert_eq!(liked.value.likes, vec![bob.clone()]);
        assert_eq!(liked_posts(&db_pool, &bob).await, vec![post.clone()]);

        let unliked = manager.toggle_like(&bob, &post).await.unwrap();
        assert!(!unliked.value.liked);
        assert!(unliked.value.likes.is_empty());
        assert!(unliked.events.is_empty());
        assert!(liked_posts(&db_pool, &bob).await.is_empty());
    }

    #[tokio::test]
    async fn liking_own_post_is_silent() {
        let (db_pool, _, manager) = setup(RecordingBlobs::default()).await;
        let alice = testing::user(&db_pool, "alice").await;
        let bob = testing::user(&db_pool, "bob").await;
        let post = manager
            .create_post(&alice, Some("hello".to_owned()), None)
            .await
            .unwrap();

        let own = manager.toggle_like(&alice, &post).await.unwrap();
        assert!(own.events.is_empty());

        let foreign = manager.toggle_like(&bob, &post).await.unwrap();
        assert_eq!(foreign.events.len(), 1);
        assert_eq!(foreign.events[0].kind, NotificationKind::Like);
        assert_eq!(foreign.events[0].to, alice);
        assert_eq!(foreign.events[0].post, Some(post));
    }

    #[tokio::test]
    async fn liking_a_missing_post_is_not_found() {
        let (db_pool, _, manager) = setup(RecordingBlobs::default()).await;
        let bob = testing::user(&db_pool, "bob").await;

        let err = manager
            .toggle_like(&bob, &PostId::from("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(liked_posts(&db_pool, &bob).await.is_empty());
    }

    #[tokio::test]
    async fn blank_comment_appends_nothing() {
        let (db_pool, _, manager) = setup(RecordingBlobs::default()).await;
        let alice = testing::user(&db_pool, "alice").await;
        let post = manager
            .create_post(&alice, Some("hello".to_owned()), None)
            .await
            .unwrap();

        for text in ["", "   "] {
            let err = manager.add_comment(&alice, &post, text).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }

        let mut conn = db_pool.acquire().await.unwrap();
        assert!(posts::comments(&mut conn, &post).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn comments_keep_arrival_order_and_notify_owner() {
        let (db_pool, _, manager) = setup(RecordingBlobs::default()).await;
        let alice = testing::user(&db_pool, "alice").await;
        let bob = testing::user(&db_pool, "bob").await;
        let post = manager
            .create_post(&alice, Some("hello".to_owned()), None)
            .await
            .unwrap();

        let first = manager.add_comment(&bob, &post, "first").await.unwrap();
        assert_eq!(first.events.len(), 1);
        assert_eq!(first.events[0].kind, NotificationKind::Comment);

        let own = manager.add_comment(&alice, &post, "thanks").await.unwrap();
        assert!(own.events.is_empty());

        let _ = manager.add_comment(&bob, &post, "first").await.unwrap();

        let mut conn = db_pool.acquire().await.unwrap();
        let texts: Vec<String> = posts::comments(&mut conn, &post)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, ["first", "thanks", "first"]);
    }

    #[tokio::test]
    async fn comment_on_missing_post_is_not_found() {
        let (db_pool, _, manager) = setup(RecordingBlobs::default()).await;
        let bob = testing::user(&db_pool, "bob").await;

        let err = manager
            .add_comment(&bob, &PostId::from("nope"), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_post_is_invalid() {
        let (db_pool, _, manager) = setup(RecordingBlobs::default()).await;
        let alice = testing::user(&db_pool, "alice").await;

        let err = manager.create_post(&alice, None, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = manager
            .create_post(&alice, Some("  ".to_owned()), Some(String::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn image_posts_store_the_blob_url() {
        let (db_pool, _, manager) = setup(RecordingBlobs::default()).await;
        let alice = testing::user(&db_pool, "alice").await;

        let post = manager
            .create_post(&alice, None, Some(PIXEL.to_owned()))
            .await
            .unwrap();

        let mut conn = db_pool.acquire().await.unwrap();
        let row = posts::find(&mut conn, &post).await.unwrap().unwrap();
        let img = row.img.unwrap();
        assert!(img.starts_with("https://blobs.test/posts/"));
        assert!(row.text.is_none());
    }

    #[tokio::test]
    async fn only_the_author_may_delete() {
        let (db_pool, blobs, manager) = setup(RecordingBlobs::default()).await;
        let alice = testing::user(&db_pool, "alice").await;
        let bob = testing::user(&db_pool, "bob").await;
        let post = manager
            .create_post(&alice, Some("mine".to_owned()), Some(PIXEL.to_owned()))
            .await
            .unwrap();

        let err = manager.delete_post(&bob, &post).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(blobs.destroyed.lock().unwrap().is_empty());

        let mut conn = db_pool.acquire().await.unwrap();
        let row = posts::find(&mut conn, &post).await.unwrap().unwrap();
        drop(conn);
        assert!(row.img.is_some());

        manager.delete_post(&alice, &post).await.unwrap();
        assert_eq!(*blobs.destroyed.lock().unwrap(), vec![row.img.unwrap()]);

        let err = manager.delete_post(&alice, &post).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_clears_liked_pointers() {
        let (db_pool, _, manager) = setup(RecordingBlobs::default()).await;
        let alice = testing::user(&db_pool, "alice").await;
        let bob = testing::user(&db_pool, "bob").await;
        let post = manager
            .create_post(&alice, Some("hello".to_owned()), None)
            .await
            .unwrap();

        let _ = manager.toggle_like(&bob, &post).await.unwrap();
        let _ = manager.add_comment(&bob, &post, "nice").await.unwrap();
        manager.delete_post(&alice, &post).await.unwrap();

        assert!(liked_posts(&db_pool, &bob).await.is_empty());
        let mut conn = db_pool.acquire().await.unwrap();
        assert!(posts::comments(&mut conn, &post).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_blob_cleanup_does_not_block_delete() {
        let (db_pool, _, manager) = setup(RecordingBlobs {
            fail_destroy: true,
            ..Default::default()
        })
        .await;
        let alice = testing::user(&db_pool, "alice").await;
        let post = manager
            .create_post(&alice, None, Some(PIXEL.to_owned()))
            .await
            .unwrap();

        manager.delete_post(&alice, &post).await.unwrap();

        let mut conn = db_pool.acquire().await.unwrap();
        assert!(posts::find(&mut conn, &post).await.unwrap().is_none());
    }
}
