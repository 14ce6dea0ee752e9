//! The social graph: who follows whom, who liked and commented on what,
//! and the feeds and notifications that fall out of it.

mod events;
mod feed;
mod inbox;
mod interactions;
mod relationships;

pub use events::{Outcome, SocialEvent};
pub use feed::FeedComposer;
pub use inbox::Inbox;
pub use interactions::{InteractionManager, LikeState};
pub use relationships::{DEFAULT_SUGGESTIONS, FollowState, MAX_SUGGESTIONS, RelationshipManager};

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sqlx::SqlitePool;

    use crate::{
        blob::{BlobError, BlobStore},
        model::UserId,
        store::users::{self, NewUser},
    };

    pub(crate) async fn user(db_pool: &SqlitePool, username: &str) -> UserId {
        let mut conn = db_pool.acquire().await.unwrap();
        users::insert(
            &mut conn,
            NewUser {
                username,
                email: &format!("{username}@example.com"),
                password_hash: "$argon2id$stub",
                full_name: &format!("{username} tester"),
            },
        )
        .await
        .unwrap()
        .user_id()
    }

    /// Hands out fake URLs and remembers what was destroyed.
    #[derive(Default)]
    pub(crate) struct RecordingBlobs {
        pub(crate) destroyed: Mutex<Vec<String>>,
        pub(crate) fail_destroy: bool,
    }

    #[async_trait]
    impl BlobStore for RecordingBlobs {
        async fn upload(&self, data_uri: &str, folder: &str) -> Result<String, BlobError> {
            if !data_uri.starts_with("data:image/") {
                return Err(BlobError::InvalidPayload("not an image".to_owned()));
            }
            Ok(format!("https://blobs.test/{folder}/{}.png", uuid::Uuid::now_v7().simple()))
        }

        async fn destroy(&self, url: &str) -> Result<(), BlobError> {
            if self.fail_destroy {
                return Err(BlobError::ForeignUrl(url.to_owned()));
            }
            self.destroyed.lock().unwrap().push(url.to_owned());
            Ok(())
        }
    }
}
