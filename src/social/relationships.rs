use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::{
    AppError, AppResult,
    model::{PublicUser, UserId},
    store::users,
};

use super::{Outcome, SocialEvent};

pub const DEFAULT_SUGGESTIONS: u32 = 4;
pub const MAX_SUGGESTIONS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowState {
    Followed,
    Unfollowed,
}

/// Owns the follower/following edge pairs.
#[derive(Clone)]
pub struct RelationshipManager {
    db_pool: SqlitePool,
}

impl RelationshipManager {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Flips `actor -> target`. Both sides of the edge change in one
    /// transaction; only the follow direction notifies.
    #[instrument(skip(self))]
    pub async fn toggle_follow(
        &self,
        actor: &UserId,
        target: &UserId,
    ) -> AppResult<Outcome<FollowState>> {
        if actor == target {
            return Err(AppError::InvalidOperation("you can't follow yourself".to_owned()));
        }

        let mut tx = self.db_pool.begin().await?;

        // the owner-side delete doubles as the membership test and takes the write lock
        if users::remove_following(&mut tx, actor, target).await? {
            users::remove_follower(&mut tx, target, actor).await?;
            tx.commit().await?;
            info!("{actor} unfollowed {target}");
            return Ok(Outcome::quiet(FollowState::Unfollowed));
        }

        if !users::exists(&mut tx, actor).await? || !users::exists(&mut tx, target).await? {
            return Err(AppError::not_found("user"));
        }

        users::add_following(&mut tx, actor, target).await?;
        users::add_follower(&mut tx, target, actor).await?;
        tx.commit().await?;

        info!("{actor} followed {target}");
        Ok(Outcome::with_events(
            FollowState::Followed,
            [SocialEvent::follow(actor, target)],
        ))
    }

    /// Up to `limit` users the actor doesn't follow yet, never the actor.
    pub async fn suggested_users(&self, actor: &UserId, limit: u32) -> AppResult<Vec<PublicUser>> {
        let limit = limit.min(MAX_SUGGESTIONS);
        let mut tx = self.db_pool.begin().await?;

        let rows = users::suggested(&mut tx, actor, limit).await?;
        let mut suggestions = Vec::with_capacity(rows.len());
        for row in rows {
            suggestions.push(users::to_public(&mut tx, row).await?);
        }

        tx.commit().await?;
        Ok(suggestions)
    }

    pub async fn followers(&self, user: &UserId) -> AppResult<Vec<PublicUser>> {
        let mut tx = self.db_pool.begin().await?;
        if !users::exists(&mut tx, user).await? {
            return Err(AppError::not_found("user"));
        }
        let ids = users::followers(&mut tx, user).await?;
        let people = users::public_many(&mut tx, &ids).await?;
        tx.commit().await?;
        Ok(people)
    }

    pub async fn followings(&self, user: &UserId) -> AppResult<Vec<PublicUser>> {
        let mut tx = self.db_pool.begin().await?;
        if !users::exists(&mut tx, user).await? {
            return Err(AppError::not_found("user"));
        }
        let ids = users::followings(&mut tx, user).await?;
        let people = users::public_many(&mut tx, &ids).await?;
        tx.commit().await?;
        Ok(people)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, model::NotificationKind, social::testing};

    async fn edges(db_pool: &SqlitePool, user: &UserId) -> (Vec<UserId>, Vec<UserId>) {
        let mut conn = db_pool.acquire().await.unwrap();
        (
            users::followers(&mut conn, user).await.unwrap(),
            users::followings(&mut conn, user).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn follow_then_unfollow_round_trips() {
        let db_pool = db::in_memory().await.unwrap();
        let alice = testing::user(&db_pool, "alice").await;
        let bob = testing::user(&db_pool, "bob").await;
        let manager = RelationshipManager::new(db_pool.clone());

        let outcome = manager.toggle_follow(&bob, &alice).await.unwrap();
        assert_eq!(outcome.value, FollowState::Followed);
        assert_eq!(edges(&db_pool, &bob).await.1, vec![alice.clone()]);
        assert_eq!(edges(&db_pool, &alice).await.0, vec![bob.clone()]);
        assert!(edges(&db_pool, &alice).await.1.is_empty());

        let outcome = manager.toggle_follow(&bob, &alice).await.unwrap();
        assert_eq!(outcome.value, FollowState::Unfollowed);
        assert!(edges(&db_pool, &bob).await.1.is_empty());
        assert!(edges(&db_pool, &alice).await.0.is_empty());
    }

    #[tokio::test]
    async fn only_the_follow_transition_notifies() {
        let db_pool = db::in_memory().await.unwrap();
        let alice = testing::user(&db_pool, "alice").await;
        let bob = testing::user(&db_pool, "bob").await;
        let manager = RelationshipManager::new(db_pool);

        let followed = manager.toggle_follow(&bob, &alice).await.unwrap();
        assert_eq!(followed.events.len(), 1);
        assert_eq!(followed.events[0].kind, NotificationKind::Follow);
        assert_eq!(followed.events[0].to, alice);

        let unfollowed = manager.toggle_follow(&bob, &alice).await.unwrap();
        assert!(unfollowed.events.is_empty());
    }

    #[tokio::test]
    async fn self_follow_is_invalid() {
        let db_pool = db::in_memory().await.unwrap();
        let alice = testing::user(&db_pool, "alice").await;
        let manager = RelationshipManager::new(db_pool.clone());

        let err = manager.toggle_follow(&alice, &alice).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
        assert_eq!(edges(&db_pool, &alice).await, (vec![], vec![]));

        // even for ids nobody owns
        let ghost = UserId::from("ghost");
        let err = manager.toggle_follow(&ghost, &ghost).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let db_pool = db::in_memory().await.unwrap();
        let alice = testing::user(&db_pool, "alice").await;
        let manager = RelationshipManager::new(db_pool.clone());

        let err = manager
            .toggle_follow(&alice, &UserId::from("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(edges(&db_pool, &alice).await.1.is_empty());
    }

    #[tokio::test]
    async fn suggestions_skip_self_and_followings() {
        let db_pool = db::in_memory().await.unwrap();
        let alice = testing::user(&db_pool, "alice").await;
        let bob = testing::user(&db_pool, "bob").await;
        let carol = testing::user(&db_pool, "carol").await;
        let dave = testing::user(&db_pool, "dave").await;
        let manager = RelationshipManager::new(db_pool);

        let _ = manager.toggle_follow(&alice, &bob).await.unwrap();

        let suggested: Vec<UserId> = manager
            .suggested_users(&alice, DEFAULT_SUGGESTIONS)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(suggested, vec![carol.clone(), dave]);

        let one = manager.suggested_users(&alice, 1).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].id, carol);
    }

    #[tokio::test]
    async fn follower_listings_resolve_profiles() {
        let db_pool = db::in_memory().await.unwrap();
        let alice = testing::user(&db_pool, "alice").await;
        let bob = testing::user(&db_pool, "bob").await;
        let manager = RelationshipManager::new(db_pool);

        let _ = manager.toggle_follow(&bob, &alice).await.unwrap();

        let followers = manager.followers(&alice).await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "bob");
        assert_eq!(followers[0].followings, vec![alice.clone()]);

        assert!(manager.followings(&alice).await.unwrap().is_empty());
        assert!(matches!(
            manager.followers(&UserId::from("ghost")).await,
            Err(AppError::NotFound(_))
        ));
    }
}
