use crate::model::{NotificationKind, PostId, UserId};

/// A notification that a state transition wants recorded. Managers only
/// produce these; [`super::Inbox::dispatch`] persists them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialEvent {
    pub from: UserId,
    pub to: UserId,
    pub kind: NotificationKind,
    pub post: Option<PostId>,
}

impl SocialEvent {
    pub fn follow(from: &UserId, to: &UserId) -> Self {
        Self {
            from: from.clone(),
            to: to.clone(),
            kind: NotificationKind::Follow,
            post: None,
        }
    }

    /// A like or comment on `post`, or nothing when the actor owns the post.
    pub fn on_post(
        kind: NotificationKind,
        from: &UserId,
        owner: &UserId,
        post: &PostId,
    ) -> Option<Self> {
        (from != owner).then(|| Self {
            from: from.clone(),
            to: owner.clone(),
            kind,
            post: Some(post.clone()),
        })
    }
}

/// Result of a mutation plus the events it still owes the inbox.
#[derive(Debug)]
#[must_use]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<SocialEvent>,
}

impl<T> Outcome<T> {
    pub fn quiet(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }

    pub fn with_events(value: T, events: impl IntoIterator<Item = SocialEvent>) -> Self {
        Self {
            value,
            events: events.into_iter().collect(),
        }
    }
}
