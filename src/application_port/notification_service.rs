use crate::domain_model::{NotificationId, NotificationRecord, PostId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("post not found")]
    PostNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("notification not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(String),
}

/// Outbound half of the realtime layer, as seen from the domain.
/// Implemented by the dispatcher; a publish reaches every live connection
/// of the recipient and silently does nothing when there are none.
#[async_trait::async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, notification: &NotificationRecord) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// No-op when the actor likes their own post.
    async fn create_like_notification(
        &self,
        post_id: PostId,
        liker: UserId,
    ) -> Result<(), NotificationError>;

    /// No-op when the actor comments on their own post.
    async fn create_comment_notification(
        &self,
        post_id: PostId,
        commenter: UserId,
    ) -> Result<(), NotificationError>;

    /// No-op when follower == followed.
    async fn create_follow_notification(
        &self,
        follower: UserId,
        followed: UserId,
    ) -> Result<(), NotificationError>;

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>, NotificationError>;

    async fn mark_read(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> Result<(), NotificationError>;

    async fn mark_all_read(&self, user_id: UserId) -> Result<(), NotificationError>;
}
