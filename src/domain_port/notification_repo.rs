use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn insert(
        &self,
        recipient_id: UserId,
        sender_id: Option<UserId>,
        kind: NotificationKind,
        target_id: Option<PostId>,
    ) -> Result<NotificationRecord, NotificationError>;

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>, NotificationError>;

    /// Returns false when no row matches the (id, recipient) pair.
    async fn mark_read(
        &self,
        notification_id: NotificationId,
        recipient_id: UserId,
    ) -> Result<bool, NotificationError>;

    async fn mark_all_read(&self, recipient_id: UserId) -> Result<(), NotificationError>;
}
