use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait MessageRepo: Send + Sync {
    async fn insert(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
    ) -> Result<DirectMessageRecord, MessageError>;

    async fn get_by_id(
        &self,
        message_id: MessageId,
    ) -> Result<Option<DirectMessageRecord>, MessageError>;

    /// Messages exchanged between two users in either direction, newest first.
    async fn get_between(
        &self,
        a: UserId,
        b: UserId,
        limit: u32,
    ) -> Result<Vec<DirectMessageRecord>, MessageError>;

    async fn mark_read(&self, message_id: MessageId) -> Result<(), MessageError>;
}
