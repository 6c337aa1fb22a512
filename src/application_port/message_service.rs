use crate::domain_model::{DirectMessageRecord, MessageId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("message not found")]
    NotFound,
    #[error("not a participant of this message")]
    NotParticipant,
    #[error("validation: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait MessageService: Send + Sync {
    /// Persist one direct message. Sender/receiver existence is the
    /// caller's concern (the dispatcher checks before invoking).
    async fn send_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
    ) -> Result<DirectMessageRecord, MessageError>;

    async fn get_conversation(
        &self,
        caller: UserId,
        other: UserId,
        limit: u32,
    ) -> Result<Vec<DirectMessageRecord>, MessageError>;

    /// Only the sender or the receiver may mark a message read.
    async fn mark_read(&self, message_id: MessageId, caller: UserId) -> Result<(), MessageError>;
}
