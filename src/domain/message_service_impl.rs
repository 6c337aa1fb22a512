use crate::application_port::{MessageError, MessageService};
use crate::domain_model::{DirectMessageRecord, MessageId, UserId};
use crate::domain_port::MessageRepo;
use std::sync::Arc;

pub struct RealMessageService {
    message_repo: Arc<dyn MessageRepo>,
    max_content_len: usize,
}

impl RealMessageService {
    pub fn new(message_repo: Arc<dyn MessageRepo>) -> Self {
        Self {
            message_repo,
            max_content_len: 4000,
        }
    }
}

#[async_trait::async_trait]
impl MessageService for RealMessageService {
    async fn send_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
    ) -> Result<DirectMessageRecord, MessageError> {
        if content.is_empty() {
            return Err(MessageError::Validation("empty message".to_string()));
        }
        if content.len() > self.max_content_len {
            return Err(MessageError::Validation("message too long".to_string()));
        }

        self.message_repo
            .insert(sender_id, receiver_id, content)
            .await
    }

    async fn get_conversation(
        &self,
        caller: UserId,
        other: UserId,
        limit: u32,
    ) -> Result<Vec<DirectMessageRecord>, MessageError> {
        self.message_repo.get_between(caller, other, limit).await
    }

    async fn mark_read(&self, message_id: MessageId, caller: UserId) -> Result<(), MessageError> {
        let message = self
            .message_repo
            .get_by_id(message_id)
            .await?
            .ok_or(MessageError::NotFound)?;

        if message.sender_id != caller && message.receiver_id != caller {
            return Err(MessageError::NotParticipant);
        }

        self.message_repo.mark_read(message_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryMessageRepo {
        rows: Mutex<Vec<DirectMessageRecord>>,
    }

    #[async_trait::async_trait]
    impl MessageRepo for MemoryMessageRepo {
        async fn insert(
            &self,
            sender_id: UserId,
            receiver_id: UserId,
            content: &str,
        ) -> Result<DirectMessageRecord, MessageError> {
            let mut rows = self.rows.lock().unwrap();
            let record = DirectMessageRecord {
                message_id: MessageId(rows.len() as i64 + 1),
                sender_id,
                receiver_id,
                content: content.to_owned(),
                is_read: false,
                created_at: Utc::now(),
            };
            rows.push(record.clone());
            Ok(record)
        }

        async fn get_by_id(
            &self,
            message_id: MessageId,
        ) -> Result<Option<DirectMessageRecord>, MessageError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|m| m.message_id == message_id)
                .cloned())
        }

        async fn get_between(
            &self,
            a: UserId,
            b: UserId,
            limit: u32,
        ) -> Result<Vec<DirectMessageRecord>, MessageError> {
            let rows = self.rows.lock().unwrap();
            let mut out: Vec<_> = rows
                .iter()
                .filter(|m| {
                    (m.sender_id == a && m.receiver_id == b)
                        || (m.sender_id == b && m.receiver_id == a)
                })
                .cloned()
                .collect();
            out.reverse();
            out.truncate(limit as usize);
            Ok(out)
        }

        async fn mark_read(&self, message_id: MessageId) -> Result<(), MessageError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(m) = rows.iter_mut().find(|m| m.message_id == message_id) {
                m.is_read = true;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn conversation_covers_both_directions() {
        let service = RealMessageService::new(Arc::new(MemoryMessageRepo::default()));

        service
            .send_message(UserId(1), UserId(2), "hi")
            .await
            .unwrap();
        service
            .send_message(UserId(2), UserId(1), "hello back")
            .await
            .unwrap();
        service
            .send_message(UserId(1), UserId(3), "unrelated")
            .await
            .unwrap();

        let conversation = service
            .get_conversation(UserId(1), UserId(2), 50)
            .await
            .unwrap();
        assert_eq!(conversation.len(), 2);
    }

    #[tokio::test]
    async fn only_participants_may_mark_read() {
        let service = RealMessageService::new(Arc::new(MemoryMessageRepo::default()));
        let message = service
            .send_message(UserId(1), UserId(2), "hi")
            .await
            .unwrap();

        assert!(matches!(
            service.mark_read(message.message_id, UserId(3)).await,
            Err(MessageError::NotParticipant)
        ));
        service
            .mark_read(message.message_id, UserId(2))
            .await
            .unwrap();

        assert!(matches!(
            service.mark_read(MessageId(999), UserId(1)).await,
            Err(MessageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn empty_message_rejected() {
        let service = RealMessageService::new(Arc::new(MemoryMessageRepo::default()));
        assert!(matches!(
            service.send_message(UserId(1), UserId(2), "").await,
            Err(MessageError::Validation(_))
        ));
    }
}
