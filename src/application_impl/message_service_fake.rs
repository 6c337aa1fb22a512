use crate::application_port::{MessageError, MessageService};
use crate::domain_model::{DirectMessageRecord, MessageId, UserId};
use chrono::Utc;
use std::sync::Mutex;

/// In-memory message log with sequential ids.
pub struct FakeMessageService {
    messages: Mutex<Vec<DirectMessageRecord>>,
}

impl FakeMessageService {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn stored(&self) -> Vec<DirectMessageRecord> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MessageService for FakeMessageService {
    async fn send_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
    ) -> Result<DirectMessageRecord, MessageError> {
        let mut messages = self.messages.lock().unwrap();
        let record = DirectMessageRecord {
            message_id: MessageId(messages.len() as i64 + 1),
            sender_id,
            receiver_id,
            content: content.to_owned(),
            is_read: false,
            created_at: Utc::now(),
        };
        messages.push(record.clone());
        Ok(record)
    }

    async fn get_conversation(
        &self,
        caller: UserId,
        other: UserId,
        limit: u32,
    ) -> Result<Vec<DirectMessageRecord>, MessageError> {
        let messages = self.messages.lock().unwrap();
        let mut out: Vec<_> = messages
            .iter()
            .filter(|m| {
                (m.sender_id == caller && m.receiver_id == other)
                    || (m.sender_id == other && m.receiver_id == caller)
            })
            .cloned()
            .collect();
        out.reverse();
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn mark_read(&self, message_id: MessageId, caller: UserId) -> Result<(), MessageError> {
        let mut messages = self.messages.lock().unwrap();
        let message = messages
            .iter_mut()
            .find(|m| m.message_id == message_id)
            .ok_or(MessageError::NotFound)?;
        if message.sender_id != caller && message.receiver_id != caller {
            return Err(MessageError::NotParticipant);
        }
        message.is_read = true;
        Ok(())
    }
}
