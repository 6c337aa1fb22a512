use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlMessageRepo {
    pool: MySqlPool,
}

impl MySqlMessageRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlMessageRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<DirectMessageRecord, MessageError> {
        Ok(DirectMessageRecord {
            message_id: row
                .try_get("id")
                .map_err(|e| MessageError::Store(e.to_string()))?,
            sender_id: row
                .try_get("sender_id")
                .map_err(|e| MessageError::Store(e.to_string()))?,
            receiver_id: row
                .try_get("receiver_id")
                .map_err(|e| MessageError::Store(e.to_string()))?,
            content: row
                .try_get("content")
                .map_err(|e| MessageError::Store(e.to_string()))?,
            is_read: row
                .try_get("is_read")
                .map_err(|e| MessageError::Store(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| MessageError::Store(e.to_string()))?,
        })
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<DirectMessageRecord>, MessageError> {
        let row_opt = sqlx::query(
            r#"
SELECT id, sender_id, receiver_id, content, is_read, created_at
FROM direct_message
WHERE id = ?
"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| MessageError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }
}

#[async_trait::async_trait]
impl MessageRepo for MySqlMessageRepo {
    async fn insert(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
    ) -> Result<DirectMessageRecord, MessageError> {
        let result = sqlx::query(
            r#"
INSERT INTO direct_message (sender_id, receiver_id, content)
VALUES (?, ?, ?)
"#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(|e| MessageError::Store(e.to_string()))?;

        let id = result.last_insert_id() as i64;
        self.fetch_by_id(id)
            .await?
            .ok_or_else(|| MessageError::Store(format!("inserted message {id} not found")))
    }

    async fn get_by_id(
        &self,
        message_id: MessageId,
    ) -> Result<Option<DirectMessageRecord>, MessageError> {
        self.fetch_by_id(message_id.0).await
    }

    async fn get_between(
        &self,
        a: UserId,
        b: UserId,
        limit: u32,
    ) -> Result<Vec<DirectMessageRecord>, MessageError> {
        let rows = sqlx::query(
            r#"
SELECT id, sender_id, receiver_id, content, is_read, created_at
FROM direct_message
WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
ORDER BY created_at DESC, id DESC
LIMIT ?
"#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MessageError::Store(e.to_string()))?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn mark_read(&self, message_id: MessageId) -> Result<(), MessageError> {
        sqlx::query(r#"UPDATE direct_message SET is_read = 1 WHERE id = ?"#)
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MessageError::Store(e.to_string()))?;

        Ok(())
    }
}
