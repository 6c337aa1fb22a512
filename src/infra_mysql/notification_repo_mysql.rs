use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlNotificationRepo {
    pool: MySqlPool,
}

impl MySqlNotificationRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlNotificationRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<NotificationRecord, NotificationError> {
        let kind: String = row
            .try_get("kind")
            .map_err(|e| NotificationError::Store(e.to_string()))?;
        let kind = kind
            .parse::<NotificationKind>()
            .map_err(NotificationError::Store)?;

        Ok(NotificationRecord {
            notification_id: row
                .try_get("id")
                .map_err(|e| NotificationError::Store(e.to_string()))?,
            recipient_id: row
                .try_get("recipient_id")
                .map_err(|e| NotificationError::Store(e.to_string()))?,
            sender_id: row
                .try_get("sender_id")
                .map_err(|e| NotificationError::Store(e.to_string()))?,
            kind,
            target_id: row
                .try_get("target_id")
                .map_err(|e| NotificationError::Store(e.to_string()))?,
            is_read: row
                .try_get("is_read")
                .map_err(|e| NotificationError::Store(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| NotificationError::Store(e.to_string()))?,
        })
    }
}

#[async_trait::async_trait]
impl NotificationRepo for MySqlNotificationRepo {
    async fn insert(
        &self,
        recipient_id: UserId,
        sender_id: Option<UserId>,
        kind: NotificationKind,
        target_id: Option<PostId>,
    ) -> Result<NotificationRecord, NotificationError> {
        let result = sqlx::query(
            r#"
INSERT INTO notification (recipient_id, sender_id, kind, target_id)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(recipient_id)
        .bind(sender_id)
        .bind(kind.as_str())
        .bind(target_id)
        .execute(&self.pool)
        .await
        .map_err(|e| NotificationError::Store(e.to_string()))?;

        let id = result.last_insert_id() as i64;
        let row = sqlx::query(
            r#"
SELECT id, recipient_id, sender_id, kind, target_id, is_read, created_at
FROM notification
WHERE id = ?
"#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| NotificationError::Store(e.to_string()))?;

        Self::row_to_record(row)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>, NotificationError> {
        let rows = sqlx::query(
            r#"
SELECT id, recipient_id, sender_id, kind, target_id, is_read, created_at
FROM notification
WHERE recipient_id = ?
ORDER BY created_at DESC, id DESC
LIMIT ?
"#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NotificationError::Store(e.to_string()))?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn mark_read(
        &self,
        notification_id: NotificationId,
        recipient_id: UserId,
    ) -> Result<bool, NotificationError> {
        let result = sqlx::query(
            r#"UPDATE notification SET is_read = 1 WHERE id = ? AND recipient_id = ?"#,
        )
        .bind(notification_id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(|e| NotificationError::Store(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, recipient_id: UserId) -> Result<(), NotificationError> {
        sqlx::query(r#"UPDATE notification SET is_read = 1 WHERE recipient_id = ? AND is_read = 0"#)
            .bind(recipient_id)
            .execute(&self.pool)
            .await
            .map_err(|e| NotificationError::Store(e.to_string()))?;

        Ok(())
    }
}
